//! 需求模型

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 需求類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemandType {
    /// 銷售訂單行（未出貨部分）
    SalesOrder,
    /// 工單物料需求（未發料部分）
    JobMaterial,
    /// 相依需求（生產件展開產生）
    Dependent,
    /// 安全庫存
    SafetyStock,
}

/// 需求記錄
///
/// 由外部模組（銷售、工單）持有；MRP 引擎只讀取。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demand {
    /// 需求ID
    pub id: Uuid,

    /// 物料ID
    pub item_id: String,

    /// 庫存地點ID
    pub location_id: String,

    /// 公司ID
    pub company_id: String,

    /// 需求數量
    pub quantity: Decimal,

    /// 已滿足數量（出貨/發料）
    pub fulfilled_quantity: Decimal,

    /// 需求日期
    pub need_date: NaiveDate,

    /// 需求類型
    pub demand_type: DemandType,

    /// 來源單據（如銷售訂單行號、工單號）
    pub source_ref: Option<String>,
}

impl Demand {
    /// 創建新的需求
    pub fn new(
        item_id: String,
        location_id: String,
        company_id: String,
        quantity: Decimal,
        need_date: NaiveDate,
        demand_type: DemandType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            location_id,
            company_id,
            quantity,
            fulfilled_quantity: Decimal::ZERO,
            need_date,
            demand_type,
            source_ref: None,
        }
    }

    /// 建構器模式：設置來源單據
    pub fn with_source_ref(mut self, source_ref: String) -> Self {
        self.source_ref = Some(source_ref);
        self
    }

    /// 建構器模式：設置已滿足數量
    pub fn with_fulfilled(mut self, fulfilled: Decimal) -> Self {
        self.fulfilled_quantity = fulfilled;
        self
    }

    /// 未滿足數量（參與淨算的部分）
    pub fn open_quantity(&self) -> Decimal {
        (self.quantity - self.fulfilled_quantity).max(Decimal::ZERO)
    }

    /// 檢查是否仍有未滿足需求
    pub fn is_open(&self) -> bool {
        self.open_quantity() > Decimal::ZERO
    }

    /// 檢查是否為相依需求
    pub fn is_dependent(&self) -> bool {
        self.demand_type == DemandType::Dependent
    }
}
