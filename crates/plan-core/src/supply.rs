//! 供應模型

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 供應類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyType {
    /// 現有庫存
    OnHand,
    /// 未結採購訂單行
    PurchaseOrder,
    /// 排程中工單的產出
    ScheduledJob,
    /// 計劃供應（MRP生成）
    Planned,
}

/// 供應記錄
///
/// 由外部模組（庫存、採購、工單）持有；MRP 引擎只讀取。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supply {
    /// 供應ID
    pub id: Uuid,

    /// 物料ID
    pub item_id: String,

    /// 庫存地點ID
    pub location_id: String,

    /// 公司ID
    pub company_id: String,

    /// 供應數量
    pub quantity: Decimal,

    /// 可用日期（現有庫存為當日）
    pub available_date: NaiveDate,

    /// 供應類型
    pub supply_type: SupplyType,

    /// 來源單據
    pub source_ref: Option<String>,

    /// 是否已確認（確認的供應不會被 MRP 調整）
    pub is_firm: bool,
}

impl Supply {
    /// 創建新的供應
    pub fn new(
        item_id: String,
        location_id: String,
        company_id: String,
        quantity: Decimal,
        available_date: NaiveDate,
        supply_type: SupplyType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            location_id,
            company_id,
            quantity,
            available_date,
            supply_type,
            source_ref: None,
            is_firm: false,
        }
    }

    /// 建構器模式：設置來源單據
    pub fn with_source_ref(mut self, source_ref: String) -> Self {
        self.source_ref = Some(source_ref);
        self
    }

    /// 建構器模式：設置為確認狀態
    pub fn as_firm(mut self) -> Self {
        self.is_firm = true;
        self
    }

    /// 檢查是否為計劃供應（MRP 生成）
    pub fn is_planned(&self) -> bool {
        self.supply_type == SupplyType::Planned
    }

    /// 檢查是否可被 MRP 調整
    pub fn is_adjustable(&self) -> bool {
        !self.is_firm && self.is_planned()
    }
}
