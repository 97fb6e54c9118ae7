//! 計劃供應模型（MRP 計算結果）

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 計劃供應類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlannedSupplyType {
    /// 建議採購
    Purchase,
    /// 建議工單
    Job,
}

/// 計劃供應記錄
///
/// MRP 輸出本質上是建議性的：每次重算以收斂方式覆寫未確認的記錄。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedSupply {
    /// 計劃供應ID
    pub id: Uuid,

    /// 物料ID
    pub item_id: String,

    /// 庫存地點ID
    pub location_id: String,

    /// 公司ID
    pub company_id: String,

    /// 計劃數量
    pub quantity: Decimal,

    /// 需求日期（完成/到貨日）
    pub due_date: NaiveDate,

    /// 開始日期（下單/開工日，依提前期回推）
    pub start_date: NaiveDate,

    /// 計劃類型
    pub supply_type: PlannedSupplyType,

    /// 觸發本建議的需求來源
    pub source_demand_id: Option<Uuid>,

    /// 是否已被計劃員確認（確認後 MRP 不再覆寫）
    pub is_firm: bool,
}

impl PlannedSupply {
    /// 創建新的計劃供應
    pub fn new(
        item_id: String,
        location_id: String,
        company_id: String,
        quantity: Decimal,
        due_date: NaiveDate,
        start_date: NaiveDate,
        supply_type: PlannedSupplyType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            location_id,
            company_id,
            quantity,
            due_date,
            start_date,
            supply_type,
            source_demand_id: None,
            is_firm: false,
        }
    }

    /// 建構器模式：設置需求來源
    pub fn with_source_demand(mut self, demand_id: Uuid) -> Self {
        self.source_demand_id = Some(demand_id);
        self
    }

    /// 計算提前期（天數）
    pub fn lead_time_days(&self) -> i64 {
        (self.due_date - self.start_date).num_days()
    }

    /// 檢查是否為建議採購
    pub fn is_purchase(&self) -> bool {
        self.supply_type == PlannedSupplyType::Purchase
    }

    /// 檢查是否為建議工單
    pub fn is_job(&self) -> bool {
        self.supply_type == PlannedSupplyType::Job
    }
}
