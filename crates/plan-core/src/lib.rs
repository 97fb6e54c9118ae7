//! # Plan Core
//!
//! 製造方法與需求計劃的核心資料模型與類型定義

pub mod calendar;
pub mod demand;
pub mod item;
pub mod method;
pub mod orders;
pub mod plan;
pub mod quote;
pub mod supply;

// Re-export 主要類型
pub use calendar::WorkCalendar;
pub use demand::{Demand, DemandType};
pub use item::{Item, LotSizePolicy, LotSizeRule, ReplenishmentPolicy};
pub use method::{MakeMethod, MethodMaterial, MethodOperation, MethodOwner, MethodType};
pub use orders::{
    Job, PurchaseOrder, PurchaseOrderLine, PurchaseOrderStatus, SalesOrder, SalesOrderLine,
};
pub use plan::{PlannedSupply, PlannedSupplyType};
pub use quote::{Quote, QuoteLine, QuoteStatus};
pub use supply::{Supply, SupplyType};

use uuid::Uuid;

/// 計劃引擎錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("驗證失敗: {0}")]
    Validation(String),

    #[error("找不到物料: {0}")]
    ItemNotFound(String),

    #[error("找不到製造方法: {0}")]
    MethodNotFound(Uuid),

    #[error("引用完整性錯誤: {0}")]
    ReferentialIntegrity(String),

    #[error("寫入失敗: {reason}（最後成功寫入節點: {last_written:?}）")]
    Persistence {
        reason: String,
        last_written: Option<Uuid>,
    },

    #[error("修訂版本衝突: 製造方法 {0} 已被其他呼叫者修改")]
    RevisionConflict(Uuid),

    #[error("工序依賴循環: {0}")]
    DependencyCycle(String),

    #[error("跨公司存取被拒: {0}")]
    CompanyMismatch(String),

    #[error("公司 {0} 已有執行中的 MRP 計算")]
    RunInProgress(String),

    #[error("其他錯誤: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PlanError>;
