//! # plan-mrp
//!
//! 物料需求計劃引擎：淨需求計算、批量規則、波次展開與排程掛鉤。

pub mod engine;
pub mod lot_sizing;
pub mod netting;
pub mod sweep;

pub use engine::{MrpEngine, MrpScope};
pub use lot_sizing::LotSizer;
pub use netting::{NetRequirement, NettingCalculator};
pub use sweep::{on_purchase_order_status_change, run_sweep, RunRegistry, RunState, SweepSummary};

use serde::{Deserialize, Serialize};

/// 一次 MRP 執行的彙總
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrpRunSummary {
    /// 公司ID
    pub company_id: String,

    /// 處理的物料/地點組合數
    pub items_processed: usize,

    /// 產生的建議採購數
    pub planned_purchases: usize,

    /// 產生的建議工單數
    pub planned_jobs: usize,

    /// 警告信息
    pub warnings: Vec<MrpWarning>,

    /// 計算耗時（毫秒）
    pub elapsed_ms: Option<u128>,
}

impl MrpRunSummary {
    /// 創建空的彙總
    pub fn new(company_id: String) -> Self {
        Self {
            company_id,
            items_processed: 0,
            planned_purchases: 0,
            planned_jobs: 0,
            warnings: Vec::new(),
            elapsed_ms: None,
        }
    }

    /// 檢查是否有錯誤級警告
    pub fn has_errors(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| w.severity == WarningSeverity::Error)
    }
}

/// MRP 警告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrpWarning {
    pub item_id: String,
    pub message: String,
    pub severity: WarningSeverity,
}

impl MrpWarning {
    pub fn new(item_id: String, message: String, severity: WarningSeverity) -> Self {
        Self {
            item_id,
            message,
            severity,
        }
    }

    pub fn info(item_id: String, message: String) -> Self {
        Self::new(item_id, message, WarningSeverity::Info)
    }

    pub fn warning(item_id: String, message: String) -> Self {
        Self::new(item_id, message, WarningSeverity::Warning)
    }

    pub fn error(item_id: String, message: String) -> Self {
        Self::new(item_id, message, WarningSeverity::Error)
    }
}

/// 警告嚴重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningSeverity {
    Info,
    Warning,
    Error,
}
