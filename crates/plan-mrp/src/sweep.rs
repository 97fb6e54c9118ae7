//! 排程掛鉤與執行狀態
//!
//! 引擎本身不帶排程器：定時掃描由外部 cron 呼叫 [`run_sweep`]，
//! 採購訂單狀態變更由單據模組呼叫 [`on_purchase_order_status_change`]。

use std::collections::HashMap;

use uuid::Uuid;

use plan_core::{PlanError, PurchaseOrderStatus, Result};
use plan_method::PlanningStore;

use crate::engine::{MrpEngine, MrpScope};
use crate::MrpRunSummary;

/// 單一公司的 MRP 執行狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum RunState {
    /// 尚未執行過
    #[default]
    Idle,
    /// 執行中
    Running,
    /// 上次執行成功
    Completed,
    /// 上次執行失敗
    Failed,
}

/// 每家公司的執行狀態登錄
///
/// 同一家公司同時只允許一個在途執行；狀態在行程內追蹤，
/// 不落地持久化。
#[derive(Debug, Default)]
pub struct RunRegistry {
    states: HashMap<String, RunState>,
}

impl RunRegistry {
    /// 創建空的登錄
    pub fn new() -> Self {
        Self::default()
    }

    /// 查詢公司的執行狀態
    pub fn state(&self, company_id: &str) -> RunState {
        self.states.get(company_id).copied().unwrap_or_default()
    }

    /// 宣告開始執行；已在執行中則拒絕
    pub fn begin(&mut self, company_id: &str) -> Result<()> {
        if self.state(company_id) == RunState::Running {
            return Err(PlanError::RunInProgress(company_id.to_string()));
        }
        self.states
            .insert(company_id.to_string(), RunState::Running);
        Ok(())
    }

    /// 標記執行成功
    pub fn complete(&mut self, company_id: &str) {
        self.states
            .insert(company_id.to_string(), RunState::Completed);
    }

    /// 標記執行失敗
    pub fn fail(&mut self, company_id: &str) {
        self.states
            .insert(company_id.to_string(), RunState::Failed);
    }
}

/// 掃描執行的彙總
#[derive(Debug, Default)]
pub struct SweepSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, PlanError)>,
}

/// 依序為每家公司執行全範圍 MRP
///
/// 單一公司失敗只記錄並繼續，不影響其他公司。
pub fn run_sweep<S: PlanningStore + Sync>(
    engine: &MrpEngine,
    store: &mut S,
    registry: &mut RunRegistry,
    companies: &[String],
    user_id: &str,
) -> SweepSummary {
    let mut summary = SweepSummary::default();

    for company_id in companies {
        match engine.run(store, registry, MrpScope::Company, company_id, user_id) {
            Ok(_) => summary.succeeded.push(company_id.clone()),
            Err(e) => {
                tracing::error!(company = %company_id, error = %e, "公司掃描執行失敗，繼續下一家");
                summary.failed.push((company_id.clone(), e));
            }
        }
    }

    tracing::info!(
        succeeded = summary.succeeded.len(),
        failed = summary.failed.len(),
        "MRP 掃描完成"
    );
    summary
}

/// 採購訂單狀態變更掛鉤
///
/// 轉入 Planned 時同步觸發該單物料的窄範圍重算；其他轉換只更新狀態。
pub fn on_purchase_order_status_change<S: PlanningStore + Sync>(
    engine: &MrpEngine,
    store: &mut S,
    registry: &mut RunRegistry,
    company_id: &str,
    order_id: Uuid,
    new_status: PurchaseOrderStatus,
    user_id: &str,
) -> Result<Option<MrpRunSummary>> {
    let mut order = store.purchase_order(company_id, order_id)?;
    let previous = order.status;
    order.status = new_status;
    store.upsert_purchase_order(order)?;

    if new_status == PurchaseOrderStatus::Planned && previous != PurchaseOrderStatus::Planned {
        let summary = engine.run(
            store,
            registry,
            MrpScope::PurchaseOrder(order_id),
            company_id,
            user_id,
        )?;
        return Ok(Some(summary));
    }
    Ok(None)
}
