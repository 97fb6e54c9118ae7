//! MRP 計算引擎
//!
//! 物料/地點組合依低階碼由淺到深結算：某組合結算前，其所有父項
//! 展開的相依需求都已併入該組合的需求，共用件不會漏算。同一階層
//! 的組合彼此獨立，以 rayon 並行計算；寫入一律循序進行。

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use rayon::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use plan_core::{
    Demand, DemandType, Item, PlanError, PlannedSupply, PlannedSupplyType, Result, Supply,
    WorkCalendar,
};
use plan_method::{MethodStore, PlanningStore};

use crate::lot_sizing::LotSizer;
use crate::netting::NettingCalculator;
use crate::sweep::RunRegistry;
use crate::{MrpRunSummary, MrpWarning};

/// MRP 計算範圍
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MrpScope {
    /// 整個公司
    Company,
    /// 單一採購訂單涉及的物料（快速路徑，不展開相依需求）
    PurchaseOrder(Uuid),
}

/// 單一物料/地點組合的計算產出
struct PairPlan {
    planned: Vec<PlannedSupply>,
    dependent: Vec<Demand>,
    warnings: Vec<MrpWarning>,
}

/// MRP 引擎
pub struct MrpEngine {
    calendar: WorkCalendar,
}

impl MrpEngine {
    /// 創建引擎
    pub fn new(calendar: WorkCalendar) -> Self {
        Self { calendar }
    }

    /// 執行一次 MRP 計算
    ///
    /// 每家公司同時只允許一個在途執行；重疊的執行請求直接拒絕，
    /// 不排隊。單一組合失敗記入警告並跳過，不中止整次執行。
    pub fn run<S: PlanningStore + Sync>(
        &self,
        store: &mut S,
        registry: &mut RunRegistry,
        scope: MrpScope,
        company_id: &str,
        user_id: &str,
    ) -> Result<MrpRunSummary> {
        registry.begin(company_id)?;
        let started = Instant::now();

        tracing::info!(company = company_id, user = user_id, ?scope, "MRP 計算開始");

        match self.execute(store, scope, company_id) {
            Ok(mut summary) => {
                summary.elapsed_ms = Some(started.elapsed().as_millis());
                registry.complete(company_id);
                tracing::info!(
                    company = company_id,
                    items = summary.items_processed,
                    purchases = summary.planned_purchases,
                    jobs = summary.planned_jobs,
                    warnings = summary.warnings.len(),
                    "MRP 計算完成"
                );
                Ok(summary)
            }
            Err(e) => {
                registry.fail(company_id);
                tracing::error!(company = company_id, error = %e, "MRP 計算失敗");
                Err(e)
            }
        }
    }

    fn execute<S: PlanningStore + Sync>(
        &self,
        store: &mut S,
        scope: MrpScope,
        company_id: &str,
    ) -> Result<MrpRunSummary> {
        // 採購訂單範圍：只重算該單涉及的物料，不展開
        let (scope_items, explode) = match scope {
            MrpScope::Company => (None, true),
            MrpScope::PurchaseOrder(order_id) => {
                let order = store.purchase_order(company_id, order_id)?;
                (Some(order.item_ids()), false)
            }
        };

        store.clear_unfirm_planned(company_id, scope_items.as_deref())?;

        // 快照：引擎計算期間的需求與供應視圖固定
        let supplies = store.supplies(company_id)?;
        let levels = if explode {
            Self::low_level_codes(store, company_id)?
        } else {
            HashMap::new()
        };

        // 待結算需求依（物料, 地點）歸組；相依需求在父層結算後併入
        let mut pending: HashMap<(String, String), Vec<Demand>> = HashMap::new();
        for demand in store.open_demands(company_id)? {
            if let Some(items) = &scope_items {
                if !items.contains(&demand.item_id) {
                    continue;
                }
            }
            pending
                .entry((demand.item_id.clone(), demand.location_id.clone()))
                .or_default()
                .push(demand);
        }

        let mut summary = MrpRunSummary::new(company_id.to_string());
        let mut processed: HashSet<(String, String)> = HashSet::new();

        // 依低階碼由淺到深：結算某組合時，其所有父項已結算完畢，
        // 相依需求不會再流入
        while !pending.is_empty() {
            let level = match pending
                .keys()
                .map(|(item_id, _)| levels.get(item_id).copied().unwrap_or(0))
                .min()
            {
                Some(level) => level,
                None => break,
            };
            let due: Vec<(String, String)> = pending
                .keys()
                .filter(|(item_id, _)| levels.get(item_id).copied().unwrap_or(0) == level)
                .cloned()
                .collect();

            let mut pairs = Vec::with_capacity(due.len());
            for key in due {
                if let Some(demands) = pending.remove(&key) {
                    processed.insert(key.clone());
                    pairs.push((key.0, key.1, demands));
                }
            }

            // 同一階層的組合互不相依：平行唯讀計算
            let shared: &S = &*store;
            let outcomes: Vec<_> = pairs
                .par_iter()
                .map(|(item_id, location_id, demands)| {
                    self.plan_pair(shared, company_id, item_id, location_id, demands, &supplies, explode)
                        .map_err(|e| (item_id.clone(), location_id.clone(), e))
                })
                .collect();

            for outcome in outcomes {
                match outcome {
                    Ok(plan) => {
                        summary.items_processed += 1;
                        summary.warnings.extend(plan.warnings);
                        for planned in plan.planned {
                            match planned.supply_type {
                                PlannedSupplyType::Purchase => summary.planned_purchases += 1,
                                PlannedSupplyType::Job => summary.planned_jobs += 1,
                            }
                            store.insert_planned_supply(planned)?;
                        }
                        for dependent in plan.dependent {
                            let key =
                                (dependent.item_id.clone(), dependent.location_id.clone());
                            // 已結算的組合又收到相依需求：方法鏈在物料層級構成循環
                            if processed.contains(&key) {
                                tracing::warn!(
                                    company = company_id,
                                    item = %key.0,
                                    location = %key.1,
                                    "相依需求指回已結算的物料，已跳過"
                                );
                                summary.warnings.push(MrpWarning::warning(
                                    key.0,
                                    "相依需求指回已結算的物料，已跳過".to_string(),
                                ));
                                continue;
                            }
                            pending.entry(key).or_default().push(dependent);
                        }
                    }
                    Err((item_id, location_id, e)) => {
                        // 單一組合失敗不中止整次執行
                        tracing::error!(
                            company = company_id,
                            item = %item_id,
                            location = %location_id,
                            error = %e,
                            "物料/地點組合計算失敗，跳過"
                        );
                        summary
                            .warnings
                            .push(MrpWarning::error(item_id, e.to_string()));
                    }
                }
            }
        }

        Ok(summary)
    }

    /// 物料低階碼：物料在全公司方法樹中出現的最深層級
    ///
    /// 自獨立需求件（階層 0）沿當前方法的物料行向下鬆弛；方法鏈
    /// 若在物料層級構成循環，鬆弛以物料數為上限截斷，循環本身
    /// 由結算時的已結算防護攔下。
    fn low_level_codes<S: PlanningStore + Sync>(
        store: &S,
        company_id: &str,
    ) -> Result<HashMap<String, u32>> {
        let items = store.items_of_company(company_id)?;
        let mut edges: Vec<(String, String)> = Vec::new();
        for item in &items {
            if let Some(method_id) = item.current_method_id {
                for material in store.materials_of(company_id, method_id)? {
                    edges.push((item.id.clone(), material.item_id));
                }
            }
        }

        let mut levels: HashMap<String, u32> = HashMap::new();
        for _ in 0..=items.len() {
            let mut changed = false;
            for (parent, child) in &edges {
                let next = levels.get(parent).copied().unwrap_or(0) + 1;
                if next > levels.get(child).copied().unwrap_or(0) {
                    levels.insert(child.clone(), next);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        Ok(levels)
    }

    /// 計算單一物料/地點組合（唯讀）
    fn plan_pair<S: PlanningStore + Sync>(
        &self,
        store: &S,
        company_id: &str,
        item_id: &str,
        location_id: &str,
        demands: &[Demand],
        supplies: &[Supply],
        explode: bool,
    ) -> Result<PairPlan> {
        let item = store.item(company_id, item_id)?;
        let pair_supplies: Vec<Supply> = supplies
            .iter()
            .filter(|s| s.item_id == item_id && s.location_id == location_id)
            .cloned()
            .collect();

        let buckets = NettingCalculator::requirement_dates(demands, &pair_supplies);
        let nets =
            NettingCalculator::calculate(demands, &pair_supplies, item.safety_stock, &buckets);

        let mut plan = PairPlan {
            planned: Vec::new(),
            dependent: Vec::new(),
            warnings: Vec::new(),
        };

        for net in nets {
            if net.net_requirement <= Decimal::ZERO {
                continue;
            }
            let quantity = LotSizer::size_order(&item, net.net_requirement);
            if quantity <= Decimal::ZERO {
                continue;
            }

            let start_date = LotSizer::start_date(&self.calendar, &item, net.date);
            let supply_type = if item.is_make() {
                PlannedSupplyType::Job
            } else {
                PlannedSupplyType::Purchase
            };

            let mut planned = PlannedSupply::new(
                item.id.clone(),
                location_id.to_string(),
                company_id.to_string(),
                quantity,
                net.date,
                start_date,
                supply_type,
            );
            if let Some(source) = demands.iter().find(|d| d.need_date == net.date) {
                planned = planned.with_source_demand(source.id);
            }

            if item.is_make() && explode {
                plan.dependent.extend(Self::explode_dependents(
                    store,
                    company_id,
                    location_id,
                    &item,
                    &planned,
                    &mut plan.warnings,
                )?);
            }

            plan.planned.push(planned);
        }

        Ok(plan)
    }

    /// 透過當前方法展開第一層相依需求，需求日為建議工單的開工日
    fn explode_dependents<S: PlanningStore + Sync>(
        store: &S,
        company_id: &str,
        location_id: &str,
        item: &Item,
        planned: &PlannedSupply,
        warnings: &mut Vec<MrpWarning>,
    ) -> Result<Vec<Demand>> {
        let method_id = match item.current_method_id {
            Some(id) => id,
            None => {
                warnings.push(MrpWarning::warning(
                    item.id.clone(),
                    "生產件沒有當前製造方法，無法展開相依需求".to_string(),
                ));
                return Ok(Vec::new());
            }
        };

        let mut dependents = Vec::new();
        for material in store.materials_of(company_id, method_id)? {
            let child = store.item(company_id, &material.item_id).map_err(|_| {
                PlanError::ReferentialIntegrity(format!(
                    "方法 {method_id} 的物料行引用不存在的物料 {}",
                    material.item_id
                ))
            })?;
            let quantity =
                child.round_quantity(planned.quantity * material.quantity_per_parent);
            if quantity <= Decimal::ZERO {
                continue;
            }

            dependents.push(
                Demand::new(
                    material.item_id,
                    location_id.to_string(),
                    company_id.to_string(),
                    quantity,
                    planned.start_date,
                    DemandType::Dependent,
                )
                .with_source_ref(format!("PLAN:{}", planned.id)),
            );
        }

        Ok(dependents)
    }
}
