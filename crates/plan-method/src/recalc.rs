//! 需求數量重算
//!
//! 自指定節點起由上而下走訪方法樹，為每條物料行覆寫計算需求量。
//! 所有計算欄位皆為覆寫而非累加，重算因此天然冪等，失敗後可
//! 直接自根節點重跑。

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use uuid::Uuid;

use plan_core::{PlanError, Result};

use crate::store::MethodStore;

/// 數量重算器
pub struct QuantityRecalculator;

impl QuantityRecalculator {
    /// 重算一棵方法樹的需求數量
    ///
    /// 入口假設呼叫者已通過外部授權檢查。走訪順序為父先於子：
    /// 子節點的數量在父節點寫入完成前不會被覆寫。
    pub fn recalculate_requirements<S: MethodStore>(
        store: &mut S,
        root_method_id: Uuid,
        company_id: &str,
        actor_id: &str,
    ) -> Result<()> {
        let root = store.make_method(company_id, root_method_id)?;

        // 樂觀鎖：同一棵樹同時只允許一個變更在途
        store.bump_revision(company_id, root_method_id, root.revision)?;

        tracing::debug!(
            method = %root_method_id,
            company = company_id,
            actor = actor_id,
            quantity = %root.required_quantity,
            "開始需求數量重算"
        );

        let mut last_written: Option<Uuid> = None;
        let mut visited: HashSet<Uuid> = HashSet::new();
        Self::visit(
            store,
            root_method_id,
            root.required_quantity,
            company_id,
            &mut visited,
            &mut last_written,
        )?;

        tracing::debug!(method = %root_method_id, "需求數量重算完成");
        Ok(())
    }

    fn visit<S: MethodStore>(
        store: &mut S,
        method_id: Uuid,
        parent_quantity: Decimal,
        company_id: &str,
        visited: &mut HashSet<Uuid>,
        last_written: &mut Option<Uuid>,
    ) -> Result<()> {
        // 重複造訪表示樹被別名或存在循環：整個重算中止，不無限遞迴
        if !visited.insert(method_id) {
            return Err(PlanError::ReferentialIntegrity(format!(
                "方法樹重複造訪節點 {method_id}（樹被別名或存在循環）"
            )));
        }

        // 工序損耗係數：物料行連結工序時參與需求計算
        let scrap_factors: HashMap<Uuid, Decimal> = store
            .operations_of(company_id, method_id)?
            .into_iter()
            .map(|op| (op.id, op.scrap_factor))
            .collect();

        for material in store.materials_of(company_id, method_id)? {
            let scrap = material
                .operation_id
                .and_then(|id| scrap_factors.get(&id).copied())
                .unwrap_or(Decimal::ZERO);

            let item = store.item(company_id, &material.item_id).map_err(|_| {
                PlanError::ReferentialIntegrity(format!(
                    "物料行 {} 引用不存在的物料 {}",
                    material.id, material.item_id
                ))
            })?;

            // 需求量 = 父需求 × 單位用量 ×（1 + 損耗），依計量單位精度捨入
            let required = item.round_quantity(
                parent_quantity * material.quantity_per_parent * (Decimal::ONE + scrap),
            );

            store
                .set_material_requirement(company_id, material.id, required)
                .map_err(|e| Self::persistence(e, last_written))?;
            *last_written = Some(material.id);

            if material.is_make() {
                // 生產件缺少子方法是資料完整性錯誤：整個重算中止，不留下半套樹
                let child_id = material.child_make_method_id.ok_or_else(|| {
                    PlanError::ReferentialIntegrity(format!(
                        "生產件物料行 {} 缺少子方法連結",
                        material.id
                    ))
                })?;
                store.make_method(company_id, child_id).map_err(|_| {
                    PlanError::ReferentialIntegrity(format!(
                        "物料行 {} 的子方法 {child_id} 不存在",
                        material.id
                    ))
                })?;

                store
                    .set_method_quantity(company_id, child_id, required)
                    .map_err(|e| Self::persistence(e, last_written))?;
                *last_written = Some(child_id);

                // 零用量仍然走訪子樹：清除過期數量而非棄置
                Self::visit(store, child_id, required, company_id, visited, last_written)?;
            }
        }

        Ok(())
    }

    fn persistence(error: PlanError, last_written: &Option<Uuid>) -> PlanError {
        PlanError::Persistence {
            reason: error.to_string(),
            last_written: *last_written,
        }
    }
}
