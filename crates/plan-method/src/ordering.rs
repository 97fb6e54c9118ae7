//! 工序順序與依賴解析
//!
//! 工序的前後關係由排序整數加上顯式前置宣告推導而成；每次插入、
//! 刪除或重排後整個重建，不做人工調和。重建結果必須是有向無環圖，
//! 會造成循環的編輯被整批拒絕。

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use plan_core::{MethodOperation, PlanError, Result};

use crate::recalc::QuantityRecalculator;
use crate::store::MethodStore;

/// 工序依賴圖（以工序ID為鍵的鄰接表）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationGraph {
    /// 後繼列表：edge (pred → succ) 表示 succ 必須等 pred 完成
    successors: HashMap<Uuid, Vec<Uuid>>,

    /// 正規化後的全序（重排後的工序ID，依序）
    sequence: Vec<Uuid>,
}

impl OperationGraph {
    /// 指定工序的後繼
    pub fn successors_of(&self, id: Uuid) -> &[Uuid] {
        self.successors.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 指定工序的前置
    pub fn predecessors_of(&self, id: Uuid) -> Vec<Uuid> {
        self.successors
            .iter()
            .filter(|(_, succs)| succs.contains(&id))
            .map(|(pred, _)| *pred)
            .collect()
    }

    /// 正規化全序
    pub fn sequence(&self) -> &[Uuid] {
        &self.sequence
    }

    /// 檢查某工序是否已無未完成的前置（可否開工的判斷基礎）
    pub fn is_ready(&self, id: Uuid, completed: &HashSet<Uuid>) -> bool {
        self.predecessors_of(id)
            .iter()
            .all(|pred| completed.contains(pred))
    }

    /// Kahn 演算法檢查無環；回傳拓撲順序
    fn verify_acyclic(&self) -> Result<Vec<Uuid>> {
        let mut in_degree: HashMap<Uuid, usize> =
            self.sequence.iter().map(|id| (*id, 0)).collect();
        for succs in self.successors.values() {
            for succ in succs {
                *in_degree.entry(*succ).or_insert(0) += 1;
            }
        }

        // 以正規化順序餵入佇列，輸出順序保持穩定
        let mut queue: VecDeque<Uuid> = self
            .sequence
            .iter()
            .filter(|id| in_degree.get(id).copied().unwrap_or(0) == 0)
            .copied()
            .collect();
        let mut sorted = Vec::with_capacity(self.sequence.len());

        while let Some(id) = queue.pop_front() {
            sorted.push(id);
            for succ in self.successors_of(id).to_vec() {
                if let Some(degree) = in_degree.get_mut(&succ) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(succ);
                    }
                }
            }
        }

        if sorted.len() != self.sequence.len() {
            let stuck: Vec<Uuid> = self
                .sequence
                .iter()
                .filter(|id| !sorted.contains(id))
                .copied()
                .collect();
            return Err(PlanError::DependencyCycle(format!(
                "工序 {stuck:?} 構成循環依賴"
            )));
        }

        Ok(sorted)
    }
}

/// 單筆排序更新
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub id: Uuid,
    pub order: u32,
}

/// 批次排序更新結果
///
/// 個別失敗不阻擋其餘更新；只要失敗清單非空，呼叫者必須視順序狀態
/// 為不保證一致，並重跑依賴解析。
#[derive(Debug, Default)]
pub struct OrderBatchResult {
    /// 成功套用的更新數
    pub applied: usize,

    /// 個別失敗（工序ID與原因）
    pub failures: Vec<(Uuid, PlanError)>,
}

impl OrderBatchResult {
    /// 批次是否完整成功
    pub fn is_consistent(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 工序依賴解析器
pub struct OperationDependencyResolver;

impl OperationDependencyResolver {
    /// 重建範圍內工序的正規順序與依賴圖
    ///
    /// 排序以 `order` 為準、建立時間決勝，重新編號為 10 的倍數；
    /// 依賴圖快取於儲存層，循環在任何寫入前偵測並拒絕。
    pub fn recalculate_operation_order<S: MethodStore>(
        store: &mut S,
        scope_id: Uuid,
        company_id: &str,
        actor_id: &str,
    ) -> Result<OperationGraph> {
        let operations = store.operations_of(company_id, scope_id)?;
        let graph = Self::build_graph(&operations)?;

        tracing::debug!(
            scope = %scope_id,
            company = company_id,
            actor = actor_id,
            operations = operations.len(),
            "重建工序順序與依賴圖"
        );

        // 正規化編號：10, 20, 30, ...（僅寫入有變動者）
        for (index, operation) in operations.iter().enumerate() {
            let canonical = (index as u32 + 1) * 10;
            if operation.order != canonical {
                store.set_operation_order(company_id, operation.id, canonical)?;
            }
        }

        store.put_operation_graph(scope_id, graph.clone())?;
        Ok(graph)
    }

    /// 套用一批手動排序更新
    ///
    /// 先以模擬順序做循環檢查（衝突 ⇒ 整批拒絕、不落任何寫入），
    /// 通過後逐筆寫入並收集個別失敗，最後重跑依賴解析。
    pub fn update_operation_order<S: MethodStore>(
        store: &mut S,
        scope_id: Uuid,
        updates: &[OrderUpdate],
        company_id: &str,
        actor_id: &str,
    ) -> Result<OrderBatchResult> {
        let mut operations = store.operations_of(company_id, scope_id)?;
        let by_id: HashMap<Uuid, u32> = updates.iter().map(|u| (u.id, u.order)).collect();

        for update in updates {
            if !operations.iter().any(|op| op.id == update.id) {
                return Err(PlanError::Validation(format!(
                    "排序更新引用範圍外的工序 {}",
                    update.id
                )));
            }
        }

        // 模擬新順序並在提交前檢查循環
        for operation in operations.iter_mut() {
            if let Some(order) = by_id.get(&operation.id) {
                operation.order = *order;
            }
        }
        operations.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
        Self::build_graph(&operations)?;

        let mut result = OrderBatchResult::default();
        for update in updates {
            match store.set_operation_order(company_id, update.id, update.order) {
                Ok(()) => result.applied += 1,
                Err(error) => {
                    tracing::warn!(operation = %update.id, %error, "排序更新失敗");
                    result.failures.push((update.id, error));
                }
            }
        }

        if result.is_consistent() {
            Self::recalculate_operation_order(store, scope_id, company_id, actor_id)?;
        }

        Ok(result)
    }

    /// 更新單一工序
    ///
    /// 損耗係數有變動時觸發所屬方法的需求數量重算（跨元件呼叫，
    /// 不在此處重複數量邏輯）。
    pub fn update_operation<S: MethodStore>(
        store: &mut S,
        operation: MethodOperation,
        company_id: &str,
        actor_id: &str,
    ) -> Result<()> {
        let previous = store.operation(company_id, operation.id)?;
        let scope_id = operation.scope_id;
        let scrap_changed = previous.scrap_factor != operation.scrap_factor;

        store.update_operation(operation)?;
        Self::recalculate_operation_order(store, scope_id, company_id, actor_id)?;

        if scrap_changed {
            QuantityRecalculator::recalculate_requirements(store, scope_id, company_id, actor_id)?;
        }

        Ok(())
    }

    /// 自排序後的工序清單建立依賴圖
    ///
    /// 推導邊：消耗前置製程輸出的工序，連到最近一個產出該製程的
    /// 前行工序；顯式前置宣告一併併入。向前引用（前置排在後面）
    /// 與循環都視為一致性衝突。
    fn build_graph(sorted_operations: &[MethodOperation]) -> Result<OperationGraph> {
        let mut graph = OperationGraph {
            successors: HashMap::new(),
            sequence: sorted_operations.iter().map(|op| op.id).collect(),
        };
        let position: HashMap<Uuid, usize> = sorted_operations
            .iter()
            .enumerate()
            .map(|(index, op)| (op.id, index))
            .collect();

        for (index, operation) in sorted_operations.iter().enumerate() {
            // 自我依賴在任何情況下都不合法
            if operation.predecessor_ids.contains(&operation.id) {
                return Err(PlanError::Validation(format!(
                    "工序 {} 宣告自身為前置工序",
                    operation.id
                )));
            }

            for predecessor in &operation.predecessor_ids {
                match position.get(predecessor) {
                    Some(pred_index) if *pred_index < index => {
                        graph
                            .successors
                            .entry(*predecessor)
                            .or_default()
                            .push(operation.id);
                    }
                    Some(_) => {
                        return Err(PlanError::DependencyCycle(format!(
                            "工序 {} 的前置 {predecessor} 排在其後，順序與依賴矛盾",
                            operation.id
                        )));
                    }
                    None => {
                        return Err(PlanError::ReferentialIntegrity(format!(
                            "工序 {} 的前置 {predecessor} 不在同一範圍",
                            operation.id
                        )));
                    }
                }
            }

            if let Some(consumed) = &operation.consumes_process {
                // 最近的前行產出工序
                let producer = sorted_operations[..index]
                    .iter()
                    .rev()
                    .find(|candidate| &candidate.process_id == consumed);

                match producer {
                    Some(producer) => {
                        graph
                            .successors
                            .entry(producer.id)
                            .or_default()
                            .push(operation.id);
                    }
                    None => {
                        // 產出者存在但被排到後面：重排與物料依賴矛盾
                        if sorted_operations[index..]
                            .iter()
                            .any(|candidate| &candidate.process_id == consumed)
                        {
                            return Err(PlanError::DependencyCycle(format!(
                                "工序 {} 消耗製程 {consumed} 的產出，但該製程被排在其後",
                                operation.id
                            )));
                        }
                        return Err(PlanError::ReferentialIntegrity(format!(
                            "工序 {} 消耗的製程 {consumed} 不在範圍內",
                            operation.id
                        )));
                    }
                }
            }
        }

        graph.verify_acyclic()?;
        Ok(graph)
    }
}
