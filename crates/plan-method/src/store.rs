//! 方法樹儲存介面
//!
//! 以同步 repository trait 作為持久層接縫，可對接任何關聯式儲存；
//! 此處附帶記憶體內實作供測試與單機使用。每個讀寫都以 `company_id`
//! 過濾，多租戶隔離是此層維護的不變量。

use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use plan_core::{
    Demand, Item, Job, MakeMethod, MethodMaterial, MethodOperation, PlanError, PlannedSupply,
    PurchaseOrder, Quote, QuoteLine, Result, SalesOrder, SalesOrderLine, Supply,
};

use crate::ordering::OperationGraph;

/// 方法樹儲存
pub trait MethodStore {
    // --- 物料主檔 ---

    fn item(&self, company_id: &str, item_id: &str) -> Result<Item>;
    fn upsert_item(&mut self, item: Item) -> Result<()>;

    /// 更新物料的當前方法外鍵（版本晉升）
    fn set_current_method(&mut self, company_id: &str, item_id: &str, method_id: Uuid)
        -> Result<()>;

    // --- 製造方法 ---

    fn make_method(&self, company_id: &str, id: Uuid) -> Result<MakeMethod>;
    fn insert_method(&mut self, method: MakeMethod) -> Result<()>;

    /// 覆寫方法節點的需求數量
    fn set_method_quantity(&mut self, company_id: &str, id: Uuid, quantity: Decimal)
        -> Result<()>;

    /// 樂觀鎖：檢查期望修訂號並遞增，回傳新修訂號
    fn bump_revision(&mut self, company_id: &str, id: Uuid, expected: u64) -> Result<u64>;

    /// 物料版本譜系中的下一個版本號
    fn next_version(&self, company_id: &str, item_id: &str) -> Result<u32>;

    // --- 物料行 ---

    fn materials_of(&self, company_id: &str, method_id: Uuid) -> Result<Vec<MethodMaterial>>;
    fn insert_material(&mut self, material: MethodMaterial) -> Result<()>;

    /// 覆寫物料行的計算需求數量
    fn set_material_requirement(&mut self, company_id: &str, id: Uuid, required: Decimal)
        -> Result<()>;

    // --- 工序 ---

    fn operation(&self, company_id: &str, id: Uuid) -> Result<MethodOperation>;
    fn operations_of(&self, company_id: &str, scope_id: Uuid) -> Result<Vec<MethodOperation>>;
    fn insert_operation(&mut self, operation: MethodOperation) -> Result<()>;
    fn update_operation(&mut self, operation: MethodOperation) -> Result<()>;
    fn set_operation_order(&mut self, company_id: &str, id: Uuid, order: u32) -> Result<()>;

    /// 快取工序依賴圖（每次變更後由解析器重建）
    fn put_operation_graph(&mut self, scope_id: Uuid, graph: OperationGraph) -> Result<()>;
    fn operation_graph(&self, scope_id: Uuid) -> Option<OperationGraph>;

    /// 單一批次寫入整棵子樹（拷貝服務的 id-map 模型）
    fn insert_subtree(
        &mut self,
        methods: Vec<MakeMethod>,
        materials: Vec<MethodMaterial>,
        operations: Vec<MethodOperation>,
    ) -> Result<()>;
}

/// 計劃資料儲存（需求、供應、訂單、工單）
pub trait PlanningStore: MethodStore {
    fn items_of_company(&self, company_id: &str) -> Result<Vec<Item>>;

    fn open_demands(&self, company_id: &str) -> Result<Vec<Demand>>;
    fn insert_demand(&mut self, demand: Demand) -> Result<()>;

    fn supplies(&self, company_id: &str) -> Result<Vec<Supply>>;
    fn insert_supply(&mut self, supply: Supply) -> Result<()>;

    fn planned_supplies(&self, company_id: &str) -> Result<Vec<PlannedSupply>>;
    fn insert_planned_supply(&mut self, planned: PlannedSupply) -> Result<()>;

    /// 清除未確認的計劃供應；`item_ids` 為 None 時清除整個公司範圍
    fn clear_unfirm_planned(&mut self, company_id: &str, item_ids: Option<&[String]>)
        -> Result<()>;

    fn purchase_order(&self, company_id: &str, id: Uuid) -> Result<PurchaseOrder>;
    fn upsert_purchase_order(&mut self, order: PurchaseOrder) -> Result<()>;

    fn quote(&self, company_id: &str, id: Uuid) -> Result<Quote>;
    fn upsert_quote(&mut self, quote: Quote) -> Result<()>;
    fn quote_line(&self, company_id: &str, id: Uuid) -> Result<QuoteLine>;
    fn quote_lines_of(&self, company_id: &str, quote_id: Uuid) -> Result<Vec<QuoteLine>>;
    fn upsert_quote_line(&mut self, line: QuoteLine) -> Result<()>;

    fn insert_sales_order(&mut self, order: SalesOrder) -> Result<()>;
    fn insert_sales_order_line(&mut self, line: SalesOrderLine) -> Result<()>;
    fn sales_order_lines_of(&self, company_id: &str, order_id: Uuid)
        -> Result<Vec<SalesOrderLine>>;

    fn job(&self, company_id: &str, id: Uuid) -> Result<Job>;
    fn upsert_job(&mut self, job: Job) -> Result<()>;
}

/// 記憶體內儲存實作
#[derive(Default)]
pub struct InMemoryStore {
    items: HashMap<(String, String), Item>,
    methods: HashMap<Uuid, MakeMethod>,
    materials: HashMap<Uuid, MethodMaterial>,
    operations: HashMap<Uuid, MethodOperation>,
    graphs: HashMap<Uuid, OperationGraph>,
    demands: HashMap<Uuid, Demand>,
    supplies: HashMap<Uuid, Supply>,
    planned: HashMap<Uuid, PlannedSupply>,
    purchase_orders: HashMap<Uuid, PurchaseOrder>,
    quotes: HashMap<Uuid, Quote>,
    quote_lines: HashMap<Uuid, QuoteLine>,
    sales_orders: HashMap<Uuid, SalesOrder>,
    sales_order_lines: HashMap<Uuid, SalesOrderLine>,
    jobs: HashMap<Uuid, Job>,
}

impl InMemoryStore {
    /// 創建空的儲存
    pub fn new() -> Self {
        Self::default()
    }

    fn guard_company(record_company: &str, company_id: &str, what: &str) -> Result<()> {
        if record_company != company_id {
            return Err(PlanError::CompanyMismatch(format!(
                "{what} 屬於公司 {record_company}，呼叫者為 {company_id}"
            )));
        }
        Ok(())
    }
}

impl MethodStore for InMemoryStore {
    fn item(&self, company_id: &str, item_id: &str) -> Result<Item> {
        self.items
            .get(&(company_id.to_string(), item_id.to_string()))
            .cloned()
            .ok_or_else(|| PlanError::ItemNotFound(item_id.to_string()))
    }

    fn upsert_item(&mut self, item: Item) -> Result<()> {
        self.items
            .insert((item.company_id.clone(), item.id.clone()), item);
        Ok(())
    }

    fn set_current_method(
        &mut self,
        company_id: &str,
        item_id: &str,
        method_id: Uuid,
    ) -> Result<()> {
        let method = self.make_method(company_id, method_id)?;
        Self::guard_company(&method.company_id, company_id, "製造方法")?;
        let item = self
            .items
            .get_mut(&(company_id.to_string(), item_id.to_string()))
            .ok_or_else(|| PlanError::ItemNotFound(item_id.to_string()))?;
        item.current_method_id = Some(method_id);
        Ok(())
    }

    fn make_method(&self, company_id: &str, id: Uuid) -> Result<MakeMethod> {
        let method = self
            .methods
            .get(&id)
            .ok_or(PlanError::MethodNotFound(id))?;
        Self::guard_company(&method.company_id, company_id, "製造方法")?;
        Ok(method.clone())
    }

    fn insert_method(&mut self, method: MakeMethod) -> Result<()> {
        self.methods.insert(method.id, method);
        Ok(())
    }

    fn set_method_quantity(
        &mut self,
        company_id: &str,
        id: Uuid,
        quantity: Decimal,
    ) -> Result<()> {
        let method = self
            .methods
            .get_mut(&id)
            .ok_or(PlanError::MethodNotFound(id))?;
        Self::guard_company(&method.company_id.clone(), company_id, "製造方法")?;
        method.required_quantity = quantity;
        Ok(())
    }

    fn bump_revision(&mut self, company_id: &str, id: Uuid, expected: u64) -> Result<u64> {
        let method = self
            .methods
            .get_mut(&id)
            .ok_or(PlanError::MethodNotFound(id))?;
        Self::guard_company(&method.company_id.clone(), company_id, "製造方法")?;
        if method.revision != expected {
            return Err(PlanError::RevisionConflict(id));
        }
        method.revision += 1;
        Ok(method.revision)
    }

    fn next_version(&self, company_id: &str, item_id: &str) -> Result<u32> {
        let max = self
            .methods
            .values()
            .filter(|m| {
                m.company_id == company_id
                    && matches!(&m.owner, plan_core::MethodOwner::Item(id) if id == item_id)
            })
            .map(|m| m.version)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    fn materials_of(&self, company_id: &str, method_id: Uuid) -> Result<Vec<MethodMaterial>> {
        let mut materials: Vec<MethodMaterial> = self
            .materials
            .values()
            .filter(|m| m.make_method_id == method_id && m.company_id == company_id)
            .cloned()
            .collect();
        // 穩定輸出順序：依物料ID
        materials.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        Ok(materials)
    }

    fn insert_material(&mut self, material: MethodMaterial) -> Result<()> {
        if material.quantity_per_parent < Decimal::ZERO {
            return Err(PlanError::Validation(format!(
                "物料行 {} 的單位用量不可為負",
                material.id
            )));
        }
        // 子方法連結寫入前檢查：不得讓方法樹出現循環
        if let Some(child_id) = material.child_make_method_id {
            crate::tree::ensure_acyclic_link(
                self,
                material.make_method_id,
                child_id,
                &material.company_id,
            )?;
        }
        self.materials.insert(material.id, material);
        Ok(())
    }

    fn set_material_requirement(
        &mut self,
        company_id: &str,
        id: Uuid,
        required: Decimal,
    ) -> Result<()> {
        let material = self.materials.get_mut(&id).ok_or_else(|| {
            PlanError::ReferentialIntegrity(format!("找不到物料行 {id}"))
        })?;
        Self::guard_company(&material.company_id.clone(), company_id, "物料行")?;
        material.required_quantity = required;
        Ok(())
    }

    fn operation(&self, company_id: &str, id: Uuid) -> Result<MethodOperation> {
        let operation = self.operations.get(&id).ok_or_else(|| {
            PlanError::ReferentialIntegrity(format!("找不到工序 {id}"))
        })?;
        Self::guard_company(&operation.company_id, company_id, "工序")?;
        Ok(operation.clone())
    }

    fn operations_of(&self, company_id: &str, scope_id: Uuid) -> Result<Vec<MethodOperation>> {
        let mut operations: Vec<MethodOperation> = self
            .operations
            .values()
            .filter(|o| o.scope_id == scope_id && o.company_id == company_id)
            .cloned()
            .collect();
        operations.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
        Ok(operations)
    }

    fn insert_operation(&mut self, operation: MethodOperation) -> Result<()> {
        if operation.predecessor_ids.contains(&operation.id) {
            return Err(PlanError::Validation(format!(
                "工序 {} 不可宣告自身為前置工序",
                operation.id
            )));
        }
        self.operations.insert(operation.id, operation);
        Ok(())
    }

    fn update_operation(&mut self, operation: MethodOperation) -> Result<()> {
        if !self.operations.contains_key(&operation.id) {
            return Err(PlanError::ReferentialIntegrity(format!(
                "找不到工序 {}",
                operation.id
            )));
        }
        self.insert_operation(operation)
    }

    fn set_operation_order(&mut self, company_id: &str, id: Uuid, order: u32) -> Result<()> {
        let operation = self.operations.get_mut(&id).ok_or_else(|| {
            PlanError::ReferentialIntegrity(format!("找不到工序 {id}"))
        })?;
        Self::guard_company(&operation.company_id.clone(), company_id, "工序")?;
        operation.order = order;
        Ok(())
    }

    fn put_operation_graph(&mut self, scope_id: Uuid, graph: OperationGraph) -> Result<()> {
        self.graphs.insert(scope_id, graph);
        Ok(())
    }

    fn operation_graph(&self, scope_id: Uuid) -> Option<OperationGraph> {
        self.graphs.get(&scope_id).cloned()
    }

    fn insert_subtree(
        &mut self,
        methods: Vec<MakeMethod>,
        materials: Vec<MethodMaterial>,
        operations: Vec<MethodOperation>,
    ) -> Result<()> {
        for method in methods {
            self.insert_method(method)?;
        }
        for material in materials {
            self.insert_material(material)?;
        }
        for operation in operations {
            self.insert_operation(operation)?;
        }
        Ok(())
    }
}

impl PlanningStore for InMemoryStore {
    fn items_of_company(&self, company_id: &str) -> Result<Vec<Item>> {
        let mut items: Vec<Item> = self
            .items
            .values()
            .filter(|i| i.company_id == company_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    fn open_demands(&self, company_id: &str) -> Result<Vec<Demand>> {
        Ok(self
            .demands
            .values()
            .filter(|d| d.company_id == company_id && d.is_open())
            .cloned()
            .collect())
    }

    fn insert_demand(&mut self, demand: Demand) -> Result<()> {
        self.demands.insert(demand.id, demand);
        Ok(())
    }

    fn supplies(&self, company_id: &str) -> Result<Vec<Supply>> {
        Ok(self
            .supplies
            .values()
            .filter(|s| s.company_id == company_id)
            .cloned()
            .collect())
    }

    fn insert_supply(&mut self, supply: Supply) -> Result<()> {
        self.supplies.insert(supply.id, supply);
        Ok(())
    }

    fn planned_supplies(&self, company_id: &str) -> Result<Vec<PlannedSupply>> {
        Ok(self
            .planned
            .values()
            .filter(|p| p.company_id == company_id)
            .cloned()
            .collect())
    }

    fn insert_planned_supply(&mut self, planned: PlannedSupply) -> Result<()> {
        self.planned.insert(planned.id, planned);
        Ok(())
    }

    fn clear_unfirm_planned(
        &mut self,
        company_id: &str,
        item_ids: Option<&[String]>,
    ) -> Result<()> {
        self.planned.retain(|_, p| {
            if p.company_id != company_id || p.is_firm {
                return true;
            }
            match item_ids {
                Some(ids) => !ids.contains(&p.item_id),
                None => false,
            }
        });
        Ok(())
    }

    fn purchase_order(&self, company_id: &str, id: Uuid) -> Result<PurchaseOrder> {
        let order = self.purchase_orders.get(&id).ok_or_else(|| {
            PlanError::ReferentialIntegrity(format!("找不到採購訂單 {id}"))
        })?;
        Self::guard_company(&order.company_id, company_id, "採購訂單")?;
        Ok(order.clone())
    }

    fn upsert_purchase_order(&mut self, order: PurchaseOrder) -> Result<()> {
        self.purchase_orders.insert(order.id, order);
        Ok(())
    }

    fn quote(&self, company_id: &str, id: Uuid) -> Result<Quote> {
        let quote = self.quotes.get(&id).ok_or_else(|| {
            PlanError::ReferentialIntegrity(format!("找不到報價單 {id}"))
        })?;
        Self::guard_company(&quote.company_id, company_id, "報價單")?;
        Ok(quote.clone())
    }

    fn upsert_quote(&mut self, quote: Quote) -> Result<()> {
        self.quotes.insert(quote.id, quote);
        Ok(())
    }

    fn quote_line(&self, company_id: &str, id: Uuid) -> Result<QuoteLine> {
        let line = self.quote_lines.get(&id).ok_or_else(|| {
            PlanError::ReferentialIntegrity(format!("找不到報價單行 {id}"))
        })?;
        Self::guard_company(&line.company_id, company_id, "報價單行")?;
        Ok(line.clone())
    }

    fn quote_lines_of(&self, company_id: &str, quote_id: Uuid) -> Result<Vec<QuoteLine>> {
        Ok(self
            .quote_lines
            .values()
            .filter(|l| l.quote_id == quote_id && l.company_id == company_id)
            .cloned()
            .collect())
    }

    fn upsert_quote_line(&mut self, line: QuoteLine) -> Result<()> {
        self.quote_lines.insert(line.id, line);
        Ok(())
    }

    fn insert_sales_order(&mut self, order: SalesOrder) -> Result<()> {
        self.sales_orders.insert(order.id, order);
        Ok(())
    }

    fn insert_sales_order_line(&mut self, line: SalesOrderLine) -> Result<()> {
        self.sales_order_lines.insert(line.id, line);
        Ok(())
    }

    fn sales_order_lines_of(
        &self,
        company_id: &str,
        order_id: Uuid,
    ) -> Result<Vec<SalesOrderLine>> {
        Ok(self
            .sales_order_lines
            .values()
            .filter(|l| l.sales_order_id == order_id && l.company_id == company_id)
            .cloned()
            .collect())
    }

    fn job(&self, company_id: &str, id: Uuid) -> Result<Job> {
        let job = self.jobs.get(&id).ok_or_else(|| {
            PlanError::ReferentialIntegrity(format!("找不到工單 {id}"))
        })?;
        Self::guard_company(&job.company_id, company_id, "工單")?;
        Ok(job.clone())
    }

    fn upsert_job(&mut self, job: Job) -> Result<()> {
        self.jobs.insert(job.id, job);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_core::{MethodOwner, ReplenishmentPolicy};

    #[test]
    fn test_company_isolation() {
        let mut store = InMemoryStore::new();
        let method = MakeMethod::new(
            MethodOwner::Item("BIKE-001".to_string()),
            1,
            "ACME".to_string(),
        );
        let id = method.id;
        store.insert_method(method).unwrap();

        // 同公司可讀
        assert!(store.make_method("ACME", id).is_ok());

        // 跨公司讀取必須失敗，而非回傳空結果
        assert!(matches!(
            store.make_method("OTHER", id),
            Err(PlanError::CompanyMismatch(_))
        ));
    }

    #[test]
    fn test_bump_revision_conflict() {
        let mut store = InMemoryStore::new();
        let method = MakeMethod::new(
            MethodOwner::Item("BIKE-001".to_string()),
            1,
            "ACME".to_string(),
        );
        let id = method.id;
        store.insert_method(method).unwrap();

        assert_eq!(store.bump_revision("ACME", id, 0).unwrap(), 1);

        // 過期的期望修訂號被拒
        assert!(matches!(
            store.bump_revision("ACME", id, 0),
            Err(PlanError::RevisionConflict(_))
        ));

        assert_eq!(store.bump_revision("ACME", id, 1).unwrap(), 2);
    }

    #[test]
    fn test_next_version_per_item_lineage() {
        let mut store = InMemoryStore::new();
        store
            .upsert_item(Item::new(
                "BIKE-001".to_string(),
                "ACME".to_string(),
                ReplenishmentPolicy::Make,
            ))
            .unwrap();

        assert_eq!(store.next_version("ACME", "BIKE-001").unwrap(), 1);

        store
            .insert_method(MakeMethod::new(
                MethodOwner::Item("BIKE-001".to_string()),
                1,
                "ACME".to_string(),
            ))
            .unwrap();
        assert_eq!(store.next_version("ACME", "BIKE-001").unwrap(), 2);

        // 其他物料的版本不影響本譜系
        store
            .insert_method(MakeMethod::new(
                MethodOwner::Item("FRAME-001".to_string()),
                7,
                "ACME".to_string(),
            ))
            .unwrap();
        assert_eq!(store.next_version("ACME", "BIKE-001").unwrap(), 2);
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let mut store = InMemoryStore::new();
        let material = MethodMaterial::new(
            Uuid::new_v4(),
            "TUBE-001".to_string(),
            "ACME".to_string(),
            Decimal::from(-1),
        );
        assert!(matches!(
            store.insert_material(material),
            Err(PlanError::Validation(_))
        ));
    }

    #[test]
    fn test_cyclic_child_link_rejected_on_insert() {
        let mut store = InMemoryStore::new();
        let a = MakeMethod::new(MethodOwner::Item("A".to_string()), 1, "ACME".to_string());
        let b = MakeMethod::new(MethodOwner::Item("B".to_string()), 1, "ACME".to_string());
        store.insert_method(a.clone()).unwrap();
        store.insert_method(b.clone()).unwrap();

        store
            .insert_material(
                MethodMaterial::new(a.id, "B".to_string(), "ACME".to_string(), Decimal::ONE)
                    .as_make(b.id),
            )
            .unwrap();

        // B 底下連回祖先 A：寫入被拒，不靠後續走訪才發現
        assert!(matches!(
            store.insert_material(
                MethodMaterial::new(b.id, "A".to_string(), "ACME".to_string(), Decimal::ONE)
                    .as_make(a.id),
            ),
            Err(PlanError::Validation(_))
        ));

        // 自我連結同樣被拒
        assert!(matches!(
            store.insert_material(
                MethodMaterial::new(a.id, "A".to_string(), "ACME".to_string(), Decimal::ONE)
                    .as_make(a.id),
            ),
            Err(PlanError::Validation(_))
        ));
        assert_eq!(store.materials_of("ACME", b.id).unwrap().len(), 0);
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut store = InMemoryStore::new();
        let scope = Uuid::new_v4();
        let mut op = MethodOperation::new(scope, "ACME".to_string(), "WELD".to_string(), 10);
        op.predecessor_ids.push(op.id);

        assert!(matches!(
            store.insert_operation(op),
            Err(PlanError::Validation(_))
        ));
    }
}
