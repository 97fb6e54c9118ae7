//! 方法版本化與深拷貝
//!
//! 深拷貝採 id-map 模型：先為來源子樹的每個節點預先產生新識別，
//! 重新對映所有內部引用後以單一批次寫入，來源與目標之間不殘留
//! 任何共享可變狀態。

use std::collections::HashMap;

use uuid::Uuid;

use plan_core::{MakeMethod, MethodOwner, PlanError, Result};

use crate::store::MethodStore;
use crate::tree::{collect_subtree, MethodSubtree};

/// 方法版本化與拷貝服務
pub struct MethodVersionService;

impl MethodVersionService {
    /// 為物料建立新版本的製造方法
    ///
    /// 新版本建立後不會自動成為當前版本；呼叫 [`Self::promote_version`]
    /// 才會更新物料的當前方法外鍵。拷貝失敗時新版本不可視為有效。
    pub fn create_version<S: MethodStore>(
        store: &mut S,
        item_id: &str,
        copy_from_id: Uuid,
        company_id: &str,
        actor_id: &str,
    ) -> Result<MakeMethod> {
        store.item(company_id, item_id)?;
        let source = store.make_method(company_id, copy_from_id)?;
        if !matches!(&source.owner, MethodOwner::Item(owner) if owner == item_id) {
            return Err(PlanError::Validation(format!(
                "來源方法 {copy_from_id} 不屬於物料 {item_id} 的版本譜系"
            )));
        }

        let version = store.next_version(company_id, item_id)?;
        let method = MakeMethod::new(
            MethodOwner::Item(item_id.to_string()),
            version,
            company_id.to_string(),
        );
        store.insert_method(method.clone())?;

        tracing::info!(
            item = item_id,
            company = company_id,
            actor = actor_id,
            version,
            "建立製造方法新版本"
        );

        Self::copy_make_method(store, copy_from_id, method.id, company_id, actor_id)?;
        store.make_method(company_id, method.id)
    }

    /// 晉升版本：以交易方式更新物料的當前方法外鍵
    pub fn promote_version<S: MethodStore>(
        store: &mut S,
        item_id: &str,
        method_id: Uuid,
        company_id: &str,
    ) -> Result<()> {
        let method = store.make_method(company_id, method_id)?;
        if !matches!(&method.owner, MethodOwner::Item(owner) if owner == item_id) {
            return Err(PlanError::Validation(format!(
                "方法 {method_id} 不屬於物料 {item_id}，不可晉升"
            )));
        }
        store.set_current_method(company_id, item_id, method_id)
    }

    /// 把來源方法的子樹深拷貝到目標節點
    ///
    /// 保留相對結構（單位用量、工序順序），所有節點取得全新識別；
    /// 巢狀生產件遞迴拷貝而非共享引用。
    pub fn copy_make_method<S: MethodStore>(
        store: &mut S,
        source_id: Uuid,
        target_id: Uuid,
        company_id: &str,
        actor_id: &str,
    ) -> Result<()> {
        let target = store.make_method(company_id, target_id)?;

        // 樂觀鎖：目標樹取得本次變更的所有權
        store.bump_revision(company_id, target_id, target.revision)?;

        let subtree = collect_subtree(store, source_id, company_id)?;
        let (methods, materials, operations) =
            Self::remap_subtree(&subtree, source_id, &target)?;

        tracing::debug!(
            source = %source_id,
            target = %target_id,
            company = company_id,
            actor = actor_id,
            methods = methods.len(),
            materials = materials.len(),
            operations = operations.len(),
            "深拷貝方法子樹"
        );

        store.insert_subtree(methods, materials, operations)
    }

    /// 以預產生的 id 對映重建子樹
    fn remap_subtree(
        subtree: &MethodSubtree,
        source_id: Uuid,
        target: &MakeMethod,
    ) -> Result<(
        Vec<MakeMethod>,
        Vec<plan_core::MethodMaterial>,
        Vec<plan_core::MethodOperation>,
    )> {
        // 來源節點 → 新識別；來源根對映到既存的目標節點
        let mut id_map: HashMap<Uuid, Uuid> = HashMap::new();
        id_map.insert(source_id, target.id);
        for method in &subtree.methods {
            id_map.entry(method.id).or_insert_with(Uuid::new_v4);
        }
        for operation in &subtree.operations {
            id_map.insert(operation.id, Uuid::new_v4());
        }

        let lookup = |id: Uuid| -> Result<Uuid> {
            id_map.get(&id).copied().ok_or_else(|| {
                PlanError::ReferentialIntegrity(format!("拷貝對映缺少節點 {id}"))
            })
        };

        // 巢狀方法節點：沿用目標的擁有者與版本（整棵樹是單一聚合）
        let methods: Vec<MakeMethod> = subtree
            .methods
            .iter()
            .filter(|m| m.id != source_id)
            .map(|m| {
                let mut copied = m.clone();
                copied.id = id_map[&m.id];
                copied.owner = target.owner.clone();
                copied.version = target.version;
                copied.company_id = target.company_id.clone();
                copied.revision = 0;
                copied
            })
            .collect();

        let mut materials = Vec::with_capacity(subtree.materials.len());
        for material in &subtree.materials {
            let mut copied = material.clone();
            copied.id = Uuid::new_v4();
            copied.make_method_id = lookup(material.make_method_id)?;
            copied.company_id = target.company_id.clone();
            if let Some(child) = material.child_make_method_id {
                copied.child_make_method_id = Some(lookup(child)?);
            }
            if let Some(operation) = material.operation_id {
                copied.operation_id = Some(lookup(operation)?);
            }
            materials.push(copied);
        }

        let mut operations = Vec::with_capacity(subtree.operations.len());
        for operation in &subtree.operations {
            let mut copied = operation.clone();
            copied.id = lookup(operation.id)?;
            copied.scope_id = lookup(operation.scope_id)?;
            copied.company_id = target.company_id.clone();
            copied.predecessor_ids = operation
                .predecessor_ids
                .iter()
                .map(|pred| lookup(*pred))
                .collect::<Result<Vec<_>>>()?;
            operations.push(copied);
        }

        Ok((methods, materials, operations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recalc::QuantityRecalculator;
    use crate::store::InMemoryStore;
    use plan_core::{Item, MethodMaterial, MethodOperation, ReplenishmentPolicy};
    use rust_decimal::Decimal;

    fn seed_item(store: &mut InMemoryStore, id: &str, policy: ReplenishmentPolicy) {
        store
            .upsert_item(Item::new(id.to_string(), "ACME".to_string(), policy))
            .unwrap();
    }

    /// 建立 BIKE → FRAME → TUBE 的兩層來源樹
    fn seed_source_tree(store: &mut InMemoryStore) -> MakeMethod {
        seed_item(store, "BIKE", ReplenishmentPolicy::Make);
        seed_item(store, "FRAME", ReplenishmentPolicy::Make);
        seed_item(store, "TUBE", ReplenishmentPolicy::Buy);

        let bike = MakeMethod::new(MethodOwner::Item("BIKE".to_string()), 1, "ACME".to_string());
        let frame =
            MakeMethod::new(MethodOwner::Item("BIKE".to_string()), 1, "ACME".to_string());

        let weld = MethodOperation::new(frame.id, "ACME".to_string(), "WELD".to_string(), 10);
        let tube_material = MethodMaterial::new(
            frame.id,
            "TUBE".to_string(),
            "ACME".to_string(),
            Decimal::from(3),
        )
        .with_operation(weld.id);
        let frame_material = MethodMaterial::new(
            bike.id,
            "FRAME".to_string(),
            "ACME".to_string(),
            Decimal::ONE,
        )
        .as_make(frame.id);

        store.insert_method(bike.clone()).unwrap();
        store.insert_method(frame).unwrap();
        store.insert_operation(weld).unwrap();
        store.insert_material(tube_material).unwrap();
        store.insert_material(frame_material).unwrap();
        store.set_current_method("ACME", "BIKE", bike.id).unwrap();
        bike
    }

    #[test]
    fn test_create_version_deep_copies_structure() {
        let mut store = InMemoryStore::new();
        let v1 = seed_source_tree(&mut store);

        let v2 = MethodVersionService::create_version(&mut store, "BIKE", v1.id, "ACME", "user-1")
            .unwrap();

        assert_eq!(v2.version, 2);
        assert_ne!(v2.id, v1.id);

        // 結構完整拷貝：一條 FRAME 行，其子方法下有 TUBE 行與 WELD 工序
        let materials = store.materials_of("ACME", v2.id).unwrap();
        assert_eq!(materials.len(), 1);
        let child_id = materials[0].child_make_method_id.unwrap();
        let child_materials = store.materials_of("ACME", child_id).unwrap();
        assert_eq!(child_materials.len(), 1);
        assert_eq!(child_materials[0].quantity_per_parent, Decimal::from(3));
        assert_eq!(store.operations_of("ACME", child_id).unwrap().len(), 1);

        // 新版本尚未晉升
        assert_eq!(
            store.item("ACME", "BIKE").unwrap().current_method_id,
            Some(v1.id)
        );
        MethodVersionService::promote_version(&mut store, "BIKE", v2.id, "ACME").unwrap();
        assert_eq!(
            store.item("ACME", "BIKE").unwrap().current_method_id,
            Some(v2.id)
        );
    }

    #[test]
    fn test_copy_isolation() {
        let mut store = InMemoryStore::new();
        let v1 = seed_source_tree(&mut store);
        let v2 = MethodVersionService::create_version(&mut store, "BIKE", v1.id, "ACME", "user-1")
            .unwrap();

        // 修改來源樹的用量
        let mut source_material = store.materials_of("ACME", v1.id).unwrap().remove(0);
        source_material.quantity_per_parent = Decimal::from(99);
        store.insert_material(source_material).unwrap();

        // 目標樹不受影響
        let target_material = &store.materials_of("ACME", v2.id).unwrap()[0];
        assert_eq!(target_material.quantity_per_parent, Decimal::ONE);

        // 反向亦然：修改目標不影響來源
        let mut edited = target_material.clone();
        edited.quantity_per_parent = Decimal::from(7);
        store.insert_material(edited).unwrap();
        assert_eq!(
            store.materials_of("ACME", v1.id).unwrap()[0].quantity_per_parent,
            Decimal::from(99)
        );
    }

    #[test]
    fn test_copied_tree_recalculates_independently() {
        let mut store = InMemoryStore::new();
        let v1 = seed_source_tree(&mut store);
        let v2 = MethodVersionService::create_version(&mut store, "BIKE", v1.id, "ACME", "user-1")
            .unwrap();

        store
            .set_method_quantity("ACME", v2.id, Decimal::from(10))
            .unwrap();
        QuantityRecalculator::recalculate_requirements(&mut store, v2.id, "ACME", "user-1")
            .unwrap();

        let child_id = store.materials_of("ACME", v2.id).unwrap()[0]
            .child_make_method_id
            .unwrap();
        assert_eq!(
            store.materials_of("ACME", child_id).unwrap()[0].required_quantity,
            Decimal::from(30)
        );

        // 來源樹的計算欄位保持未動
        assert_eq!(
            store.materials_of("ACME", v1.id).unwrap()[0].required_quantity,
            Decimal::ZERO
        );
    }

    #[test]
    fn test_create_version_rejects_foreign_source() {
        let mut store = InMemoryStore::new();
        seed_item(&mut store, "BIKE", ReplenishmentPolicy::Make);
        seed_item(&mut store, "CART", ReplenishmentPolicy::Make);
        let cart =
            MakeMethod::new(MethodOwner::Item("CART".to_string()), 1, "ACME".to_string());
        store.insert_method(cart.clone()).unwrap();

        assert!(matches!(
            MethodVersionService::create_version(&mut store, "BIKE", cart.id, "ACME", "user-1"),
            Err(PlanError::Validation(_))
        ));
    }
}
