//! 方法樹遍歷輔助

use std::collections::HashSet;

use uuid::Uuid;

use plan_core::{MakeMethod, MethodMaterial, MethodOperation, PlanError, Result};

use crate::store::MethodStore;

/// 一棵方法子樹的完整內容（節點、物料行、工序）
#[derive(Debug, Clone, Default)]
pub struct MethodSubtree {
    pub methods: Vec<MakeMethod>,
    pub materials: Vec<MethodMaterial>,
    pub operations: Vec<MethodOperation>,
}

/// 以廣度優先收集整棵子樹
///
/// 樹依構造不變量應為無循環；重複造訪視為資料完整性錯誤而非無限走訪。
pub fn collect_subtree<S: MethodStore + ?Sized>(
    store: &S,
    root_id: Uuid,
    company_id: &str,
) -> Result<MethodSubtree> {
    let mut subtree = MethodSubtree::default();
    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut queue = vec![root_id];

    while let Some(method_id) = queue.pop() {
        if !visited.insert(method_id) {
            return Err(PlanError::ReferentialIntegrity(format!(
                "方法樹 {root_id} 重複造訪節點 {method_id}（樹被別名或存在循環）"
            )));
        }

        subtree.methods.push(store.make_method(company_id, method_id)?);
        subtree
            .operations
            .extend(store.operations_of(company_id, method_id)?);

        for material in store.materials_of(company_id, method_id)? {
            if material.is_make() {
                let child_id = material.child_make_method_id.ok_or_else(|| {
                    PlanError::ReferentialIntegrity(format!(
                        "生產件物料行 {} 缺少子方法連結",
                        material.id
                    ))
                })?;
                queue.push(child_id);
            }
            subtree.materials.push(material);
        }
    }

    Ok(subtree)
}

/// 檢查把 `child_method_id` 連結到 `parent_method_id` 底下是否會造成循環
///
/// 由於物料行只能指向樹內的後代節點，若自候選子節點向下可達父節點，
/// 此連結即構成循環，必須拒絕。
pub fn ensure_acyclic_link<S: MethodStore + ?Sized>(
    store: &S,
    parent_method_id: Uuid,
    child_method_id: Uuid,
    company_id: &str,
) -> Result<()> {
    if parent_method_id == child_method_id {
        return Err(PlanError::Validation(format!(
            "方法 {parent_method_id} 不可連結自身為子方法"
        )));
    }

    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut queue = vec![child_method_id];

    while let Some(method_id) = queue.pop() {
        if method_id == parent_method_id {
            return Err(PlanError::Validation(format!(
                "連結 {child_method_id} 到 {parent_method_id} 會在方法樹中造成循環"
            )));
        }
        if !visited.insert(method_id) {
            continue;
        }
        for material in store.materials_of(company_id, method_id)? {
            if let Some(child) = material.child_make_method_id {
                queue.push(child);
            }
        }
    }

    Ok(())
}
