//! 製造方法模型（BOM 與途程的樹狀節點）

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 製造方法的擁有者
///
/// 一個製造方法同一時間只屬於一個擁有者。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodOwner {
    /// 物料主檔層級的方法（可被版本化）
    Item(String),
    /// 工單層級的副本（發放工單時建立，之後獨立演化）
    Job(Uuid),
    /// 報價單行所配置的方法（僅供估價）
    QuoteLine(Uuid),
    /// 報價單行下巢狀物料所配置的方法
    QuoteMaterial(Uuid),
}

/// 製造方法（BOM/途程樹的根節點或巢狀節點）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MakeMethod {
    /// 方法ID
    pub id: Uuid,

    /// 擁有者
    pub owner: MethodOwner,

    /// 版本號（同一物料的版本譜系內遞增）
    pub version: u32,

    /// 公司ID
    pub company_id: String,

    /// 本節點的需求數量（根節點為工單/訂單數量，巢狀節點由上層計算覆寫）
    pub required_quantity: Decimal,

    /// 修訂計數器（樂觀鎖：每次樹狀變更前 check-and-increment）
    pub revision: u64,
}

impl MakeMethod {
    /// 創建新的製造方法
    pub fn new(owner: MethodOwner, version: u32, company_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            version,
            company_id,
            required_quantity: Decimal::ONE,
            revision: 0,
        }
    }

    /// 建構器模式：設置需求數量
    pub fn with_required_quantity(mut self, quantity: Decimal) -> Self {
        self.required_quantity = quantity;
        self
    }

    /// 檢查是否為物料層級的方法
    pub fn is_item_method(&self) -> bool {
        matches!(self.owner, MethodOwner::Item(_))
    }

    /// 檢查是否為工單層級的副本
    pub fn is_job_method(&self) -> bool {
        matches!(self.owner, MethodOwner::Job(_))
    }
}

/// 物料行的供應方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodType {
    /// 採購件（葉節點）
    Buy,
    /// 生產件（必須連結子方法）
    Make,
}

/// 製造方法中的一條物料行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodMaterial {
    /// 物料行ID
    pub id: Uuid,

    /// 所屬方法ID
    pub make_method_id: Uuid,

    /// 子物料ID
    pub item_id: String,

    /// 公司ID
    pub company_id: String,

    /// 單位父件用量（>= 0）
    pub quantity_per_parent: Decimal,

    /// 計量單位
    pub unit_of_measure: String,

    /// 供應方式
    pub method_type: MethodType,

    /// 子方法（method_type 為 Make 時必須指向同一棵樹內的節點）
    pub child_make_method_id: Option<Uuid>,

    /// 消耗此物料的工序（影響損耗係數）
    pub operation_id: Option<Uuid>,

    /// 計算出的需求數量（由數量重算覆寫，永不累加）
    pub required_quantity: Decimal,
}

impl MethodMaterial {
    /// 創建新的物料行
    pub fn new(
        make_method_id: Uuid,
        item_id: String,
        company_id: String,
        quantity_per_parent: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            make_method_id,
            item_id,
            company_id,
            quantity_per_parent,
            unit_of_measure: "EA".to_string(),
            method_type: MethodType::Buy,
            child_make_method_id: None,
            operation_id: None,
            required_quantity: Decimal::ZERO,
        }
    }

    /// 建構器模式：設為生產件並連結子方法
    pub fn as_make(mut self, child_make_method_id: Uuid) -> Self {
        self.method_type = MethodType::Make;
        self.child_make_method_id = Some(child_make_method_id);
        self
    }

    /// 建構器模式：連結消耗工序
    pub fn with_operation(mut self, operation_id: Uuid) -> Self {
        self.operation_id = Some(operation_id);
        self
    }

    /// 建構器模式：設置計量單位
    pub fn with_unit(mut self, unit: String) -> Self {
        self.unit_of_measure = unit;
        self
    }

    /// 檢查是否為生產件行
    pub fn is_make(&self) -> bool {
        self.method_type == MethodType::Make
    }
}

/// 製造工序（方法或工單範圍內的一個步驟）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodOperation {
    /// 工序ID
    pub id: Uuid,

    /// 所屬範圍（方法或工單方法的ID）
    pub scope_id: Uuid,

    /// 公司ID
    pub company_id: String,

    /// 製程ID
    pub process_id: String,

    /// 工作中心
    pub work_center_id: Option<String>,

    /// 排序整數（同一範圍內唯一、全序）
    pub order: u32,

    /// 整備時間（分鐘）
    pub setup_time: Decimal,

    /// 單件加工時間（分鐘）
    pub run_time_per_unit: Decimal,

    /// 損耗係數（影響該工序消耗物料的需求量）
    pub scrap_factor: Decimal,

    /// 顯式前置工序（使用者宣告的硬性依賴）
    pub predecessor_ids: Vec<Uuid>,

    /// 消耗的前置製程輸出（推導依賴邊的來源）
    pub consumes_process: Option<String>,

    /// 建立時間（排序平手時的決勝依據）
    pub created_at: DateTime<Utc>,
}

impl MethodOperation {
    /// 創建新的工序
    pub fn new(scope_id: Uuid, company_id: String, process_id: String, order: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope_id,
            company_id,
            process_id,
            work_center_id: None,
            order,
            setup_time: Decimal::ZERO,
            run_time_per_unit: Decimal::ZERO,
            scrap_factor: Decimal::ZERO,
            predecessor_ids: Vec::new(),
            consumes_process: None,
            created_at: Utc::now(),
        }
    }

    /// 建構器模式：設置工作中心
    pub fn with_work_center(mut self, work_center_id: String) -> Self {
        self.work_center_id = Some(work_center_id);
        self
    }

    /// 建構器模式：設置標準工時
    pub fn with_times(mut self, setup_time: Decimal, run_time_per_unit: Decimal) -> Self {
        self.setup_time = setup_time;
        self.run_time_per_unit = run_time_per_unit;
        self
    }

    /// 建構器模式：設置損耗係數
    pub fn with_scrap_factor(mut self, scrap_factor: Decimal) -> Self {
        self.scrap_factor = scrap_factor;
        self
    }

    /// 建構器模式：宣告顯式前置工序
    pub fn with_predecessor(mut self, predecessor_id: Uuid) -> Self {
        self.predecessor_ids.push(predecessor_id);
        self
    }

    /// 建構器模式：宣告消耗的前置製程輸出
    pub fn consuming_process(mut self, process_id: String) -> Self {
        self.consumes_process = Some(process_id);
        self
    }
}
