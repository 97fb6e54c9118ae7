//! 銷售訂單、採購訂單與工單模型

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 銷售訂單
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrder {
    /// 訂單ID
    pub id: Uuid,

    /// 公司ID
    pub company_id: String,

    /// 訂單編號
    pub order_number: String,

    /// 來源報價單（由報價轉單時填入）
    pub source_quote_id: Option<Uuid>,
}

impl SalesOrder {
    /// 創建新的銷售訂單
    pub fn new(company_id: String, order_number: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            order_number,
            source_quote_id: None,
        }
    }

    /// 建構器模式：設置來源報價單
    pub fn from_quote(mut self, quote_id: Uuid) -> Self {
        self.source_quote_id = Some(quote_id);
        self
    }
}

/// 銷售訂單行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrderLine {
    /// 訂單行ID
    pub id: Uuid,

    /// 所屬訂單ID
    pub sales_order_id: Uuid,

    /// 公司ID
    pub company_id: String,

    /// 物料ID
    pub item_id: String,

    /// 庫存地點ID
    pub location_id: String,

    /// 訂購數量
    pub quantity: Decimal,

    /// 承諾交期
    pub promised_date: NaiveDate,

    /// 來源報價單行
    pub source_quote_line_id: Option<Uuid>,
}

impl SalesOrderLine {
    /// 創建新的訂單行
    pub fn new(
        sales_order_id: Uuid,
        company_id: String,
        item_id: String,
        location_id: String,
        quantity: Decimal,
        promised_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sales_order_id,
            company_id,
            item_id,
            location_id,
            quantity,
            promised_date,
            source_quote_line_id: None,
        }
    }
}

/// 採購訂單狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderStatus {
    /// 草稿
    Draft,
    /// 已計劃（觸發窄範圍 MRP 重算）
    Planned,
    /// 已發放
    Released,
    /// 已結案
    Closed,
}

/// 採購訂單
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    /// 訂單ID
    pub id: Uuid,

    /// 公司ID
    pub company_id: String,

    /// 訂單編號
    pub order_number: String,

    /// 狀態
    pub status: PurchaseOrderStatus,

    /// 訂單行
    pub lines: Vec<PurchaseOrderLine>,
}

impl PurchaseOrder {
    /// 創建新的採購訂單
    pub fn new(company_id: String, order_number: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            order_number,
            status: PurchaseOrderStatus::Draft,
            lines: Vec::new(),
        }
    }

    /// 添加訂單行
    pub fn add_line(&mut self, line: PurchaseOrderLine) {
        self.lines.push(line);
    }

    /// 訂單涉及的物料ID（窄範圍 MRP 使用）
    pub fn item_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lines.iter().map(|l| l.item_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// 採購訂單行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    /// 訂單行ID
    pub id: Uuid,

    /// 物料ID
    pub item_id: String,

    /// 收貨地點ID
    pub location_id: String,

    /// 訂購數量
    pub quantity: Decimal,

    /// 預計到貨日
    pub due_date: NaiveDate,
}

impl PurchaseOrderLine {
    /// 創建新的採購訂單行
    pub fn new(item_id: String, location_id: String, quantity: Decimal, due_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            location_id,
            quantity,
            due_date,
        }
    }
}

/// 工單（製造方法的可執行實例）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// 工單ID
    pub id: Uuid,

    /// 公司ID
    pub company_id: String,

    /// 生產的物料ID
    pub item_id: String,

    /// 庫存地點ID
    pub location_id: String,

    /// 生產數量
    pub quantity: Decimal,

    /// 預計完工日
    pub due_date: NaiveDate,

    /// 工單層級的製造方法（發放時深拷貝，之後與來源方法無關）
    pub make_method_id: Option<Uuid>,

    /// 來源銷售訂單行
    pub sales_order_line_id: Option<Uuid>,
}

impl Job {
    /// 創建新的工單
    pub fn new(
        company_id: String,
        item_id: String,
        location_id: String,
        quantity: Decimal,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            item_id,
            location_id,
            quantity,
            due_date,
            make_method_id: None,
            sales_order_line_id: None,
        }
    }

    /// 建構器模式：連結來源銷售訂單行
    pub fn with_sales_order_line(mut self, line_id: Uuid) -> Self {
        self.sales_order_line_id = Some(line_id);
        self
    }
}
