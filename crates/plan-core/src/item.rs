//! 物料主檔模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 補貨政策
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplenishmentPolicy {
    /// 採購
    Buy,
    /// 生產
    Make,
}

/// 批量規則
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotSizeRule {
    /// 批對批（Lot for Lot）- 按實際需求訂購
    LotForLot,

    /// 固定訂購量（Fixed Order Quantity）- 每次固定數量
    FixedOrderQuantity,

    /// 最小-最大（Min-Max）
    MinMax,
}

/// 物料批量政策
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotSizePolicy {
    /// 批量規則
    pub rule: LotSizeRule,

    /// 固定批量（如果適用）
    pub fixed_lot_size: Option<Decimal>,

    /// 最小訂購量
    pub minimum_order_qty: Option<Decimal>,

    /// 最大訂購量
    pub maximum_order_qty: Option<Decimal>,

    /// 訂購倍數（必須是此倍數）
    pub order_multiple: Option<Decimal>,
}

impl LotSizePolicy {
    /// 創建批對批政策（預設）
    pub fn lot_for_lot() -> Self {
        Self {
            rule: LotSizeRule::LotForLot,
            fixed_lot_size: None,
            minimum_order_qty: None,
            maximum_order_qty: None,
            order_multiple: None,
        }
    }

    /// 建構器模式：設置批量規則
    pub fn with_rule(mut self, rule: LotSizeRule) -> Self {
        self.rule = rule;
        self
    }

    /// 建構器模式：設置固定批量
    pub fn with_fixed_lot_size(mut self, size: Decimal) -> Self {
        self.fixed_lot_size = Some(size);
        self
    }

    /// 建構器模式：設置最小訂購量
    pub fn with_minimum_order_qty(mut self, qty: Decimal) -> Self {
        self.minimum_order_qty = Some(qty);
        self
    }

    /// 建構器模式：設置最大訂購量
    pub fn with_maximum_order_qty(mut self, qty: Decimal) -> Self {
        self.maximum_order_qty = Some(qty);
        self
    }

    /// 建構器模式：設置訂購倍數
    pub fn with_order_multiple(mut self, multiple: Decimal) -> Self {
        self.order_multiple = Some(multiple);
        self
    }

    /// 調整訂購量以符合批量政策
    pub fn adjust_order_quantity(&self, mut quantity: Decimal) -> Decimal {
        // 應用最小訂購量
        if let Some(min_qty) = self.minimum_order_qty {
            if quantity < min_qty {
                quantity = min_qty;
            }
        }

        // 應用訂購倍數
        if let Some(multiple) = self.order_multiple {
            if multiple > Decimal::ZERO {
                let remainder = quantity % multiple;
                if remainder > Decimal::ZERO {
                    quantity = quantity - remainder + multiple;
                }
            }
        }

        // 應用最大訂購量
        if let Some(max_qty) = self.maximum_order_qty {
            if quantity > max_qty {
                quantity = max_qty;
            }
        }

        quantity
    }
}

impl Default for LotSizePolicy {
    fn default() -> Self {
        Self::lot_for_lot()
    }
}

/// 物料主檔
///
/// 身分（id）不可變；可變屬性由外部物料模組維護，
/// 計劃引擎只讀取計劃相關欄位。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// 物料ID
    pub id: String,

    /// 公司ID
    pub company_id: String,

    /// 名稱
    pub name: String,

    /// 計量單位
    pub unit_of_measure: String,

    /// 計量單位小數精度（數量捨入位數）
    pub unit_precision: u32,

    /// 補貨政策
    pub replenishment: ReplenishmentPolicy,

    /// 批量政策
    pub lot_size: LotSizePolicy,

    /// 提前期（工作天）
    pub lead_time_days: u32,

    /// 安全庫存
    pub safety_stock: Decimal,

    /// 當前有效製造方法（顯式外鍵，版本晉升時以交易方式更新）
    pub current_method_id: Option<Uuid>,
}

impl Item {
    /// 創建新的物料
    pub fn new(id: String, company_id: String, replenishment: ReplenishmentPolicy) -> Self {
        Self {
            name: id.clone(),
            id,
            company_id,
            unit_of_measure: "EA".to_string(),
            unit_precision: 4,
            replenishment,
            lot_size: LotSizePolicy::lot_for_lot(),
            lead_time_days: 0,
            safety_stock: Decimal::ZERO,
            current_method_id: None,
        }
    }

    /// 建構器模式：設置名稱
    pub fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    /// 建構器模式：設置計量單位與精度
    pub fn with_unit(mut self, unit: String, precision: u32) -> Self {
        self.unit_of_measure = unit;
        self.unit_precision = precision;
        self
    }

    /// 建構器模式：設置批量政策
    pub fn with_lot_size(mut self, lot_size: LotSizePolicy) -> Self {
        self.lot_size = lot_size;
        self
    }

    /// 建構器模式：設置提前期
    pub fn with_lead_time(mut self, days: u32) -> Self {
        self.lead_time_days = days;
        self
    }

    /// 建構器模式：設置安全庫存
    pub fn with_safety_stock(mut self, stock: Decimal) -> Self {
        self.safety_stock = stock;
        self
    }

    /// 檢查是否為生產件
    pub fn is_make(&self) -> bool {
        self.replenishment == ReplenishmentPolicy::Make
    }

    /// 依計量單位精度捨入數量
    pub fn round_quantity(&self, quantity: Decimal) -> Decimal {
        quantity.round_dp(self.unit_precision)
    }
}
