//! 批量計算

use chrono::NaiveDate;
use rust_decimal::Decimal;

use plan_core::{Item, LotSizeRule, WorkCalendar};

/// 批量計算器
pub struct LotSizer;

impl LotSizer {
    /// 依物料批量政策把淨需求轉為訂購量
    ///
    /// 規則運算後再套用最小/倍數/最大調整，最後依計量單位精度捨入。
    pub fn size_order(item: &Item, net_requirement: Decimal) -> Decimal {
        if net_requirement <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let policy = &item.lot_size;
        let quantity = match policy.rule {
            LotSizeRule::LotForLot => net_requirement,
            LotSizeRule::FixedOrderQuantity => match policy.fixed_lot_size {
                // 固定批量的整數倍，足以覆蓋淨需求
                Some(lot) if lot > Decimal::ZERO => {
                    let lots = (net_requirement / lot).ceil();
                    lots * lot
                }
                _ => net_requirement,
            },
            LotSizeRule::MinMax => {
                let min = policy.minimum_order_qty.unwrap_or(net_requirement);
                net_requirement.max(min)
            }
        };

        item.round_quantity(policy.adjust_order_quantity(quantity))
    }

    /// 由交期沿工作日曆回推開始日（下單/開工日）
    pub fn start_date(calendar: &WorkCalendar, item: &Item, due_date: NaiveDate) -> NaiveDate {
        calendar.subtract_working_days(due_date, item.lead_time_days)
    }
}
