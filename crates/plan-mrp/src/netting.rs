//! 淨需求計算
//!
//! 依日期桶由早到晚走訪：先到的需求先消耗庫存與在途供應，
//! 晚於需求日的供應不會回頭抵銷較早的需求。

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plan_core::{Demand, Supply, SupplyType};

/// 淨需求計算結果（單一日期桶）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetRequirement {
    /// 日期
    pub date: NaiveDate,
    /// 總需求
    pub gross_requirement: Decimal,
    /// 預計收貨
    pub scheduled_receipt: Decimal,
    /// 預計庫存
    pub projected_on_hand: Decimal,
    /// 淨需求
    pub net_requirement: Decimal,
}

/// 淨需求計算器
pub struct NettingCalculator;

impl NettingCalculator {
    /// 收集參與淨算的日期桶（需求日與供應可用日的聯集，排序去重）
    pub fn requirement_dates(demands: &[Demand], supplies: &[Supply]) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = demands
            .iter()
            .map(|d| d.need_date)
            .chain(
                supplies
                    .iter()
                    .filter(|s| s.supply_type != SupplyType::OnHand)
                    .map(|s| s.available_date),
            )
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// 計算淨需求
    ///
    /// 現有庫存（OnHand）併入初始庫存；其餘供應按可用日計入該桶的
    /// 預計收貨。預計庫存低於安全庫存時產生淨需求，補足到安全庫存。
    pub fn calculate(
        demands: &[Demand],
        supplies: &[Supply],
        safety_stock: Decimal,
        time_buckets: &[NaiveDate],
    ) -> Vec<NetRequirement> {
        let initial_inventory = supplies
            .iter()
            .filter(|s| s.supply_type == SupplyType::OnHand)
            .map(|s| s.quantity)
            .sum::<Decimal>();

        let mut results = Vec::with_capacity(time_buckets.len());
        let mut current_inventory = initial_inventory;

        for &date in time_buckets {
            let gross_requirement = demands
                .iter()
                .filter(|d| d.need_date == date)
                .map(|d| d.open_quantity())
                .sum::<Decimal>();

            let scheduled_receipt = supplies
                .iter()
                .filter(|s| s.supply_type != SupplyType::OnHand && s.available_date == date)
                .map(|s| s.quantity)
                .sum::<Decimal>();

            let projected_on_hand = current_inventory + scheduled_receipt - gross_requirement;

            let net_requirement = if projected_on_hand < safety_stock {
                safety_stock - projected_on_hand
            } else {
                Decimal::ZERO
            };

            results.push(NetRequirement {
                date,
                gross_requirement,
                scheduled_receipt,
                projected_on_hand,
                net_requirement,
            });

            // 淨需求視為已計劃補足：後續桶自補足後的水位繼續走
            current_inventory = projected_on_hand + net_requirement;
        }

        results
    }
}
