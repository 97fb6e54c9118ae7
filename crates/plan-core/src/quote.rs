//! 報價單模型

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 報價單狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteStatus {
    /// 草稿（可配置方法）
    Draft,
    /// 已送出
    Sent,
    /// 已轉為銷售訂單
    Converted,
    /// 已失效
    Expired,
}

/// 報價單
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// 報價單ID
    pub id: Uuid,

    /// 公司ID
    pub company_id: String,

    /// 報價單編號
    pub quote_number: String,

    /// 狀態
    pub status: QuoteStatus,
}

impl Quote {
    /// 創建新的報價單
    pub fn new(company_id: String, quote_number: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            quote_number,
            status: QuoteStatus::Draft,
        }
    }
}

/// 報價單行
///
/// 報價單行擁有一個僅供估價/配置的製造方法；
/// 轉單時由具體化服務產生工單層級的副本。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteLine {
    /// 報價單行ID
    pub id: Uuid,

    /// 所屬報價單ID
    pub quote_id: Uuid,

    /// 公司ID
    pub company_id: String,

    /// 物料ID
    pub item_id: String,

    /// 庫存地點ID
    pub location_id: String,

    /// 報價數量
    pub quantity: Decimal,

    /// 承諾交期
    pub promised_date: NaiveDate,

    /// 報價配置的製造方法（owner 為 QuoteLine）
    pub make_method_id: Option<Uuid>,
}

impl QuoteLine {
    /// 創建新的報價單行
    pub fn new(
        quote_id: Uuid,
        company_id: String,
        item_id: String,
        location_id: String,
        quantity: Decimal,
        promised_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            quote_id,
            company_id,
            item_id,
            location_id,
            quantity,
            promised_date,
            make_method_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_quote() {
        let quote = Quote::new("ACME".to_string(), "Q-001".to_string());
        assert_eq!(quote.status, QuoteStatus::Draft);

        let line = QuoteLine::new(
            quote.id,
            "ACME".to_string(),
            "BIKE-001".to_string(),
            "MAIN".to_string(),
            Decimal::from(10),
            NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
        );
        assert_eq!(line.quote_id, quote.id);
        assert!(line.make_method_id.is_none());
    }
}
