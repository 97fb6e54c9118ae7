//! 報價單方法具體化
//!
//! 報價階段的方法配置（估價用）與正式的物料/工單方法各自擁有
//! 獨立的方法樹；流轉一律透過深拷貝，絕不共享節點。

use uuid::Uuid;

use plan_core::{
    Job, MakeMethod, MethodOwner, PlanError, QuoteStatus, ReplenishmentPolicy, Result,
    SalesOrder, SalesOrderLine,
};

use crate::copy::MethodVersionService;
use crate::ordering::OperationDependencyResolver;
use crate::recalc::QuantityRecalculator;
use crate::store::{MethodStore, PlanningStore};

/// 報價轉單請求
#[derive(Debug, Clone)]
pub struct ConvertQuoteRequest {
    pub quote_id: Uuid,
    pub company_id: String,
    pub user_id: String,
    /// 要轉單的報價單行；不可為空
    pub selected_line_ids: Vec<Uuid>,
}

/// 報價轉單結果
///
/// 單行建立失敗不會回滾其他行；失敗明細由呼叫端決定如何補救。
#[derive(Debug)]
pub struct QuoteConversion {
    pub sales_order_id: Uuid,
    pub created_line_ids: Vec<Uuid>,
    pub created_job_ids: Vec<Uuid>,
    pub failures: Vec<(Uuid, PlanError)>,
}

/// 報價方法具體化服務
pub struct QuoteMaterializer;

impl QuoteMaterializer {
    /// 為報價單行建立（或重建）估價用的製造方法
    ///
    /// 物料已有當前方法時以深拷貝帶入其結構；方法數量設為報價數量
    /// 後立即重算整棵樹的需求量。
    pub fn upsert_quote_line_method<S: PlanningStore>(
        store: &mut S,
        quote_line_id: Uuid,
        company_id: &str,
        actor_id: &str,
    ) -> Result<MakeMethod> {
        let mut line = store.quote_line(company_id, quote_line_id)?;
        let quote = store.quote(company_id, line.quote_id)?;
        if quote.status == QuoteStatus::Converted {
            return Err(PlanError::Validation(format!(
                "報價單 {} 已轉單，不可再配置方法",
                quote.id
            )));
        }

        let item = store.item(company_id, &line.item_id)?;
        let method = MakeMethod::new(
            MethodOwner::QuoteLine(line.id),
            1,
            company_id.to_string(),
        )
        .with_required_quantity(line.quantity);
        store.insert_method(method.clone())?;

        if let Some(source_id) = item.current_method_id {
            MethodVersionService::copy_make_method(
                store, source_id, method.id, company_id, actor_id,
            )?;
            QuantityRecalculator::recalculate_requirements(
                store, method.id, company_id, actor_id,
            )?;
        }

        line.make_method_id = Some(method.id);
        store.upsert_quote_line(line)?;

        tracing::info!(
            quote_line = %quote_line_id,
            method = %method.id,
            company = company_id,
            actor = actor_id,
            "建立報價單行方法"
        );
        store.make_method(company_id, method.id)
    }

    /// 把報價配置的方法回寫為物料的新版本方法
    ///
    /// 不就地覆蓋當前版本；而是建立下一版並晉升，報價方法本身保持不動。
    pub fn upsert_make_method_from_quote_line<S: PlanningStore>(
        store: &mut S,
        quote_line_id: Uuid,
        company_id: &str,
        actor_id: &str,
    ) -> Result<MakeMethod> {
        let line = store.quote_line(company_id, quote_line_id)?;
        let source_id = line.make_method_id.ok_or_else(|| {
            PlanError::Validation(format!("報價單行 {quote_line_id} 尚未配置製造方法"))
        })?;

        let version = store.next_version(company_id, &line.item_id)?;
        let method = MakeMethod::new(
            MethodOwner::Item(line.item_id.clone()),
            version,
            company_id.to_string(),
        );
        store.insert_method(method.clone())?;

        Self::upsert_make_method_from_quote_method(
            store, source_id, method.id, company_id, actor_id,
        )?;
        MethodVersionService::promote_version(store, &line.item_id, method.id, company_id)?;
        store.make_method(company_id, method.id)
    }

    /// 把報價範疇的方法深拷貝到目標方法節點並重算
    ///
    /// 目標必須是尚無內容的新節點；既有結構不會被合併。
    pub fn upsert_make_method_from_quote_method<S: PlanningStore>(
        store: &mut S,
        source_method_id: Uuid,
        target_method_id: Uuid,
        company_id: &str,
        actor_id: &str,
    ) -> Result<()> {
        if !store.materials_of(company_id, target_method_id)?.is_empty() {
            return Err(PlanError::Validation(format!(
                "目標方法 {target_method_id} 已有物料行，不可覆蓋"
            )));
        }
        MethodVersionService::copy_make_method(
            store,
            source_method_id,
            target_method_id,
            company_id,
            actor_id,
        )?;
        QuantityRecalculator::recalculate_requirements(
            store,
            target_method_id,
            company_id,
            actor_id,
        )
    }

    /// 報價轉銷售訂單
    ///
    /// 先驗證整份請求再開始寫入；通過後逐行建立訂單行，生產型物料
    /// 另建工單與工單層級的方法副本。單行失敗記入 `failures` 並繼續；
    /// 只有在至少一行成功時才把報價單標記為已轉單。
    pub fn convert_quote_to_order<S: PlanningStore>(
        store: &mut S,
        request: &ConvertQuoteRequest,
    ) -> Result<QuoteConversion> {
        let mut quote = store.quote(&request.company_id, request.quote_id)?;
        if quote.status == QuoteStatus::Converted {
            return Err(PlanError::Validation(format!(
                "報價單 {} 已轉單",
                quote.id
            )));
        }
        if request.selected_line_ids.is_empty() {
            return Err(PlanError::Validation(
                "轉單必須至少選擇一個報價單行".to_string(),
            ));
        }

        let lines = store.quote_lines_of(&request.company_id, quote.id)?;
        let mut selected = Vec::with_capacity(request.selected_line_ids.len());
        for line_id in &request.selected_line_ids {
            let line = lines.iter().find(|l| l.id == *line_id).ok_or_else(|| {
                PlanError::Validation(format!(
                    "報價單行 {line_id} 不屬於報價單 {}",
                    quote.id
                ))
            })?;
            selected.push(line.clone());
        }

        let order = SalesOrder::new(
            request.company_id.clone(),
            format!("SO-{}", quote.quote_number),
        )
        .from_quote(quote.id);
        store.insert_sales_order(order.clone())?;

        let mut conversion = QuoteConversion {
            sales_order_id: order.id,
            created_line_ids: Vec::new(),
            created_job_ids: Vec::new(),
            failures: Vec::new(),
        };

        for line in &selected {
            match Self::materialize_line(store, &order, line, &request.user_id) {
                Ok((order_line_id, job_id)) => {
                    conversion.created_line_ids.push(order_line_id);
                    if let Some(job_id) = job_id {
                        conversion.created_job_ids.push(job_id);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        quote_line = %line.id,
                        error = %e,
                        "報價單行轉單失敗，略過此行"
                    );
                    conversion.failures.push((line.id, e));
                }
            }
        }

        // 全數失敗時報價單維持原狀態，呼叫端修正後可重新轉單
        if conversion.created_line_ids.is_empty() {
            tracing::warn!(
                quote = %request.quote_id,
                order = %order.id,
                "選取的報價單行全數轉單失敗，報價單不標記為已轉單"
            );
        } else {
            quote.status = QuoteStatus::Converted;
            store.upsert_quote(quote)?;
        }

        tracing::info!(
            quote = %request.quote_id,
            order = %order.id,
            lines = conversion.created_line_ids.len(),
            jobs = conversion.created_job_ids.len(),
            failures = conversion.failures.len(),
            user = %request.user_id,
            "報價轉單完成"
        );
        Ok(conversion)
    }

    /// 具體化單一報價單行：建立訂單行，必要時連同工單與方法副本
    fn materialize_line<S: PlanningStore>(
        store: &mut S,
        order: &SalesOrder,
        line: &plan_core::QuoteLine,
        actor_id: &str,
    ) -> Result<(Uuid, Option<Uuid>)> {
        let item = store.item(&order.company_id, &line.item_id)?;

        let mut order_line = SalesOrderLine::new(
            order.id,
            order.company_id.clone(),
            line.item_id.clone(),
            line.location_id.clone(),
            line.quantity,
            line.promised_date,
        );
        order_line.source_quote_line_id = Some(line.id);
        store.insert_sales_order_line(order_line.clone())?;

        if item.replenishment != ReplenishmentPolicy::Make {
            return Ok((order_line.id, None));
        }

        let mut job = Job::new(
            order.company_id.clone(),
            line.item_id.clone(),
            line.location_id.clone(),
            line.quantity,
            line.promised_date,
        )
        .with_sales_order_line(order_line.id);

        let method = MakeMethod::new(
            MethodOwner::Job(job.id),
            1,
            order.company_id.clone(),
        )
        .with_required_quantity(line.quantity);
        store.insert_method(method.clone())?;

        // 方法來源優先序：報價配置 > 物料當前版本 > 空方法
        let source_id = line.make_method_id.or(item.current_method_id);
        if let Some(source_id) = source_id {
            MethodVersionService::copy_make_method(
                store,
                source_id,
                method.id,
                &order.company_id,
                actor_id,
            )?;
            QuantityRecalculator::recalculate_requirements(
                store,
                method.id,
                &order.company_id,
                actor_id,
            )?;
            OperationDependencyResolver::recalculate_operation_order(
                store,
                method.id,
                &order.company_id,
                actor_id,
            )?;
        }

        job.make_method_id = Some(method.id);
        store.upsert_job(job.clone())?;
        Ok((order_line.id, Some(job.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use chrono::NaiveDate;
    use plan_core::{Item, MethodMaterial, MethodOperation, Quote, QuoteLine};
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seed_item(store: &mut InMemoryStore, id: &str, policy: ReplenishmentPolicy) {
        store
            .upsert_item(Item::new(id.to_string(), "ACME".to_string(), policy))
            .unwrap();
    }

    /// BIKE 的當前方法：每台 2 支 TUBE，一道 WELD 工序
    fn seed_bike_method(store: &mut InMemoryStore) -> Uuid {
        seed_item(store, "BIKE", ReplenishmentPolicy::Make);
        seed_item(store, "TUBE", ReplenishmentPolicy::Buy);

        let method =
            MakeMethod::new(MethodOwner::Item("BIKE".to_string()), 1, "ACME".to_string());
        let weld = MethodOperation::new(method.id, "ACME".to_string(), "WELD".to_string(), 10);
        let tube = MethodMaterial::new(
            method.id,
            "TUBE".to_string(),
            "ACME".to_string(),
            Decimal::from(2),
        )
        .with_operation(weld.id);

        store.insert_method(method.clone()).unwrap();
        store.insert_operation(weld).unwrap();
        store.insert_material(tube).unwrap();
        store.set_current_method("ACME", "BIKE", method.id).unwrap();
        method.id
    }

    fn seed_quote_line(store: &mut InMemoryStore, item: &str, quantity: Decimal) -> (Quote, QuoteLine) {
        let quote = Quote::new("ACME".to_string(), "Q-100".to_string());
        store.upsert_quote(quote.clone()).unwrap();
        let line = QuoteLine::new(
            quote.id,
            "ACME".to_string(),
            item.to_string(),
            "MAIN".to_string(),
            quantity,
            date(2026, 10, 1),
        );
        store.upsert_quote_line(line.clone()).unwrap();
        (quote, line)
    }

    #[test]
    fn test_quote_line_method_copies_current_method() {
        let mut store = InMemoryStore::new();
        let item_method = seed_bike_method(&mut store);
        let (_, line) = seed_quote_line(&mut store, "BIKE", Decimal::from(5));

        let method =
            QuoteMaterializer::upsert_quote_line_method(&mut store, line.id, "ACME", "user-1")
                .unwrap();

        assert_ne!(method.id, item_method);
        assert!(matches!(method.owner, MethodOwner::QuoteLine(id) if id == line.id));
        assert_eq!(method.required_quantity, Decimal::from(5));

        // 結構拷貝且需求量已按報價數量展開：5 × 2 = 10
        let materials = store.materials_of("ACME", method.id).unwrap();
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].required_quantity, Decimal::from(10));

        // 報價單行已連結新方法
        assert_eq!(
            store.quote_line("ACME", line.id).unwrap().make_method_id,
            Some(method.id)
        );
    }

    #[test]
    fn test_quote_method_flows_back_as_new_version() {
        let mut store = InMemoryStore::new();
        let v1 = seed_bike_method(&mut store);
        let (_, line) = seed_quote_line(&mut store, "BIKE", Decimal::from(5));

        let quote_method =
            QuoteMaterializer::upsert_quote_line_method(&mut store, line.id, "ACME", "user-1")
                .unwrap();

        // 報價協商後把用量改成 3
        let mut material = store.materials_of("ACME", quote_method.id).unwrap().remove(0);
        material.quantity_per_parent = Decimal::from(3);
        store.insert_material(material).unwrap();

        let v2 = QuoteMaterializer::upsert_make_method_from_quote_line(
            &mut store, line.id, "ACME", "user-1",
        )
        .unwrap();

        assert_eq!(v2.version, 2);
        assert_eq!(
            store.item("ACME", "BIKE").unwrap().current_method_id,
            Some(v2.id)
        );
        assert_eq!(
            store.materials_of("ACME", v2.id).unwrap()[0].quantity_per_parent,
            Decimal::from(3)
        );
        // 原版本不受影響
        assert_eq!(
            store.materials_of("ACME", v1).unwrap()[0].quantity_per_parent,
            Decimal::from(2)
        );
    }

    #[test]
    fn test_convert_quote_selected_lines_only() {
        let mut store = InMemoryStore::new();
        seed_bike_method(&mut store);
        seed_item(&mut store, "HELMET", ReplenishmentPolicy::Buy);

        let (quote, bike_line) = seed_quote_line(&mut store, "BIKE", Decimal::from(4));
        let helmet_line = QuoteLine::new(
            quote.id,
            "ACME".to_string(),
            "HELMET".to_string(),
            "MAIN".to_string(),
            Decimal::from(4),
            date(2026, 10, 1),
        );
        store.upsert_quote_line(helmet_line.clone()).unwrap();

        QuoteMaterializer::upsert_quote_line_method(&mut store, bike_line.id, "ACME", "user-1")
            .unwrap();

        // 只轉 BIKE 行
        let conversion = QuoteMaterializer::convert_quote_to_order(
            &mut store,
            &ConvertQuoteRequest {
                quote_id: quote.id,
                company_id: "ACME".to_string(),
                user_id: "user-1".to_string(),
                selected_line_ids: vec![bike_line.id],
            },
        )
        .unwrap();

        assert_eq!(conversion.created_line_ids.len(), 1);
        assert_eq!(conversion.created_job_ids.len(), 1);
        assert!(conversion.failures.is_empty());

        // 工單方法是獨立副本，需求量按訂購數量展開：4 × 2 = 8
        let job = store.job("ACME", conversion.created_job_ids[0]).unwrap();
        let job_method_id = job.make_method_id.unwrap();
        let materials = store.materials_of("ACME", job_method_id).unwrap();
        assert_eq!(materials[0].required_quantity, Decimal::from(8));

        // 報價單已標記轉單，重複轉單被拒
        assert_eq!(
            store.quote("ACME", quote.id).unwrap().status,
            QuoteStatus::Converted
        );
        assert!(matches!(
            QuoteMaterializer::convert_quote_to_order(
                &mut store,
                &ConvertQuoteRequest {
                    quote_id: quote.id,
                    company_id: "ACME".to_string(),
                    user_id: "user-1".to_string(),
                    selected_line_ids: vec![helmet_line.id],
                },
            ),
            Err(PlanError::Validation(_))
        ));
    }

    #[test]
    fn test_convert_buy_line_creates_no_job() {
        let mut store = InMemoryStore::new();
        seed_item(&mut store, "HELMET", ReplenishmentPolicy::Buy);
        let (quote, line) = seed_quote_line(&mut store, "HELMET", Decimal::from(6));

        let conversion = QuoteMaterializer::convert_quote_to_order(
            &mut store,
            &ConvertQuoteRequest {
                quote_id: quote.id,
                company_id: "ACME".to_string(),
                user_id: "user-1".to_string(),
                selected_line_ids: vec![line.id],
            },
        )
        .unwrap();

        assert_eq!(conversion.created_line_ids.len(), 1);
        assert!(conversion.created_job_ids.is_empty());
        let order_lines = store
            .sales_order_lines_of("ACME", conversion.sales_order_id)
            .unwrap();
        assert_eq!(order_lines[0].source_quote_line_id, Some(line.id));
    }

    #[test]
    fn test_convert_with_all_lines_failed_keeps_quote_open() {
        let mut store = InMemoryStore::new();
        seed_item(&mut store, "HELMET", ReplenishmentPolicy::Buy);
        let (quote, line) = seed_quote_line(&mut store, "HELMET", Decimal::from(6));

        // 物料主檔在報價後被刪除：該行具體化必然失敗
        let orphan = QuoteLine::new(
            quote.id,
            "ACME".to_string(),
            "GHOST".to_string(),
            "MAIN".to_string(),
            Decimal::from(2),
            date(2026, 10, 1),
        );
        store.upsert_quote_line(orphan.clone()).unwrap();

        let conversion = QuoteMaterializer::convert_quote_to_order(
            &mut store,
            &ConvertQuoteRequest {
                quote_id: quote.id,
                company_id: "ACME".to_string(),
                user_id: "user-1".to_string(),
                selected_line_ids: vec![orphan.id],
            },
        )
        .unwrap();

        assert!(conversion.created_line_ids.is_empty());
        assert_eq!(conversion.failures.len(), 1);

        // 沒有任何行成功：報價單不得標記為已轉單，修正後可重轉
        assert_ne!(
            store.quote("ACME", quote.id).unwrap().status,
            QuoteStatus::Converted
        );
        let retry = QuoteMaterializer::convert_quote_to_order(
            &mut store,
            &ConvertQuoteRequest {
                quote_id: quote.id,
                company_id: "ACME".to_string(),
                user_id: "user-1".to_string(),
                selected_line_ids: vec![line.id],
            },
        )
        .unwrap();
        assert_eq!(retry.created_line_ids.len(), 1);
        assert_eq!(
            store.quote("ACME", quote.id).unwrap().status,
            QuoteStatus::Converted
        );
    }

    #[test]
    fn test_convert_rejects_foreign_line() {
        let mut store = InMemoryStore::new();
        seed_item(&mut store, "HELMET", ReplenishmentPolicy::Buy);
        let (quote, _) = seed_quote_line(&mut store, "HELMET", Decimal::from(6));

        assert!(matches!(
            QuoteMaterializer::convert_quote_to_order(
                &mut store,
                &ConvertQuoteRequest {
                    quote_id: quote.id,
                    company_id: "ACME".to_string(),
                    user_id: "user-1".to_string(),
                    selected_line_ids: vec![Uuid::new_v4()],
                },
            ),
            Err(PlanError::Validation(_))
        ));
    }
}
