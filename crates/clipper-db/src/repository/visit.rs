//! # Visit Repository
//!
//! The visit-creation orchestrator and visit state transitions.
//!
//! ## Visit Lifecycle
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Visit Lifecycle                         │
//! │                                                              │
//! │  1. CREATE (one transaction, all-or-nothing)                 │
//! │     └── validate whole request → joined messages on failure  │
//! │     └── insert visit shell                                   │
//! │     └── price + insert each line, in request order           │
//! │     └── insert payments                                      │
//! │     └── rewrite totals from the built children               │
//! │     └── commit                                               │
//! │                                                              │
//! │  2. FINALIZE (one-way draft → finalized)                     │
//! │                                                              │
//! │  3. VOID (orthogonal flag, settable from either status)      │
//! │                                                              │
//! │  Prepaid draws, point accrual, and inventory movements are   │
//! │  NOT wired here; callers sequence those ledger calls around  │
//! │  visit creation explicitly.                                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use clipper_core::validation::validate_create_visit;
use clipper_core::{
    price_line, visit_totals, CoreError, CreateVisitRequest, ItemType, LineItemRef, LineToPrice,
    Money, MissingRefPolicy, Payment, PricingConfig, PricingTarget, Visit, VisitDetail, VisitLine,
    VisitStatus,
};

use crate::error::{DbError, DbResult};

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw visit_lines row. The two nullable id columns are collapsed into the
/// [`LineItemRef`] sum type on the way out; the table CHECK constraint and
/// this conversion together keep the XOR invariant airtight.
#[derive(Debug, sqlx::FromRow)]
struct VisitLineRow {
    id: String,
    visit_id: String,
    position: i64,
    item_type: ItemType,
    service_id: Option<String>,
    product_id: Option<String>,
    staff_id: Option<String>,
    qty: i64,
    list_unit_price: Money,
    discount_rate: i64,
    discount_amount: Money,
    net_unit_price: Money,
    prepaid_used: Money,
    net_total: Money,
    applied_rule_id: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

impl TryFrom<VisitLineRow> for VisitLine {
    type Error = DbError;

    fn try_from(row: VisitLineRow) -> Result<Self, Self::Error> {
        let item = match (row.item_type, row.service_id, row.product_id) {
            (ItemType::Service, Some(service_id), None) => LineItemRef::Service { service_id },
            (ItemType::Product, None, Some(product_id)) => LineItemRef::Product { product_id },
            _ => {
                return Err(DbError::Internal(format!(
                    "visit line {} has inconsistent item reference",
                    row.id
                )))
            }
        };

        Ok(VisitLine {
            id: row.id,
            visit_id: row.visit_id,
            position: row.position,
            item,
            staff_id: row.staff_id,
            qty: row.qty,
            list_unit_price: row.list_unit_price,
            discount_rate: row.discount_rate,
            discount_amount: row.discount_amount,
            net_unit_price: row.net_unit_price,
            prepaid_used: row.prepaid_used,
            net_total: row.net_total,
            applied_rule_id: row.applied_rule_id,
            created_at: row.created_at,
        })
    }
}

const SELECT_VISIT: &str = "
    SELECT id, store_id, customer_id, visited_at, status, voided_at,
           subtotal, total, created_at, updated_at
    FROM visits WHERE id = ?1 AND store_id = ?2
";

const SELECT_LINES: &str = "
    SELECT id, visit_id, position, item_type, service_id, product_id, staff_id,
           qty, list_unit_price, discount_rate, discount_amount, net_unit_price,
           prepaid_used, net_total, applied_rule_id, created_at
    FROM visit_lines WHERE visit_id = ?1 ORDER BY position
";

const SELECT_PAYMENTS: &str = "
    SELECT id, visit_id, method, amount, created_at
    FROM payments WHERE visit_id = ?1 ORDER BY created_at
";

// =============================================================================
// Repository
// =============================================================================

/// Repository for visit operations, including the one multi-entity write
/// transaction in the system.
#[derive(Debug, Clone)]
pub struct VisitRepository {
    pool: SqlitePool,
    pricing: PricingConfig,
}

impl VisitRepository {
    /// Creates a new VisitRepository.
    pub fn new(pool: SqlitePool, pricing: PricingConfig) -> Self {
        VisitRepository { pool, pricing }
    }

    /// Creates a visit with its line items and payments atomically.
    ///
    /// ## What This Does
    /// 1. Validates the whole request; every field problem is joined into
    ///    one [`DbError::Validation`] before anything is written
    /// 2. Opens a transaction
    /// 3. Resolves each line's catalog reference store-scoped and runs the
    ///    pricing engine, in request order
    /// 4. Inserts visit, lines, payments; rewrites the visit totals from
    ///    the built children
    /// 5. Commits; any failure along the way rolls everything back
    ///
    /// Status defaults to `finalized` when the request leaves it unset.
    ///
    /// This method never touches the prepaid, point, or inventory ledgers.
    /// A line's `prepaid_used` asserts the caller already recorded that
    /// draw; accrual is invoked by the caller after finalization.
    pub async fn create_visit(
        &self,
        store_id: &str,
        req: &CreateVisitRequest,
    ) -> DbResult<VisitDetail> {
        if let Err(errors) = validate_create_visit(req) {
            return Err(DbError::validation(&errors));
        }

        let mut tx = self.pool.begin().await?;

        let customer_exists = sqlx::query_scalar::<_, String>(
            "SELECT id FROM customers WHERE id = ?1 AND store_id = ?2",
        )
        .bind(&req.customer_id)
        .bind(store_id)
        .fetch_optional(&mut *tx)
        .await?;
        if customer_exists.is_none() {
            return Err(DbError::not_found("Customer", &req.customer_id));
        }

        let rules = sqlx::query_as::<_, clipper_core::DiscountRule>(
            "SELECT id, store_id, name, rule_type, value, applies_to, target_id,
                    starts_at, ends_at, position, created_at
             FROM discount_rules WHERE store_id = ?1
             ORDER BY position",
        )
        .bind(store_id)
        .fetch_all(&mut *tx)
        .await?;

        let now = Utc::now();
        let mut visit = Visit {
            id: Uuid::new_v4().to_string(),
            store_id: store_id.to_string(),
            customer_id: req.customer_id.clone(),
            visited_at: req.visited_at.unwrap_or(now),
            status: req.status.unwrap_or(VisitStatus::Finalized),
            voided_at: None,
            subtotal: Money::zero(),
            total: Money::zero(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %visit.id, store_id = %store_id, "Creating visit shell");

        sqlx::query(
            "INSERT INTO visits
                 (id, store_id, customer_id, visited_at, status, voided_at,
                  subtotal, total, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&visit.id)
        .bind(&visit.store_id)
        .bind(&visit.customer_id)
        .bind(visit.visited_at)
        .bind(visit.status)
        .bind(visit.voided_at)
        .bind(visit.subtotal)
        .bind(visit.total)
        .bind(visit.created_at)
        .bind(visit.updated_at)
        .execute(&mut *tx)
        .await?;

        let mut lines = Vec::with_capacity(req.line_items.len());
        for (index, line_req) in req.line_items.iter().enumerate() {
            let Some(item) = line_req.item_ref() else {
                // Validation already rejected this shape; a second guard
                // here keeps the invariant local.
                return Err(DbError::Validation(format!(
                    "line_items[{index}] is missing its catalog reference"
                )));
            };

            let (target, list_price) =
                self.resolve_target(&mut tx, store_id, index, &item).await?;

            let priced = price_line(
                &LineToPrice {
                    target: &target,
                    list_price,
                    qty: line_req.qty,
                    discount_rate: line_req.discount_rate,
                    discount_amount: line_req.discount_amount,
                    rule_id: line_req.rule_id.as_deref(),
                    prepaid_used: line_req.prepaid_used.unwrap_or_default(),
                },
                &rules,
                now,
            );

            let line = VisitLine {
                id: Uuid::new_v4().to_string(),
                visit_id: visit.id.clone(),
                position: index as i64,
                item,
                staff_id: line_req.staff_id.clone(),
                qty: line_req.qty,
                list_unit_price: priced.list_unit_price,
                discount_rate: priced.discount_rate,
                discount_amount: priced.discount_amount,
                net_unit_price: priced.net_unit_price,
                prepaid_used: priced.prepaid_used,
                net_total: priced.net_total,
                applied_rule_id: priced.applied_rule_id,
                created_at: now,
            };

            let (service_id, product_id) = match &line.item {
                LineItemRef::Service { service_id } => (Some(service_id.as_str()), None),
                LineItemRef::Product { product_id } => (None, Some(product_id.as_str())),
            };

            sqlx::query(
                "INSERT INTO visit_lines
                     (id, visit_id, position, item_type, service_id, product_id, staff_id,
                      qty, list_unit_price, discount_rate, discount_amount, net_unit_price,
                      prepaid_used, net_total, applied_rule_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            )
            .bind(&line.id)
            .bind(&line.visit_id)
            .bind(line.position)
            .bind(line.item.item_type())
            .bind(service_id)
            .bind(product_id)
            .bind(&line.staff_id)
            .bind(line.qty)
            .bind(line.list_unit_price)
            .bind(line.discount_rate)
            .bind(line.discount_amount)
            .bind(line.net_unit_price)
            .bind(line.prepaid_used)
            .bind(line.net_total)
            .bind(&line.applied_rule_id)
            .bind(line.created_at)
            .execute(&mut *tx)
            .await?;

            lines.push(line);
        }

        let mut payments = Vec::with_capacity(req.payments.len());
        for payment_req in &req.payments {
            let payment = Payment {
                id: Uuid::new_v4().to_string(),
                visit_id: visit.id.clone(),
                method: payment_req.method,
                amount: payment_req.amount,
                created_at: now,
            };

            sqlx::query(
                "INSERT INTO payments (id, visit_id, method, amount, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&payment.id)
            .bind(&payment.visit_id)
            .bind(payment.method)
            .bind(payment.amount)
            .bind(payment.created_at)
            .execute(&mut *tx)
            .await?;

            payments.push(payment);
        }

        // Totals are rewritten from the children just built, inside the
        // same transaction. The shell's zeros never escape.
        let totals = visit_totals(&lines);
        visit.subtotal = totals.subtotal;
        visit.total = totals.total;

        sqlx::query("UPDATE visits SET subtotal = ?2, total = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(&visit.id)
            .bind(visit.subtotal)
            .bind(visit.total)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            id = %visit.id,
            total = %visit.total,
            lines = lines.len(),
            payments = payments.len(),
            "Visit created"
        );

        Ok(VisitDetail {
            visit,
            lines,
            payments,
        })
    }

    /// Gets a visit with its lines and payments, scoped to a store.
    pub async fn get_visit(&self, store_id: &str, visit_id: &str) -> DbResult<Option<VisitDetail>> {
        let Some(visit) = sqlx::query_as::<_, Visit>(SELECT_VISIT)
            .bind(visit_id)
            .bind(store_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let line_rows = sqlx::query_as::<_, VisitLineRow>(SELECT_LINES)
            .bind(visit_id)
            .fetch_all(&self.pool)
            .await?;
        let lines = line_rows
            .into_iter()
            .map(VisitLine::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let payments = sqlx::query_as::<_, Payment>(SELECT_PAYMENTS)
            .bind(visit_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(Some(VisitDetail {
            visit,
            lines,
            payments,
        }))
    }

    /// Finalizes a draft visit. One-way; finalizing twice is an error.
    pub async fn finalize_visit(&self, store_id: &str, visit_id: &str) -> DbResult<Visit> {
        let visit = sqlx::query_as::<_, Visit>(SELECT_VISIT)
            .bind(visit_id)
            .bind(store_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Visit", visit_id))?;

        if visit.status == VisitStatus::Finalized {
            return Err(CoreError::InvalidVisitStatus {
                visit_id: visit_id.to_string(),
                current_status: "finalized".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE visits SET status = 'finalized', updated_at = ?3
             WHERE id = ?1 AND store_id = ?2 AND status = 'draft'",
        )
        .bind(visit_id)
        .bind(store_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        // A concurrent finalize between the read and the update loses here.
        if result.rows_affected() == 0 {
            return Err(CoreError::InvalidVisitStatus {
                visit_id: visit_id.to_string(),
                current_status: "finalized".to_string(),
            }
            .into());
        }

        info!(id = %visit_id, "Visit finalized");

        Ok(Visit {
            status: VisitStatus::Finalized,
            updated_at: now,
            ..visit
        })
    }

    /// Voids a visit (from either status).
    ///
    /// Calling void again refreshes `voided_at` rather than failing; the
    /// flag is a timestamp, not a transition.
    pub async fn void_visit(&self, store_id: &str, visit_id: &str) -> DbResult<Visit> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE visits SET voided_at = ?3, updated_at = ?3
             WHERE id = ?1 AND store_id = ?2",
        )
        .bind(visit_id)
        .bind(store_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Visit", visit_id));
        }

        info!(id = %visit_id, "Visit voided");

        let visit = sqlx::query_as::<_, Visit>(SELECT_VISIT)
            .bind(visit_id)
            .bind(store_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(visit)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Resolves a line's catalog reference to a pricing target and list
    /// price, store-scoped.
    ///
    /// A reference that doesn't resolve follows the configured policy:
    /// price at zero (default, resilient to stale ids) or reject the whole
    /// visit.
    async fn resolve_target(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        store_id: &str,
        index: usize,
        item: &LineItemRef,
    ) -> DbResult<(PricingTarget, Money)> {
        match item {
            LineItemRef::Service { service_id } => {
                let row = sqlx::query_as::<_, (Option<String>, Money)>(
                    "SELECT category_id, list_price FROM services
                     WHERE id = ?1 AND store_id = ?2",
                )
                .bind(service_id)
                .bind(store_id)
                .fetch_optional(&mut **tx)
                .await?;

                match row {
                    Some((category_id, list_price)) => Ok((
                        PricingTarget::Service {
                            service_id: service_id.clone(),
                            category_id,
                        },
                        list_price,
                    )),
                    None => self.missing_ref(index, service_id).map(|()| {
                        (
                            PricingTarget::Service {
                                service_id: service_id.clone(),
                                category_id: None,
                            },
                            Money::zero(),
                        )
                    }),
                }
            }
            LineItemRef::Product { product_id } => {
                let row = sqlx::query_as::<_, (Money,)>(
                    "SELECT retail_unit_price FROM products
                     WHERE id = ?1 AND store_id = ?2",
                )
                .bind(product_id)
                .bind(store_id)
                .fetch_optional(&mut **tx)
                .await?;

                match row {
                    Some((list_price,)) => Ok((
                        PricingTarget::Product {
                            product_id: product_id.clone(),
                        },
                        list_price,
                    )),
                    None => self.missing_ref(index, product_id).map(|()| {
                        (
                            PricingTarget::Product {
                                product_id: product_id.clone(),
                            },
                            Money::zero(),
                        )
                    }),
                }
            }
        }
    }

    fn missing_ref(&self, index: usize, item_id: &str) -> DbResult<()> {
        match self.pricing.missing_ref_policy {
            MissingRefPolicy::PriceAsZero => {
                debug!(line = index, item_id = %item_id, "Catalog reference missing, pricing at zero");
                Ok(())
            }
            MissingRefPolicy::Reject => Err(CoreError::MissingCatalogRef {
                line: index,
                item_id: item_id.to_string(),
            }
            .into()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::catalog::NewDiscountRule;
    use clipper_core::{
        DiscountAppliesTo, DiscountRuleType, LineItemRequest, PaymentMethod, PaymentRequest,
        ProductKind,
    };

    struct Fixture {
        db: Database,
        store_id: String,
        customer_id: String,
        service_id: String,
        product_id: String,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let store = catalog.create_store("Store").await.unwrap();
        let customer = catalog
            .create_customer(&store.id, "Dana", None, None)
            .await
            .unwrap();
        let service = catalog
            .create_service(&store.id, "Cut", None, Money::from_minor(30_000))
            .await
            .unwrap();
        let product = catalog
            .create_product(
                &store.id,
                "Shampoo",
                ProductKind::Retail,
                Money::from_minor(15_000),
            )
            .await
            .unwrap();

        Fixture {
            db,
            store_id: store.id,
            customer_id: customer.id,
            service_id: service.id,
            product_id: product.id,
        }
    }

    fn service_line(f: &Fixture) -> LineItemRequest {
        LineItemRequest {
            item_type: ItemType::Service,
            service_id: Some(f.service_id.clone()),
            product_id: None,
            staff_id: None,
            qty: 1,
            discount_rate: None,
            discount_amount: None,
            rule_id: None,
            prepaid_used: None,
        }
    }

    fn product_line(f: &Fixture) -> LineItemRequest {
        LineItemRequest {
            item_type: ItemType::Product,
            service_id: None,
            product_id: Some(f.product_id.clone()),
            staff_id: None,
            qty: 1,
            discount_rate: None,
            discount_amount: None,
            rule_id: None,
            prepaid_used: None,
        }
    }

    fn request(lines: Vec<LineItemRequest>, payments: Vec<PaymentRequest>, f: &Fixture) -> CreateVisitRequest {
        CreateVisitRequest {
            customer_id: f.customer_id.clone(),
            visited_at: None,
            status: None,
            line_items: lines,
            payments,
        }
    }

    async fn count_visits(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM visits")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_visit_with_service_product_and_payment() {
        let f = fixture().await;

        let detail = f
            .db
            .visits()
            .create_visit(
                &f.store_id,
                &request(
                    vec![service_line(&f), product_line(&f)],
                    vec![PaymentRequest {
                        method: PaymentMethod::Card,
                        amount: Money::from_minor(45_000),
                    }],
                    &f,
                ),
            )
            .await
            .unwrap();

        assert_eq!(detail.visit.subtotal.minor(), 45_000);
        assert_eq!(detail.visit.total.minor(), 45_000);
        assert_eq!(detail.paid_amount().minor(), 45_000);
        assert_eq!(detail.remaining_amount().minor(), 0);
        assert!(detail.fully_paid());

        // Round-trips through the read path identically.
        let fetched = f
            .db
            .visits()
            .get_visit(&f.store_id, &detail.visit.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.visit.subtotal.minor(), 45_000);
        assert_eq!(fetched.lines.len(), 2);
        assert_eq!(fetched.payments.len(), 1);
        assert_eq!(fetched.lines[0].position, 0);
        assert_eq!(fetched.lines[1].position, 1);
    }

    #[tokio::test]
    async fn test_status_defaults_to_finalized() {
        let f = fixture().await;
        let detail = f
            .db
            .visits()
            .create_visit(&f.store_id, &request(vec![service_line(&f)], vec![], &f))
            .await
            .unwrap();
        assert_eq!(detail.visit.status, VisitStatus::Finalized);
    }

    #[tokio::test]
    async fn test_auto_rule_applies_and_is_recorded() {
        let f = fixture().await;
        let rule = f
            .db
            .catalog()
            .create_discount_rule(
                &f.store_id,
                NewDiscountRule {
                    name: "3000 off services".to_string(),
                    rule_type: DiscountRuleType::Amount,
                    value: 3_000,
                    applies_to: DiscountAppliesTo::AllServices,
                    target_id: None,
                    starts_at: None,
                    ends_at: None,
                },
            )
            .await
            .unwrap();

        let mut line = service_line(&f);
        line.qty = 1;
        let detail = f
            .db
            .visits()
            .create_visit(&f.store_id, &request(vec![line], vec![], &f))
            .await
            .unwrap();

        let priced = &detail.lines[0];
        assert_eq!(priced.discount_amount.minor(), 3_000);
        assert_eq!(priced.net_unit_price.minor(), 27_000);
        assert_eq!(priced.applied_rule_id.as_deref(), Some(rule.id.as_str()));
        assert_eq!(detail.visit.total.minor(), 27_000);
    }

    #[tokio::test]
    async fn test_explicit_rate_beats_rule_on_the_same_line() {
        let f = fixture().await;
        let rule = f
            .db
            .catalog()
            .create_discount_rule(
                &f.store_id,
                NewDiscountRule {
                    name: "half off".to_string(),
                    rule_type: DiscountRuleType::Percent,
                    value: 50,
                    applies_to: DiscountAppliesTo::AllServices,
                    target_id: None,
                    starts_at: None,
                    ends_at: None,
                },
            )
            .await
            .unwrap();

        let mut line = service_line(&f);
        line.discount_rate = Some(10);
        line.rule_id = Some(rule.id);

        let detail = f
            .db
            .visits()
            .create_visit(&f.store_id, &request(vec![line], vec![], &f))
            .await
            .unwrap();

        // round(30,000 * 10%) = 3,000, not the rule's 15,000
        assert_eq!(detail.lines[0].discount_amount.minor(), 3_000);
        assert_eq!(detail.lines[0].discount_rate, 10);
        assert_eq!(detail.lines[0].applied_rule_id, None);
    }

    #[tokio::test]
    async fn test_prepaid_used_floors_line_at_zero() {
        let f = fixture().await;

        let mut line = service_line(&f);
        line.prepaid_used = Some(Money::from_minor(50_000));

        let detail = f
            .db
            .visits()
            .create_visit(&f.store_id, &request(vec![line], vec![], &f))
            .await
            .unwrap();

        assert_eq!(detail.lines[0].net_total.minor(), 0);
        assert_eq!(detail.visit.total.minor(), 0);
        assert_eq!(detail.visit.subtotal.minor(), 30_000);
    }

    #[tokio::test]
    async fn test_validation_failure_persists_nothing() {
        let f = fixture().await;

        let mut bad_line = service_line(&f);
        bad_line.qty = 0;

        let err = f
            .db
            .visits()
            .create_visit(
                &f.store_id,
                &request(
                    vec![bad_line],
                    vec![PaymentRequest {
                        method: PaymentMethod::Cash,
                        amount: Money::zero(),
                    }],
                    &f,
                ),
            )
            .await
            .unwrap_err();

        match err {
            DbError::Validation(message) => {
                assert!(message.contains("qty must be positive"));
                assert!(message.contains("amount must be positive"));
            }
            other => panic!("expected Validation, got {other:?}"),
        }

        assert_eq!(count_visits(&f.db).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_customer_is_not_found() {
        let f = fixture().await;
        let mut req = request(vec![service_line(&f)], vec![], &f);
        req.customer_id = "no-such-customer".to_string();

        let err = f.db.visits().create_visit(&f.store_id, &req).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(count_visits(&f.db).await, 0);
    }

    #[tokio::test]
    async fn test_missing_catalog_ref_prices_at_zero_by_default() {
        let f = fixture().await;

        let mut line = service_line(&f);
        line.service_id = Some("stale-service-id".to_string());

        let detail = f
            .db
            .visits()
            .create_visit(
                &f.store_id,
                &request(vec![line, product_line(&f)], vec![], &f),
            )
            .await
            .unwrap();

        assert_eq!(detail.lines[0].list_unit_price.minor(), 0);
        assert_eq!(detail.lines[0].net_total.minor(), 0);
        assert_eq!(detail.visit.total.minor(), 15_000);
    }

    #[tokio::test]
    async fn test_missing_catalog_ref_rejects_and_rolls_back_under_strict_policy() {
        let f = fixture().await;
        let strict = f.db.clone().with_pricing_config(PricingConfig {
            missing_ref_policy: MissingRefPolicy::Reject,
        });

        let mut line = service_line(&f);
        line.service_id = Some("stale-service-id".to_string());

        let err = strict
            .visits()
            .create_visit(
                &f.store_id,
                &request(vec![product_line(&f), line], vec![], &f),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Core(CoreError::MissingCatalogRef { line: 1, .. })
        ));
        // The already-inserted shell and first line rolled back with it.
        assert_eq!(count_visits(&f.db).await, 0);
    }

    #[tokio::test]
    async fn test_finalize_draft_then_refuse_second_finalize() {
        let f = fixture().await;
        let mut req = request(vec![service_line(&f)], vec![], &f);
        req.status = Some(VisitStatus::Draft);

        let detail = f.db.visits().create_visit(&f.store_id, &req).await.unwrap();
        assert_eq!(detail.visit.status, VisitStatus::Draft);

        let finalized = f
            .db
            .visits()
            .finalize_visit(&f.store_id, &detail.visit.id)
            .await
            .unwrap();
        assert_eq!(finalized.status, VisitStatus::Finalized);

        let err = f
            .db
            .visits()
            .finalize_visit(&f.store_id, &detail.visit.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InvalidVisitStatus { .. })
        ));
    }

    #[tokio::test]
    async fn test_void_from_either_status_and_revoid_refreshes() {
        let f = fixture().await;
        let detail = f
            .db
            .visits()
            .create_visit(&f.store_id, &request(vec![service_line(&f)], vec![], &f))
            .await
            .unwrap();

        let voided = f
            .db
            .visits()
            .void_visit(&f.store_id, &detail.visit.id)
            .await
            .unwrap();
        let first_voided_at = voided.voided_at.unwrap();
        // Status survives the void; the flag is orthogonal.
        assert_eq!(voided.status, VisitStatus::Finalized);

        let revoided = f
            .db
            .visits()
            .void_visit(&f.store_id, &detail.visit.id)
            .await
            .unwrap();
        assert!(revoided.voided_at.unwrap() >= first_voided_at);
    }

    #[tokio::test]
    async fn test_cross_store_visit_is_invisible() {
        let f = fixture().await;
        let other = f.db.catalog().create_store("Other").await.unwrap();

        let detail = f
            .db
            .visits()
            .create_visit(&f.store_id, &request(vec![service_line(&f)], vec![], &f))
            .await
            .unwrap();

        let foreign = f.db.visits().get_visit(&other.id, &detail.visit.id).await.unwrap();
        assert!(foreign.is_none());

        let err = f
            .db
            .visits()
            .void_visit(&other.id, &detail.visit.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
