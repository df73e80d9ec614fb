//! # Prepaid Ledger
//!
//! Sale and consumption of stored-value accounts. One purchase opens one
//! account; a customer may hold several, each drawn down independently.
//!
//! ## Balance Enforcement
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  The naive sequence                                          │
//! │    read remaining → check >= amount → append usage           │
//! │  is a check-then-act race: two concurrent draws can both     │
//! │  pass the check and jointly overdraw the account.            │
//! │                                                              │
//! │  Here the check lives INSIDE the append:                     │
//! │                                                              │
//! │    INSERT INTO prepaid_usages ...                            │
//! │    SELECT ...                                                │
//! │    WHERE (remaining balance recomputed in SQL) >= amount     │
//! │                                                              │
//! │  SQLite serializes writers, so the recomputation and the     │
//! │  append are one atomic step. rows_affected = 0 means the     │
//! │  draw lost and nothing was written.                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use clipper_core::validation::validate_amount_positive;
use clipper_core::{CoreError, Money, PrepaidAccountDetail, PrepaidSale, PrepaidUsage};

use crate::error::{DbError, DbResult};

/// Guarded append: writes the usage only if the account can cover it.
const INSERT_USAGE_GUARDED: &str = "
    INSERT INTO prepaid_usages (id, prepaid_sale_id, visit_id, visit_line_id, amount_used, used_at)
    SELECT ?1, ?2, ?3, ?4, ?5, ?6
    WHERE (
        SELECT s.value_amount - COALESCE(
            (SELECT SUM(u.amount_used) FROM prepaid_usages u WHERE u.prepaid_sale_id = s.id), 0)
        FROM prepaid_sales s WHERE s.id = ?2
    ) >= ?5
";

/// Repository for prepaid stored-value operations.
#[derive(Debug, Clone)]
pub struct PrepaidRepository {
    pool: SqlitePool,
}

impl PrepaidRepository {
    /// Creates a new PrepaidRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PrepaidRepository { pool }
    }

    /// Sells a prepaid plan to a customer, opening a new account.
    ///
    /// No validation against existing accounts: stacking is allowed by
    /// design (each purchase is its own account).
    pub async fn sell(
        &self,
        store_id: &str,
        customer_id: &str,
        plan_id: &str,
        staff_id: Option<&str>,
        sold_at: Option<DateTime<Utc>>,
    ) -> DbResult<PrepaidSale> {
        let customer = sqlx::query_scalar::<_, String>(
            "SELECT id FROM customers WHERE id = ?1 AND store_id = ?2",
        )
        .bind(customer_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;
        if customer.is_none() {
            return Err(DbError::not_found("Customer", customer_id));
        }

        let plan = sqlx::query_as::<_, clipper_core::PrepaidPlan>(
            "SELECT id, store_id, name, price_paid, value_amount, is_active, created_at
             FROM prepaid_plans WHERE id = ?1 AND store_id = ?2",
        )
        .bind(plan_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("PrepaidPlan", plan_id))?;

        let now = Utc::now();
        let sale = PrepaidSale {
            id: Uuid::new_v4().to_string(),
            store_id: store_id.to_string(),
            customer_id: customer_id.to_string(),
            plan_id: plan.id.clone(),
            amount_paid: plan.price_paid,
            value_amount: plan.value_amount,
            staff_id: staff_id.map(str::to_string),
            sold_at: sold_at.unwrap_or(now),
            created_at: now,
        };

        info!(
            id = %sale.id,
            customer_id = %customer_id,
            value = %sale.value_amount,
            "Selling prepaid account"
        );

        sqlx::query(
            "INSERT INTO prepaid_sales
                 (id, store_id, customer_id, plan_id, amount_paid, value_amount, staff_id, sold_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&sale.id)
        .bind(&sale.store_id)
        .bind(&sale.customer_id)
        .bind(&sale.plan_id)
        .bind(sale.amount_paid)
        .bind(sale.value_amount)
        .bind(&sale.staff_id)
        .bind(sale.sold_at)
        .bind(sale.created_at)
        .execute(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Draws stored value, against a named account or the earliest-sold
    /// account that can cover the amount (first fit, not best fit).
    ///
    /// ## Failures
    /// - [`CoreError::InsufficientBalance`]: the NAMED account cannot cover
    ///   the draw (nothing is written)
    /// - [`CoreError::NoAccountAvailable`]: auto-selection found no account
    ///   that can cover the draw on its own
    pub async fn use_amount(
        &self,
        store_id: &str,
        customer_id: &str,
        amount: Money,
        visit_id: Option<&str>,
        visit_line_id: Option<&str>,
        account_id: Option<&str>,
    ) -> DbResult<PrepaidUsage> {
        validate_amount_positive("amount", amount.minor()).map_err(CoreError::from)?;

        match account_id {
            Some(account_id) => {
                self.use_named_account(store_id, customer_id, account_id, amount, visit_id, visit_line_id)
                    .await
            }
            None => {
                self.use_auto_selected(store_id, customer_id, amount, visit_id, visit_line_id)
                    .await
            }
        }
    }

    /// Total remaining stored value across all of a customer's accounts.
    pub async fn balance_for(&self, store_id: &str, customer_id: &str) -> DbResult<Money> {
        let exists = sqlx::query_scalar::<_, String>(
            "SELECT id FROM customers WHERE id = ?1 AND store_id = ?2",
        )
        .bind(customer_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Customer", customer_id));
        }

        let balance: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(
                 s.value_amount - COALESCE(
                     (SELECT SUM(u.amount_used) FROM prepaid_usages u WHERE u.prepaid_sale_id = s.id), 0)
             ), 0)
             FROM prepaid_sales s
             WHERE s.store_id = ?1 AND s.customer_id = ?2",
        )
        .bind(store_id)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_minor(balance))
    }

    /// Per-account breakdown with usage history, for display.
    pub async fn details_for(
        &self,
        store_id: &str,
        customer_id: &str,
    ) -> DbResult<Vec<PrepaidAccountDetail>> {
        let accounts = sqlx::query_as::<_, PrepaidSale>(
            "SELECT id, store_id, customer_id, plan_id, amount_paid, value_amount, staff_id, sold_at, created_at
             FROM prepaid_sales
             WHERE store_id = ?1 AND customer_id = ?2
             ORDER BY sold_at",
        )
        .bind(store_id)
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        let mut details = Vec::with_capacity(accounts.len());
        for sale in accounts {
            let usages = sqlx::query_as::<_, PrepaidUsage>(
                "SELECT id, prepaid_sale_id, visit_id, visit_line_id, amount_used, used_at
                 FROM prepaid_usages
                 WHERE prepaid_sale_id = ?1
                 ORDER BY used_at",
            )
            .bind(&sale.id)
            .fetch_all(&self.pool)
            .await?;

            let used: Money = usages.iter().map(|u| u.amount_used).sum();
            let remaining_balance = sale.value_amount - used;

            details.push(PrepaidAccountDetail {
                sale,
                remaining_balance,
                usages,
            });
        }

        Ok(details)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn use_named_account(
        &self,
        store_id: &str,
        customer_id: &str,
        account_id: &str,
        amount: Money,
        visit_id: Option<&str>,
        visit_line_id: Option<&str>,
    ) -> DbResult<PrepaidUsage> {
        // Scope the account to the store AND customer; a foreign account id
        // looks exactly like a missing one.
        let exists = sqlx::query_scalar::<_, String>(
            "SELECT id FROM prepaid_sales WHERE id = ?1 AND store_id = ?2 AND customer_id = ?3",
        )
        .bind(account_id)
        .bind(store_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        if exists.is_none() {
            return Err(DbError::not_found("PrepaidSale", account_id));
        }

        let usage = self
            .try_insert_usage(account_id, amount, visit_id, visit_line_id)
            .await?;

        match usage {
            Some(usage) => Ok(usage),
            None => {
                let remaining = self.remaining_for(account_id).await?;
                Err(CoreError::InsufficientBalance {
                    account_id: account_id.to_string(),
                    remaining: remaining.minor(),
                    requested: amount.minor(),
                }
                .into())
            }
        }
    }

    async fn use_auto_selected(
        &self,
        store_id: &str,
        customer_id: &str,
        amount: Money,
        visit_id: Option<&str>,
        visit_line_id: Option<&str>,
    ) -> DbResult<PrepaidUsage> {
        // First fit in sold_at order. The guarded insert re-checks each
        // candidate, so a balance consumed between selection and append just
        // moves us to the next candidate instead of overdrawing.
        let candidates: Vec<String> = sqlx::query_scalar(
            "SELECT s.id
             FROM prepaid_sales s
             WHERE s.store_id = ?1 AND s.customer_id = ?2
               AND s.value_amount - COALESCE(
                     (SELECT SUM(u.amount_used) FROM prepaid_usages u WHERE u.prepaid_sale_id = s.id), 0)
                   >= ?3
             ORDER BY s.sold_at",
        )
        .bind(store_id)
        .bind(customer_id)
        .bind(amount)
        .fetch_all(&self.pool)
        .await?;

        for account_id in &candidates {
            if let Some(usage) = self
                .try_insert_usage(account_id, amount, visit_id, visit_line_id)
                .await?
            {
                return Ok(usage);
            }
        }

        Err(CoreError::NoAccountAvailable {
            requested: amount.minor(),
        }
        .into())
    }

    /// The guarded append. Returns `None` when the account could not cover
    /// the amount; no row is written in that case.
    async fn try_insert_usage(
        &self,
        account_id: &str,
        amount: Money,
        visit_id: Option<&str>,
        visit_line_id: Option<&str>,
    ) -> DbResult<Option<PrepaidUsage>> {
        let usage = PrepaidUsage {
            id: Uuid::new_v4().to_string(),
            prepaid_sale_id: account_id.to_string(),
            visit_id: visit_id.map(str::to_string),
            visit_line_id: visit_line_id.map(str::to_string),
            amount_used: amount,
            used_at: Utc::now(),
        };

        let result = sqlx::query(INSERT_USAGE_GUARDED)
            .bind(&usage.id)
            .bind(&usage.prepaid_sale_id)
            .bind(&usage.visit_id)
            .bind(&usage.visit_line_id)
            .bind(usage.amount_used)
            .bind(usage.used_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        debug!(
            account_id = %account_id,
            amount = %amount,
            "Prepaid usage recorded"
        );

        Ok(Some(usage))
    }

    /// Computed remaining balance for one account.
    async fn remaining_for(&self, account_id: &str) -> DbResult<Money> {
        let remaining: i64 = sqlx::query_scalar(
            "SELECT s.value_amount - COALESCE(
                 (SELECT SUM(u.amount_used) FROM prepaid_usages u WHERE u.prepaid_sale_id = s.id), 0)
             FROM prepaid_sales s WHERE s.id = ?1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_minor(remaining))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
