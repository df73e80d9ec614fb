//! # Loyalty Point Ledger
//!
//! Accrual, redemption, and manual adjustment of customer points. The
//! balance is the sum of `points_delta` over the append-only ledger; it is
//! recomputed on read and never stored.
//!
//! Every append goes through one guarded INSERT whose WHERE clause
//! recomputes the running balance: a negative delta that would push the
//! balance below zero writes nothing. The guard is uniform; `redeem` and a
//! negative `adjust` are enforced identically.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use clipper_core::validation::{validate_amount_positive, validate_memo};
use clipper_core::{CoreError, PointTransaction, PointTxnType, Visit, VisitStatus};

use crate::error::{DbError, DbResult};

/// Uniform guarded append: refuses any row that would take the customer's
/// running balance negative. Positive deltas pass trivially.
const INSERT_TXN_GUARDED: &str = "
    INSERT INTO point_transactions
        (id, store_id, customer_id, visit_id, txn_type, points_delta, memo, created_at)
    SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
    WHERE COALESCE((
        SELECT SUM(points_delta) FROM point_transactions
        WHERE store_id = ?2 AND customer_id = ?3
    ), 0) + ?6 >= 0
";

/// Repository for loyalty point operations.
#[derive(Debug, Clone)]
pub struct PointRepository {
    pool: SqlitePool,
}

impl PointRepository {
    /// Creates a new PointRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PointRepository { pool }
    }

    /// Accrues points for a finalized visit under the store's active point
    /// rule.
    ///
    /// ## Returns
    /// The written transaction, or `None` when nothing should be written:
    /// - the visit is still a draft
    /// - the store has no currently-active point rule
    /// - the computed points are zero or negative
    /// - this visit already has an accrual row (retry after a crash between
    ///   finalization and accrual is safe)
    pub async fn earn_from_visit(
        &self,
        store_id: &str,
        visit_id: &str,
    ) -> DbResult<Option<PointTransaction>> {
        let visit = sqlx::query_as::<_, Visit>(
            "SELECT id, store_id, customer_id, visited_at, status, voided_at,
                    subtotal, total, created_at, updated_at
             FROM visits WHERE id = ?1 AND store_id = ?2",
        )
        .bind(visit_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Visit", visit_id))?;

        if visit.status == VisitStatus::Draft {
            debug!(visit_id = %visit_id, "Skipping accrual for draft visit");
            return Ok(None);
        }

        let now = Utc::now();
        let rules = sqlx::query_as::<_, clipper_core::PointRule>(
            "SELECT id, store_id, name, rule_type, value, starts_at, ends_at, position, created_at
             FROM point_rules WHERE store_id = ?1
             ORDER BY position",
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        let Some(rule) = rules.iter().find(|r| r.is_active_at(now)) else {
            return Ok(None);
        };

        let points = rule.points_for(visit.total);
        if points <= 0 {
            return Ok(None);
        }

        let txn = PointTransaction {
            id: Uuid::new_v4().to_string(),
            store_id: store_id.to_string(),
            customer_id: visit.customer_id.clone(),
            visit_id: Some(visit_id.to_string()),
            txn_type: PointTxnType::Earn,
            points_delta: points,
            memo: None,
            created_at: now,
        };

        // One accrual per visit: the NOT EXISTS arm makes a second call a
        // clean no-op instead of a double credit.
        let result = sqlx::query(
            "INSERT INTO point_transactions
                 (id, store_id, customer_id, visit_id, txn_type, points_delta, memo, created_at)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
             WHERE NOT EXISTS (
                 SELECT 1 FROM point_transactions
                 WHERE visit_id = ?4 AND txn_type = 'earn'
             )",
        )
        .bind(&txn.id)
        .bind(&txn.store_id)
        .bind(&txn.customer_id)
        .bind(&txn.visit_id)
        .bind(txn.txn_type)
        .bind(txn.points_delta)
        .bind(&txn.memo)
        .bind(txn.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(visit_id = %visit_id, "Visit already accrued, skipping");
            return Ok(None);
        }

        info!(
            visit_id = %visit_id,
            customer_id = %txn.customer_id,
            points = points,
            "Points accrued"
        );

        Ok(Some(txn))
    }

    /// Redeems points against the customer's balance.
    ///
    /// Fails with [`CoreError::InsufficientPoints`] when the balance cannot
    /// cover the redemption; no row is written in that case.
    pub async fn redeem(
        &self,
        store_id: &str,
        customer_id: &str,
        points: i64,
        visit_id: Option<&str>,
    ) -> DbResult<PointTransaction> {
        validate_amount_positive("points", points).map_err(CoreError::from)?;
        self.require_customer(store_id, customer_id).await?;

        self.append_guarded(
            store_id,
            customer_id,
            visit_id,
            PointTxnType::Redeem,
            -points,
            None,
        )
        .await
    }

    /// Writes a manual adjustment with an arbitrary signed delta.
    ///
    /// The memo is mandatory (someone has to say why). Negative deltas are
    /// subject to the same balance guard as redemptions.
    pub async fn adjust(
        &self,
        store_id: &str,
        customer_id: &str,
        points_delta: i64,
        memo: &str,
    ) -> DbResult<PointTransaction> {
        validate_memo(memo).map_err(CoreError::from)?;
        self.require_customer(store_id, customer_id).await?;

        self.append_guarded(
            store_id,
            customer_id,
            None,
            PointTxnType::Adjust,
            points_delta,
            Some(memo),
        )
        .await
    }

    /// Current point balance: the sum over the customer's ledger rows.
    pub async fn balance_for(&self, store_id: &str, customer_id: &str) -> DbResult<i64> {
        self.require_customer(store_id, customer_id).await?;

        let balance: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(points_delta), 0)
             FROM point_transactions WHERE store_id = ?1 AND customer_id = ?2",
        )
        .bind(store_id)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(balance)
    }

    /// Most recent transactions first.
    pub async fn history_for(
        &self,
        store_id: &str,
        customer_id: &str,
        limit: u32,
    ) -> DbResult<Vec<PointTransaction>> {
        let history = sqlx::query_as::<_, PointTransaction>(
            "SELECT id, store_id, customer_id, visit_id, txn_type, points_delta, memo, created_at
             FROM point_transactions
             WHERE store_id = ?1 AND customer_id = ?2
             ORDER BY created_at DESC
             LIMIT ?3",
        )
        .bind(store_id)
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(history)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn require_customer(&self, store_id: &str, customer_id: &str) -> DbResult<()> {
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
        Ok(())
    }

    async fn append_guarded(
        &self,
        store_id: &str,
        customer_id: &str,
        visit_id: Option<&str>,
        txn_type: PointTxnType,
        points_delta: i64,
        memo: Option<&str>,
    ) -> DbResult<PointTransaction> {
        let txn = PointTransaction {
            id: Uuid::new_v4().to_string(),
            store_id: store_id.to_string(),
            customer_id: customer_id.to_string(),
            visit_id: visit_id.map(str::to_string),
            txn_type,
            points_delta,
            memo: memo.map(str::to_string),
            created_at: Utc::now(),
        };

        let result = sqlx::query(INSERT_TXN_GUARDED)
            .bind(&txn.id)
            .bind(&txn.store_id)
            .bind(&txn.customer_id)
            .bind(&txn.visit_id)
            .bind(txn.txn_type)
            .bind(txn.points_delta)
            .bind(&txn.memo)
            .bind(txn.created_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            let balance = self.balance_for(store_id, customer_id).await?;
            return Err(CoreError::InsufficientPoints {
                balance,
                requested: points_delta.abs(),
            }
            .into());
        }

        debug!(
            customer_id = %customer_id,
            delta = points_delta,
            txn_type = ?txn.txn_type,
            "Point transaction recorded"
        );

        Ok(txn)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
