//! # Inventory Ledger
//!
//! Append-only stock movements per product. The five event kinds are thin
//! constructors over one append; current stock is the signed sum of a
//! product's events.
//!
//! There is deliberately no balance floor here: stock can go negative,
//! which signals a data-entry or timing gap to reconcile, not a violation
//! to reject.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use clipper_core::validation::{validate_amount_positive, validate_memo};
use clipper_core::{CoreError, InventoryEvent, InventoryEventType, StockSummaryRow};

use crate::error::{DbError, DbResult};

/// Repository for inventory ledger operations.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Records stock received from a vendor (+qty).
    pub async fn record_purchase(
        &self,
        store_id: &str,
        product_id: &str,
        qty: i64,
        memo: Option<&str>,
    ) -> DbResult<InventoryEvent> {
        validate_amount_positive("qty", qty).map_err(CoreError::from)?;
        self.append(store_id, product_id, None, None, InventoryEventType::Purchase, qty, memo)
            .await
    }

    /// Records stock sold on a visit line (−qty).
    pub async fn record_sale(
        &self,
        store_id: &str,
        product_id: &str,
        qty: i64,
        visit_id: &str,
        visit_line_id: &str,
    ) -> DbResult<InventoryEvent> {
        validate_amount_positive("qty", qty).map_err(CoreError::from)?;
        self.append(
            store_id,
            product_id,
            Some(visit_id),
            Some(visit_line_id),
            InventoryEventType::Sale,
            -qty,
            None,
        )
        .await
    }

    /// Records back-room consumption (−qty), optionally tied to a visit.
    pub async fn record_consume(
        &self,
        store_id: &str,
        product_id: &str,
        qty: i64,
        visit_id: Option<&str>,
        memo: Option<&str>,
    ) -> DbResult<InventoryEvent> {
        validate_amount_positive("qty", qty).map_err(CoreError::from)?;
        self.append(
            store_id,
            product_id,
            visit_id,
            None,
            InventoryEventType::Consume,
            -qty,
            memo,
        )
        .await
    }

    /// Records a manual correction with an arbitrary signed delta.
    /// The memo is mandatory.
    pub async fn adjust(
        &self,
        store_id: &str,
        product_id: &str,
        qty_delta: i64,
        memo: &str,
    ) -> DbResult<InventoryEvent> {
        validate_memo(memo).map_err(CoreError::from)?;
        self.append(
            store_id,
            product_id,
            None,
            None,
            InventoryEventType::Adjust,
            qty_delta,
            Some(memo),
        )
        .await
    }

    /// Records spoiled or damaged stock (−qty). The memo is mandatory.
    pub async fn record_waste(
        &self,
        store_id: &str,
        product_id: &str,
        qty: i64,
        memo: &str,
    ) -> DbResult<InventoryEvent> {
        validate_amount_positive("qty", qty).map_err(CoreError::from)?;
        validate_memo(memo).map_err(CoreError::from)?;
        self.append(
            store_id,
            product_id,
            None,
            None,
            InventoryEventType::Waste,
            -qty,
            Some(memo),
        )
        .await
    }

    /// Current stock: the signed sum of the product's events.
    pub async fn current_stock(&self, store_id: &str, product_id: &str) -> DbResult<i64> {
        self.require_product(store_id, product_id).await?;

        let stock: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(qty_delta), 0)
             FROM inventory_events WHERE store_id = ?1 AND product_id = ?2",
        )
        .bind(store_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(stock)
    }

    /// Event history for a product, oldest first.
    pub async fn events_for(
        &self,
        store_id: &str,
        product_id: &str,
    ) -> DbResult<Vec<InventoryEvent>> {
        self.require_product(store_id, product_id).await?;

        let events = sqlx::query_as::<_, InventoryEvent>(
            "SELECT id, store_id, product_id, visit_id, visit_line_id, event_type, qty_delta, memo, created_at
             FROM inventory_events
             WHERE store_id = ?1 AND product_id = ?2
             ORDER BY created_at",
        )
        .bind(store_id)
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Read-only reporting helper: every inventory-tracked product with its
    /// computed stock and last purchase timestamp.
    pub async fn stock_summary(&self, store_id: &str) -> DbResult<Vec<StockSummaryRow>> {
        let rows = sqlx::query_as::<_, StockSummaryRow>(
            "SELECT p.id AS product_id, p.name, p.kind,
                    COALESCE((
                        SELECT SUM(e.qty_delta) FROM inventory_events e
                        WHERE e.product_id = p.id
                    ), 0) AS current_stock,
                    (
                        SELECT MAX(e.created_at) FROM inventory_events e
                        WHERE e.product_id = p.id AND e.event_type = 'purchase'
                    ) AS last_purchased_at
             FROM products p
             WHERE p.store_id = ?1 AND p.kind IN ('consumable', 'both')
             ORDER BY p.name",
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn require_product(&self, store_id: &str, product_id: &str) -> DbResult<()> {
        let exists = sqlx::query_scalar::<_, String>(
            "SELECT id FROM products WHERE id = ?1 AND store_id = ?2",
        )
        .bind(product_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        if exists.is_none() {
            return Err(DbError::not_found("Product", product_id));
        }
        Ok(())
    }

    /// The one append every event kind funnels through.
    #[allow(clippy::too_many_arguments)]
    async fn append(
        &self,
        store_id: &str,
        product_id: &str,
        visit_id: Option<&str>,
        visit_line_id: Option<&str>,
        event_type: InventoryEventType,
        qty_delta: i64,
        memo: Option<&str>,
    ) -> DbResult<InventoryEvent> {
        self.require_product(store_id, product_id).await?;

        let event = InventoryEvent {
            id: Uuid::new_v4().to_string(),
            store_id: store_id.to_string(),
            product_id: product_id.to_string(),
            visit_id: visit_id.map(str::to_string),
            visit_line_id: visit_line_id.map(str::to_string),
            event_type,
            qty_delta,
            memo: memo.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO inventory_events
                 (id, store_id, product_id, visit_id, visit_line_id, event_type, qty_delta, memo, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&event.id)
        .bind(&event.store_id)
        .bind(&event.product_id)
        .bind(&event.visit_id)
        .bind(&event.visit_line_id)
        .bind(event.event_type)
        .bind(event.qty_delta)
        .bind(&event.memo)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        debug!(
            product_id = %product_id,
            event_type = ?event.event_type,
            qty_delta = qty_delta,
            "Inventory event recorded"
        );

        Ok(event)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
