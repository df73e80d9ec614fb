//! # Domain Types
//!
//! Core domain types for Clipper POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Domain Types                          │
//! │                                                              │
//! │  Store (tenant root)                                         │
//! │   ├── Customer ── point/prepaid balances (computed sums)     │
//! │   ├── Service / Product          (catalog)                   │
//! │   ├── DiscountRule / PointRule   (time-windowed policies)    │
//! │   ├── Visit ── VisitLine* ── Payment*   (the aggregate)      │
//! │   ├── PrepaidPlan ── PrepaidSale ── PrepaidUsage*  (ledger)  │
//! │   ├── PointTransaction*                            (ledger)  │
//! │   └── InventoryEvent*                              (ledger)  │
//! │                                                              │
//! │  * = append-only; balances are sums over these rows          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has an `id` (UUID v4, immutable, used for relations) and
//! belongs to exactly one store. Cross-store lookups behave identically to
//! "not found".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Store & Customer
// =============================================================================

/// A tenant: one salon owning all other data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Store {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A customer of one store.
///
/// Point and prepaid balances are deliberately absent here: they are sums
/// over the ledgers, recomputed on read, never stored columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub store_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Computed balances for one customer, derived from the two ledgers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerBalances {
    pub point_balance: i64,
    pub prepaid_balance: Money,
}

// =============================================================================
// Catalog
// =============================================================================

/// A service on the store's menu (cut, color, treatment, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Service {
    pub id: String,
    pub store_id: String,
    /// Optional grouping used by `service_category` discount rules.
    pub category_id: Option<String>,
    pub name: String,
    pub list_price: Money,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Whether a product is sellable at the counter, tracked as inventory,
/// or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// Sold to customers, not tracked in stock.
    Retail,
    /// Used up in the back room, tracked in stock, not sold.
    Consumable,
    /// Sold and tracked.
    Both,
}

/// A retail or consumable product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub store_id: String,
    pub name: String,
    pub kind: ProductKind,
    pub retail_unit_price: Money,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Whether this product can appear on a visit line.
    #[inline]
    pub fn is_sellable(&self) -> bool {
        matches!(self.kind, ProductKind::Retail | ProductKind::Both)
    }

    /// Whether this product's stock is tracked in the inventory ledger.
    #[inline]
    pub fn is_tracked(&self) -> bool {
        matches!(self.kind, ProductKind::Consumable | ProductKind::Both)
    }
}

// =============================================================================
// Pricing & Point Rules
// =============================================================================

/// How a discount rule computes its deduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountRuleType {
    /// `value` is a whole percent of list price, rounded half-up.
    Percent,
    /// `value` is an absolute amount, clamped at the list price.
    Amount,
}

/// What a discount rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountAppliesTo {
    AllServices,
    /// Matches services whose `category_id` equals the rule's `target_id`.
    ServiceCategory,
    /// Matches the single service named by `target_id`.
    SpecificService,
    AllProducts,
    /// Matches the single product named by `target_id`.
    SpecificProduct,
}

/// A store-configured, time-windowed discount policy.
///
/// `position` is the explicit precedence: candidate rules are always walked
/// in ascending position and the first match wins. Insertion order is not
/// load-bearing on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DiscountRule {
    pub id: String,
    pub store_id: String,
    pub name: String,
    pub rule_type: DiscountRuleType,
    /// Percent points for `percent` rules, minor units for `amount` rules.
    pub value: i64,
    pub applies_to: DiscountAppliesTo,
    pub target_id: Option<String>,
    /// Window start; `None` means unbounded below.
    pub starts_at: Option<DateTime<Utc>>,
    /// Window end; `None` means unbounded above.
    pub ends_at: Option<DateTime<Utc>>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// How a point rule computes accrual from a finalized visit's total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PointRuleType {
    /// `floor(total * value / 100)` points.
    PercentOfNet,
    /// `value` points, independent of the visit amount.
    Fixed,
}

/// A store-configured loyalty accrual policy.
///
/// The first currently-active rule by `position` is "the" accrual rule;
/// rules never stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PointRule {
    pub id: String,
    pub store_id: String,
    pub name: String,
    pub rule_type: PointRuleType,
    pub value: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

impl PointRule {
    /// Points accrued for a visit total under this rule.
    ///
    /// `percent_of_net` floors (a customer never earns a fractional point
    /// rounded in their favor); `fixed` ignores the amount entirely.
    pub fn points_for(&self, total: Money) -> i64 {
        match self.rule_type {
            PointRuleType::PercentOfNet => (total.minor() * self.value) / 100,
            PointRuleType::Fixed => self.value,
        }
    }
}

// =============================================================================
// Visit Aggregate
// =============================================================================

/// The lifecycle status of a visit. One-way: draft → finalized.
///
/// Voiding is NOT a status: it is the orthogonal `voided_at` timestamp on
/// [`Visit`], settable from either status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    /// Visit is being assembled; accrual skips it.
    Draft,
    /// Visit is settled; totals are final and accrual may run.
    Finalized,
}

impl Default for VisitStatus {
    fn default() -> Self {
        VisitStatus::Draft
    }
}

/// One customer transaction (sale) with line items and payments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Visit {
    pub id: String,
    pub store_id: String,
    pub customer_id: String,
    pub visited_at: DateTime<Utc>,
    pub status: VisitStatus,
    pub voided_at: Option<DateTime<Utc>>,
    /// Sum of `list_unit_price * qty` over lines. Recomputed before every
    /// persist, never trusted as independent state.
    pub subtotal: Money,
    /// Sum of line `net_total`. Same recomputation discipline.
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    /// Whether the visit has been voided (on either status).
    #[inline]
    pub fn is_voided(&self) -> bool {
        self.voided_at.is_some()
    }
}

/// Which side of the catalog a line references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Service,
    Product,
}

/// A line's catalog reference: exactly one of service or product.
///
/// A sum type instead of two nullable ids makes the invalid "both set" and
/// "neither set" states unrepresentable once a request has been validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "item_type", rename_all = "snake_case")]
pub enum LineItemRef {
    Service { service_id: String },
    Product { product_id: String },
}

impl LineItemRef {
    /// The discriminant, as stored in the `item_type` column.
    #[inline]
    pub fn item_type(&self) -> ItemType {
        match self {
            LineItemRef::Service { .. } => ItemType::Service,
            LineItemRef::Product { .. } => ItemType::Product,
        }
    }

    /// The referenced catalog id.
    #[inline]
    pub fn target_id(&self) -> &str {
        match self {
            LineItemRef::Service { service_id } => service_id,
            LineItemRef::Product { product_id } => product_id,
        }
    }
}

/// One priced row within a visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitLine {
    pub id: String,
    pub visit_id: String,
    /// Order the line was supplied in; lines are priced and listed in this
    /// order.
    pub position: i64,
    #[serde(flatten)]
    pub item: LineItemRef,
    pub staff_id: Option<String>,
    pub qty: i64,
    pub list_unit_price: Money,
    /// Whole percent; non-zero only when a rate was explicit or a percent
    /// rule applied.
    pub discount_rate: i64,
    /// The binding discount figure in minor units.
    pub discount_amount: Money,
    /// `list_unit_price - discount_amount`.
    pub net_unit_price: Money,
    /// Stored value consumed against this line (already recorded in the
    /// prepaid ledger by the caller).
    pub prepaid_used: Money,
    /// `net_unit_price * qty - prepaid_used`, floored at zero.
    pub net_total: Money,
    /// Audit trail: the auto- or explicitly-applied discount rule, if any.
    pub applied_rule_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VisitLine {
    /// This line's contribution to the visit subtotal.
    #[inline]
    pub fn line_subtotal(&self) -> Money {
        self.list_unit_price * self.qty
    }
}

/// How a payment was tendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Cash,
    Bank,
    Credit,
    Pay,
    Other,
    /// Settled from a prepaid account (the ledger draw happens separately).
    Prepaid,
    /// Settled from loyalty points (the redemption happens separately).
    Points,
}

/// A payment towards a visit. A visit can carry several for split tender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub visit_id: String,
    pub method: PaymentMethod,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Prepaid Ledger
// =============================================================================

/// A sellable stored-value template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PrepaidPlan {
    pub id: String,
    pub store_id: String,
    pub name: String,
    /// What the customer pays for the plan.
    pub price_paid: Money,
    /// The stored value the account opens with (often more than the price).
    pub value_amount: Money,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One purchased prepaid account.
///
/// A customer may hold several concurrent accounts; each is drawn down
/// independently. The remaining balance is `value_amount` minus the sum of
/// this account's usages, computed on read and never allowed below zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PrepaidSale {
    pub id: String,
    pub store_id: String,
    pub customer_id: String,
    pub plan_id: String,
    pub amount_paid: Money,
    pub value_amount: Money,
    pub staff_id: Option<String>,
    pub sold_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One draw against a prepaid account. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PrepaidUsage {
    pub id: String,
    pub prepaid_sale_id: String,
    pub visit_id: Option<String>,
    pub visit_line_id: Option<String>,
    pub amount_used: Money,
    pub used_at: DateTime<Utc>,
}

/// Per-account breakdown for display: the account, its computed remaining
/// balance, and its usage history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepaidAccountDetail {
    pub sale: PrepaidSale,
    pub remaining_balance: Money,
    pub usages: Vec<PrepaidUsage>,
}

// =============================================================================
// Loyalty Point Ledger
// =============================================================================

/// Why a point transaction exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PointTxnType {
    Earn,
    Redeem,
    Adjust,
    Expire,
}

/// An append-only loyalty ledger row. Balance = sum of `points_delta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PointTransaction {
    pub id: String,
    pub store_id: String,
    pub customer_id: String,
    pub visit_id: Option<String>,
    pub txn_type: PointTxnType,
    pub points_delta: i64,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Inventory Ledger
// =============================================================================

/// What moved the stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum InventoryEventType {
    Purchase,
    Sale,
    Consume,
    Adjust,
    Waste,
}

/// An append-only stock ledger row. Current stock = sum of `qty_delta`;
/// negative stock is representable (an unreconciled-data signal, not an
/// integrity violation).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryEvent {
    pub id: String,
    pub store_id: String,
    pub product_id: String,
    pub visit_id: Option<String>,
    pub visit_line_id: Option<String>,
    pub event_type: InventoryEventType,
    pub qty_delta: i64,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row of the inventory reporting helper: a tracked product with its
/// computed stock and last purchase timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockSummaryRow {
    pub product_id: String,
    pub name: String,
    pub kind: ProductKind,
    pub current_stock: i64,
    pub last_purchased_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Request DTOs
// =============================================================================
// The inbound shapes the request layer hands to the orchestrator. These keep
// the permissive wire form (two nullable ids per line); validation converts
// to the strict domain types.

/// Request to create a visit with its line items and payments atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisitRequest {
    pub customer_id: String,
    /// Defaults to now.
    pub visited_at: Option<DateTime<Utc>>,
    /// Defaults to `finalized` when unspecified (walk-in sales settle
    /// immediately; drafts are the exception, not the rule).
    pub status: Option<VisitStatus>,
    pub line_items: Vec<LineItemRequest>,
    pub payments: Vec<PaymentRequest>,
}

/// One requested line item, pre-validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRequest {
    pub item_type: ItemType,
    pub service_id: Option<String>,
    pub product_id: Option<String>,
    pub staff_id: Option<String>,
    pub qty: i64,
    /// Explicit whole-percent discount. Wins over everything else.
    pub discount_rate: Option<i64>,
    /// Explicit absolute discount. Wins over rule lookup.
    pub discount_amount: Option<Money>,
    /// Explicit discount rule to apply when no explicit figures are given.
    pub rule_id: Option<String>,
    /// Stored value already drawn against this line by the caller.
    pub prepaid_used: Option<Money>,
}

impl LineItemRequest {
    /// The strict catalog reference, if the request is well-formed.
    ///
    /// Returns `None` when the id matching `item_type` is absent; validation
    /// reports that as a field error before pricing ever runs.
    pub fn item_ref(&self) -> Option<LineItemRef> {
        match self.item_type {
            ItemType::Service => self.service_id.clone().map(|service_id| LineItemRef::Service { service_id }),
            ItemType::Product => self.product_id.clone().map(|product_id| LineItemRef::Product { product_id }),
        }
    }
}

/// One requested payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub amount: Money,
}

// =============================================================================
// Unit Tests
// =============================================================================
