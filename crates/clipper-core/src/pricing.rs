//! # Pricing Engine & Discount Rule Matcher
//!
//! Computes list price, discount, and net figures for one visit line.
//!
//! ## Discount Precedence
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  First matching branch wins; later branches never run.       │
//! │                                                              │
//! │  1. explicit discount_rate  > 0 → round(list * rate / 100)   │
//! │  2. explicit discount_amount > 0 → used as-is                │
//! │  3. explicit rule_id             → apply that rule           │
//! │  4. auto-select                  → first active rule (by     │
//! │                                    position) whose predicate │
//! │                                    matches the line          │
//! │  5. otherwise                    → no discount               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is pure: it never touches a ledger. Prepaid consumption,
//! point accrual, and inventory movements belong to their repositories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{DiscountAppliesTo, DiscountRule, DiscountRuleType, PointRule};

// =============================================================================
// Configuration
// =============================================================================

/// What to do when a line references a catalog id that no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRefPolicy {
    /// Price the line at zero and keep the visit (resilient to stale ids).
    PriceAsZero,
    /// Fail the whole visit with a typed error.
    Reject,
}

/// Pricing behavior knobs.
#[derive(Debug, Clone, Copy)]
pub struct PricingConfig {
    pub missing_ref_policy: MissingRefPolicy,
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            missing_ref_policy: MissingRefPolicy::PriceAsZero,
        }
    }
}

// =============================================================================
// Inputs & Output
// =============================================================================

/// What the matcher sees of a line: which catalog side it is on, which
/// entry it names, and (for services) the category it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingTarget {
    Service {
        service_id: String,
        category_id: Option<String>,
    },
    Product {
        product_id: String,
    },
}

/// One line ready for pricing. The catalog reference has already been
/// resolved upstream to a list price (zero for a missing reference under
/// [`MissingRefPolicy::PriceAsZero`]).
#[derive(Debug, Clone)]
pub struct LineToPrice<'a> {
    pub target: &'a PricingTarget,
    pub list_price: Money,
    pub qty: i64,
    /// Explicit whole-percent discount, if the operator entered one.
    pub discount_rate: Option<i64>,
    /// Explicit absolute discount, if the operator entered one.
    pub discount_amount: Option<Money>,
    /// Explicitly chosen rule, if any.
    pub rule_id: Option<&'a str>,
    /// Stored value the caller already drew against this line.
    pub prepaid_used: Money,
}

/// The fully computed pricing figures for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub list_unit_price: Money,
    /// Whole percent; zero unless an explicit rate or a percent rule bound.
    pub discount_rate: i64,
    /// The binding discount figure.
    pub discount_amount: Money,
    /// `list_unit_price - discount_amount`.
    pub net_unit_price: Money,
    pub prepaid_used: Money,
    /// `net_unit_price * qty - prepaid_used`, floored at zero.
    pub net_total: Money,
    /// Audit: which rule produced the discount, when one did.
    pub applied_rule_id: Option<String>,
}

// =============================================================================
// Validity Windows
// =============================================================================

/// Window test shared by discount and point rules: `now` must fall inside
/// `[starts_at, ends_at]`, with a `None` bound meaning unbounded on that
/// side.
pub fn window_active(
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if let Some(start) = starts_at {
        if start > now {
            return false;
        }
    }
    if let Some(end) = ends_at {
        if end < now {
            return false;
        }
    }
    true
}

impl DiscountRule {
    /// Whether this rule's validity window contains `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        window_active(self.starts_at, self.ends_at, now)
    }

    /// The matcher predicate: does this rule apply to the given line?
    ///
    /// Targeted kinds (`service_category`, `specific_service`,
    /// `specific_product`) never match when the rule carries no `target_id`.
    pub fn matches(&self, target: &PricingTarget) -> bool {
        match (self.applies_to, target) {
            (DiscountAppliesTo::AllServices, PricingTarget::Service { .. }) => true,
            (
                DiscountAppliesTo::ServiceCategory,
                PricingTarget::Service { category_id, .. },
            ) => match (&self.target_id, category_id) {
                (Some(rule_target), Some(line_category)) => rule_target == line_category,
                _ => false,
            },
            (
                DiscountAppliesTo::SpecificService,
                PricingTarget::Service { service_id, .. },
            ) => self.target_id.as_deref() == Some(service_id.as_str()),
            (DiscountAppliesTo::AllProducts, PricingTarget::Product { .. }) => true,
            (
                DiscountAppliesTo::SpecificProduct,
                PricingTarget::Product { product_id },
            ) => self.target_id.as_deref() == Some(product_id.as_str()),
            _ => false,
        }
    }

    /// Applies this rule to a list price.
    ///
    /// Returns `(rate, amount)`: for percent rules the rate is recorded for
    /// audit and the amount is the binding figure; for amount rules the rate
    /// field stays zero and the amount is clamped at the list price (a rule
    /// can never discount below zero).
    pub fn apply(&self, list_price: Money) -> (i64, Money) {
        match self.rule_type {
            DiscountRuleType::Percent => (self.value, list_price.percent_of(self.value)),
            DiscountRuleType::Amount => {
                (0, Money::from_minor(self.value).min(list_price))
            }
        }
    }
}

impl PointRule {
    /// Whether this rule's validity window contains `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        window_active(self.starts_at, self.ends_at, now)
    }
}

// =============================================================================
// Pricing Engine
// =============================================================================

/// Prices one line under the store's discount rules.
///
/// `rules` is the store's full rule list in position order; only
/// auto-selection (branch 4) filters to rules active at `now`. An explicit
/// `rule_id` resolves against the full list: the rule was chosen upstream,
/// so its window is not re-checked here.
///
/// ## Example
/// ```rust
/// use clipper_core::money::Money;
/// use clipper_core::pricing::{price_line, LineToPrice, PricingTarget};
///
/// let target = PricingTarget::Service {
///     service_id: "svc-1".to_string(),
///     category_id: None,
/// };
/// let priced = price_line(
///     &LineToPrice {
///         target: &target,
///         list_price: Money::from_minor(30_000),
///         qty: 1,
///         discount_rate: Some(10),
///         discount_amount: None,
///         rule_id: None,
///         prepaid_used: Money::zero(),
///     },
///     &[],
///     chrono::Utc::now(),
/// );
/// assert_eq!(priced.discount_amount.minor(), 3_000);
/// assert_eq!(priced.net_total.minor(), 27_000);
/// ```
pub fn price_line(line: &LineToPrice, rules: &[DiscountRule], now: DateTime<Utc>) -> PricedLine {
    let list_price = line.list_price;

    let (discount_rate, discount_amount, applied_rule_id) = resolve_discount(line, rules, now);

    let net_unit_price = list_price - discount_amount;
    let net_total = (net_unit_price * line.qty - line.prepaid_used).floor_zero();

    PricedLine {
        list_unit_price: list_price,
        discount_rate,
        discount_amount,
        net_unit_price,
        prepaid_used: line.prepaid_used,
        net_total,
        applied_rule_id,
    }
}

/// The precedence chain. Returns `(rate, amount, applied_rule_id)` with
/// unset figures normalized to zero.
fn resolve_discount(
    line: &LineToPrice,
    rules: &[DiscountRule],
    now: DateTime<Utc>,
) -> (i64, Money, Option<String>) {
    // 1. Explicit rate wins over everything.
    if let Some(rate) = line.discount_rate {
        if rate > 0 {
            return (rate, line.list_price.percent_of(rate), None);
        }
    }

    // 2. Explicit amount, already resolved upstream. No recompute.
    if let Some(amount) = line.discount_amount {
        if amount.is_positive() {
            return (0, amount, None);
        }
    }

    // 3. Explicitly chosen rule. An unknown id silently yields no discount.
    if let Some(rule_id) = line.rule_id {
        if let Some(rule) = rules.iter().find(|r| r.id == rule_id) {
            let (rate, amount) = rule.apply(line.list_price);
            return (rate, amount, Some(rule.id.clone()));
        }
        return (0, Money::zero(), None);
    }

    // 4. Auto-select: first active rule by position whose predicate matches.
    if let Some(rule) = rules
        .iter()
        .filter(|r| r.is_active_at(now))
        .find(|r| r.matches(line.target))
    {
        let (rate, amount) = rule.apply(line.list_price);
        return (rate, amount, Some(rule.id.clone()));
    }

    // 5. No discount.
    (0, Money::zero(), None)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn service_target() -> PricingTarget {
        PricingTarget::Service {
            service_id: "svc-1".to_string(),
            category_id: Some("cat-5".to_string()),
        }
    }

    fn rule(
        id: &str,
        rule_type: DiscountRuleType,
        value: i64,
        applies_to: DiscountAppliesTo,
        target_id: Option<&str>,
        position: i64,
    ) -> DiscountRule {
        DiscountRule {
            id: id.to_string(),
            store_id: "store-1".to_string(),
            name: id.to_string(),
            rule_type,
            value,
            applies_to,
            target_id: target_id.map(str::to_string),
            starts_at: None,
            ends_at: None,
            position,
            created_at: Utc::now(),
        }
    }

    fn line<'a>(target: &'a PricingTarget, list_price: i64) -> LineToPrice<'a> {
        LineToPrice {
            target,
            list_price: Money::from_minor(list_price),
            qty: 1,
            discount_rate: None,
            discount_amount: None,
            rule_id: None,
            prepaid_used: Money::zero(),
        }
    }

    #[test]
    fn test_explicit_rate_wins_over_rule_id() {
        // Rate 10 and a pointer at a 50% rule: the rate must bind.
        let target = service_target();
        let rules = vec![rule(
            "big-rule",
            DiscountRuleType::Percent,
            50,
            DiscountAppliesTo::AllServices,
            None,
            1,
        )];

        let priced = price_line(
            &LineToPrice {
                discount_rate: Some(10),
                rule_id: Some("big-rule"),
                ..line(&target, 20_000)
            },
            &rules,
            Utc::now(),
        );

        assert_eq!(priced.discount_rate, 10);
        assert_eq!(priced.discount_amount.minor(), 2_000);
        assert_eq!(priced.applied_rule_id, None);
    }

    #[test]
    fn test_explicit_amount_wins_over_rule_lookup() {
        let target = service_target();
        let rules = vec![rule(
            "r1",
            DiscountRuleType::Percent,
            50,
            DiscountAppliesTo::AllServices,
            None,
            1,
        )];

        let priced = price_line(
            &LineToPrice {
                discount_amount: Some(Money::from_minor(1_234)),
                ..line(&target, 20_000)
            },
            &rules,
            Utc::now(),
        );

        assert_eq!(priced.discount_amount.minor(), 1_234);
        assert_eq!(priced.discount_rate, 0);
        assert_eq!(priced.applied_rule_id, None);
    }

    #[test]
    fn test_auto_rule_amount_applied_and_recorded() {
        // One active amount rule, value 3,000, all services. A 20,000 line
        // prices at 17,000 with the rule id on the audit field.
        let target = service_target();
        let rules = vec![rule(
            "amt-1",
            DiscountRuleType::Amount,
            3_000,
            DiscountAppliesTo::AllServices,
            None,
            1,
        )];

        let priced = price_line(&line(&target, 20_000), &rules, Utc::now());

        assert_eq!(priced.discount_amount.minor(), 3_000);
        assert_eq!(priced.net_unit_price.minor(), 17_000);
        assert_eq!(priced.discount_rate, 0);
        assert_eq!(priced.applied_rule_id.as_deref(), Some("amt-1"));
    }

    #[test]
    fn test_amount_rule_clamps_at_list_price() {
        let target = service_target();
        let rules = vec![rule(
            "amt-big",
            DiscountRuleType::Amount,
            50_000,
            DiscountAppliesTo::AllServices,
            None,
            1,
        )];

        let priced = price_line(&line(&target, 20_000), &rules, Utc::now());

        assert_eq!(priced.discount_amount.minor(), 20_000);
        assert_eq!(priced.net_unit_price.minor(), 0);
        assert_eq!(priced.net_total.minor(), 0);
    }

    #[test]
    fn test_first_match_by_position_wins_both_orderings() {
        let target = service_target();

        let category_rule = |pos| {
            rule(
                "cat-rule",
                DiscountRuleType::Percent,
                20,
                DiscountAppliesTo::ServiceCategory,
                Some("cat-5"),
                pos,
            )
        };
        let all_rule = |pos| {
            rule(
                "all-rule",
                DiscountRuleType::Percent,
                5,
                DiscountAppliesTo::AllServices,
                None,
                pos,
            )
        };

        // Category rule first: it binds.
        let priced = price_line(
            &line(&target, 10_000),
            &[category_rule(1), all_rule(2)],
            Utc::now(),
        );
        assert_eq!(priced.applied_rule_id.as_deref(), Some("cat-rule"));
        assert_eq!(priced.discount_amount.minor(), 2_000);

        // All-services rule first: it binds instead.
        let priced = price_line(
            &line(&target, 10_000),
            &[all_rule(1), category_rule(2)],
            Utc::now(),
        );
        assert_eq!(priced.applied_rule_id.as_deref(), Some("all-rule"));
        assert_eq!(priced.discount_amount.minor(), 500);
    }

    #[test]
    fn test_category_rule_requires_exact_category() {
        let other_category = PricingTarget::Service {
            service_id: "svc-9".to_string(),
            category_id: Some("cat-7".to_string()),
        };
        let rules = vec![rule(
            "cat-rule",
            DiscountRuleType::Percent,
            20,
            DiscountAppliesTo::ServiceCategory,
            Some("cat-5"),
            1,
        )];

        let priced = price_line(&line(&other_category, 10_000), &rules, Utc::now());
        assert_eq!(priced.discount_amount.minor(), 0);
        assert_eq!(priced.applied_rule_id, None);
    }

    #[test]
    fn test_targeted_rule_without_target_never_matches() {
        let target = service_target();
        let rules = vec![rule(
            "broken",
            DiscountRuleType::Percent,
            20,
            DiscountAppliesTo::SpecificService,
            None,
            1,
        )];

        let priced = price_line(&line(&target, 10_000), &rules, Utc::now());
        assert_eq!(priced.applied_rule_id, None);
    }

    #[test]
    fn test_product_rules_do_not_match_services() {
        let target = service_target();
        let rules = vec![rule(
            "prod-rule",
            DiscountRuleType::Percent,
            20,
            DiscountAppliesTo::AllProducts,
            None,
            1,
        )];

        let priced = price_line(&line(&target, 10_000), &rules, Utc::now());
        assert_eq!(priced.applied_rule_id, None);
    }

    #[test]
    fn test_expired_rule_is_not_auto_selected() {
        let target = service_target();
        let now = Utc::now();

        let mut expired = rule(
            "expired",
            DiscountRuleType::Percent,
            20,
            DiscountAppliesTo::AllServices,
            None,
            1,
        );
        expired.ends_at = Some(now - Duration::days(1));

        let priced = price_line(&line(&target, 10_000), &[expired], now);
        assert_eq!(priced.applied_rule_id, None);
        assert_eq!(priced.discount_amount.minor(), 0);
    }

    #[test]
    fn test_explicit_rule_id_skips_window_check() {
        let target = service_target();
        let now = Utc::now();

        let mut expired = rule(
            "expired",
            DiscountRuleType::Amount,
            1_000,
            DiscountAppliesTo::AllServices,
            None,
            1,
        );
        expired.ends_at = Some(now - Duration::days(1));

        let priced = price_line(
            &LineToPrice {
                rule_id: Some("expired"),
                ..line(&target, 10_000)
            },
            &[expired],
            now,
        );
        assert_eq!(priced.applied_rule_id.as_deref(), Some("expired"));
        assert_eq!(priced.discount_amount.minor(), 1_000);
    }

    #[test]
    fn test_unknown_rule_id_prices_without_discount() {
        let target = service_target();
        let priced = price_line(
            &LineToPrice {
                rule_id: Some("gone"),
                ..line(&target, 10_000)
            },
            &[],
            Utc::now(),
        );
        assert_eq!(priced.discount_amount.minor(), 0);
        assert_eq!(priced.applied_rule_id, None);
    }

    #[test]
    fn test_net_total_floors_at_zero_under_prepaid() {
        let target = service_target();
        let priced = price_line(
            &LineToPrice {
                prepaid_used: Money::from_minor(50_000),
                ..line(&target, 10_000)
            },
            &[],
            Utc::now(),
        );

        // 10,000 - 50,000 would be negative; the floor absorbs the excess.
        assert_eq!(priced.net_total.minor(), 0);
        assert_eq!(priced.net_unit_price.minor(), 10_000);
    }

    #[test]
    fn test_window_bounds() {
        let now = Utc::now();
        assert!(window_active(None, None, now));
        assert!(window_active(Some(now), None, now));
        assert!(window_active(None, Some(now), now));
        assert!(!window_active(Some(now + Duration::hours(1)), None, now));
        assert!(!window_active(None, Some(now - Duration::hours(1)), now));
    }
}
