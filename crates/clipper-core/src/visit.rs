//! # Visit Aggregate
//!
//! Pure derivations over a visit's children. The persistence layer calls
//! these immediately before every write so the stored `subtotal` and
//! `total` columns are always the literal sums over current lines, never
//! independently mutated state.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{Payment, Visit, VisitLine};

// =============================================================================
// Derived Totals
// =============================================================================

/// The two derived money columns of a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitTotals {
    /// Sum of `list_unit_price * qty` over lines.
    pub subtotal: Money,
    /// Sum of line `net_total`. Not guaranteed ≤ subtotal in general, but
    /// each line's net is floored at zero so the total never goes negative.
    pub total: Money,
}

/// Recomputes both totals from the given lines.
pub fn visit_totals(lines: &[VisitLine]) -> VisitTotals {
    VisitTotals {
        subtotal: lines.iter().map(VisitLine::line_subtotal).sum(),
        total: lines.iter().map(|line| line.net_total).sum(),
    }
}

/// Sum of payment amounts.
pub fn paid_amount(payments: &[Payment]) -> Money {
    payments.iter().map(|p| p.amount).sum()
}

// =============================================================================
// Read Model
// =============================================================================

/// The visit aggregate with its children, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitDetail {
    pub visit: Visit,
    pub lines: Vec<VisitLine>,
    pub payments: Vec<Payment>,
}

impl VisitDetail {
    /// Total tendered across all payments.
    pub fn paid_amount(&self) -> Money {
        paid_amount(&self.payments)
    }

    /// `total - paid`. Negative when overpaid.
    pub fn remaining_amount(&self) -> Money {
        self.visit.total - self.paid_amount()
    }

    /// Whether the visit is settled (remaining ≤ 0).
    pub fn fully_paid(&self) -> bool {
        !self.remaining_amount().is_positive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LineItemRef, PaymentMethod, VisitStatus};
    use chrono::Utc;

    fn test_line(list_unit: i64, qty: i64, net_total: i64) -> VisitLine {
        VisitLine {
            id: "line".to_string(),
            visit_id: "visit".to_string(),
            position: 0,
            item: LineItemRef::Service {
                service_id: "svc".to_string(),
            },
            staff_id: None,
            qty,
            list_unit_price: Money::from_minor(list_unit),
            discount_rate: 0,
            discount_amount: Money::zero(),
            net_unit_price: Money::from_minor(list_unit),
            prepaid_used: Money::zero(),
            net_total: Money::from_minor(net_total),
            applied_rule_id: None,
            created_at: Utc::now(),
        }
    }

    fn test_payment(amount: i64) -> Payment {
        Payment {
            id: "pay".to_string(),
            visit_id: "visit".to_string(),
            method: PaymentMethod::Card,
            amount: Money::from_minor(amount),
            created_at: Utc::now(),
        }
    }

    fn test_visit(subtotal: i64, total: i64) -> Visit {
        let now = Utc::now();
        Visit {
            id: "visit".to_string(),
            store_id: "store".to_string(),
            customer_id: "cust".to_string(),
            visited_at: now,
            status: VisitStatus::Finalized,
            voided_at: None,
            subtotal: Money::from_minor(subtotal),
            total: Money::from_minor(total),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_totals_derive_from_children() {
        let lines = vec![test_line(30_000, 1, 30_000), test_line(15_000, 1, 15_000)];
        let totals = visit_totals(&lines);

        assert_eq!(totals.subtotal.minor(), 45_000);
        assert_eq!(totals.total.minor(), 45_000);
    }

    #[test]
    fn test_totals_respect_quantities_and_discounts() {
        // 2 x 10,000 list with a discounted 18,000 net, plus a zeroed line.
        let lines = vec![test_line(10_000, 2, 18_000), test_line(5_000, 1, 0)];
        let totals = visit_totals(&lines);

        assert_eq!(totals.subtotal.minor(), 25_000);
        assert_eq!(totals.total.minor(), 18_000);
    }

    #[test]
    fn test_empty_visit_totals_are_zero() {
        let totals = visit_totals(&[]);
        assert!(totals.subtotal.is_zero());
        assert!(totals.total.is_zero());
    }

    #[test]
    fn test_paid_and_remaining() {
        let detail = VisitDetail {
            visit: test_visit(45_000, 45_000),
            lines: vec![],
            payments: vec![test_payment(30_000), test_payment(15_000)],
        };

        assert_eq!(detail.paid_amount().minor(), 45_000);
        assert_eq!(detail.remaining_amount().minor(), 0);
        assert!(detail.fully_paid());
    }

    #[test]
    fn test_overpayment_goes_negative_and_counts_as_paid() {
        let detail = VisitDetail {
            visit: test_visit(10_000, 10_000),
            lines: vec![],
            payments: vec![test_payment(12_000)],
        };

        assert_eq!(detail.remaining_amount().minor(), -2_000);
        assert!(detail.fully_paid());
    }

    #[test]
    fn test_unpaid_visit_is_not_fully_paid() {
        let detail = VisitDetail {
            visit: test_visit(10_000, 10_000),
            lines: vec![],
            payments: vec![],
        };

        assert_eq!(detail.remaining_amount().minor(), 10_000);
        assert!(!detail.fully_paid());
    }
}
