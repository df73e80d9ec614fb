//! # Validation Module
//!
//! Input validation for Clipper POS.
//!
//! Single-field validators return on the first problem; whole-request
//! validation collects every problem so the caller gets one failure with
//! all messages joined, not a drip-feed of rejections.

use crate::error::ValidationError;
use crate::types::CreateVisitRequest;
use crate::{MAX_LINE_QTY, MAX_VISIT_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates an entity display name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive
/// - Must not exceed [`MAX_LINE_QTY`]
pub fn validate_qty(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "qty".to_string(),
        });
    }

    if qty > MAX_LINE_QTY {
        return Err(ValidationError::OutOfRange {
            field: "qty".to_string(),
            min: 1,
            max: MAX_LINE_QTY,
        });
    }

    Ok(())
}

/// Validates a whole-percent discount rate (0 to 100).
pub fn validate_discount_rate(rate: i64) -> ValidationResult<()> {
    if !(0..=100).contains(&rate) {
        return Err(ValidationError::OutOfRange {
            field: "discount_rate".to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(())
}

/// Validates a monetary amount that must be strictly positive
/// (payments, ledger draws).
pub fn validate_amount_positive(field: &str, amount: i64) -> ValidationResult<()> {
    if amount <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a monetary amount that may be zero but not negative
/// (discounts, prepaid application).
pub fn validate_amount_non_negative(field: &str, amount: i64) -> ValidationResult<()> {
    if amount < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a required memo (manual adjustments and waste must say why).
pub fn validate_memo(memo: &str) -> ValidationResult<()> {
    if memo.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "memo".to_string(),
        });
    }

    Ok(())
}

/// Validates a UUID string format.
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Request Validation
// =============================================================================

/// Validates a whole visit-creation request, collecting every field error.
///
/// Nothing may be written when this returns `Err`; the orchestrator joins
/// the messages into the single failure string the caller sees.
pub fn validate_create_visit(req: &CreateVisitRequest) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if req.customer_id.trim().is_empty() {
        errors.push(ValidationError::Required {
            field: "customer_id".to_string(),
        });
    }

    if req.line_items.is_empty() {
        errors.push(ValidationError::Required {
            field: "line_items".to_string(),
        });
    }

    if req.line_items.len() > MAX_VISIT_LINES {
        errors.push(ValidationError::OutOfRange {
            field: "line_items".to_string(),
            min: 1,
            max: MAX_VISIT_LINES as i64,
        });
    }

    for (index, line) in req.line_items.iter().enumerate() {
        if line.item_ref().is_none() {
            let field = match line.item_type {
                crate::types::ItemType::Service => format!("line_items[{index}].service_id"),
                crate::types::ItemType::Product => format!("line_items[{index}].product_id"),
            };
            errors.push(ValidationError::Required { field });
        }

        if let Err(err) = validate_qty(line.qty) {
            errors.push(prefix_field(err, &format!("line_items[{index}]")));
        }

        if let Some(rate) = line.discount_rate {
            if let Err(err) = validate_discount_rate(rate) {
                errors.push(prefix_field(err, &format!("line_items[{index}]")));
            }
        }

        if let Some(amount) = line.discount_amount {
            if let Err(err) =
                validate_amount_non_negative("discount_amount", amount.minor())
            {
                errors.push(prefix_field(err, &format!("line_items[{index}]")));
            }
        }

        if let Some(prepaid) = line.prepaid_used {
            if let Err(err) = validate_amount_non_negative("prepaid_used", prepaid.minor()) {
                errors.push(prefix_field(err, &format!("line_items[{index}]")));
            }
        }
    }

    for (index, payment) in req.payments.iter().enumerate() {
        if let Err(err) = validate_amount_positive("amount", payment.amount.minor()) {
            errors.push(prefix_field(err, &format!("payments[{index}]")));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Joins collected validation messages into the single diagnostic string
/// surfaced to the caller.
pub fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Re-homes a field error under a path prefix like `line_items[2]`.
fn prefix_field(err: ValidationError, prefix: &str) -> ValidationError {
    match err {
        ValidationError::Required { field } => ValidationError::Required {
            field: format!("{prefix}.{field}"),
        },
        ValidationError::MustBePositive { field } => ValidationError::MustBePositive {
            field: format!("{prefix}.{field}"),
        },
        ValidationError::OutOfRange { field, min, max } => ValidationError::OutOfRange {
            field: format!("{prefix}.{field}"),
            min,
            max,
        },
        ValidationError::TooLong { field, max } => ValidationError::TooLong {
            field: format!("{prefix}.{field}"),
            max,
        },
        ValidationError::InvalidFormat { field, reason } => ValidationError::InvalidFormat {
            field: format!("{prefix}.{field}"),
            reason,
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::{ItemType, LineItemRequest, PaymentMethod, PaymentRequest};

    fn service_line(qty: i64) -> LineItemRequest {
        LineItemRequest {
            item_type: ItemType::Service,
            service_id: Some("svc-1".to_string()),
            product_id: None,
            staff_id: None,
            qty,
            discount_rate: None,
            discount_amount: None,
            rule_id: None,
            prepaid_used: None,
        }
    }

    fn request(lines: Vec<LineItemRequest>, payments: Vec<PaymentRequest>) -> CreateVisitRequest {
        CreateVisitRequest {
            customer_id: "cust-1".to_string(),
            visited_at: None,
            status: None,
            line_items: lines,
            payments,
        }
    }

    #[test]
    fn test_validate_qty() {
        assert!(validate_qty(1).is_ok());
        assert!(validate_qty(999).is_ok());
        assert!(validate_qty(0).is_err());
        assert!(validate_qty(-1).is_err());
        assert!(validate_qty(1_000).is_err());
    }

    #[test]
    fn test_validate_discount_rate() {
        assert!(validate_discount_rate(0).is_ok());
        assert!(validate_discount_rate(100).is_ok());
        assert!(validate_discount_rate(101).is_err());
        assert!(validate_discount_rate(-5).is_err());
    }

    #[test]
    fn test_validate_memo() {
        assert!(validate_memo("stock count correction").is_ok());
        assert!(validate_memo("   ").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "not-a-uuid").is_err());
    }

    #[test]
    fn test_valid_request_passes() {
        let req = request(
            vec![service_line(1)],
            vec![PaymentRequest {
                method: PaymentMethod::Card,
                amount: Money::from_minor(10_000),
            }],
        );
        assert!(validate_create_visit(&req).is_ok());
    }

    #[test]
    fn test_request_collects_all_errors() {
        let mut bad_line = service_line(0);
        bad_line.service_id = None;

        let req = CreateVisitRequest {
            customer_id: "".to_string(),
            visited_at: None,
            status: None,
            line_items: vec![bad_line],
            payments: vec![PaymentRequest {
                method: PaymentMethod::Cash,
                amount: Money::zero(),
            }],
        };

        let errors = validate_create_visit(&req).unwrap_err();
        // customer_id, missing service_id, bad qty, bad payment amount
        assert_eq!(errors.len(), 4);

        let joined = join_messages(&errors);
        assert!(joined.contains("customer_id is required"));
        assert!(joined.contains("line_items[0].service_id is required"));
        assert!(joined.contains("line_items[0].qty must be positive"));
        assert!(joined.contains("payments[0].amount must be positive"));
    }

    #[test]
    fn test_empty_line_items_rejected() {
        let req = request(vec![], vec![]);
        let errors = validate_create_visit(&req).unwrap_err();
        assert!(join_messages(&errors).contains("line_items is required"));
    }

    #[test]
    fn test_mismatched_item_reference_rejected() {
        let mut line = service_line(1);
        line.item_type = ItemType::Product;
        // product declared, only a service id supplied

        let req = request(vec![line], vec![]);
        let errors = validate_create_visit(&req).unwrap_err();
        assert!(join_messages(&errors).contains("line_items[0].product_id is required"));
    }
}
