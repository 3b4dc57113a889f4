//! Admin-driven order and payment status rules.
//!
//! ```text
//! order:   pending ──► processing ──► shipped ──► completed
//!             │            │
//!             └────────────┴──► cancelled
//!
//! payment: pending ──► paid ──► refunded
//! ```
//!
//! Setting a status to its current value is always allowed and changes nothing.

use common::{OrderStatus, PaymentStatus};

use crate::DomainError;

/// Forward-only status changes.
pub trait StatusTransition: Copy + PartialEq + std::fmt::Display {
    /// Returns true if moving from `self` to `next` is a real, allowed change.
    fn can_transition_to(&self, next: Self) -> bool;

    /// Validates a change, treating a same-value update as a no-op.
    fn transition_to(self, next: Self) -> Result<Self, DomainError> {
        if self == next || self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl StatusTransition for OrderStatus {
    fn can_transition_to(&self, next: Self) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Completed)
        )
    }
}

impl StatusTransition for PaymentStatus {
    fn can_transition_to(&self, next: Self) -> bool {
        use PaymentStatus::*;
        matches!((*self, next), (Pending, Paid) | (Paid, Refunded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_forward_path() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn test_cancel_only_before_shipping() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for next in OrderStatus::ALL {
            assert!(!OrderStatus::Completed.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Processing));

        let err = OrderStatus::Pending
            .transition_to(OrderStatus::Completed)
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition { ref from, ref to } if from == "pending" && to == "completed"
        ));
    }

    #[test]
    fn test_same_status_is_noop() {
        assert_eq!(
            OrderStatus::Completed.transition_to(OrderStatus::Completed).unwrap(),
            OrderStatus::Completed
        );
        assert_eq!(
            PaymentStatus::Refunded.transition_to(PaymentStatus::Refunded).unwrap(),
            PaymentStatus::Refunded
        );
    }

    #[test]
    fn test_payment_rules() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Paid.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Paid));
    }
}
