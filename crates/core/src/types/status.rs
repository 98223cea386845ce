//! Status enums for the checkout flow.

use serde::{Deserialize, Serialize};

/// Processor-side order status.
///
/// Maps to the PayPal Orders API status values. The order is mutated only by
/// the processor; locally this is read off the wire, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Created,
    Approved,
    Captured,
    Failed,
    /// Statuses this system does not act on (SAVED, PAYER_ACTION_REQUIRED, ...).
    #[serde(other)]
    Other,
}

/// Phase of a checkout attempt in the durable capture log.
///
/// `capture_requested -> captured_grant_pending -> entitlement_granted`,
/// with `capture_failed` as the processor-rejection exit. A row stuck in
/// `captured_grant_pending` means money moved but the grant did not land;
/// the attempt needs reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "capture_phase", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum CapturePhase {
    /// Capture request submitted to the processor, outcome unknown.
    CaptureRequested,
    /// Processor confirmed the capture; entitlement grant not yet recorded.
    CapturedGrantPending,
    /// Terminal success: capture confirmed and entitlement granted.
    EntitlementGranted,
    /// Terminal failure: processor rejected the capture. No money moved.
    CaptureFailed,
}

impl CapturePhase {
    /// True when money has been taken from the payer.
    #[must_use]
    pub const fn payment_captured(&self) -> bool {
        matches!(self, Self::CapturedGrantPending | Self::EntitlementGranted)
    }

    /// True when this phase is an end state for the attempt.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::EntitlementGranted | Self::CaptureFailed)
    }
}

impl std::fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CaptureRequested => write!(f, "capture_requested"),
            Self::CapturedGrantPending => write!(f, "captured_grant_pending"),
            Self::EntitlementGranted => write!(f, "entitlement_granted"),
            Self::CaptureFailed => write!(f, "capture_failed"),
        }
    }
}

impl std::str::FromStr for CapturePhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "capture_requested" => Ok(Self::CaptureRequested),
            "captured_grant_pending" => Ok(Self::CapturedGrantPending),
            "entitlement_granted" => Ok(Self::EntitlementGranted),
            "capture_failed" => Ok(Self::CaptureFailed),
            _ => Err(format!("invalid capture phase: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_deserializes_processor_values() {
        let status: OrderStatus = serde_json::from_str("\"CREATED\"").expect("parse");
        assert_eq!(status, OrderStatus::Created);

        let status: OrderStatus = serde_json::from_str("\"COMPLETED\"").expect("parse");
        assert_eq!(status, OrderStatus::Other);
    }

    #[test]
    fn test_capture_phase_roundtrip() {
        for phase in [
            CapturePhase::CaptureRequested,
            CapturePhase::CapturedGrantPending,
            CapturePhase::EntitlementGranted,
            CapturePhase::CaptureFailed,
        ] {
            let s = phase.to_string();
            assert_eq!(s.parse::<CapturePhase>(), Ok(phase));
        }
    }

    #[test]
    fn test_payment_captured_marks_both_post_capture_phases() {
        assert!(CapturePhase::CapturedGrantPending.payment_captured());
        assert!(CapturePhase::EntitlementGranted.payment_captured());
        assert!(!CapturePhase::CaptureRequested.payment_captured());
        assert!(!CapturePhase::CaptureFailed.payment_captured());
    }
}
