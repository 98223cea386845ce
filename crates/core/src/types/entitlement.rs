//! User entitlement record.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::types::id::UserId;

/// Length of one purchased subscription period.
pub const SUBSCRIPTION_PERIOD_MONTHS: u32 = 1;

/// A user's subscription entitlement as persisted in the `users` table.
///
/// Invariant: `subs` only becomes `true` after the payment processor has
/// confirmed a capture for a matching order. The entitlement is mutated
/// exclusively through the store adapter.
///
/// Field names match the external JSON contract (`subs`, `subs_expires_at`)
/// rather than Rust conventions, since clients consume this record verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct UserEntitlement {
    /// User identity, foreign to the external auth provider.
    pub id: UserId,
    /// Whether the subscription is currently active.
    pub subs: bool,
    /// When the purchased period ends. `None` until the first grant.
    pub subs_expires_at: Option<DateTime<Utc>>,
}

impl UserEntitlement {
    /// Expiry for a subscription period starting at `granted_at`.
    ///
    /// Saturates at the end of the month when the start date has no direct
    /// counterpart (e.g., Jan 31 -> Feb 28).
    #[must_use]
    pub fn period_end(granted_at: DateTime<Utc>) -> DateTime<Utc> {
        granted_at
            .checked_add_months(Months::new(SUBSCRIPTION_PERIOD_MONTHS))
            .unwrap_or(granted_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_period_end_adds_one_month() {
        let start = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).single().expect("valid date");
        let end = UserEntitlement::period_end(start);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 4, 15, 12, 0, 0).single().expect("valid date"));
    }

    #[test]
    fn test_period_end_clamps_short_months() {
        let start = Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).single().expect("valid date");
        let end = UserEntitlement::period_end(start);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 2, 28, 0, 0, 0).single().expect("valid date"));
    }

    #[test]
    fn test_serializes_external_field_names() {
        let record = UserEntitlement {
            id: UserId::new("u-123"),
            subs: true,
            subs_expires_at: None,
        };
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["id"], "u-123");
        assert_eq!(json["subs"], true);
        assert!(json["subs_expires_at"].is_null());
    }
}
