//! Stored idempotency records and ledger lookup outcomes.

use chrono::{DateTime, Utc};

use super::{PurchaseKey, RequestDigest};

/// Durable idempotency row: a completed purchase response bound to its key
/// and request digest until `expires_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdemRecord {
    pub key: PurchaseKey,
    pub digest: RequestDigest,
    /// Response body replayed verbatim on retry.
    pub response: serde_json::Value,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl IdemRecord {
    /// Whether the record has outlived its TTL at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Outcome of reserving an idempotency key.
#[derive(Debug, Clone, PartialEq)]
pub enum BeginOutcome {
    /// No live record; the caller owns the key for this attempt.
    Reserved,
    /// A live record exists. The caller must compare digests: matching means
    /// replay the stored response verbatim, differing means reject.
    Existing(IdemRecord),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::idempotency::{ClientKey, canonicalize_and_hash};
    use crate::domain::DomainName;
    use chrono::Duration;
    use serde_json::json;

    fn record(expires_at: DateTime<Utc>) -> IdemRecord {
        let domain = DomainName::parse("example.com").expect("valid name");
        IdemRecord {
            key: PurchaseKey::for_purchase(&domain, &ClientKey::random()),
            digest: canonicalize_and_hash(&json!({"domain": "example.com"})).expect("digest"),
            response: json!({"order_id": "PB-1"}),
            expires_at,
            created_at: expires_at - Duration::hours(1),
        }
    }

    #[test]
    fn live_record_is_not_expired() {
        let now = Utc::now();
        assert!(!record(now + Duration::minutes(5)).is_expired(now));
    }

    #[test]
    fn record_expires_at_the_boundary() {
        let now = Utc::now();
        assert!(record(now).is_expired(now));
        assert!(record(now - Duration::seconds(1)).is_expired(now));
    }
}
