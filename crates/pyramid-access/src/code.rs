//! Access codes and redemption results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A code that unlocks the ebook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCode {
    /// Code text as handed out
    pub code: String,
    /// Deactivated codes are refused
    #[serde(default = "active")]
    pub is_active: bool,
    /// Refused after this instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Unlimited when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    /// Successful redemptions so far
    #[serde(default)]
    pub used_count: u32,
}

fn active() -> bool {
    true
}

impl AccessCode {
    /// Active, unlimited, non-expiring code
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            is_active: true,
            expires_at: None,
            max_uses: None,
            used_count: 0,
        }
    }

    /// Limit the number of redemptions
    #[must_use]
    pub fn with_max_uses(mut self, max_uses: u32) -> Self {
        self.max_uses = Some(max_uses);
        self
    }

    /// Expire at an instant
    #[must_use]
    pub fn expiring(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Mark inactive
    #[must_use]
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether every use has been taken
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.used_count >= max)
    }

    /// Why this code cannot be redeemed at `now`, if it cannot.
    ///
    /// Checks run in a fixed order: active, expiry, usage limit.
    #[must_use]
    pub fn check(&self, now: DateTime<Utc>) -> Option<Rejection> {
        if !self.is_active {
            Some(Rejection::Inactive)
        } else if self.expires_at.is_some_and(|at| now > at) {
            Some(Rejection::Expired)
        } else if self.is_exhausted() {
            Some(Rejection::Exhausted)
        } else {
            None
        }
    }
}

/// One successful redemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    /// Code redeemed
    pub code: String,
    /// When
    pub redeemed_at: DateTime<Utc>,
}

/// Reason a redemption is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// No such code
    Invalid,
    /// Code switched off
    Inactive,
    /// Past `expires_at`
    Expired,
    /// `used_count` reached `max_uses`
    Exhausted,
}

impl Rejection {
    /// Message shown to the reader
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Invalid => "Invalid access code",
            Self::Inactive => "This code is no longer active",
            Self::Expired => "This code has expired",
            Self::Exhausted => "This code has reached its usage limit",
        }
    }
}

/// Outcome of a redemption attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemResult {
    /// Whether access was granted
    pub valid: bool,
    /// Reader-facing reason when refused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RedeemResult {
    /// Accepted
    #[inline]
    #[must_use]
    pub fn granted() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    /// Refused for `reason`
    #[inline]
    #[must_use]
    pub fn rejected(reason: Rejection) -> Self {
        Self {
            valid: false,
            error: Some(reason.message().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn checks_run_in_order() {
        let now = Utc::now();
        let code = AccessCode::new("PIVOT")
            .with_max_uses(1)
            .expiring(now - Duration::days(1))
            .deactivated();
        assert_eq!(code.check(now), Some(Rejection::Inactive));

        let code = AccessCode { is_active: true, ..code };
        assert_eq!(code.check(now), Some(Rejection::Expired));

        let code = AccessCode {
            expires_at: Some(now + Duration::days(1)),
            used_count: 1,
            ..code
        };
        assert_eq!(code.check(now), Some(Rejection::Exhausted));
        assert_eq!(AccessCode::new("OPEN").check(now), None);
    }

    #[test]
    fn expiry_instant_itself_is_still_valid() {
        let now = Utc::now();
        assert_eq!(AccessCode::new("EDGE").expiring(now).check(now), None);
    }

    #[test]
    fn rejected_result_carries_message() {
        assert_eq!(
            RedeemResult::rejected(Rejection::Exhausted),
            RedeemResult {
                valid: false,
                error: Some("This code has reached its usage limit".into()),
            }
        );
        let json = serde_json::to_string(&RedeemResult::granted()).unwrap();
        assert_eq!(json, r#"{"valid":true}"#);
    }

    #[test]
    fn json_defaults_to_active_unlimited() {
        let code: AccessCode = serde_json::from_str(r#"{"code":"BOOK"}"#).unwrap();
        assert_eq!(code, AccessCode::new("BOOK"));
    }
}
