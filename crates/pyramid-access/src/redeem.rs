//! Code redemption

use crate::code::{RedeemResult, Redemption, Rejection};
use crate::error::AccessError;
use crate::store::CodeStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Redeems codes against a [`CodeStore`]
#[derive(Debug, Clone)]
pub struct AccessCodes {
    store: Arc<dyn CodeStore>,
}

impl AccessCodes {
    /// Service over `store`
    #[must_use]
    pub fn new(store: Arc<dyn CodeStore>) -> Self {
        Self { store }
    }

    /// Redeem `code` now
    ///
    /// # Errors
    /// Store failures only; refusals come back as `valid: false`
    pub async fn redeem(&self, code: &str) -> Result<RedeemResult, AccessError> {
        self.redeem_at(code, Utc::now()).await
    }

    /// Redeem `code` as of `now`.
    ///
    /// A refused code is left untouched. An accepted one gains exactly one
    /// use and one redemption entry.
    ///
    /// # Errors
    /// Store failures only; refusals come back as `valid: false`
    #[tracing::instrument(skip(self))]
    pub async fn redeem_at(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<RedeemResult, AccessError> {
        let code = code.trim();
        let Some(found) = self.store.find_code(code).await? else {
            tracing::info!("rejected unknown code");
            return Ok(RedeemResult::rejected(Rejection::Invalid));
        };
        if let Some(reason) = found.check(now) {
            tracing::info!(?reason, "rejected code");
            return Ok(RedeemResult::rejected(reason));
        }

        let redemption = Redemption {
            code: found.code.clone(),
            redeemed_at: now,
        };
        match self.store.record_redemption(&found.code, redemption).await {
            Ok(updated) => {
                tracing::info!(used = updated.used_count, "redeemed code");
                Ok(RedeemResult::granted())
            }
            Err(AccessError::LimitReached(_)) => {
                tracing::warn!("usage limit reached while recording");
                Ok(RedeemResult::rejected(Rejection::Exhausted))
            }
            Err(AccessError::UnknownCode(_)) => Ok(RedeemResult::rejected(Rejection::Invalid)),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::AccessCode;
    use crate::store::MemoryCodeStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn service(codes: Vec<AccessCode>) -> (Arc<MemoryCodeStore>, AccessCodes) {
        let store = Arc::new(MemoryCodeStore::new());
        for code in codes {
            store.upsert(code);
        }
        (store.clone(), AccessCodes::new(store))
    }

    #[tokio::test]
    async fn valid_code_counts_one_use() {
        let (store, codes) = service(vec![AccessCode::new("PIVOT").with_max_uses(5)]);

        let result = codes.redeem("  PIVOT ").await.unwrap();

        assert_eq!(result, RedeemResult::granted());
        let code = store.find_code("PIVOT").await.unwrap().unwrap();
        assert_eq!(code.used_count, 1);
        assert_eq!(store.redemptions_of("PIVOT").len(), 1);
    }

    #[tokio::test]
    async fn exhausted_code_is_not_incremented() {
        let mut code = AccessCode::new("FULL").with_max_uses(2);
        code.used_count = 2;
        let (store, codes) = service(vec![code]);

        let result = codes.redeem("FULL").await.unwrap();

        assert_eq!(
            result,
            RedeemResult {
                valid: false,
                error: Some("This code has reached its usage limit".into()),
            }
        );
        assert_eq!(store.find_code("FULL").await.unwrap().unwrap().used_count, 2);
        assert!(store.redemptions_of("FULL").is_empty());
    }

    #[tokio::test]
    async fn refusal_messages() {
        let now = Utc::now();
        let (_, codes) = service(vec![
            AccessCode::new("OFF").deactivated(),
            AccessCode::new("OLD").expiring(now - Duration::hours(1)),
        ]);

        let message = |r: RedeemResult| r.error.unwrap_or_default();
        assert_eq!(
            message(codes.redeem_at("NOPE", now).await.unwrap()),
            "Invalid access code"
        );
        assert_eq!(
            message(codes.redeem_at("OFF", now).await.unwrap()),
            "This code is no longer active"
        );
        assert_eq!(
            message(codes.redeem_at("OLD", now).await.unwrap()),
            "This code has expired"
        );
    }

    #[derive(Debug)]
    struct Offline;

    #[async_trait]
    impl CodeStore for Offline {
        async fn find_code(&self, _code: &str) -> Result<Option<AccessCode>, AccessError> {
            Err(AccessError::Backend("offline".into()))
        }

        async fn record_redemption(
            &self,
            _code: &str,
            _redemption: Redemption,
        ) -> Result<AccessCode, AccessError> {
            Err(AccessError::Backend("offline".into()))
        }
    }

    #[tokio::test]
    async fn store_failure_is_an_error_not_a_refusal() {
        let codes = AccessCodes::new(Arc::new(Offline));
        let err = codes.redeem("ANY").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
