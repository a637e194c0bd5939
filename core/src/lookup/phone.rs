//! Phone reputation lookups with cache, skip and quota policy.
//!
//! Order of checks for a number:
//!   1. cached result            -> `Cached`
//!   2. number already reported  -> `Skipped` (saves quota)
//!   3. user over quota          -> `RateLimited`
//!   4. live provider call       -> `Live` or `Unavailable`
//! Only a live call that returned an answer counts against the quota.

use super::{PhoneLookup, PhoneLookupResult, PhoneLookupStatus};
use crate::{
    clock::Clock,
    rate_limiter::RateLimiter,
    store::{CachedPhoneLookup, DeskStore},
    types::UserId,
};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PhoneCheck {
    Cached(CachedPhoneLookup),
    Skipped,
    RateLimited { retry_after: String },
    Live(PhoneLookupResult),
    Unavailable { reason: String },
}

/// Strip spaces, dashes and plus signs; `60…` becomes `0…`.
pub fn sanitize_phone(raw: &str) -> String {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '+'))
        .collect();
    match digits.strip_prefix("60") {
        Some(rest) => format!("0{rest}"),
        None => digits,
    }
}

pub struct PhoneLookupService {
    store:    DeskStore,
    limiter:  Arc<RateLimiter>,
    provider: Arc<dyn PhoneLookup>,
    clock:    Arc<dyn Clock>,
    timeout:  Duration,
}

impl PhoneLookupService {
    pub fn new(
        store: DeskStore,
        limiter: Arc<RateLimiter>,
        provider: Arc<dyn PhoneLookup>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            limiter,
            provider,
            clock,
            timeout,
        }
    }

    pub async fn check(&self, user_id: UserId, raw_phone: &str) -> PhoneCheck {
        let phone = sanitize_phone(raw_phone);

        match self.store.cached_phone_lookup(&phone) {
            Ok(Some(cached)) => return PhoneCheck::Cached(cached),
            Ok(None) => {}
            Err(e) => warn!("[PhoneLookup] cache read failed for {phone}: {e}"),
        }

        match self.store.phone_known(&phone) {
            Ok(true) => {
                info!("[PhoneLookup] {phone} already reported, skipping live lookup");
                return PhoneCheck::Skipped;
            }
            Ok(false) => {}
            Err(e) => warn!("[PhoneLookup] report check failed for {phone}: {e}"),
        }

        let decision = self.limiter.check(user_id, self.clock.now());
        if !decision.allowed {
            return PhoneCheck::RateLimited {
                retry_after: decision.retry_after_text(),
            };
        }

        let result = match tokio::time::timeout(self.timeout, self.provider.lookup(&phone)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!("[PhoneLookup] provider failed for {phone}: {e}");
                return PhoneCheck::Unavailable {
                    reason: e.to_string(),
                };
            }
            Err(_) => {
                warn!("[PhoneLookup] provider timed out for {phone}");
                return PhoneCheck::Unavailable {
                    reason: "lookup timed out".into(),
                };
            }
        };

        let now = self.clock.now();
        if result.status == PhoneLookupStatus::Success && result.name.is_some() {
            let entry = CachedPhoneLookup {
                phone_number: phone.clone(),
                name:         result.name.clone(),
                carrier:      result.carrier.clone(),
                is_spam:      result.is_spam,
                spam_type:    result.spam_type.clone(),
                looked_up_at: now,
            };
            let raw = serde_json::to_value(&result).unwrap_or(serde_json::Value::Null);
            if let Err(e) = self.store.save_phone_lookup(&entry, &raw, user_id) {
                warn!("[PhoneLookup] cache write failed for {phone}: {e}");
            }
        }
        self.limiter.increment(user_id, now);
        PhoneCheck::Live(result)
    }
}
