//! Live phone lookup quota: sliding window per user, consumed only by live
//! calls that reached the provider.

mod common;

use async_trait::async_trait;
use chrono::Duration;
use common::{start_time, OTHER_REPORTER, REPORTER};
use scamdesk_core::{
    clock::{Clock, ManualClock},
    config::RateLimitConfig,
    error::{DeskError, DeskResult},
    lookup::{PhoneCheck, PhoneLookup, PhoneLookupResult, PhoneLookupService, PhoneLookupStatus},
    rate_limiter::RateLimiter,
    report::{NewReport, ReporterRole, Target},
    store::{CachedPhoneLookup, DeskStore},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Provider that counts calls and either answers or fails.
struct ScriptedPhone {
    calls: AtomicUsize,
    fail:  bool,
    name:  Option<String>,
}

impl ScriptedPhone {
    fn answering(name: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail:  false,
            name:  name.map(str::to_string),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail:  true,
            name:  None,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PhoneLookup for ScriptedPhone {
    async fn lookup(&self, _phone: &str) -> DeskResult<PhoneLookupResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DeskError::Lookup {
                service: "phone".into(),
                reason:  "HTTP 503".into(),
            });
        }
        Ok(PhoneLookupResult {
            status:    PhoneLookupStatus::Success,
            name:      self.name.clone(),
            carrier:   Some("Maxis".into()),
            is_spam:   false,
            spam_type: None,
        })
    }
}

struct Harness {
    store:   DeskStore,
    clock:   Arc<ManualClock>,
    limiter: Arc<RateLimiter>,
    service: PhoneLookupService,
}

fn harness(provider: Arc<ScriptedPhone>) -> Harness {
    common::init_logs();
    let store = DeskStore::in_memory().unwrap();
    store.migrate().unwrap();
    let clock = Arc::new(ManualClock::new(start_time()));
    let limiter = Arc::new(RateLimiter::new(&RateLimitConfig::default()));
    let service = PhoneLookupService::new(
        store.clone(),
        limiter.clone(),
        provider,
        clock.clone(),
        std::time::Duration::from_secs(2),
    );
    Harness {
        store,
        clock,
        limiter,
        service,
    }
}

// ── Limiter ───────────────────────────────────────────────────────

/// Two lookups fill the window; the wait counts down from the oldest.
#[test]
fn window_allows_max_then_blocks() {
    let limiter = RateLimiter::new(&RateLimitConfig::default());
    let t0 = start_time();

    assert!(limiter.check(REPORTER, t0).allowed);
    limiter.increment(REPORTER, t0);
    limiter.increment(REPORTER, t0 + Duration::hours(1));

    let decision = limiter.check(REPORTER, t0 + Duration::hours(2));
    assert!(!decision.allowed);
    assert_eq!(decision.retry_after, Duration::hours(3));
    assert_eq!(decision.retry_after_text(), "3h 1m");

    // Other users have their own window.
    assert!(limiter.check(OTHER_REPORTER, t0 + Duration::hours(2)).allowed);

    // The oldest stamp ages out after exactly five hours.
    assert!(limiter.check(REPORTER, t0 + Duration::hours(5)).allowed);
}

/// Checking never consumes quota.
#[test]
fn check_is_free() {
    let limiter = RateLimiter::new(&RateLimitConfig::default());
    let t0 = start_time();
    for _ in 0..10 {
        assert!(limiter.check(REPORTER, t0).allowed);
    }
}

/// A disabled limiter never blocks.
#[test]
fn disabled_limiter_allows_everything() {
    let limiter = RateLimiter::new(&RateLimitConfig {
        enabled: false,
        ..RateLimitConfig::default()
    });
    let t0 = start_time();
    for _ in 0..5 {
        limiter.increment(REPORTER, t0);
    }
    assert!(limiter.check(REPORTER, t0).allowed);
}

// ── Lookup service ────────────────────────────────────────────────

/// Live calls count; the third in the window is refused before the
/// provider is reached.
#[tokio::test]
async fn live_lookups_consume_quota() {
    let provider = ScriptedPhone::answering(None);
    let h = harness(provider.clone());

    assert!(matches!(h.service.check(REPORTER, "0111111111").await, PhoneCheck::Live(_)));
    assert!(matches!(h.service.check(REPORTER, "0122222222").await, PhoneCheck::Live(_)));
    match h.service.check(REPORTER, "0133333333").await {
        PhoneCheck::RateLimited { retry_after } => assert_eq!(retry_after, "5h 1m"),
        other => panic!("expected rate limit, got {other:?}"),
    }
    assert_eq!(provider.calls(), 2);

    h.clock.advance(Duration::hours(5));
    assert!(matches!(h.service.check(REPORTER, "0133333333").await, PhoneCheck::Live(_)));
}

/// A failing provider is "unavailable" and costs nothing.
#[tokio::test]
async fn failed_lookups_are_free() {
    let provider = ScriptedPhone::failing();
    let h = harness(provider.clone());

    for _ in 0..3 {
        match h.service.check(REPORTER, "0111111111").await {
            PhoneCheck::Unavailable { reason } => assert!(reason.contains("HTTP 503")),
            other => panic!("expected unavailable, got {other:?}"),
        }
    }
    assert_eq!(provider.calls(), 3);
    assert!(h.limiter.check(REPORTER, h.clock.now()).allowed);
}

/// A cached number is answered from the cache without quota or provider.
#[tokio::test]
async fn cached_lookup_skips_provider() {
    let provider = ScriptedPhone::answering(Some("Ah Chong"));
    let h = harness(provider.clone());
    let entry = CachedPhoneLookup {
        phone_number: "0111111111".into(),
        name:         Some("Ah Chong".into()),
        carrier:      None,
        is_spam:      true,
        spam_type:    Some("scam".into()),
        looked_up_at: start_time(),
    };
    h.store
        .save_phone_lookup(&entry, &serde_json::json!({}), OTHER_REPORTER)
        .unwrap();

    match h.service.check(REPORTER, "+60 11-1111 111").await {
        PhoneCheck::Cached(cached) => {
            assert_eq!(cached.name.as_deref(), Some("Ah Chong"));
            assert!(cached.is_spam);
        }
        other => panic!("expected cache hit, got {other:?}"),
    }
    assert_eq!(provider.calls(), 0);
}

/// A named live answer is cached, so asking again is free.
#[tokio::test]
async fn named_answer_is_cached() {
    let provider = ScriptedPhone::answering(Some("Ah Chong"));
    let h = harness(provider.clone());

    assert!(matches!(h.service.check(REPORTER, "0111111111").await, PhoneCheck::Live(_)));
    assert!(matches!(h.service.check(REPORTER, "0111111111").await, PhoneCheck::Cached(_)));
    assert!(matches!(h.service.check(REPORTER, "0111111111").await, PhoneCheck::Cached(_)));
    assert_eq!(provider.calls(), 1);
}

/// A number that already appears in a report is not looked up.
#[tokio::test]
async fn reported_number_is_skipped() {
    let provider = ScriptedPhone::answering(None);
    let h = harness(provider.clone());
    let report = NewReport {
        submitter_id: OTHER_REPORTER,
        title: "Fake loan".into(),
        description: "Asked for a processing fee".into(),
        reporter_role: ReporterRole::Victim,
        loss_amount: 300.0,
        target: Target::Phone {
            number:       "0111111111".into(),
            display_name: None,
        },
        evidence: Vec::new(),
        screenshots: vec!["f1".into()],
        linked_profile_id: None,
    };
    h.store.insert_report(&report, h.clock.now()).unwrap();

    for _ in 0..3 {
        assert_eq!(h.service.check(REPORTER, "011-1111111").await, PhoneCheck::Skipped);
    }
    assert_eq!(provider.calls(), 0);
    assert!(h.limiter.check(REPORTER, h.clock.now()).allowed);
}
