//! Rate limiter behaviour through the public actor handle:
//! quota tiers, window expiry, concurrency and persistence.

use std::sync::Arc;

use chrono::Utc;
use edge_ingest::rate_limit::{
    FileStore, LimitTier, LimiterError, ManualClock, MemoryStore, RateLimiterBuilder, RateLimiterConfig,
    RateLimiterHandle, SystemTag,
};
use proptest::prelude::*;
use tempfile::TempDir;

const ONE_HOUR_MS: u64 = 3_600_000;

fn scenario_config() -> RateLimiterConfig {
    // global=1000, browser=400, convex=300, worker=300, per_trace=100, window=1h
    let config = RateLimiterConfig::default();
    assert_eq!(config.global_limit, 1000);
    assert_eq!(config.per_trace_limit, 100);
    assert_eq!(config.window_ms, ONE_HOUR_MS);
    config
}

#[tokio::test]
async fn test_sequential_requests_on_one_trace() {
    let limiter = RateLimiterHandle::spawn(scenario_config());

    for i in 0..150u64 {
        let result = limiter.check(SystemTag::browser(), "t1").await.unwrap();
        if i < 100 {
            assert!(result.allowed, "request {} should be allowed", i + 1);
            assert_eq!(result.remaining_quota, 99 - i);
            assert!(result.reason.is_none());
        } else {
            assert!(!result.allowed, "request {} should be denied", i + 1);
            assert_eq!(result.remaining_quota, 0);
            assert_eq!(
                result.reason.as_deref(),
                Some("Per-trace rate limit exceeded for t1")
            );
        }
    }

    let status = limiter.status().await.unwrap();
    assert_eq!(status.current_state.global_current, 100);
    assert_eq!(status.current_state.trace_count("t1"), 100);
}

#[tokio::test]
async fn test_system_quota_caps_browser_traffic() {
    let config = scenario_config();
    let limiter = RateLimiterHandle::spawn(config.clone());

    let mut allowed = 0;
    for trace in 0..120 {
        let trace_id = format!("trace-{}", trace);
        for _ in 0..10 {
            let result = limiter
                .check(SystemTag::browser(), trace_id.clone())
                .await
                .unwrap();
            if result.allowed {
                allowed += 1;
            } else {
                assert_eq!(result.remaining_quota, 0);
                assert_eq!(result.tier, Some(LimitTier::System));
                assert!(result
                    .reason
                    .unwrap()
                    .contains("browser system rate limit exceeded"));
            }
        }
    }

    assert_eq!(allowed, 400);
    let status = limiter.status().await.unwrap();
    assert!(status.current_state.global_current <= 400);
    assert_eq!(
        status.current_state.system_count(&SystemTag::browser()),
        400
    );
    assert!(status.current_state.is_consistent(&config));
}

#[tokio::test]
async fn test_global_limit_rejects_everything_once_full() {
    let config = scenario_config();
    let limiter = RateLimiterHandle::spawn(config.clone());

    let fill = [
        (SystemTag::browser(), 400),
        (SystemTag::convex(), 300),
        (SystemTag::worker(), 300),
    ];
    for (system, count) in fill {
        for i in 0..count {
            let trace_id = format!("{}-{}", system, i / 50);
            let result = limiter.check(system.clone(), trace_id).await.unwrap();
            assert!(result.allowed);
        }
    }

    let status = limiter.status().await.unwrap();
    assert_eq!(status.current_state.global_current, 1000);

    let result = limiter.check(SystemTag::manual(), "fresh").await.unwrap();
    assert!(!result.allowed);
    assert_eq!(result.reason.as_deref(), Some("Global rate limit exceeded"));
    assert_eq!(result.remaining_quota, 0);

    // Global is evaluated before the system tier, even for an exhausted system
    let result = limiter.check(SystemTag::browser(), "fresh").await.unwrap();
    assert_eq!(result.reason.as_deref(), Some("Global rate limit exceeded"));

    let after = limiter.status().await.unwrap();
    assert_eq!(after.current_state, status.current_state);
}

#[tokio::test]
async fn test_window_expiry_resets_counters() {
    let config = scenario_config();
    let clock = ManualClock::new(Utc::now());
    let limiter = RateLimiterBuilder::new(config.clone())
        .clock(Arc::new(clock.clone()))
        .spawn();

    for _ in 0..100 {
        assert!(limiter.check(SystemTag::worker(), "t1").await.unwrap().allowed);
    }
    assert!(!limiter.check(SystemTag::worker(), "t1").await.unwrap().allowed);

    // Just before expiry the window is still closed for t1
    clock.advance_ms(ONE_HOUR_MS - 1);
    assert!(!limiter.check(SystemTag::worker(), "t1").await.unwrap().allowed);

    clock.advance_ms(1);
    let result = limiter.check(SystemTag::worker(), "t1").await.unwrap();
    assert!(result.allowed);
    assert_eq!(result.remaining_quota, config.per_trace_limit - 1);

    let status = limiter.status().await.unwrap();
    assert_eq!(status.current_state.window_start, clock_now(&clock));
    assert_eq!(status.current_state.global_current, 1);
    assert_eq!(status.current_state.trace_counts.len(), 1);
    assert_eq!(status.window_remaining_ms, ONE_HOUR_MS);
}

fn clock_now(clock: &ManualClock) -> chrono::DateTime<Utc> {
    use edge_ingest::rate_limit::Clock;
    clock.now()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checks_never_over_admit() {
    let config = scenario_config();
    let limiter = RateLimiterHandle::spawn(config.clone());

    let tasks: Vec<_> = (0..250)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.check(SystemTag::worker(), "burst").await })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let allowed = results.iter().filter(|r| r.allowed).count();
    assert_eq!(allowed, 100);

    for denied in results.iter().filter(|r| !r.allowed) {
        assert_eq!(denied.remaining_quota, 0);
        assert_eq!(
            denied.reason.as_deref(),
            Some("Per-trace rate limit exceeded for burst")
        );
    }

    // Each remaining_quota value from 99 down to 0 is handed out exactly once
    let mut remaining: Vec<u64> = results
        .iter()
        .filter(|r| r.allowed)
        .map(|r| r.remaining_quota)
        .collect();
    remaining.sort_unstable();
    assert_eq!(remaining, (0..100).collect::<Vec<u64>>());

    let status = limiter.status().await.unwrap();
    assert_eq!(status.current_state.trace_count("burst"), 100);
    assert!(status.current_state.is_consistent(&config));
}

#[tokio::test]
async fn test_status_matches_admissions() {
    let store = MemoryStore::new();
    let limiter = RateLimiterBuilder::new(scenario_config())
        .store(Arc::new(store.clone()))
        .spawn();

    let admissions = [
        (SystemTag::browser(), "a"),
        (SystemTag::browser(), "a"),
        (SystemTag::convex(), "b"),
        (SystemTag::worker(), "c"),
        (SystemTag::new("mobile"), "a"),
    ];
    for (system, trace) in &admissions {
        assert!(limiter.check(system.clone(), *trace).await.unwrap().allowed);
    }

    let status = limiter.status().await.unwrap();
    let state = &status.current_state;
    assert_eq!(state.global_current, 5);
    assert_eq!(state.system_count(&SystemTag::browser()), 2);
    assert_eq!(state.system_count(&SystemTag::convex()), 1);
    assert_eq!(state.system_count(&SystemTag::worker()), 1);
    assert_eq!(state.system_count(&SystemTag::new("mobile")), 1);
    assert_eq!(state.trace_count("a"), 3);
    assert_eq!(state.trace_count("b"), 1);
    assert_eq!(state.trace_count("c"), 1);

    // Every admission was written through before it was acknowledged
    assert_eq!(store.snapshot().await.as_ref(), Some(state));
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("limiter-state.json");
    let config = scenario_config();

    let first = RateLimiterBuilder::new(config.clone())
        .store(Arc::new(FileStore::new(&path)))
        .spawn();
    for _ in 0..5 {
        first.check(SystemTag::convex(), "t1").await.unwrap();
    }
    drop(first);

    let second = RateLimiterBuilder::new(config)
        .store(Arc::new(FileStore::new(&path)))
        .spawn();

    let status = second.status().await.unwrap();
    assert_eq!(status.current_state.global_current, 5);
    assert_eq!(status.current_state.trace_count("t1"), 5);

    let result = second.check(SystemTag::convex(), "t1").await.unwrap();
    assert!(result.allowed);
    assert_eq!(result.remaining_quota, 94);
}

#[tokio::test]
async fn test_expired_state_on_disk_is_reset_on_first_check() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("limiter-state.json");
    let config = scenario_config();
    let clock = ManualClock::new(Utc::now());

    let first = RateLimiterBuilder::new(config.clone())
        .store(Arc::new(FileStore::new(&path)))
        .clock(Arc::new(clock.clone()))
        .spawn();
    for _ in 0..100 {
        first.check(SystemTag::browser(), "t1").await.unwrap();
    }
    drop(first);

    clock.advance_ms(ONE_HOUR_MS * 2);
    let second = RateLimiterBuilder::new(config)
        .store(Arc::new(FileStore::new(&path)))
        .clock(Arc::new(clock.clone()))
        .spawn();

    let result = second.check(SystemTag::browser(), "t1").await.unwrap();
    assert!(result.allowed);
    assert_eq!(result.remaining_quota, 99);
}

#[tokio::test]
async fn test_corrupt_state_file_fails_closed_until_repaired() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("limiter-state.json");
    tokio::fs::write(&path, b"{not json").await.unwrap();

    let limiter = RateLimiterBuilder::new(scenario_config())
        .store(Arc::new(FileStore::new(&path)))
        .spawn();

    for _ in 0..2 {
        let err = limiter.check(SystemTag::browser(), "t1").await.unwrap_err();
        assert!(matches!(err, LimiterError::Persistence(_)));
    }
    let err = limiter.status().await.unwrap_err();
    assert!(matches!(err, LimiterError::Persistence(_)));

    // Nothing was written over the unreadable state
    assert_eq!(tokio::fs::read(&path).await.unwrap(), b"{not json");

    tokio::fs::remove_file(&path).await.unwrap();
    let result = limiter.check(SystemTag::browser(), "t1").await.unwrap();
    assert!(result.allowed);
    assert_eq!(result.remaining_quota, 99);
}

fn tiny_config() -> RateLimiterConfig {
    RateLimiterConfig {
        global_limit: 12,
        per_trace_limit: 3,
        window_ms: 10_000,
        default_system_quota: 4,
        ..Default::default()
    }
    .with_system_quota(SystemTag::browser(), 6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_counters_stay_consistent(
        ops in prop::collection::vec((0usize..4, 0usize..5, 0u64..4_000), 1..60)
    ) {
        let systems = [
            SystemTag::browser(),
            SystemTag::convex(),
            SystemTag::worker(),
            SystemTag::manual(),
        ];
        let config = tiny_config();
        let runtime = tokio::runtime::Runtime::new().unwrap();

        runtime.block_on(async {
            let clock = ManualClock::new(Utc::now());
            let limiter = RateLimiterBuilder::new(config.clone())
                .clock(Arc::new(clock.clone()))
                .spawn();

            for (system, trace, advance_ms) in ops {
                clock.advance_ms(advance_ms);
                let trace_id = format!("t{}", trace);
                let before = limiter.status().await.unwrap().current_state;
                let result = limiter.check(systems[system].clone(), trace_id.clone()).await.unwrap();
                let after = limiter.status().await.unwrap().current_state;

                prop_assert!(after.is_consistent(&config));
                if result.allowed {
                    prop_assert_eq!(
                        result.remaining_quota,
                        config.per_trace_limit - after.trace_count(&trace_id)
                    );
                } else {
                    prop_assert_eq!(result.remaining_quota, 0);
                    // Denials never touch the counters of an unexpired window
                    if before.window_start == after.window_start {
                        prop_assert_eq!(&before, &after);
                    }
                }
            }
            Ok(())
        })?;
    }
}
