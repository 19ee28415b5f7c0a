//! Property-based tests for backend-kit.
//!
//! These tests verify universal properties across all inputs using proptest.

use std::time::Duration;

use backend_kit::cache::{GovernorConfig, GovernorState, LinkEvent, LinkState, transition};
use backend_kit::logging::{MASK, SENSITIVE_KEYS, sanitize_metadata};
use backend_kit::shape::{add_prefix_to_keys, omit, pick, remove_prefix_from_keys};
use proptest::prelude::*;
use serde_json::Value;
use test_utils::fixtures::{SampleSession, fast_cache_config, memory_connection, memory_store};
use test_utils::{
    cache_key_strategy, failure_event_strategy, json_object_strategy, json_value_strategy,
    link_event_sequence_strategy, list_values_strategy, max_retries_strategy, prefix_strategy,
};

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

fn started() -> GovernorState {
    GovernorState {
        link: LinkState::Connecting,
        current: 0,
    }
}

// The counter equals the failures seen since the last Connect.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_counter_tracks_failures_since_connect(events in link_event_sequence_strategy(40)) {
        let config = GovernorConfig::default().with_max_retries(u32::MAX);
        let mut state = started();
        let mut expected = 0u32;

        for event in &events {
            let (next, effects) = transition(&state, event, &config);
            match event {
                LinkEvent::Connect => {
                    expected = 0;
                    prop_assert_eq!(next.link, LinkState::Connected);
                    prop_assert!(effects.iter().all(|e| matches!(e, backend_kit::cache::Effect::CancelTimeout)));
                }
                LinkEvent::End => prop_assert!(effects.is_empty()),
                LinkEvent::Reconnecting | LinkEvent::Error(_) => expected += 1,
            }
            state = next;
            prop_assert_eq!(state.current, expected);
        }
    }

    #[test]
    fn prop_exactly_one_force_close_at_budget(
        max in max_retries_strategy(),
        failures in prop::collection::vec(failure_event_strategy(), 1..16),
    ) {
        let config = GovernorConfig::default().with_max_retries(max);
        let mut state = started();

        for (i, event) in failures.iter().enumerate() {
            let (next, effects) = transition(&state, event, &config);
            let count = u32::try_from(i + 1).unwrap();
            let force_closes = effects
                .iter()
                .filter(|e| matches!(e, backend_kit::cache::Effect::ScheduleForceClose(_)))
                .count();
            prop_assert_eq!(force_closes == 1, count >= max);
            state = next;
        }
    }
}

// Handles survive below the budget and are dropped at it.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_handle_survives_below_budget(
        max in max_retries_strategy(),
        failures in prop::collection::vec(failure_event_strategy(), 0..8),
    ) {
        let runtime = paused_runtime();
        let (kept, connected, disconnects) = runtime.block_on(async {
            let (conn, connector) = memory_connection(fast_cache_config(max));
            conn.initialize();
            settle().await;

            for event in failures.iter().take(usize::try_from(max - 1).unwrap()) {
                conn.notify(event.clone());
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
            (conn.has_handle(), conn.is_connected(), connector.disconnects())
        });

        prop_assert!(kept);
        prop_assert!(connected);
        prop_assert_eq!(disconnects, 0);
    }

    #[test]
    fn prop_budget_exhaustion_closes_once(
        max in max_retries_strategy(),
        failures in prop::collection::vec(failure_event_strategy(), 8),
    ) {
        let runtime = paused_runtime();
        let (kept, connected, disconnects, current) = runtime.block_on(async {
            let (conn, connector) = memory_connection(fast_cache_config(max));
            conn.initialize();
            settle().await;

            for event in failures.iter().take(usize::try_from(max).unwrap()) {
                conn.notify(event.clone());
            }
            tokio::time::sleep(Duration::from_millis(1500)).await;
            (conn.has_handle(), conn.is_connected(), connector.disconnects(), conn.retry_info().current)
        });

        prop_assert!(!kept);
        prop_assert!(!connected);
        prop_assert_eq!(disconnects, 1);
        prop_assert_eq!(current, 0);
    }

    #[test]
    fn prop_reset_retry_count_zeroes(
        failures in prop::collection::vec(failure_event_strategy(), 0..6),
    ) {
        let runtime = paused_runtime();
        let current = runtime.block_on(async {
            let (conn, _connector) = memory_connection(fast_cache_config(10));
            conn.initialize();
            settle().await;
            for event in failures {
                conn.notify(event);
            }
            conn.reset_retry_count();
            conn.retry_info().current
        });
        prop_assert_eq!(current, 0);
    }
}

// Store helpers behave like the values they wrap.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_set_get_round_trip(key in cache_key_strategy(), value in json_value_strategy()) {
        let loaded: Option<Value> = tokio_test::block_on(async {
            let (store, _connector) = memory_store();
            settle_real().await;
            store.set(&key, &value, None).await.unwrap();
            store.get(&key).await.unwrap()
        });
        prop_assert_eq!(loaded, Some(value));
    }

    #[test]
    fn prop_never_set_key_is_none(key in cache_key_strategy()) {
        let loaded: Option<Value> = tokio_test::block_on(async {
            let (store, _connector) = memory_store();
            settle_real().await;
            store.get(&key).await.unwrap()
        });
        prop_assert!(loaded.is_none());
    }

    #[test]
    fn prop_push_preserves_order(key in cache_key_strategy(), values in list_values_strategy()) {
        let stored = tokio_test::block_on(async {
            let (store, _connector) = memory_store();
            settle_real().await;
            let len = store.push_to_list(&key, &values).await.unwrap();
            assert_eq!(len, values.len() as u64);
            store.list_all(&key).await.unwrap()
        });
        prop_assert_eq!(stored, values);
    }

    #[test]
    fn prop_increment_counts_up(key in cache_key_strategy(), n in 1usize..20) {
        let (results, ttl) = tokio_test::block_on(async {
            let (store, _connector) = memory_store();
            settle_real().await;
            let mut results = Vec::new();
            for _ in 0..n {
                results.push(store.increment(&key).await.unwrap());
            }
            let ttl = store.connection().link().unwrap().ttl(&key).await.unwrap();
            (results, ttl)
        });

        let expected: Vec<i64> = (1..=i64::try_from(n).unwrap()).collect();
        prop_assert_eq!(results, expected);
        prop_assert!((59..=60).contains(&ttl));
    }
}

async fn settle_real() {
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[test]
fn test_typed_session_round_trip() {
    let session = SampleSession::admin();
    let loaded: Option<SampleSession> = tokio_test::block_on(async {
        let (store, _connector) = memory_store();
        settle_real().await;
        store.set("session:user-1", &session, Some(Duration::from_secs(300))).await.unwrap();
        store.get("session:user-1").await.unwrap()
    });
    assert_eq!(loaded, Some(session));
}

// Pure reshaping helpers.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_prefix_round_trip(obj in json_object_strategy(), prefix in prefix_strategy()) {
        let prefixed = add_prefix_to_keys(&obj, &prefix, &[]);
        prop_assert!(prefixed.keys().all(|k| k.starts_with(&prefix)));
        prop_assert_eq!(remove_prefix_from_keys(&prefixed, &prefix), obj);
    }

    #[test]
    fn prop_pick_and_omit_partition(obj in json_object_strategy(), take in 0usize..8) {
        let fields: Vec<&str> = obj.keys().take(take).map(String::as_str).collect();
        let mut merged = pick(&fields, &obj);
        merged.extend(omit(&fields, &obj));

        prop_assert_eq!(pick(&fields, &obj).len(), fields.len());
        prop_assert_eq!(merged, obj);
    }

    #[test]
    fn prop_sanitize_never_leaks(obj in json_object_strategy(), secret in "[a-z]{1,12}") {
        let mut obj = obj;
        for key in SENSITIVE_KEYS {
            obj.insert(key.to_string(), Value::String(secret.clone()));
        }
        let clean = sanitize_metadata(&Value::Object(obj));

        for key in SENSITIVE_KEYS {
            prop_assert_eq!(&clean[key], &Value::String(MASK.to_string()));
        }
        prop_assert_eq!(sanitize_metadata(&clean), clean);
    }
}
