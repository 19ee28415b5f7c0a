//! Shared proptest generators.

use backend_kit::cache::LinkEvent;
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Generate cache keys such as `session:ab12`.
pub fn cache_key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}(:[a-z0-9_-]{1,12}){0,2}"
}

/// Generate a retry budget.
pub fn max_retries_strategy() -> impl Strategy<Value = u32> {
    1u32..=8
}

/// Generate an event that draws from the retry budget.
pub fn failure_event_strategy() -> impl Strategy<Value = LinkEvent> {
    prop_oneof![
        Just(LinkEvent::Reconnecting),
        "[a-z ]{1,20}".prop_map(LinkEvent::Error),
    ]
}

/// Generate any link event.
pub fn link_event_strategy() -> impl Strategy<Value = LinkEvent> {
    prop_oneof![
        3 => failure_event_strategy(),
        1 => Just(LinkEvent::Connect),
        1 => Just(LinkEvent::End),
    ]
}

/// Generate a sequence of link events.
pub fn link_event_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<LinkEvent>> {
    prop::collection::vec(link_event_strategy(), 0..=max_len)
}

/// Generate list elements.
pub fn list_values_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zA-Z0-9 ]{0,16}", 1..20)
}

/// Generate arbitrary JSON values, nested up to three levels.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 _@.-]{0,24}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,10}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generate flat JSON objects.
pub fn json_object_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z][a-zA-Z_]{0,10}", json_value_strategy(), 0..8)
        .prop_map(|m| m.into_iter().collect())
}

/// Generate key prefixes.
pub fn prefix_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,5}_"
}
