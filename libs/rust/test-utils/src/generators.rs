//! Shared proptest generators.

use proptest::prelude::*;
use serde_json::{Map, Value};

/// Key IDs as issuers tend to format them.
pub fn kid_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{3,10}-[0-9]{4}",
        "[A-Za-z0-9_-]{8,32}",
        "[0-9a-f]{40}",
    ]
}

/// Flat claim sets with string and integer values.
///
/// Registered claim names are excluded so the sets never trip time or
/// audience checks.
pub fn claims_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(
        "x_[a-z]{1,12}",
        prop_oneof![
            "[ -~]{0,32}".prop_map(Value::from),
            any::<i32>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
        ],
        0..8,
    )
    .prop_map(|claims| claims.into_iter().collect())
}

/// Strings that are not three dot-separated segments.
pub fn malformed_token_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z0-9_-]{0,64}",
        "[A-Za-z0-9_-]{1,32}\\.[A-Za-z0-9_-]{1,32}",
        "[A-Za-z0-9_-]{1,16}(\\.[A-Za-z0-9_-]{1,16}){3,5}",
    ]
}
