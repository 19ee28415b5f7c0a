//! Object reshaping and id helpers.

use mongodb::bson::Uuid;
use mongodb::bson::oid::ObjectId;
use rand::Rng;
use serde_json::{Map, Value};

use crate::error::{KitError, KitResult};

/// Prefix every key except those in `excluded`.
///
/// ```
/// use backend_kit::shape::add_prefix_to_keys;
/// use serde_json::json;
///
/// let obj = json!({"id": 1, "name": "ana"});
/// let prefixed = add_prefix_to_keys(obj.as_object().unwrap(), "user_", &["id"]);
/// assert_eq!(serde_json::Value::Object(prefixed), json!({"id": 1, "user_name": "ana"}));
/// ```
#[must_use]
pub fn add_prefix_to_keys(obj: &Map<String, Value>, prefix: &str, excluded: &[&str]) -> Map<String, Value> {
    obj.iter()
        .map(|(key, value)| {
            let key = if excluded.contains(&key.as_str()) {
                key.clone()
            } else {
                format!("{prefix}{key}")
            };
            (key, value.clone())
        })
        .collect()
}

/// Strip `prefix` from the keys that start with it; other keys are kept.
#[must_use]
pub fn remove_prefix_from_keys(obj: &Map<String, Value>, prefix: &str) -> Map<String, Value> {
    obj.iter()
        .map(|(key, value)| {
            let key = key.strip_prefix(prefix).unwrap_or(key).to_string();
            (key, value.clone())
        })
        .collect()
}

/// Keep only `fields`.
#[must_use]
pub fn pick(fields: &[&str], obj: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|field| obj.get(*field).map(|value| ((*field).to_string(), value.clone())))
        .collect()
}

/// Drop `fields`.
#[must_use]
pub fn omit(fields: &[&str], obj: &Map<String, Value>) -> Map<String, Value> {
    obj.iter()
        .filter(|(key, _)| !fields.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Millisecond timestamp followed by a number in `0..999`.
///
/// Not unique under load; use it for display ids only.
#[must_use]
pub fn random_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..999);
    format!("{millis}{suffix}")
}

/// Parse a 24-character hex object id.
///
/// # Errors
///
/// Returns [`KitError::InvalidInput`] for malformed ids.
pub fn to_object_id(id: &str) -> KitResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|e| KitError::invalid_input(format!("invalid object id {id:?}: {e}")))
}

/// Parse a hyphenated UUID into the document-store representation.
///
/// # Errors
///
/// Returns [`KitError::InvalidInput`] for malformed ids.
pub fn to_uuid(id: &str) -> KitResult<Uuid> {
    Uuid::parse_str(id).map_err(|e| KitError::invalid_input(format!("invalid uuid {id:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_prefix_round_trip() {
        let obj = map(json!({"id": 1, "name": "ana", "age": 30}));
        let prefixed = add_prefix_to_keys(&obj, "usr_", &["id"]);
        assert_eq!(Value::Object(prefixed.clone()), json!({"id": 1, "usr_name": "ana", "usr_age": 30}));
        assert_eq!(remove_prefix_from_keys(&prefixed, "usr_"), obj);
    }

    #[test]
    fn test_remove_prefix_keeps_other_keys() {
        let obj = map(json!({"p_a": 1, "b": 2}));
        assert_eq!(Value::Object(remove_prefix_from_keys(&obj, "p_")), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_pick_and_omit() {
        let obj = map(json!({"id": 1, "name": "ana", "password": "x"}));
        assert_eq!(Value::Object(pick(&["id", "name", "missing"], &obj)), json!({"id": 1, "name": "ana"}));
        assert_eq!(Value::Object(omit(&["password"], &obj)), json!({"id": 1, "name": "ana"}));
        assert!(pick(&[], &obj).is_empty());
        assert_eq!(omit(&[], &obj), obj);
    }

    #[test]
    fn test_random_id_shape() {
        let id = random_id();
        assert!(id.len() >= 14);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_object_id() {
        let oid = to_object_id("507f1f77bcf86cd799439011").unwrap();
        assert_eq!(oid.to_hex(), "507f1f77bcf86cd799439011");
        assert!(matches!(to_object_id("nope"), Err(KitError::InvalidInput(_))));
    }

    #[test]
    fn test_uuid() {
        let uuid = to_uuid("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(uuid.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert!(to_uuid("not-a-uuid").is_err());
    }
}
