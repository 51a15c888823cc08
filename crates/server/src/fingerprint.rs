use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Deterministic digest of a business payload. Two semantically identical
/// payloads (same key/value pairs, any ordering or formatting) hash the same;
/// any value difference produces a different digest. Transport metadata is
/// never part of the input.
pub fn fingerprint<T: Serialize>(payload: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(payload)?;
    let mut canonical = String::new();
    write_canonical(&value, &mut canonical);
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(format!("{digest:x}"))
}

/// Compact JSON with object keys sorted recursively. `serde_json` preserves
/// insertion order in this workspace, so sorting happens here.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn key_order_does_not_affect_digest() {
        let a = json!({"customer_id": "c1", "item_id": "i1", "quantity": 3});
        let b = json!({"quantity": 3, "item_id": "i1", "customer_id": "c1"});
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn formatting_does_not_affect_digest() {
        let a: Value =
            serde_json::from_str(r#"{ "customer_id" : "c1",  "quantity": 3 }"#).unwrap();
        let b: Value = serde_json::from_str("{\"quantity\":3,\n\"customer_id\":\"c1\"}").unwrap();
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn value_change_changes_digest() {
        let a = json!({"customer_id": "c1", "item_id": "i1", "quantity": 3});
        let b = json!({"customer_id": "c1", "item_id": "i1", "quantity": 5});
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn nested_objects_are_canonicalized() {
        let a = json!({"outer": {"b": 2, "a": [1, {"y": 0, "x": 9}]}});
        let b = json!({"outer": {"a": [1, {"x": 9, "y": 0}], "b": 2}});
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }
}
