use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serializes `value` with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (idx, (key, val)) in entries.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// `<prefix>:<sha256(canonical args)[..32]>`. The prefix is the tool name so
/// identical arguments never collide across tools.
pub fn build_cache_key(prefix: &str, args: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(args).as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{prefix}:{}", &digest[..32])
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nested_objects_are_sorted() {
        let value = json!({"b": {"y": 1, "x": [ {"d": 1, "c": 2} ]}, "a": "s"});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":"s","b":{"x":[{"c":2,"d":1}],"y":1}}"#
        );
    }

    #[test]
    fn key_is_prefixed_and_order_independent() {
        let mut a = serde_json::Map::new();
        a.insert("domain".into(), json!("example.com"));
        a.insert("include_ct_logs".into(), json!(false));
        let mut b = serde_json::Map::new();
        b.insert("include_ct_logs".into(), json!(false));
        b.insert("domain".into(), json!("example.com"));

        let ka = build_cache_key("domain_recon", &Value::Object(a));
        let kb = build_cache_key("domain_recon", &Value::Object(b));
        assert_eq!(ka, kb);
        assert!(ka.starts_with("domain_recon:"));
        assert_eq!(ka.len(), "domain_recon:".len() + 32);
        assert_ne!(ka, build_cache_key("dns_lookup", &json!({"domain": "example.com", "include_ct_logs": false})));
    }
}
