//! Deep merge of config layers.

use serde_json::Value;

/// Fold `overlay` into `base`: objects merge per key, anything else replaces.
pub(super) fn merge_layer(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_layer(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::merge_layer;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn nested_keys_survive_partial_overlays() {
        let mut base = json!({ "chunking": { "chunk_size": 1000, "chunk_overlap": 200 } });
        merge_layer(
            &mut base,
            json!({ "chunking": { "chunk_overlap": 100 }, "search": { "max_top_k": 50 } }),
        );
        assert_eq!(
            base,
            json!({
                "chunking": { "chunk_size": 1000, "chunk_overlap": 100 },
                "search": { "max_top_k": 50 }
            })
        );
    }

    #[test]
    fn non_object_overlay_replaces() {
        let mut base = json!({ "vector_store": { "api_key": "a" } });
        merge_layer(&mut base, json!({ "vector_store": null }));
        assert_eq!(base, json!({ "vector_store": null }));
    }
}
