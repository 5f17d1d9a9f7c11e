//! Flattening of agent session events into storable text.

use serde_json::Value;

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Join session events into `"{author}: {text}"` lines.
///
/// `content` may be a string or an object whose `parts` are strings or
/// `{ "text": .. }` objects. Events without content are skipped. Returns
/// `None` when no text was found.
pub fn extract_session_text(events: &[Value]) -> Option<String> {
    let mut lines = Vec::new();
    for event in events {
        let Some(event) = event.as_object() else {
            continue;
        };
        let author = event
            .get("author")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        match event.get("content") {
            Some(Value::String(text)) => lines.push(format!("{author}: {text}")),
            Some(Value::Object(content)) => {
                let parts = content.get("parts").and_then(Value::as_array);
                for part in parts.into_iter().flatten() {
                    match part {
                        Value::String(text) => lines.push(format!("{author}: {text}")),
                        Value::Object(part) => {
                            if let Some(text) = part.get("text") {
                                lines.push(format!("{author}: {}", text_of(text)));
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}
