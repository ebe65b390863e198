use serde_json::Value;

/// Substitutes every `{{path}}` occurrence in `template` by looking `path` up
/// in `context`, dot-separated, with integer segments indexing arrays.
/// Unresolved or non-scalar lookups are left as the literal `{{path}}` token
/// (fail-soft) so a broken mapping is visible rather than silently blanked.
pub fn templ_str(template: &str, context: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let path = after_open[..end].trim();
        match lookup(context, path) {
            Some(scalar) => out.push_str(&scalar),
            None => out.push_str(&format!("{{{{{}}}}}", path)),
        }
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    out
}

fn lookup(context: &Value, path: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    let mut current = context;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    scalar_to_string(current)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Walks every string field of a JSON value and templates it against
/// `context`, leaving non-string values untouched.
pub fn templ_value(value: &Value, context: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(templ_str(s, context)),
        Value::Array(items) => Value::Array(items.iter().map(|v| templ_value(v, context)).collect()),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map.iter() {
                out.insert(k.clone(), templ_value(v, context));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_nested_paths() {
        let context = json!({ "user": { "name": "Alex" }, "order": { "id": "12345" } });
        let out = templ_str("Hello {{user.name}} order {{order.id}}", &context);
        assert_eq!(out, "Hello Alex order 12345");
    }

    #[test]
    fn substitutes_array_index_segments() {
        let context = json!({ "items": [{ "name": "widget" }] });
        assert_eq!(templ_str("{{items.0.name}}", &context), "widget");
    }

    #[test]
    fn preserves_literal_token_on_miss() {
        let context = json!({ "user": { "name": "Alex" } });
        assert_eq!(templ_str("{{user.missing}}", &context), "{{user.missing}}");
    }

    #[test]
    fn is_a_fixed_point_when_no_tokens_remain() {
        let context = json!({ "a": "b" });
        let once = templ_str("plain text, no tokens", &context);
        let twice = templ_str(&once, &context);
        assert_eq!(once, twice);
    }

    #[test]
    fn non_scalar_resolution_is_left_literal() {
        let context = json!({ "user": { "name": "Alex" } });
        assert_eq!(templ_str("{{user}}", &context), "{{user}}");
    }
}
