use serde_json::Value;

const SENSITIVE_KEY_SUBSTRINGS: &[&str] = &[
    "api_key",
    "apikey",
    "token",
    "secret",
    "password",
    "pass",
    "webhook_url",
    "account_sid",
    "auth_token",
];

const REDACTED: &str = "***REDACTED***";

/// Masks secret-shaped values out of a JSON value before it is ever logged.
/// Applied both to values under suspicious keys and, regardless of key, to
/// values that structurally look like a secret.
pub fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(mask_string(s)),
        Value::Array(items) => Value::Array(items.iter().map(mask_value).collect()),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map.iter() {
                if is_sensitive_key(k) {
                    out.insert(k.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(k.clone(), mask_value(v));
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

pub fn mask_string(s: &str) -> String {
    if looks_like_secret(s) {
        REDACTED.to_string()
    } else {
        s.to_string()
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEY_SUBSTRINGS
        .iter()
        .any(|needle| lower.contains(needle))
}

fn looks_like_secret(s: &str) -> bool {
    let lower = s.to_lowercase();
    if lower.starts_with("https://hooks.slack.com/")
        || lower.starts_with("https://discord.com/api/webhooks/")
        || lower.starts_with("https://discordapp.com/api/webhooks/")
    {
        return true;
    }
    if s.starts_with("AKIA") && s.len() >= 16 && s.chars().all(|c| c.is_ascii_alphanumeric()) {
        return true;
    }
    if looks_like_card_number(s) {
        return true;
    }
    if has_userinfo(s) {
        return true;
    }
    if looks_like_email(s) {
        return true;
    }
    false
}

fn looks_like_card_number(s: &str) -> bool {
    let digits: String = s.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    digits.len() >= 13 && digits.len() <= 19 && digits.chars().all(|c| c.is_ascii_digit())
}

fn has_userinfo(s: &str) -> bool {
    if let Some(rest) = s.split("://").nth(1) {
        if let Some((userinfo, _)) = rest.split_once('@') {
            return !userinfo.is_empty() && !userinfo.contains('/');
        }
    }
    false
}

fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.contains(' ')
        && !local.contains(' ')
        && !s.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_values_under_sensitive_keys() {
        let input = json!({ "api_key": "sk-live-abcdef", "name": "Alex" });
        let masked = mask_value(&input);
        assert_eq!(masked["api_key"], REDACTED);
        assert_eq!(masked["name"], "Alex");
    }

    #[test]
    fn masks_slack_webhook_url_regardless_of_key() {
        let input = json!({ "destination": "https://hooks.slack.com/services/T0/B0/xyz" });
        let masked = mask_value(&input);
        assert_eq!(masked["destination"], REDACTED);
    }

    #[test]
    fn masks_email_addresses() {
        let masked = mask_value(&json!({ "contact": "person@example.com" }));
        assert_eq!(masked["contact"], REDACTED);
    }

    #[test]
    fn masks_card_like_digit_runs() {
        let masked = mask_value(&json!({ "note": "4111111111111111" }));
        assert_eq!(masked["note"], REDACTED);
    }

    #[test]
    fn leaves_ordinary_strings_untouched() {
        let masked = mask_value(&json!({ "order_id": "12345" }));
        assert_eq!(masked["order_id"], "12345");
    }

    #[test]
    fn recurses_into_nested_objects_and_arrays() {
        let input = json!({ "steps": [{ "token": "abc" }, { "note": "fine" }] });
        let masked = mask_value(&input);
        assert_eq!(masked["steps"][0]["token"], REDACTED);
        assert_eq!(masked["steps"][1]["note"], "fine");
    }
}
