use serde_json::Value;

/// Masks sensitive fields in JSON payloads before they reach the logs.
/// Payment payloads carry bank account numbers and emails; neither belongs
/// in log storage.
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_value(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_field(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "account_number"
            | "client_email"
            | "email"
            | "password"
            | "secret"
            | "token"
            | "api_key"
            | "authorization"
    )
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.len() > 8 => {
            let visible = &s[..4];
            let end = &s[s.len() - 4..];
            Value::String(format!("{}****{}", visible, end))
        }
        _ => Value::String("****".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_account_number() {
        let input = json!({
            "account_number": "0001234567",
            "amount": "5000.00"
        });

        let sanitized = sanitize_json(&input);
        let account = sanitized["account_number"].as_str().unwrap();

        assert!(account.contains("****"));
        assert_eq!(sanitized["amount"], "5000.00");
    }

    #[test]
    fn test_sanitize_nested() {
        let input = json!({
            "booking": {
                "client_email": "client@example.com",
                "duration_minutes": 60
            }
        });

        let sanitized = sanitize_json(&input);
        assert!(sanitized["booking"]["client_email"].as_str().unwrap().contains("****"));
        assert_eq!(sanitized["booking"]["duration_minutes"], 60);
    }

    #[test]
    fn test_short_values_fully_masked() {
        let input = json!({ "token": "abc" });
        let sanitized = sanitize_json(&input);
        assert_eq!(sanitized["token"], "****");
    }
}
