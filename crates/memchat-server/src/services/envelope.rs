use anyhow::Result;
use serde_json::Value;

/// Strip the `{ success, result, errors }` envelope some inference gateways wrap
/// around the model output. Bodies without the envelope pass through untouched.
pub fn unwrap_envelope(body: Value) -> Result<Value> {
    let Some(success) = body.get("success").and_then(Value::as_bool) else {
        return Ok(body);
    };

    if !success {
        let errors = body.get("errors").cloned().unwrap_or(Value::Null);
        anyhow::bail!("gateway reported failure: {}", errors);
    }

    match body {
        Value::Object(mut map) => Ok(map.remove("result").unwrap_or(Value::Null)),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_body_passes_through() {
        let body = json!({"response": "hi"});
        assert_eq!(unwrap_envelope(body.clone()).unwrap(), body);
    }

    #[test]
    fn test_envelope_unwrapped() {
        let body = json!({"success": true, "errors": [], "result": {"response": "hi"}});
        assert_eq!(unwrap_envelope(body).unwrap(), json!({"response": "hi"}));
    }

    #[test]
    fn test_failed_envelope_is_error() {
        let body = json!({"success": false, "errors": [{"code": 7000}]});
        assert!(unwrap_envelope(body).is_err());
    }
}
