use std::collections::HashMap;

use serde_json::Value;

use crate::error::ApiError;

/// Read a required path parameter.
pub fn path_param<'a>(path: &'a HashMap<String, String>, key: &str) -> Result<&'a str, ApiError> {
    path.get(key)
        .map(String::as_str)
        .ok_or_else(|| ApiError::bad_request(format!("missing {key} path parameter")))
}

/// Parse an optional numeric query parameter.
pub fn parse_optional_f64(
    params: &HashMap<String, String>,
    field: &str,
) -> Result<Option<f64>, ApiError> {
    match params.get(field) {
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("{field} must be a number"))),
        None => Ok(None),
    }
}

/// Serialize a record for a response body.
pub fn to_payload<T: serde::Serialize>(value: &T) -> Value {
    // Records only hold strings, numbers and timestamps.
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_number_parsing() {
        let mut params = HashMap::new();
        assert_eq!(parse_optional_f64(&params, "delay").unwrap(), None);

        params.insert("delay".to_string(), " 2.5 ".to_string());
        assert_eq!(parse_optional_f64(&params, "delay").unwrap(), Some(2.5));

        params.insert("delay".to_string(), "soon".to_string());
        assert!(matches!(
            parse_optional_f64(&params, "delay"),
            Err(ApiError::BadRequest(_))
        ));
    }
}
