//! API error body parsing.
//!
//! Handles the error envelopes the upstream service and its gateways use:
//! - Standard:  `{"error": {"message": "...", "type": "..."}}`
//! - Flat:      `{"message": "...", "code": "..."}`
//! - Detail:    `{"detail": "..."}`
//! - Exception: `{"__type": "...", "message": "..."}`
//!
//! Anything else falls back to the raw body text.

use serde_json::Value;

/// Parsed API error information.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiErrorInfo {
    /// Human-readable error message.
    pub message: String,
    /// Service-specific error code (e.g. `"ThrottlingException"`).
    pub code: Option<String>,
}

/// Parse an error response body into structured error info.
pub fn parse_api_error(body: &str) -> ApiErrorInfo {
    let raw = || ApiErrorInfo {
        message: body.trim().to_owned(),
        code: None,
    };

    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return raw();
    };

    if let Some(msg) = json["error"]["message"].as_str() {
        let code = json["error"]["type"]
            .as_str()
            .or_else(|| json["error"]["code"].as_str())
            .map(String::from);
        return ApiErrorInfo {
            message: msg.to_owned(),
            code,
        };
    }

    if let Some(msg) = json["message"]
        .as_str()
        .or_else(|| json["Message"].as_str())
        .or_else(|| json["detail"].as_str())
    {
        let code = json["__type"]
            .as_str()
            .map(|t| t.rsplit('#').next().unwrap_or(t))
            .or_else(|| json["code"].as_str())
            .map(String::from);
        return ApiErrorInfo {
            message: msg.to_owned(),
            code,
        };
    }

    raw()
}

/// Terminal message for a failed HTTP attempt:
/// `HTTP <status> <status text>: <message>`.
pub fn format_http_error(status: u16, status_text: &str, body: &str) -> String {
    let info = parse_api_error(body);
    let head = if status_text.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status} {status_text}")
    };
    if info.message.is_empty() {
        head
    } else {
        format!("{head}: {}", info.message)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_envelope() {
        let info = parse_api_error(r#"{"error":{"type":"overloaded_error","message":"Overloaded"}}"#);
        assert_eq!(info.message, "Overloaded");
        assert_eq!(info.code.as_deref(), Some("overloaded_error"));
    }

    #[test]
    fn flat_message() {
        let info = parse_api_error(r#"{"message":"Too many requests","code":"throttled"}"#);
        assert_eq!(info.message, "Too many requests");
        assert_eq!(info.code.as_deref(), Some("throttled"));
    }

    #[test]
    fn detail() {
        let info = parse_api_error(r#"{"detail":"Not found"}"#);
        assert_eq!(info.message, "Not found");
        assert!(info.code.is_none());
    }

    #[test]
    fn exception_type_envelope() {
        let body = r#"{"__type":"com.example#ValidationException","message":"Input is too long"}"#;
        let info = parse_api_error(body);
        assert_eq!(info.message, "Input is too long");
        assert_eq!(info.code.as_deref(), Some("ValidationException"));
    }

    #[test]
    fn non_json_falls_back_to_body() {
        let info = parse_api_error("  upstream connect error  ");
        assert_eq!(info.message, "upstream connect error");
    }

    #[test]
    fn unrecognized_json_falls_back_to_body() {
        assert_eq!(parse_api_error(r#"{"error":{}}"#).message, r#"{"error":{}}"#);
    }

    #[test]
    fn http_error_format() {
        insta::assert_snapshot!(
            format_http_error(429, "Too Many Requests", r#"{"message":"slow down"}"#),
            @"HTTP 429 Too Many Requests: slow down"
        );
        assert_eq!(format_http_error(500, "", ""), "HTTP 500");
    }
}
