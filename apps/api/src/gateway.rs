//! Request gateway plumbing: correlation-id propagation and the lenient
//! JSON body extractor (smart-quote stripping plus a single repair pass).

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::Instrument;
use uuid::Uuid;

use crate::errors::AppError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request correlation id, generated when the caller does not send one.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Middleware: reads or mints the correlation id, threads it through a
/// tracing span, and echoes it on the response.
pub async fn propagate_request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let span = tracing::info_span!("request", request_id = %request_id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Replaces curly/smart quotes (U+2018–U+201F) and primes (U+2032–U+2036)
/// with their ASCII equivalents before parsing.
pub fn sanitize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{2034}'
            | '\u{2035}' | '\u{2036}' => '"',
            other => other,
        })
        .collect()
}

/// Single repair pass for almost-JSON: drops raw control characters and
/// trailing commas before a closing brace/bracket. String contents (other
/// than control characters) are left untouched.
pub fn repair_json(text: &str) -> String {
    let chars: Vec<char> = text
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
        .collect();

    let mut out = String::with_capacity(chars.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next_significant = chars[i + 1..]
                    .iter()
                    .find(|n| !n.is_whitespace());
                if matches!(next_significant, Some('}') | Some(']')) {
                    // trailing comma
                } else {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Lenient JSON extractor: sanitize quotes, try a strict parse, try one
/// repair pass, then fail with `VALIDATION_ERROR`.
pub struct LenientJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for LenientJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|_| AppError::Validation("unable to read request body".to_string()))?;
        let text = String::from_utf8_lossy(&bytes);
        let mut sanitized = sanitize_quotes(&text);
        // Endpoints whose parameters are all optional accept an empty body.
        if sanitized.trim().is_empty() {
            sanitized = "{}".to_string();
        }

        if let Ok(value) = serde_json::from_str::<T>(&sanitized) {
            return Ok(LenientJson(value));
        }

        let repaired = repair_json(&sanitized);
        serde_json::from_str::<T>(&repaired)
            .map(LenientJson)
            .map_err(|e| {
                // serde_json refuses numbers that overflow f64 (e.g. 1e309)
                // at parse time; those are non-finite weights and must keep
                // the 422 weight contract rather than read as a syntax error.
                if e.to_string().contains("number out of range") {
                    AppError::UnprocessableWeights(
                        "numeric value out of range".to_string(),
                    )
                } else {
                    AppError::Validation(format!("invalid JSON body: {e}"))
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Body {
        name: String,
        count: u32,
    }

    #[test]
    fn test_sanitize_smart_quotes() {
        let input = "{\u{201C}name\u{201D}: \u{2018}x\u{2019}}";
        assert_eq!(sanitize_quotes(input), "{\"name\": 'x'}");
    }

    #[test]
    fn test_repair_removes_trailing_commas() {
        let input = r#"{"name": "x", "count": 2,}"#;
        let repaired = repair_json(input);
        let parsed: Body = serde_json::from_str(&repaired).unwrap();
        assert_eq!(parsed.count, 2);
    }

    #[test]
    fn test_repair_removes_trailing_comma_in_arrays() {
        let input = r#"{"items": [1, 2, 3,]}"#;
        let repaired = repair_json(input);
        assert!(serde_json::from_str::<serde_json::Value>(&repaired).is_ok());
    }

    #[test]
    fn test_repair_preserves_commas_inside_strings() {
        let input = r#"{"name": "a, b,", "count": 1}"#;
        let repaired = repair_json(input);
        let parsed: Body = serde_json::from_str(&repaired).unwrap();
        assert_eq!(parsed.name, "a, b,");
    }

    #[test]
    fn test_repair_strips_control_characters() {
        let input = "{\"name\": \"x\", \u{0000}\"count\": 1}";
        let repaired = repair_json(input);
        let parsed: Body = serde_json::from_str(&repaired).unwrap();
        assert_eq!(parsed.name, "x");
    }

    #[test]
    fn test_smart_quoted_body_round_trip() {
        let input = "{\u{201C}name\u{201D}: \u{201C}annotator\u{201D}, \u{201C}count\u{201D}: 3}";
        let sanitized = sanitize_quotes(input);
        let parsed: Body = serde_json::from_str(&sanitized).unwrap();
        assert_eq!(
            parsed,
            Body {
                name: "annotator".to_string(),
                count: 3
            }
        );
    }
}
