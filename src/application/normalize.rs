use serde_json::Value;
use wayfarer_api_types::{NormalizedResponse, RateLimitInfo};

use super::transport::{TransportError, UpstreamReply};

pub const RATE_REMAINING_HEADER: &str = "X-Rate-Limit-Remaining";
pub const RATE_RETRY_AFTER_HEADER: &str = "X-Rate-Limit-Retry-After-Seconds";
pub const RETRY_AFTER_HEADER: &str = "Retry-After";

const DEFAULT_RETRY_AFTER_SECS: u64 = 30;
const TOO_MANY_REQUESTS: u16 = 429;
const FIRST_ERROR_STATUS: u16 = 400;

/// Map a transport outcome to the envelope returned to callers.
pub fn normalize(outcome: Result<UpstreamReply, TransportError>) -> NormalizedResponse {
    let reply = match outcome {
        Ok(reply) => reply,
        Err(err) => return NormalizedResponse::transport_failure(format!("Transport error: {err}")),
    };

    let remaining = numeric_header(&reply, RATE_REMAINING_HEADER);

    if reply.status == TOO_MANY_REQUESTS {
        let retry_after = numeric_header(&reply, RATE_RETRY_AFTER_HEADER)
            .or_else(|| numeric_header(&reply, RETRY_AFTER_HEADER))
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        let rate = RateLimitInfo {
            remaining,
            retry_after_seconds: Some(retry_after),
        };
        return NormalizedResponse::failure(
            reply.status,
            format!("Rate limit reached. Retry after {retry_after}s."),
            Some(rate),
        );
    }

    let rate = remaining.map(|remaining| RateLimitInfo {
        remaining: Some(remaining),
        retry_after_seconds: None,
    });

    if reply.status >= FIRST_ERROR_STATUS {
        return NormalizedResponse::failure(reply.status, error_message(&reply), rate);
    }

    NormalizedResponse::success(reply.status, decode_body(&reply.body), rate)
}

fn numeric_header(reply: &UpstreamReply, name: &str) -> Option<u64> {
    reply.header(name)?.parse().ok()
}

fn error_message(reply: &UpstreamReply) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(&reply.body) {
        return value.to_string();
    }
    let trimmed = reply.body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", reply.status)
    } else {
        trimmed.to_string()
    }
}

fn decode_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wayfarer_api_types::ResponseKind;

    use super::*;

    #[test]
    fn success_decodes_json_and_remaining_quota() {
        let reply = UpstreamReply::new(200, r#"{"time": 1, "states": []}"#)
            .with_header("x-rate-limit-remaining", "3999");
        let response = normalize(Ok(reply));

        assert!(response.ok());
        assert_eq!(response.status(), 200);
        assert_eq!(response.data(), Some(&json!({"time": 1, "states": []})));
        assert_eq!(response.rate().and_then(|rate| rate.remaining), Some(3999));
    }

    #[test]
    fn empty_and_text_bodies_stay_successful() {
        let empty = normalize(Ok(UpstreamReply::new(204, "")));
        assert_eq!(empty.data(), Some(&Value::Null));
        assert!(empty.rate().is_none());

        let text = normalize(Ok(UpstreamReply::new(200, "pong")));
        assert_eq!(text.data(), Some(&json!("pong")));
    }

    #[test]
    fn redirect_statuses_are_not_errors() {
        let response = normalize(Ok(UpstreamReply::new(304, "")));
        assert!(response.ok());
        assert_eq!(response.status(), 304);
    }

    #[test]
    fn rate_limit_prefers_opensky_header() {
        let reply = UpstreamReply::new(429, "")
            .with_header(RATE_RETRY_AFTER_HEADER, "12")
            .with_header(RETRY_AFTER_HEADER, "99")
            .with_header(RATE_REMAINING_HEADER, "0");
        let response = normalize(Ok(reply));

        assert_eq!(response.kind(), ResponseKind::RateLimited);
        assert_eq!(response.error(), Some("Rate limit reached. Retry after 12s."));
        let rate = response.rate().expect("rate info");
        assert_eq!(rate.retry_after_seconds, Some(12));
        assert_eq!(rate.remaining, Some(0));
    }

    #[test]
    fn rate_limit_falls_back_to_retry_after_then_default() {
        let standard = normalize(Ok(UpstreamReply::new(429, "").with_header("retry-after", "7")));
        assert_eq!(standard.error(), Some("Rate limit reached. Retry after 7s."));

        let bare = normalize(Ok(UpstreamReply::new(429, "slow down")));
        assert_eq!(bare.error(), Some("Rate limit reached. Retry after 30s."));
        assert_eq!(
            bare.rate().and_then(|rate| rate.retry_after_seconds),
            Some(30)
        );
    }

    #[test]
    fn error_messages_prefer_compact_json_then_text() {
        let json_body = normalize(Ok(UpstreamReply::new(
            404,
            "{\n  \"message\": \"Not Found\"\n}",
        )));
        assert_eq!(json_body.kind(), ResponseKind::UpstreamError);
        assert_eq!(json_body.error(), Some(r#"{"message":"Not Found"}"#));

        let text_body = normalize(Ok(UpstreamReply::new(503, "  upstream down \n")));
        assert_eq!(text_body.error(), Some("upstream down"));

        let no_body = normalize(Ok(UpstreamReply::new(500, "   ")));
        assert_eq!(no_body.error(), Some("HTTP 500"));
    }

    #[test]
    fn transport_failures_have_status_zero() {
        let response = normalize(Err(TransportError::Timeout(Duration::from_secs(20))));
        assert_eq!(response.kind(), ResponseKind::TransportError);
        assert_eq!(response.status(), 0);
        assert_eq!(
            response.error(),
            Some("Transport error: request timed out after 20s")
        );
    }
}
