use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Maximum retry attempts after an initial request attempt.
pub const MAX_RETRIES: u32 = 3;
/// Base delay before the first retry.
pub const BASE_DELAY_MS: u64 = 1000;

fn retryable_text_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|too.?many.?requests|overloaded|service.?unavailable|bad.?gateway|timed?.?out|connection.?(refused|reset)")
            .expect("retry regex must compile")
    })
}

/// Retry policy for transient HTTP statuses and transient-looking error text.
pub fn is_retryable_http_error(status: u16, error_text: &str) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504) || retryable_text_regex().is_match(error_text)
}

/// Client errors other than timeouts and rate limits never succeed on retry.
pub fn is_permanent_status(status: u16) -> bool {
    (400..500).contains(&status) && !matches!(status, 408 | 429)
}

/// Compute exponential backoff delay for a retry attempt.
pub fn retry_delay(attempt: u32) -> Duration {
    let exponent = attempt.min(30);
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(exponent)))
}
