use std::collections::BTreeMap;

use crate::config::CompletionApiConfig;
use crate::error::CompletionApiError;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_USER_AGENT: &str = "user-agent";

/// Headers sent with every streaming chat-completions request, keyed by
/// lowercase name.
pub fn build_headers(
    config: &CompletionApiConfig,
) -> Result<BTreeMap<&'static str, String>, CompletionApiError> {
    if !config.has_api_key() {
        return Err(CompletionApiError::MissingApiKey);
    }

    Ok(BTreeMap::from([
        (
            HEADER_AUTHORIZATION,
            format!("Bearer {}", config.api_key.trim()),
        ),
        (HEADER_ACCEPT, "text/event-stream".to_owned()),
        (HEADER_CONTENT_TYPE, "application/json".to_owned()),
        (HEADER_USER_AGENT, user_agent()),
    ]))
}

/// `component-forge/<version> (<os>; <arch>)`.
fn user_agent() -> String {
    format!(
        "component-forge/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        normalize_arch(std::env::consts::ARCH)
    )
}

fn normalize_arch(arch: &str) -> &str {
    match arch {
        "x86_64" | "amd64" => "x64",
        "x86" | "i386" | "i686" => "ia32",
        "aarch64" => "arm64",
        other => other,
    }
}
