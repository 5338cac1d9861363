use std::sync::Arc;

use component_forge::config::{EnvConfig, ProviderKind};
use generation_provider::{GenerationProvider, ProviderInitError};
use generation_provider_completion_api::{CompletionApiProvider, CompletionApiProviderConfig};
use generation_provider_mock::MockProvider;

/// Builds the provider selected by `config`.
///
/// A missing API key does not fail here; the completion-api provider
/// reports it through `preflight` on every request instead.
pub fn provider_for_config(
    config: &EnvConfig,
) -> Result<Arc<dyn GenerationProvider>, ProviderInitError> {
    match config.provider {
        ProviderKind::Mock => Ok(Arc::new(MockProvider::default())),
        ProviderKind::CompletionApi => {
            let mut provider_config = CompletionApiProviderConfig::new(
                config.api_key.clone().unwrap_or_default(),
                config.model.clone(),
            );
            if let Some(base_url) = &config.base_url {
                provider_config = provider_config.with_base_url(base_url.clone());
            }
            if let Some(timeout) = config.timeout {
                provider_config = provider_config.with_timeout(timeout);
            }
            Ok(Arc::new(CompletionApiProvider::new(provider_config)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use component_forge::config::{EnvConfig, LogConfig, ProviderKind, DEFAULT_BIND_ADDR};

    use super::provider_for_config;

    fn config(provider: ProviderKind, api_key: Option<&str>) -> EnvConfig {
        EnvConfig {
            provider,
            api_key: api_key.map(str::to_string),
            base_url: Some("http://127.0.0.1:9".to_string()),
            model: "llama-3.1-8b".to_string(),
            timeout: Some(Duration::from_secs(5)),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            log: LogConfig::default(),
        }
    }

    #[test]
    fn mock_provider_resolves() {
        let provider = provider_for_config(&config(ProviderKind::Mock, None))
            .expect("mock provider should resolve");
        assert_eq!(provider.profile().provider_id, "mock");
        assert!(provider.preflight().is_ok());
    }

    #[test]
    fn completion_api_without_key_fails_preflight_only() {
        let provider = provider_for_config(&config(ProviderKind::CompletionApi, None))
            .expect("provider builds without a key");
        assert_eq!(provider.profile().provider_id, "completion-api");
        assert_eq!(provider.profile().model_id, "llama-3.1-8b");

        let error = provider.preflight().expect_err("missing key is reported");
        assert_eq!(error.message(), "The generation service API key is not configured");
    }

    #[test]
    fn completion_api_with_key_is_ready() {
        let provider = provider_for_config(&config(ProviderKind::CompletionApi, Some("sk-test")))
            .expect("provider builds");
        assert!(provider.preflight().is_ok());
    }
}
