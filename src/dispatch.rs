//! The dispatch decision for file creation: route through the load-balanced
//! pool, or call a fixed provider with its configured overrides merged in.

use crate::config::{FilesConfigStore, PROVIDER_KEY, ProviderSettings};
use crate::error::Result;

/// One-shot routing choice for a create-file request. Computed once, never
/// revisited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchDecision {
    /// Forward to the load-balanced pool under the sniffed model name.
    Pool { model: String },
    /// Forward to a single fixed provider with merged settings.
    Provider {
        provider: String,
        settings: ProviderSettings,
    },
}

pub fn is_known_model(model: Option<&str>, known_models: &[String]) -> bool {
    match model {
        Some(model) => known_models.iter().any(|name| name == model),
        None => false,
    }
}

/// Decides the routing path for a create-file request.
///
/// The pool path applies only when load balancing is enabled, a model was
/// sniffed from the upload, and that model is known to the pool. Everything
/// else goes to the fixed provider, with that provider's configured settings
/// merged into the request. Resolution failures on the fixed path (store
/// never configured) propagate; they are fatal for the request.
pub fn decide(
    loadbalancing_enabled: bool,
    sniffed_model: Option<&str>,
    known_models: &[String],
    provider: &str,
    request_settings: &ProviderSettings,
    store: &FilesConfigStore,
) -> Result<DispatchDecision> {
    if loadbalancing_enabled && is_known_model(sniffed_model, known_models) {
        if let Some(model) = sniffed_model {
            return Ok(DispatchDecision::Pool {
                model: model.to_string(),
            });
        }
    }

    let config = store.resolve(provider)?.unwrap_or_default();
    Ok(DispatchDecision::Provider {
        provider: provider.to_string(),
        settings: merge_settings(&config, request_settings),
    })
}

/// Merges a provider's configured settings into request-supplied ones.
/// Config fills gaps only; request values win on conflict. The provider
/// identifier key is never forwarded. Inputs are left untouched.
pub fn merge_settings(
    config: &ProviderSettings,
    request: &ProviderSettings,
) -> ProviderSettings {
    let mut merged = request.clone();
    for (key, value) in config {
        merged.entry(key.clone()).or_insert_with(|| value.clone());
    }
    merged.remove(PROVIDER_KEY);
    merged
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn configured_store() -> FilesConfigStore {
        let store = FilesConfigStore::new();
        store
            .set_config(Some(&json!([
                {"custom_llm_provider": "openai", "api_base": "https://configured"}
            ])))
            .expect("set config");
        store
    }

    fn known() -> Vec<String> {
        vec!["gpt-4".to_string(), "gpt-4o".to_string()]
    }

    #[test]
    fn feature_off_always_picks_the_fixed_provider() {
        let store = configured_store();
        let decision = decide(
            false,
            Some("gpt-4"),
            &known(),
            "openai",
            &ProviderSettings::new(),
            &store,
        )
        .expect("decide");
        assert!(matches!(decision, DispatchDecision::Provider { .. }));
    }

    #[test]
    fn known_model_with_feature_on_picks_the_pool() {
        let store = FilesConfigStore::new();
        let decision = decide(
            true,
            Some("gpt-4"),
            &known(),
            "openai",
            &ProviderSettings::new(),
            &store,
        )
        .expect("decide");
        assert_eq!(
            decision,
            DispatchDecision::Pool {
                model: "gpt-4".to_string()
            }
        );
    }

    #[test]
    fn unknown_model_falls_back_to_the_fixed_provider() {
        let store = configured_store();
        let decision = decide(
            true,
            Some("claude-3"),
            &known(),
            "openai",
            &ProviderSettings::new(),
            &store,
        )
        .expect("decide");
        let DispatchDecision::Provider { provider, settings } = decision else {
            panic!("expected fixed provider");
        };
        assert_eq!(provider, "openai");
        assert_eq!(settings.get("api_base"), Some(&json!("https://configured")));
        assert!(settings.get(PROVIDER_KEY).is_none());
    }

    #[test]
    fn no_sniffed_model_falls_back_to_the_fixed_provider() {
        let store = configured_store();
        let decision = decide(
            true,
            None,
            &known(),
            "openai",
            &ProviderSettings::new(),
            &store,
        )
        .expect("decide");
        assert!(matches!(decision, DispatchDecision::Provider { .. }));
    }

    #[test]
    fn fixed_path_without_config_is_fatal() {
        let store = FilesConfigStore::new();
        let err = decide(
            true,
            Some("unlisted"),
            &known(),
            "openai",
            &ProviderSettings::new(),
            &store,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn request_values_win_on_merge_conflicts() {
        let mut config = ProviderSettings::new();
        config.insert("api_base".to_string(), json!("https://configured"));
        config.insert("timeout".to_string(), json!(30));
        config.insert(PROVIDER_KEY.to_string(), json!("openai"));

        let mut request = ProviderSettings::new();
        request.insert("api_base".to_string(), json!("https://from-request"));

        let merged = merge_settings(&config, &request);
        assert_eq!(merged.get("api_base"), Some(&json!("https://from-request")));
        assert_eq!(merged.get("timeout"), Some(&json!(30)));
        assert!(merged.get(PROVIDER_KEY).is_none());

        // inputs untouched
        assert_eq!(config.get(PROVIDER_KEY), Some(&json!("openai")));
        assert_eq!(request.len(), 1);
    }
}
