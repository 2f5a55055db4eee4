//! Per-provider files settings, loaded once and swapped atomically.
//!
//! Settings groups arrive as an ordered list of maps. Each group names the
//! provider it applies to under the reserved `custom_llm_provider` key;
//! every other entry is forwarded to the backend call as-is. String values
//! prefixed with `os.environ/` are resolved against the process environment
//! when the snapshot is installed, never per request.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{GatewayError, Result};

/// Marker prefix for environment-backed secret indirection.
pub const SECRET_MARKER: &str = "os.environ/";

/// Reserved settings key naming the provider a group applies to. Stripped
/// before the group is merged into an outgoing backend call.
pub const PROVIDER_KEY: &str = "custom_llm_provider";

pub type ProviderSettings = BTreeMap<String, Value>;

/// Process-wide snapshot of files provider settings.
///
/// Single writer (administrative reload), many concurrent readers. Readers
/// always observe either the previous snapshot or the fully resolved new
/// one, never a half-resolved list.
#[derive(Default)]
pub struct FilesConfigStore {
    snapshot: ArcSwapOption<Vec<ProviderSettings>>,
}

impl FilesConfigStore {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwapOption::empty(),
        }
    }

    /// Replaces the settings snapshot. `None` leaves the existing snapshot
    /// untouched. Secret markers are resolved eagerly; a marker naming an
    /// unset variable fails the whole load.
    pub fn set_config(&self, config: Option<&Value>) -> Result<()> {
        let Some(config) = config else {
            return Ok(());
        };

        let groups = config.as_array().ok_or_else(|| {
            GatewayError::Config("invalid files settings, expected a list".to_string())
        })?;

        let mut resolved = Vec::with_capacity(groups.len());
        for group in groups {
            let Some(entries) = group.as_object() else {
                continue;
            };
            let mut settings = ProviderSettings::new();
            for (key, value) in entries {
                settings.insert(key.clone(), resolve_secret_value(key, value)?);
            }
            resolved.push(settings);
        }

        self.snapshot.store(Some(Arc::new(resolved)));
        Ok(())
    }

    /// Looks up the settings group for a provider. `vertex_ai` manages its
    /// own configuration elsewhere and always reads as "no override";
    /// otherwise an unconfigured store is an error and the first matching
    /// group wins.
    pub fn resolve(&self, provider: &str) -> Result<Option<ProviderSettings>> {
        if provider == "vertex_ai" {
            return Ok(None);
        }

        let Some(groups) = self.snapshot.load_full() else {
            return Err(GatewayError::Config(
                "files settings are not configured, set them in the gateway config".to_string(),
            ));
        };

        Ok(groups
            .iter()
            .find(|group| {
                group.get(PROVIDER_KEY).and_then(Value::as_str) == Some(provider)
            })
            .cloned())
    }

    /// Lenient variant for operations that work without any files settings:
    /// an unconfigured store reads as "no override" instead of failing.
    pub fn resolve_if_configured(&self, provider: &str) -> Option<ProviderSettings> {
        self.resolve(provider).ok().flatten()
    }

    pub fn is_configured(&self) -> bool {
        self.snapshot.load().is_some()
    }
}

fn resolve_secret_value(key: &str, value: &Value) -> Result<Value> {
    let Some(text) = value.as_str() else {
        return Ok(value.clone());
    };
    let Some(name) = text.strip_prefix(SECRET_MARKER) else {
        return Ok(value.clone());
    };

    let name = name.trim();
    let secret = std::env::var(name).map_err(|_| {
        GatewayError::Config(format!(
            "secret `{name}` referenced by `{key}` is not present in the environment"
        ))
    })?;
    Ok(Value::String(secret))
}

/// Gateway config file, YAML. Mirrors the proxy config layout: a
/// `files_settings` list of provider groups plus general toggles.
#[derive(Debug, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub files_settings: Option<Value>,
    #[serde(default)]
    pub general_settings: GeneralSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeneralSettings {
    #[serde(default)]
    pub master_key: Option<String>,
    #[serde(default)]
    pub enable_loadbalancing_on_batch_endpoints: bool,
    #[serde(default)]
    pub pool_models: Vec<String>,
}

impl GatewayConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw)
            .map_err(|err| GatewayError::Config(format!("invalid gateway config: {err}")))
    }
}
