//! Fixed-provider backend boundary and its OpenAI-compatible HTTP
//! implementation.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::config::ProviderSettings;
use crate::error::{GatewayError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Backend call metadata used to enrich response headers. Never consulted
/// for routing decisions.
#[derive(Debug, Clone, Default)]
pub struct BackendMeta {
    pub model_id: Option<String>,
    pub cache_key: Option<String>,
    pub api_base: Option<String>,
}

/// Wrapped transport response carried by content downloads; body, status
/// and headers are passed through to the caller verbatim.
#[derive(Debug, Clone)]
pub struct RawContent {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct BackendReply {
    pub body: Value,
    pub meta: BackendMeta,
    pub content: Option<RawContent>,
}

impl BackendReply {
    pub fn json(body: Value) -> Self {
        Self {
            body,
            meta: BackendMeta::default(),
            content: None,
        }
    }

    pub fn with_meta(mut self, meta: BackendMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_content(mut self, content: RawContent) -> Self {
        self.content = Some(content);
        self
    }
}

#[derive(Debug, Clone)]
pub struct CreateFileUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
    pub purpose: String,
}

/// A fixed provider's files surface. `settings` carries the merged provider
/// overrides (already stripped of the provider-identifier key).
#[async_trait]
pub trait FileBackend: Send + Sync {
    async fn create_file(
        &self,
        provider: &str,
        settings: &ProviderSettings,
        upload: CreateFileUpload,
    ) -> Result<BackendReply>;

    async fn retrieve_file(
        &self,
        provider: &str,
        settings: &ProviderSettings,
        file_id: &str,
    ) -> Result<BackendReply>;

    async fn file_content(
        &self,
        provider: &str,
        settings: &ProviderSettings,
        file_id: &str,
    ) -> Result<BackendReply>;

    async fn delete_file(
        &self,
        provider: &str,
        settings: &ProviderSettings,
        file_id: &str,
    ) -> Result<BackendReply>;

    async fn list_files(
        &self,
        provider: &str,
        settings: &ProviderSettings,
        purpose: Option<&str>,
    ) -> Result<BackendReply>;
}

/// reqwest-backed implementation speaking the OpenAI files API. The base
/// address and key come from the merged settings (`api_base`, `api_key`),
/// falling back to the backend's defaults.
pub struct HttpFileBackend {
    client: reqwest::Client,
    default_api_base: String,
    default_api_key: Option<String>,
}

impl HttpFileBackend {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| GatewayError::Backend {
                status: 500,
                message: format!("backend http client error: {err}"),
            })?;
        Ok(Self {
            client,
            default_api_base: DEFAULT_BASE_URL.to_string(),
            default_api_key: None,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.default_api_base = api_base.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.default_api_key = Some(api_key.into());
        self
    }

    fn api_base<'a>(&'a self, settings: &'a ProviderSettings) -> &'a str {
        setting_str(settings, "api_base").unwrap_or(&self.default_api_base)
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: String,
        settings: &ProviderSettings,
    ) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, url);
        let api_key = setting_str(settings, "api_key").or(self.default_api_key.as_deref());
        if let Some(api_key) = api_key {
            req = req.bearer_auth(api_key);
        }
        req
    }

    async fn send_json(
        &self,
        req: reqwest::RequestBuilder,
        api_base: &str,
    ) -> Result<BackendReply> {
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<Value>().await?;
        Ok(BackendReply::json(body).with_meta(BackendMeta {
            api_base: Some(api_base.to_string()),
            ..BackendMeta::default()
        }))
    }
}

fn setting_str<'a>(settings: &'a ProviderSettings, key: &str) -> Option<&'a str> {
    settings.get(key).and_then(Value::as_str)
}

fn join_endpoint(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{base}/{endpoint}")
}

#[async_trait]
impl FileBackend for HttpFileBackend {
    async fn create_file(
        &self,
        _provider: &str,
        settings: &ProviderSettings,
        upload: CreateFileUpload,
    ) -> Result<BackendReply> {
        let api_base = self.api_base(settings).to_string();
        let url = join_endpoint(&api_base, "files");

        let mut file_part = Part::bytes(upload.bytes.to_vec()).file_name(upload.filename);
        if let Some(content_type) = upload.content_type.as_deref() {
            file_part = file_part.mime_str(content_type).map_err(|err| {
                GatewayError::invalid_request(format!("invalid file content type: {err}"))
            })?;
        }
        let form = Form::new()
            .text("purpose", upload.purpose)
            .part("file", file_part);

        let req = self
            .request(reqwest::Method::POST, url, settings)
            .multipart(form);
        self.send_json(req, &api_base).await
    }

    async fn retrieve_file(
        &self,
        _provider: &str,
        settings: &ProviderSettings,
        file_id: &str,
    ) -> Result<BackendReply> {
        let api_base = self.api_base(settings).to_string();
        let url = join_endpoint(&api_base, &format!("files/{file_id}"));
        let req = self.request(reqwest::Method::GET, url, settings);
        self.send_json(req, &api_base).await
    }

    async fn file_content(
        &self,
        _provider: &str,
        settings: &ProviderSettings,
        file_id: &str,
    ) -> Result<BackendReply> {
        let api_base = self.api_base(settings).to_string();
        let url = join_endpoint(&api_base, &format!("files/{file_id}/content"));
        let response = self
            .request(reqwest::Method::GET, url, settings)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(BackendReply::json(Value::Null)
            .with_meta(BackendMeta {
                api_base: Some(api_base),
                ..BackendMeta::default()
            })
            .with_content(RawContent {
                status: status.as_u16(),
                headers,
                body,
            }))
    }

    async fn delete_file(
        &self,
        _provider: &str,
        settings: &ProviderSettings,
        file_id: &str,
    ) -> Result<BackendReply> {
        let api_base = self.api_base(settings).to_string();
        let url = join_endpoint(&api_base, &format!("files/{file_id}"));
        let req = self.request(reqwest::Method::DELETE, url, settings);
        self.send_json(req, &api_base).await
    }

    async fn list_files(
        &self,
        _provider: &str,
        settings: &ProviderSettings,
        purpose: Option<&str>,
    ) -> Result<BackendReply> {
        let api_base = self.api_base(settings).to_string();
        let url = join_endpoint(&api_base, "files");
        let mut req = self.request(reqwest::Method::GET, url, settings);
        if let Some(purpose) = purpose {
            req = req.query(&[("purpose", purpose)]);
        }
        self.send_json(req, &api_base).await
    }
}

/// Builds a settings map from literal key/value pairs.
pub fn settings_from_pairs<I, K, V>(pairs: I) -> ProviderSettings
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect::<BTreeMap<_, _>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_endpoint_normalizes_slashes() {
        assert_eq!(
            join_endpoint("https://api.example.com/v1/", "/files"),
            "https://api.example.com/v1/files"
        );
        assert_eq!(
            join_endpoint("https://api.example.com/v1", "files/abc"),
            "https://api.example.com/v1/files/abc"
        );
    }

    #[test]
    fn settings_override_the_default_base() {
        let backend = HttpFileBackend::new().expect("client");
        let settings = settings_from_pairs([("api_base", "https://override")]);
        assert_eq!(backend.api_base(&settings), "https://override");
        assert_eq!(backend.api_base(&ProviderSettings::new()), DEFAULT_BASE_URL);
    }
}
