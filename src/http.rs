//! HTTP surface: the five files operations behind one parameterized
//! pipeline, plus credential checks and error normalization.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::{Deserialize, Serialize};

use crate::backend::{BackendReply, CreateFileUpload, FileBackend};
use crate::config::{FilesConfigStore, ProviderSettings};
use crate::dispatch::{self, DispatchDecision};
use crate::envelope::envelope_headers;
use crate::error::{GatewayError, Result};
use crate::hooks::{CallContext, CallStatus, CallerIdentity, NoopStatusHook, StatusHook};
use crate::router::FileRouter;
use crate::sniff;

pub const DEFAULT_PROVIDER: &str = "openai";

static REQUEST_ID_SEQ: AtomicU64 = AtomicU64::new(0);

/// Gateway credential. When no keys are registered the gateway is open and
/// callers get an anonymous identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayKey {
    pub key_id: String,
    pub token: String,
    #[serde(default)]
    pub allowed_model_region: Option<String>,
}

impl GatewayKey {
    pub fn new(key_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            token: token.into(),
            allowed_model_region: None,
        }
    }

    pub fn with_allowed_model_region(mut self, region: impl Into<String>) -> Self {
        self.allowed_model_region = Some(region.into());
        self
    }
}

#[derive(Clone)]
pub struct FilesGatewayState {
    files_config: Arc<FilesConfigStore>,
    backend: Arc<dyn FileBackend>,
    router: Option<Arc<dyn FileRouter>>,
    hooks: Arc<dyn StatusHook>,
    gateway_keys: Vec<GatewayKey>,
    pool_models: Vec<String>,
    loadbalance_batches: bool,
    version: String,
}

impl FilesGatewayState {
    pub fn new(backend: impl FileBackend + 'static) -> Self {
        Self {
            files_config: Arc::new(FilesConfigStore::new()),
            backend: Arc::new(backend),
            router: None,
            hooks: Arc::new(NoopStatusHook),
            gateway_keys: Vec::new(),
            pool_models: Vec::new(),
            loadbalance_batches: false,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_files_config(mut self, store: Arc<FilesConfigStore>) -> Self {
        self.files_config = store;
        self
    }

    pub fn with_router(mut self, router: impl FileRouter + 'static) -> Self {
        self.router = Some(Arc::new(router));
        self
    }

    pub fn with_status_hook(mut self, hooks: impl StatusHook + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn with_gateway_key(mut self, key: GatewayKey) -> Self {
        self.gateway_keys.push(key);
        self
    }

    /// Declares the model names known to the pool independently of a
    /// registered router, e.g. from the control plane before the router has
    /// been initialized with backends.
    pub fn with_pool_models(mut self, names: Vec<String>) -> Self {
        self.pool_models = names;
        self
    }

    pub fn with_batch_loadbalancing(mut self, enabled: bool) -> Self {
        self.loadbalance_batches = enabled;
        self
    }

    pub fn files_config(&self) -> &Arc<FilesConfigStore> {
        &self.files_config
    }

    fn known_pool_models(&self) -> Vec<String> {
        if !self.pool_models.is_empty() {
            return self.pool_models.clone();
        }
        self.router
            .as_ref()
            .map(|router| router.model_names())
            .unwrap_or_default()
    }
}

/// One parameterized operation instead of five near-identical handlers.
#[derive(Debug, Clone)]
pub enum FileOperation {
    Create { upload: CreateFileUpload },
    Retrieve { file_id: String },
    Content { file_id: String },
    Delete { file_id: String },
    List { purpose: Option<String> },
}

impl FileOperation {
    fn name(&self) -> &'static str {
        match self {
            FileOperation::Create { .. } => "create_file",
            FileOperation::Retrieve { .. } => "retrieve_file",
            FileOperation::Content { .. } => "file_content",
            FileOperation::Delete { .. } => "delete_file",
            FileOperation::List { .. } => "list_files",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    pub code: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Deserialize)]
struct ProviderQuery {
    #[serde(default)]
    provider: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    purpose: Option<String>,
}

/// Builds the gateway router. Unprefixed, `/v1`, and provider-prefixed
/// route variants are equivalent aliases for the same five operations.
pub fn router(state: FilesGatewayState) -> axum::Router {
    let mut router = axum::Router::new().route("/health", get(health));

    for prefix in ["", "/v1"] {
        router = router
            .route(
                &format!("{prefix}/files"),
                get(list_files).post(create_file),
            )
            .route(
                &format!("{prefix}/files/:file_id"),
                get(retrieve_file).delete(delete_file),
            )
            .route(
                &format!("{prefix}/files/:file_id/content"),
                get(file_content),
            );
    }

    router
        .route(
            "/:provider/v1/files",
            get(list_files_for_provider).post(create_file_for_provider),
        )
        .route(
            "/:provider/v1/files/:file_id",
            get(retrieve_file_for_provider).delete(delete_file_for_provider),
        )
        .route(
            "/:provider/v1/files/:file_id/content",
            get(file_content_for_provider),
        )
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

type HandlerResult = std::result::Result<Response, (StatusCode, Json<ErrorResponse>)>;

async fn create_file(
    State(state): State<FilesGatewayState>,
    Query(query): Query<ProviderQuery>,
    headers: HeaderMap,
    multipart: Multipart,
) -> HandlerResult {
    handle_create(state, headers, query.provider, multipart).await
}

async fn create_file_for_provider(
    State(state): State<FilesGatewayState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> HandlerResult {
    handle_create(state, headers, Some(provider), multipart).await
}

async fn retrieve_file(
    State(state): State<FilesGatewayState>,
    Path(file_id): Path<String>,
    Query(query): Query<ProviderQuery>,
    headers: HeaderMap,
) -> HandlerResult {
    let provider = effective_provider(query.provider, None);
    run_operation(&state, &headers, provider, FileOperation::Retrieve { file_id }).await
}

async fn retrieve_file_for_provider(
    State(state): State<FilesGatewayState>,
    Path((provider, file_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> HandlerResult {
    run_operation(&state, &headers, provider, FileOperation::Retrieve { file_id }).await
}

async fn file_content(
    State(state): State<FilesGatewayState>,
    Path(file_id): Path<String>,
    Query(query): Query<ProviderQuery>,
    headers: HeaderMap,
) -> HandlerResult {
    let provider = effective_provider(query.provider, None);
    run_operation(&state, &headers, provider, FileOperation::Content { file_id }).await
}

async fn file_content_for_provider(
    State(state): State<FilesGatewayState>,
    Path((provider, file_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> HandlerResult {
    run_operation(&state, &headers, provider, FileOperation::Content { file_id }).await
}

async fn delete_file(
    State(state): State<FilesGatewayState>,
    Path(file_id): Path<String>,
    Query(query): Query<ProviderQuery>,
    headers: HeaderMap,
) -> HandlerResult {
    let provider = effective_provider(query.provider, None);
    run_operation(&state, &headers, provider, FileOperation::Delete { file_id }).await
}

async fn delete_file_for_provider(
    State(state): State<FilesGatewayState>,
    Path((provider, file_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> HandlerResult {
    run_operation(&state, &headers, provider, FileOperation::Delete { file_id }).await
}

async fn list_files(
    State(state): State<FilesGatewayState>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> HandlerResult {
    let provider = effective_provider(query.provider, None);
    run_operation(
        &state,
        &headers,
        provider,
        FileOperation::List {
            purpose: query.purpose,
        },
    )
    .await
}

async fn list_files_for_provider(
    State(state): State<FilesGatewayState>,
    Path(provider): Path<String>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> HandlerResult {
    run_operation(
        &state,
        &headers,
        provider,
        FileOperation::List {
            purpose: query.purpose,
        },
    )
    .await
}

async fn handle_create(
    state: FilesGatewayState,
    headers: HeaderMap,
    provider_hint: Option<String>,
    mut multipart: Multipart,
) -> HandlerResult {
    let form = read_create_form(&mut multipart)
        .await
        .map_err(|err| normalize_error(&err))?;
    let provider = effective_provider(provider_hint, form.provider_field);
    run_operation(
        &state,
        &headers,
        provider,
        FileOperation::Create {
            upload: form.upload,
        },
    )
    .await
}

struct CreateForm {
    upload: CreateFileUpload,
    provider_field: Option<String>,
}

async fn read_create_form(multipart: &mut Multipart) -> Result<CreateForm> {
    let mut purpose: Option<String> = None;
    let mut provider_field: Option<String> = None;
    let mut file: Option<(String, Option<String>, bytes::Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        GatewayError::invalid_request(format!("malformed multipart body: {err}"))
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "purpose" => {
                purpose = Some(field.text().await.map_err(|err| {
                    GatewayError::invalid_request(format!("unreadable `purpose` field: {err}"))
                })?);
            }
            "custom_llm_provider" => {
                provider_field = Some(field.text().await.map_err(|err| {
                    GatewayError::invalid_request(format!(
                        "unreadable `custom_llm_provider` field: {err}"
                    ))
                })?);
            }
            "file" => {
                let filename = field.file_name().unwrap_or("file").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|err| {
                    GatewayError::invalid_request(format!("unreadable `file` field: {err}"))
                })?;
                file = Some((filename, content_type, bytes));
            }
            _ => {
                // drain unknown fields so the stream stays consumable
                let _ = field.bytes().await;
            }
        }
    }

    let purpose = purpose.ok_or_else(|| GatewayError::missing_param("purpose"))?;
    let (filename, content_type, bytes) =
        file.ok_or_else(|| GatewayError::missing_param("file"))?;

    Ok(CreateForm {
        upload: CreateFileUpload {
            filename,
            content_type,
            bytes,
            purpose,
        },
        provider_field,
    })
}

fn effective_provider(hint: Option<String>, payload_field: Option<String>) -> String {
    hint.filter(|value| !value.trim().is_empty())
        .or_else(|| payload_field.filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_PROVIDER.to_string())
}

/// The shared pipeline behind all five operations: authenticate, dispatch,
/// invoke, notify, render. Every failure funnels through a single
/// normalization point.
async fn run_operation(
    state: &FilesGatewayState,
    headers: &HeaderMap,
    provider: String,
    op: FileOperation,
) -> HandlerResult {
    let caller = authenticate(state, headers).map_err(|err| normalize_error(&err))?;
    let ctx = CallContext {
        call_id: extract_header(headers, "x-request-id").unwrap_or_else(generate_request_id),
        caller,
    };

    tracing::debug!(
        call_id = %ctx.call_id,
        operation = op.name(),
        provider = %provider,
        "handling file operation"
    );

    let rendered = match execute(state, &provider, &op).await {
        Ok(reply) => {
            let hooks = state.hooks.clone();
            let call_id = ctx.call_id.clone();
            tokio::spawn(async move {
                hooks
                    .update_request_status(&call_id, CallStatus::Success)
                    .await;
            });
            render(state, &ctx, &op, reply)
        }
        Err(err) => Err(err),
    };

    match rendered {
        Ok(response) => Ok(response),
        Err(err) => {
            state.hooks.on_call_failure(&ctx, &err).await;
            tracing::error!(
                call_id = %ctx.call_id,
                operation = op.name(),
                error = %err,
                "file operation failed"
            );
            Err(normalize_error(&err))
        }
    }
}

async fn execute(
    state: &FilesGatewayState,
    provider: &str,
    op: &FileOperation,
) -> Result<BackendReply> {
    match op {
        FileOperation::Create { upload } => {
            let sniffed = if state.loadbalance_batches {
                sniff::sniff_model(&upload.bytes)
            } else {
                None
            };
            let known = state.known_pool_models();
            let decision = dispatch::decide(
                state.loadbalance_batches,
                sniffed.as_deref(),
                &known,
                provider,
                &ProviderSettings::new(),
                &state.files_config,
            )?;

            match decision {
                DispatchDecision::Pool { model } => {
                    let router = state
                        .router
                        .as_ref()
                        .ok_or(GatewayError::RouterNotInitialized)?;
                    tracing::debug!(model = %model, "routing upload through the model pool");
                    router.create_file(&model, upload.clone()).await
                }
                DispatchDecision::Provider { provider, settings } => {
                    state
                        .backend
                        .create_file(&provider, &settings, upload.clone())
                        .await
                }
            }
        }
        FileOperation::Retrieve { file_id } => {
            let settings = lenient_settings(&state.files_config, provider);
            state
                .backend
                .retrieve_file(provider, &settings, file_id)
                .await
        }
        FileOperation::Content { file_id } => {
            let settings = lenient_settings(&state.files_config, provider);
            state
                .backend
                .file_content(provider, &settings, file_id)
                .await
        }
        FileOperation::Delete { file_id } => {
            let settings = lenient_settings(&state.files_config, provider);
            state
                .backend
                .delete_file(provider, &settings, file_id)
                .await
        }
        FileOperation::List { purpose } => {
            let settings = lenient_settings(&state.files_config, provider);
            state
                .backend
                .list_files(provider, &settings, purpose.as_deref())
                .await
        }
    }
}

/// Provider overrides for the non-create operations: missing files settings
/// are not an error here, only an absent override.
fn lenient_settings(store: &FilesConfigStore, provider: &str) -> ProviderSettings {
    let config = store.resolve_if_configured(provider).unwrap_or_default();
    dispatch::merge_settings(&config, &ProviderSettings::new())
}

fn render(
    state: &FilesGatewayState,
    ctx: &CallContext,
    op: &FileOperation,
    reply: BackendReply,
) -> Result<Response> {
    let envelope = envelope_headers(&reply.meta, ctx, &state.version);

    if let FileOperation::Content { .. } = op {
        let raw = reply.content.ok_or_else(|| {
            GatewayError::InvalidResponse(
                "backend reply is missing the wrapped transport response".to_string(),
            )
        })?;

        let mut response = Response::new(Body::from(raw.body));
        *response.status_mut() =
            StatusCode::from_u16(raw.status).unwrap_or(StatusCode::OK);
        for (name, value) in &raw.headers {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                continue;
            };
            let Ok(value) = HeaderValue::from_str(value) else {
                continue;
            };
            response.headers_mut().insert(name, value);
        }
        response.headers_mut().extend(envelope);
        return Ok(response);
    }

    Ok((envelope, Json(reply.body)).into_response())
}

fn authenticate(state: &FilesGatewayState, headers: &HeaderMap) -> Result<CallerIdentity> {
    if state.gateway_keys.is_empty() {
        return Ok(CallerIdentity::default());
    }

    let token = extract_bearer(headers).ok_or(GatewayError::Unauthorized)?;
    state
        .gateway_keys
        .iter()
        .find(|key| key.token == token)
        .map(|key| CallerIdentity {
            key_id: key.key_id.clone(),
            allowed_model_region: key.allowed_model_region.clone(),
        })
        .ok_or(GatewayError::Unauthorized)
}

fn normalize_error(err: &GatewayError) -> (StatusCode, Json<ErrorResponse>) {
    let status = err.status_code();
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody {
                message: err.to_string(),
                kind: err.error_type().to_string(),
                param: err.param().map(str::to_string),
                code: status.as_u16(),
            },
        }),
    )
}

fn extract_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let auth = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())?
        .trim()
        .to_string();
    let rest = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))?;
    let token = rest.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn generate_request_id() -> String {
    let seq = REQUEST_ID_SEQ.fetch_add(1, Ordering::Relaxed);
    let ts_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0);
    format!("filegate-{ts_ms}-{seq}")
}
