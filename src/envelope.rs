//! Gateway metadata headers added to every successful response.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::backend::BackendMeta;
use crate::hooks::CallContext;

pub const HEADER_MODEL_ID: &str = "x-filegate-model-id";
pub const HEADER_CACHE_KEY: &str = "x-filegate-cache-key";
pub const HEADER_API_BASE: &str = "x-filegate-api-base";
pub const HEADER_VERSION: &str = "x-filegate-version";
pub const HEADER_MODEL_REGION: &str = "x-filegate-model-region";
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Renders backend-call metadata and caller attributes as response headers.
/// All lookups default to the empty string; this never fails.
pub fn envelope_headers(meta: &BackendMeta, ctx: &CallContext, version: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, HEADER_MODEL_ID, meta.model_id.as_deref().unwrap_or(""));
    insert(&mut headers, HEADER_CACHE_KEY, meta.cache_key.as_deref().unwrap_or(""));
    insert(&mut headers, HEADER_API_BASE, meta.api_base.as_deref().unwrap_or(""));
    insert(&mut headers, HEADER_VERSION, version);
    insert(
        &mut headers,
        HEADER_MODEL_REGION,
        ctx.caller.allowed_model_region.as_deref().unwrap_or(""),
    );
    insert(&mut headers, HEADER_REQUEST_ID, &ctx.call_id);
    headers
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    let name = HeaderName::from_static(name);
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}
