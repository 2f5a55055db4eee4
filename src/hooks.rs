//! Per-call context and the status-tracking collaborator boundary.

use async_trait::async_trait;

use crate::error::GatewayError;

/// Authenticated caller attributes attached before the dispatch core runs.
#[derive(Debug, Clone, Default)]
pub struct CallerIdentity {
    pub key_id: String,
    pub allowed_model_region: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CallContext {
    pub call_id: String,
    pub caller: CallerIdentity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
}

/// External status tracker. Success notifications are fire-and-forget and
/// never affect the response; failure notifications run before the error is
/// rendered so the collaborator can alert on it.
#[async_trait]
pub trait StatusHook: Send + Sync {
    async fn update_request_status(&self, call_id: &str, status: CallStatus);

    async fn on_call_failure(&self, ctx: &CallContext, error: &GatewayError);
}

#[derive(Debug, Default)]
pub struct NoopStatusHook;

#[async_trait]
impl StatusHook for NoopStatusHook {
    async fn update_request_status(&self, _call_id: &str, _status: CallStatus) {}

    async fn on_call_failure(&self, _ctx: &CallContext, _error: &GatewayError) {}
}
