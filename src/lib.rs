//! filegate: an OpenAI-compatible files gateway.
//!
//! Exposes the five `/v1/files` operations and forwards each call either to
//! a fixed provider backend or, for batch uploads declaring a model known
//! to the load-balanced pool, through that pool.

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod envelope;
mod error;
pub mod hooks;
pub mod http;
pub mod router;
pub mod sniff;

pub use backend::{
    BackendMeta, BackendReply, CreateFileUpload, FileBackend, HttpFileBackend, RawContent,
};
pub use config::{FilesConfigStore, GatewayConfig, ProviderSettings};
pub use dispatch::{DispatchDecision, decide, merge_settings};
pub use error::{GatewayError, Result};
pub use hooks::{CallContext, CallStatus, CallerIdentity, NoopStatusHook, StatusHook};
pub use http::{ErrorBody, ErrorResponse, FilesGatewayState, GatewayKey};
pub use router::FileRouter;
pub use sniff::sniff_model;
