//! Boundary to the load-balanced model pool.
//!
//! The pool's internals (replica selection, retries, health) live behind
//! this trait; the gateway only needs the set of model names the pool can
//! serve and a way to hand it a file upload for one of them.

use async_trait::async_trait;

use crate::backend::{BackendReply, CreateFileUpload};
use crate::error::Result;

#[async_trait]
pub trait FileRouter: Send + Sync {
    /// Model names the pool currently knows how to serve.
    fn model_names(&self) -> Vec<String>;

    /// Uploads a file through whichever pool target the router selects for
    /// `model`.
    async fn create_file(&self, model: &str, upload: CreateFileUpload) -> Result<BackendReply>;
}
