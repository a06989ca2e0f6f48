//! Execution engine module
//!
//! Order submission behind a trait, with a paper engine for replay runs

mod paper;
mod types;

pub use paper::PaperEngine;
pub use types::{ExecutionError, Fill, OrderId, OrderRequest};

use async_trait::async_trait;

/// Trait for execution engine implementations
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Submit a market order; a venue refusal is `ExecutionError::Rejected`
    async fn submit_order(&self, order: OrderRequest) -> Result<Fill, ExecutionError>;
    /// All fills so far
    async fn fills(&self) -> Vec<Fill>;
}
