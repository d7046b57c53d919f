//! Runtime for executing conversations
//!
//! The engine owns no session state between runs. Everything it needs is
//! loaded from the checkpoint store at the start of a run and written back
//! at the end.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{EngineConfig, EngineError, RunReply, WorkflowEngine};
pub use traits::*;

/// Type alias for production engine with concrete implementations
pub type ProductionEngine = WorkflowEngine<DatabaseStorage, LlmGenerationClient, ProviderSearchClient>;
