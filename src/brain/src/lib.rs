//! # Aegis Brain - LLM Routing Layer
//!
//! The brain crate owns provider selection, response caching and daily token
//! accounting for the Aegis kernel. Everything above it (agents, the
//! coordinator, the pipeline) calls [`LlmRouter::think`] and treats the
//! router as the single source of truth for daily consumption via the
//! [`DailyTokenSource`] seam.

pub mod provider;
pub mod router;
pub mod types;

pub use provider::{EchoProvider, FlakyProvider, Provider};
pub use router::LlmRouter;
pub use types::*;
