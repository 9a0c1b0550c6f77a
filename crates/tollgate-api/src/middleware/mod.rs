//! # Middleware Modules
//!
//! Tower layers that are not tied to one gateway component. The gate, the
//! auth steps and the response rewriter live in their own modules.

pub mod cors;
pub mod tracing_layer;
