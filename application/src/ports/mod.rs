//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod ai_provider;
pub mod publisher;
pub mod session_store;
pub mod transcript;
