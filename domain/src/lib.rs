//! Domain layer for mqtt-gpt-relay
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or transport concerns.
//!
//! # Core Concepts
//!
//! ## Session
//!
//! A session is the conversational state for one broker topic. Its history is
//! a bounded [`Conversation`]: the system turn always sits at position 0 and
//! the oldest exchange turns are evicted first once the cap is reached.
//!
//! ## Capability
//!
//! Every inbound request is routed to exactly one [`Capability`] (chat or
//! draw) by a [`CapabilityClassifier`] built from ordered rules.
//!
//! ## Envelopes
//!
//! [`InboundRequest`] and [`OutboundMessage`] are the JSON shapes carried over
//! the broker.

pub mod capability;
pub mod core;
pub mod relay;
pub mod session;
pub mod util;

// Re-export commonly used types
pub use capability::{
    classifier::CapabilityClassifier,
    rule::{CapabilityRule, DrawKeywordRule},
    Capability,
};
pub use core::error::DomainError;
pub use relay::{
    request::InboundRequest,
    response::{OutboundMessage, FINISH_SENTINEL, IMAGE_PNG},
};
pub use session::{
    cache::{Ensured, SessionCache},
    entities::{Role, SessionKey, Turn},
    history::Conversation,
    policy::SessionPolicy,
    stream::StreamEvent,
};
