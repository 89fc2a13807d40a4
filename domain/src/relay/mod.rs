//! Broker message envelopes.
//!
//! - [`request::InboundRequest`]: decoded unit of work from a request topic
//! - [`response::OutboundMessage`]: one message published to a session topic
//!
//! Binary payloads travel as standard base64 strings inside the JSON bodies.

mod payload;
pub mod request;
pub mod response;
