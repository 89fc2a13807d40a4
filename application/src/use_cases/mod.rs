//! Use cases
//!
//! Request handling: the dispatcher, per-session workers and one handler
//! per capability.

pub mod audio;
pub mod chat;
pub mod dispatch;
pub mod image;
pub mod shared;
mod worker;

#[cfg(test)]
pub(crate) mod test_support;
