//! Composable communication stack.
//!
//! A stack is an ordered chain of [`Layer`]s. Inbound messages and readiness
//! notices travel up the chain, outbound messages and lifecycle calls travel
//! down. Every operation a layer does not override forwards to the matching
//! neighbor, so a layer only implements what it changes.
//!
//! The chain is stored as an arena indexed by position; neighbor links are
//! indices, and each layer addresses the chain through a [`Cx`] handle.

pub mod queue;
pub mod stack;

pub use queue::Queue;
pub use stack::{Ack, Cx, Layer, Stack};
