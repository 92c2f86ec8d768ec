//! Cross-context message transport abstraction.
//!
//! Provides the primitives every other xdm layer builds on:
//! - [`RawChannel`], a best-effort, string-oriented message channel between two
//!   browsing contexts
//! - [`BrowsingContext`], which hands out channels to hosted frames or to the
//!   embedding parent
//! - [`EventLoop`], the explicit "run on a later turn" scheduling primitive
//! - origin and URL helpers used to decide where messages may go
//!
//! The [`memory`] module implements all of the above in-process, which is what
//! the tests and the CLI demo run on.

pub mod error;
pub mod event_loop;
pub mod memory;
pub mod origin;
pub mod traits;

pub use error::{Result, TransportError};
pub use event_loop::EventLoop;
pub use memory::{MemoryBrowser, MemoryChannel, MemoryWindow};
pub use origin::{append_query_parameters, normalize_location, parse_query, resolve_url};
pub use traits::{
    BrowsingContext, FrameSpec, Listener, LoadHook, ListenerId, MessageData, MessageEvent, RawChannel,
};
