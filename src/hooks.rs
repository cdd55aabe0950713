//! Lifecycle holders that UI bindings drive: [`RequestHook`] for reads and [`MutationHook`]
//! for writes.
//!
//! Neither hook spawns anything. Fetches and mutations are plain `Send` futures that the
//! binding hands to its executor, and results land in shared state the binding re-reads
//! through `snapshot()`.

pub mod mutation;
pub mod request;

pub use mutation::*;
pub use request::*;
