//! Auth-domain identifiers, redacted secrets, and the persisted session model.

pub mod id;
pub mod session;

pub use id::*;
pub use session::*;
