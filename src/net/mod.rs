//! Backend boundary: wire types, HTTP client, poll-cycle state machine

pub mod api;
pub mod protocol;
pub mod sync;

pub use api::{ApiClient, ApiError};
pub use sync::{NetworkSync, SyncAction};
