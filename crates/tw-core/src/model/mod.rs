//! Cluster model: plain data types shared by the leader and every follower.
//!
//! All types serialize to JSON with `snake_case` field names; that JSON is the
//! wire format of the RPC surface and the admin HTTP façade.

pub mod announcement;
pub mod screen;
pub mod settings;
pub mod ticker;
pub mod update;

pub use announcement::*;
pub use screen::*;
pub use settings::*;
pub use ticker::*;
pub use update::*;
