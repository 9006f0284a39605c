//! # tw-follower
//!
//! One screen of a ticker wall.
//!
//! - [`api`]: leader client (unary calls + join stream)
//! - [`mirror`]: local copy of leader state, frame computation
//! - [`sync`]: connect / apply / reconnect state machine
//! - [`frame`]: headless frame loop

pub mod api;
pub mod frame;
pub mod mirror;
pub mod sync;

pub use api::LeaderClient;
pub use mirror::{ConnectionStatus, Frame, Mirror, MirrorState, RenderedTicker};
pub use sync::Follower;
