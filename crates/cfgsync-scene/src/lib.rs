//! Scene deltas for cfgsync.
//!
//! The same add/update/remove shape as the config sets, applied to live
//! actors. Each recipient gets its own stream of [`SceneDelta`]s, each
//! one diffed against the newest snapshot that recipient has
//! acknowledged rather than the previous delta. A lost delta therefore
//! doesn't need to be resent: the next one still applies.
//!
//! ```text
//! DeltaSender::compose ──SceneDelta──→ DeltaReceiver::receive
//!        ▲                                      │
//!        └──────── acknowledge(timestamp) ──────┘
//! ```

mod config;
mod error;
mod receiver;
mod sender;
mod types;

pub use config::DeltaConfig;
pub use error::DeltaError;
pub use receiver::DeltaReceiver;
pub use sender::DeltaSender;
pub use types::{ActorId, Replicated, Scene, SceneDelta};
