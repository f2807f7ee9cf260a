//! Wire-level vocabulary for cfgsync.
//!
//! This crate defines what the server and its subscribers say to each
//! other about the shared configuration registry:
//!
//! - **Identity** ([`ClientId`], [`ConfigClass`], [`ConfigKey`]): who is
//!   talking and which config an entry addresses.
//! - **Entries** ([`ConfigEntry`], [`ConfigValue`]): a key plus a full
//!   serialized snapshot of the config's value.
//! - **Change events** ([`EntryEvent`], [`Commit`], [`SetSnapshot`]): what
//!   happened to the three shared sets (`added`, `updated`, `removed`).
//! - **Messages** ([`UpdateConfigs`], [`SyncEvent`]): the request a client
//!   sends upstream and the events the server broadcasts back.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how config values are
//!   turned into bytes.
//!
//! # Where it sits
//!
//! ```text
//! Registry (typed configs) ↔ Protocol (entries, events) ↔ Server / Client sync
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientId, Commit, ConfigClass, ConfigEntry, ConfigKey, ConfigValue,
    EntryEvent, SetName, SetRecord, SetSnapshot, SyncEvent, UpdateConfigs,
};
