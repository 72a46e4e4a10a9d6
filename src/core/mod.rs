//! Core bridge types: object identities, configuration, errors.
//!
//! These types are shared by every component and carry no Lua state.

pub mod config;
pub mod error;
pub mod object;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use object::{
    card_class_name, CardInfo, CoroutineId, Handle, ObjectId, ObjectKind, ObjectRef, SessionId,
};
