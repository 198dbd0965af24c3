//! Storage gateway for the notification orchestration core.
//!
//! Typed operations over SQLite, each running in an explicit transactional
//! work scope with eager loading only. Channel delivery URLs are encrypted
//! at rest and never logged.

pub mod crypto;
pub mod entities;
pub mod error;
pub mod gateway;

pub use crypto::{CipherUrl, UrlCipher};
pub use entities::*;
pub use error::StoreError;
pub use gateway::{ChannelFilter, StoreGateway, WorkScope};
