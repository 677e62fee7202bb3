//! Remote data service contract and its implementations.
//!
//! The portal never talks to the network directly. It depends on three
//! traits defined here:
//!
//! - [`AuthService`]: identities, sessions, and the auth-change feed
//! - [`DataService`]: table reads and writes described by a [`Query`]
//! - [`FileStorage`]: object upload and public URLs
//!
//! [`HttpBackend`] speaks the hosted backend's REST API; [`MemoryBackend`]
//! keeps everything in process.

pub mod auth;
pub mod data;
pub mod error;
pub mod http;
pub mod memory;
pub mod query;
pub mod storage;

pub use auth::{
    AuthChange, AuthChangeEvent, AuthService, AuthSession, AuthUser, SignUpOutcome,
    SignUpRequest, UserMetadata,
};
pub use data::DataService;
pub use error::RemoteError;
pub use http::{HttpBackend, RemoteConfig};
pub use memory::{MemoryBackend, Operation};
pub use query::{tables, Query};
pub use storage::FileStorage;
