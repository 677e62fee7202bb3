//! Faculty management portal client.
//!
//! Headless application layer over the hosted backend: session tracking,
//! a polling read cache, mutations that invalidate it, document uploads,
//! and the faculty and admin dashboards as view models.

pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod mutation;
pub mod session;
pub mod state;
pub mod upload;
pub mod views;

pub use config::PortalConfig;
pub use error::{AppError, AppResult};
pub use state::{AppContext, Backend};
