//! Domain rules shared by every faculty portal crate: roles, validation,
//! and the activity record encodings.

pub mod activity;
pub mod activity_record;
pub mod attendance;
pub mod error;
pub mod record_codec;
pub mod roles;
pub mod schedule;
pub mod types;
