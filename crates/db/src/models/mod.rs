//! Row models and DTOs.
//!
//! Each submodule contains:
//! - A `Deserialize` + `Serialize` struct matching a remote row
//! - A `Serialize` create DTO for inserts, where the portal writes the table
//! - An update DTO (all `Option` fields) where the portal patches rows

pub mod class_record;
pub mod class_session;
pub mod course;
pub mod profile;
pub mod stats;
pub mod work_activity;
pub mod work_detail;
