//! Repository for the `profiles` table.

use fms_core::roles::Role;
use fms_core::types::Id;
use fms_remote::{tables, DataService, Query, RemoteError};

use crate::models::profile::{Profile, UpdateProfile};
use crate::{decode_row, decode_rows};

pub struct ProfileRepo;

impl ProfileRepo {
    /// Find a profile by identity ID.
    pub async fn find_by_id(
        data: &dyn DataService,
        id: Id,
    ) -> Result<Option<Profile>, RemoteError> {
        let query = Query::table(tables::PROFILES).eq("id", id.to_string()).limit(1);
        let rows = data.select(&query).await?;
        rows.into_iter().next().map(decode_row).transpose()
    }

    /// All profiles with `role`, newest first.
    pub async fn list_by_role(
        data: &dyn DataService,
        role: Role,
    ) -> Result<Vec<Profile>, RemoteError> {
        let query = Query::table(tables::PROFILES)
            .eq("role", role.as_str())
            .newest_first();
        decode_rows(data.select(&query).await?)
    }

    pub async fn count_by_role(data: &dyn DataService, role: Role) -> Result<u64, RemoteError> {
        data.count(&Query::table(tables::PROFILES).eq("role", role.as_str()))
            .await
    }

    /// Patch a profile. Returns `None` when no row matched.
    pub async fn update(
        data: &dyn DataService,
        id: Id,
        input: &UpdateProfile,
    ) -> Result<Option<Profile>, RemoteError> {
        let query = Query::table(tables::PROFILES).eq("id", id.to_string());
        let rows = data.update(&query, serde_json::to_value(input)?).await?;
        rows.into_iter().next().map(decode_row).transpose()
    }
}
