//! Route resolution and the client-side role gate.

use fms_db::models::profile::Profile;
use fms_db::repositories::ProfileRepo;

use crate::error::AppResult;
use crate::session::SessionState;
use crate::state::AppContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Auth,
    Dashboard,
    Admin,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Landing => "/",
            Route::Auth => "/auth",
            Route::Dashboard => "/dashboard",
            Route::Admin => "/admin",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "" => Some(Route::Landing),
            "/auth" => Some(Route::Auth),
            "/dashboard" => Some(Route::Dashboard),
            "/admin" => Some(Route::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Landing,
    Auth,
    FacultyDashboard,
    AdminDashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Loading,
    Render(View),
    Redirect(Route),
}

/// Where the signed-in user's profile stands.
#[derive(Debug, Clone, Copy)]
pub enum ProfileLookup<'a> {
    Pending,
    Missing,
    Found(&'a Profile),
}

/// Decide what `route` shows for the given identity.
///
/// Only a loaded profile with the admin role opens the admin view; anything
/// else is sent back to the dashboard, which falls back to the faculty view.
pub fn resolve(route: Route, session: &SessionState, profile: ProfileLookup<'_>) -> RouteDecision {
    if session.loading {
        return RouteDecision::Loading;
    }

    match route {
        Route::Landing | Route::Auth if session.is_signed_in() => {
            RouteDecision::Redirect(Route::Dashboard)
        }
        Route::Landing => RouteDecision::Render(View::Landing),
        Route::Auth => RouteDecision::Render(View::Auth),
        Route::Dashboard | Route::Admin if !session.is_signed_in() => {
            RouteDecision::Redirect(Route::Auth)
        }
        Route::Dashboard => match profile {
            ProfileLookup::Pending => RouteDecision::Loading,
            ProfileLookup::Found(p) if p.role.is_admin() => {
                RouteDecision::Render(View::AdminDashboard)
            }
            _ => RouteDecision::Render(View::FacultyDashboard),
        },
        Route::Admin => match profile {
            ProfileLookup::Pending => RouteDecision::Loading,
            ProfileLookup::Found(p) if p.role.is_admin() => {
                RouteDecision::Render(View::AdminDashboard)
            }
            _ => RouteDecision::Redirect(Route::Dashboard),
        },
    }
}

/// Resolve `route` for the current session, loading the profile first.
pub async fn navigate(ctx: &AppContext, route: Route) -> AppResult<RouteDecision> {
    let session = ctx.session.ready().await;
    let profile = match session.user_id() {
        Some(id) => ProfileRepo::find_by_id(ctx.data.as_ref(), id).await?,
        None => None,
    };
    let lookup = match &profile {
        Some(p) => ProfileLookup::Found(p),
        None => ProfileLookup::Missing,
    };
    let decision = resolve(route, &session, lookup);
    tracing::debug!(route = route.path(), ?decision, "Route resolved");
    Ok(decision)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use fms_core::roles::Role;
    use fms_core::types::Id;
    use fms_remote::{AuthUser, UserMetadata};

    use super::*;

    fn signed_in() -> SessionState {
        SessionState {
            user: Some(AuthUser {
                id: Id::new_v4(),
                email: "rao@uni.edu".into(),
                email_confirmed_at: Some(Utc::now()),
                user_metadata: UserMetadata::default(),
            }),
            session: None,
            loading: false,
        }
    }

    fn signed_out() -> SessionState {
        SessionState {
            loading: false,
            ..SessionState::default()
        }
    }

    fn profile(role: Role) -> Profile {
        Profile {
            id: Id::new_v4(),
            email: "rao@uni.edu".into(),
            full_name: "Dr. Rao".into(),
            role,
            department: None,
            employee_id: None,
            phone: None,
            avatar_url: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn loading_session_blocks_every_route() {
        for route in [Route::Landing, Route::Auth, Route::Dashboard, Route::Admin] {
            assert_eq!(
                resolve(route, &SessionState::default(), ProfileLookup::Pending),
                RouteDecision::Loading
            );
        }
    }

    #[test]
    fn signed_out_users_go_to_auth() {
        assert_eq!(
            resolve(Route::Dashboard, &signed_out(), ProfileLookup::Missing),
            RouteDecision::Redirect(Route::Auth)
        );
        assert_eq!(
            resolve(Route::Admin, &signed_out(), ProfileLookup::Missing),
            RouteDecision::Redirect(Route::Auth)
        );
        assert_eq!(
            resolve(Route::Landing, &signed_out(), ProfileLookup::Missing),
            RouteDecision::Render(View::Landing)
        );
    }

    #[test]
    fn signed_in_users_skip_landing_and_auth() {
        assert_eq!(
            resolve(Route::Auth, &signed_in(), ProfileLookup::Pending),
            RouteDecision::Redirect(Route::Dashboard)
        );
    }

    #[test]
    fn dashboard_dispatches_by_role() {
        let admin = profile(Role::Admin);
        let faculty = profile(Role::Faculty);
        assert_eq!(
            resolve(Route::Dashboard, &signed_in(), ProfileLookup::Found(&admin)),
            RouteDecision::Render(View::AdminDashboard)
        );
        assert_eq!(
            resolve(Route::Dashboard, &signed_in(), ProfileLookup::Found(&faculty)),
            RouteDecision::Render(View::FacultyDashboard)
        );
        assert_eq!(
            resolve(Route::Dashboard, &signed_in(), ProfileLookup::Missing),
            RouteDecision::Render(View::FacultyDashboard)
        );
    }

    #[test]
    fn admin_view_is_role_gated() {
        let faculty = profile(Role::Faculty);
        let student = profile(Role::Student);
        assert_eq!(
            resolve(Route::Admin, &signed_in(), ProfileLookup::Found(&faculty)),
            RouteDecision::Redirect(Route::Dashboard)
        );
        assert_eq!(
            resolve(Route::Admin, &signed_in(), ProfileLookup::Found(&student)),
            RouteDecision::Redirect(Route::Dashboard)
        );
        assert_eq!(
            resolve(Route::Admin, &signed_in(), ProfileLookup::Pending),
            RouteDecision::Loading
        );
    }

    #[test]
    fn paths_round_trip() {
        for route in [Route::Landing, Route::Auth, Route::Dashboard, Route::Admin] {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
        assert_eq!(Route::from_path("/nope"), None);
    }
}
