use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::models::ReportId;

/// Anything that can answer "is someone signed in?".
pub trait AuthState {
    fn is_authenticated(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteName {
    Login,
    Register,
    Dashboard,
    Reports,
    NewReport,
    ReportDetail,
    Students,
    Settings,
}

impl RouteName {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteName::Login => "login",
            RouteName::Register => "register",
            RouteName::Dashboard => "dashboard",
            RouteName::Reports => "reports",
            RouteName::NewReport => "new-report",
            RouteName::ReportDetail => "report-detail",
            RouteName::Students => "students",
            RouteName::Settings => "settings",
        }
    }

    pub fn meta(self) -> RouteMeta {
        match self {
            RouteName::Login | RouteName::Register => RouteMeta::GUEST,
            RouteName::Dashboard
            | RouteName::Reports
            | RouteName::NewReport
            | RouteName::ReportDetail
            | RouteName::Students
            | RouteName::Settings => RouteMeta::AUTH,
        }
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_guest: bool,
}

impl RouteMeta {
    pub const PUBLIC: RouteMeta = RouteMeta {
        requires_auth: false,
        requires_guest: false,
    };
    pub const AUTH: RouteMeta = RouteMeta {
        requires_auth: true,
        requires_guest: false,
    };
    pub const GUEST: RouteMeta = RouteMeta {
        requires_auth: false,
        requires_guest: true,
    };
}

/// A resolved destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub name: RouteName,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<ReportId>,
    pub meta: RouteMeta,
}

impl Route {
    pub fn named(name: RouteName) -> Self {
        let path = match name {
            RouteName::Login => "/login",
            RouteName::Register => "/register",
            RouteName::Dashboard => "/dashboard",
            RouteName::Reports => "/reports",
            RouteName::NewReport => "/reports/new",
            RouteName::Students => "/students",
            RouteName::Settings => "/settings",
            RouteName::ReportDetail => "/reports/:id",
        };
        Self {
            name,
            path: path.to_string(),
            report_id: None,
            meta: name.meta(),
        }
    }

    pub fn report_detail(id: ReportId) -> Self {
        Self {
            name: RouteName::ReportDetail,
            path: format!("/reports/{id}"),
            report_id: Some(id),
            meta: RouteName::ReportDetail.meta(),
        }
    }

    /// Resolves a URL path. `/` resolves to the dashboard; unknown paths to `None`.
    pub fn resolve(path: &str) -> Option<Self> {
        if !path.starts_with('/') {
            return None;
        }
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').skip(1).collect();
        let name = match segments.as_slice() {
            [] => RouteName::Dashboard,
            ["login"] => RouteName::Login,
            ["register"] => RouteName::Register,
            ["dashboard"] => RouteName::Dashboard,
            ["reports"] => RouteName::Reports,
            ["reports", "new"] => RouteName::NewReport,
            ["reports", id] if !id.is_empty() => return Some(Self::report_detail(ReportId::new(*id))),
            ["students"] => RouteName::Students,
            ["settings"] => RouteName::Settings,
            _ => return None,
        };
        Some(Self::named(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "to", rename_all = "lowercase")]
pub enum Navigation {
    Allow,
    Redirect(RouteName),
}

/// Decides whether a destination may be entered given the current sign-in state.
pub fn check(meta: RouteMeta, authenticated: bool) -> Navigation {
    if meta.requires_auth && !authenticated {
        Navigation::Redirect(RouteName::Login)
    } else if meta.requires_guest && authenticated {
        Navigation::Redirect(RouteName::Dashboard)
    } else {
        Navigation::Allow
    }
}

#[derive(Debug)]
pub struct NavigationGuard<'a, A: AuthState + ?Sized> {
    auth: &'a A,
}

impl<'a, A: AuthState + ?Sized> NavigationGuard<'a, A> {
    pub fn new(auth: &'a A) -> Self {
        Self { auth }
    }

    pub fn before_each(&self, to: &Route) -> Navigation {
        let decision = check(to.meta, self.auth.is_authenticated());
        debug!(to = %to.path, ?decision, "navigation");
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(bool);

    impl AuthState for Fixed {
        fn is_authenticated(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn protected_route_redirects_guests_to_login() {
        let route = Route::named(RouteName::Reports);
        assert_eq!(
            NavigationGuard::new(&Fixed(false)).before_each(&route),
            Navigation::Redirect(RouteName::Login)
        );
        assert_eq!(NavigationGuard::new(&Fixed(true)).before_each(&route), Navigation::Allow);
    }

    #[test]
    fn guest_route_redirects_users_to_dashboard() {
        let route = Route::named(RouteName::Login);
        assert_eq!(
            NavigationGuard::new(&Fixed(true)).before_each(&route),
            Navigation::Redirect(RouteName::Dashboard)
        );
        assert_eq!(NavigationGuard::new(&Fixed(false)).before_each(&route), Navigation::Allow);
    }

    #[test]
    fn requires_auth_wins_when_both_flags_are_set() {
        let both = RouteMeta {
            requires_auth: true,
            requires_guest: true,
        };
        assert_eq!(check(both, false), Navigation::Redirect(RouteName::Login));
        assert_eq!(check(both, true), Navigation::Redirect(RouteName::Dashboard));
        assert_eq!(check(RouteMeta::PUBLIC, false), Navigation::Allow);
    }

    #[test]
    fn resolves_known_paths() {
        assert_eq!(Route::resolve("/").unwrap().name, RouteName::Dashboard);
        assert_eq!(Route::resolve("/register").unwrap().meta, RouteMeta::GUEST);
        assert_eq!(Route::resolve("/reports/new").unwrap().name, RouteName::NewReport);
        assert_eq!(Route::resolve("/students/").unwrap().name, RouteName::Students);

        let detail = Route::resolve("/reports/3?tab=edit").unwrap();
        assert_eq!(detail.name, RouteName::ReportDetail);
        assert_eq!(detail.report_id, Some(ReportId::new("3")));
        assert!(detail.meta.requires_auth);

        assert!(Route::resolve("/admin").is_none());
        assert!(Route::resolve("login").is_none());
        assert!(Route::resolve("/reports/3/edit").is_none());
    }
}
