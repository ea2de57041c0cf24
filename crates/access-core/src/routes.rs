//! ============================================================================
//! Dashboard Routes - Which page needs which role
//! ============================================================================
//! Every dashboard page mounts one gate with the requirement listed here.
//! Marketing pages are public and never mount a gate.
//! ============================================================================

use serde::Serialize;

use crate::access::{Requirement, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardRoute {
    pub path: &'static str,
    pub title: &'static str,
    pub requirement: Requirement,
}

const fn gated(path: &'static str, title: &'static str, role: Role) -> DashboardRoute {
    DashboardRoute {
        path,
        title,
        requirement: Requirement::Role(role),
    }
}

pub const DASHBOARD_ROUTES: &[DashboardRoute] = &[
    gated("/miner", "Miner Dashboard", Role::Miner),
    // Was hard-wired to "always granted"; gated like its parent
    gated("/miner/minerals", "Registered Minerals", Role::Miner),
    gated("/refiner", "Refiner Dashboard", Role::Refiner),
    gated("/buyer", "Buyer Dashboard", Role::Buyer),
    gated("/transporter", "Transporter Dashboard", Role::Transporter),
    gated("/auditor", "Auditor Dashboard", Role::Auditor),
    gated("/inspector", "Inspector Dashboard", Role::Inspector),
    gated("/admin", "Admin Dashboard", Role::Admin),
    // Was hard-wired to "always granted"; gated like its parent
    gated("/admin/management", "Role Management", Role::Admin),
];

pub const PUBLIC_PAGES: &[&str] = &[
    "/",
    "/about",
    "/blog",
    "/careers",
    "/contact",
    "/docs",
    "/help",
    "/partners",
    "/portfolio",
    "/services",
];

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Route entry governing `path`: the longest route that is `path` itself or
/// a parent of it at a segment boundary
pub fn route_for(path: &str) -> Option<&'static DashboardRoute> {
    let path = normalize(path);
    DASHBOARD_ROUTES
        .iter()
        .filter(|route| {
            path == route.path
                || path
                    .strip_prefix(route.path)
                    .map(|rest| rest.starts_with('/'))
                    .unwrap_or(false)
        })
        .max_by_key(|route| route.path.len())
}

/// Requirement for a page, or None for public pages
pub fn requirement_for(path: &str) -> Option<Requirement> {
    route_for(path).map(|route| route.requirement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_role_has_a_dashboard() {
        for role in Role::ALL {
            let path = format!("/{}", role);
            assert_eq!(requirement_for(&path), Some(Requirement::Role(role)), "{}", path);
        }
    }

    #[test]
    fn test_previously_bypassed_pages_are_gated() {
        assert_eq!(
            requirement_for("/admin/management"),
            Some(Requirement::Role(Role::Admin))
        );
        assert_eq!(
            requirement_for("/miner/minerals"),
            Some(Requirement::Role(Role::Miner))
        );
    }

    #[test]
    fn test_nested_and_decorated_paths() {
        assert_eq!(
            route_for("/admin/management/").map(|r| r.title),
            Some("Role Management")
        );
        assert_eq!(
            requirement_for("/refiner/batches/42?tab=history"),
            Some(Requirement::Role(Role::Refiner))
        );
        // Segment boundary: "/minerals" is not under "/miner"
        assert_eq!(requirement_for("/minerals"), None);
    }

    #[test]
    fn test_public_pages_have_no_gate() {
        for page in PUBLIC_PAGES {
            assert_eq!(requirement_for(page), None, "{}", page);
        }
        assert_eq!(requirement_for(""), None);
    }
}
