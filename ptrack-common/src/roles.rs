//! Study roles and the principal performing a request

use serde::{Deserialize, Serialize};

/// Role of a study team member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Research Assistant: registers participants, records screening
    #[serde(rename = "RA")]
    ResearchAssistant,
    /// Research Officer: confirms data receipt
    #[serde(rename = "RO")]
    ResearchOfficer,
    /// Principal investigator / site administrator
    #[serde(rename = "AD")]
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::ResearchAssistant, Role::ResearchOfficer, Role::Admin];

    /// Two-letter code stored in the database
    pub fn code(&self) -> &'static str {
        match self {
            Role::ResearchAssistant => "RA",
            Role::ResearchOfficer => "RO",
            Role::Admin => "AD",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.code() == code)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::ResearchAssistant => "Research Assistant",
            Role::ResearchOfficer => "Research Officer",
            Role::Admin => "PI",
        }
    }
}

/// Dashboard a user lands on after login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dashboard {
    Ra,
    Ro,
    Summary,
}

impl Dashboard {
    pub fn path(&self) -> &'static str {
        match self {
            Dashboard::Ra => "/api/dashboard/ra",
            Dashboard::Ro => "/api/dashboard/ro",
            Dashboard::Summary => "/api/dashboard/summary",
        }
    }
}

/// Authenticated caller, reduced to what permission checks need
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub role: Option<Role>,
    pub site_id: Option<i64>,
    pub is_superuser: bool,
}

impl Principal {
    pub fn has_role(&self, roles: &[Role]) -> bool {
        self.role.map(|r| roles.contains(&r)).unwrap_or(false)
    }

    /// Holds one of `roles`, or is a superuser
    pub fn allowed(&self, roles: &[Role]) -> bool {
        self.is_superuser || self.has_role(roles)
    }

    /// PI or superuser
    pub fn is_admin(&self) -> bool {
        self.allowed(&[Role::Admin])
    }

    /// May tick checklist items and write per-item comments
    pub fn can_confirm_items(&self) -> bool {
        self.allowed(&[Role::ResearchOfficer, Role::Admin])
    }

    /// Superusers see every site; everyone else only their own
    pub fn can_see_site(&self, site_id: i64) -> bool {
        self.is_superuser || self.site_id == Some(site_id)
    }

    /// Site filter for queries: `None` means all sites
    pub fn site_scope(&self) -> SiteScope {
        if self.is_superuser {
            SiteScope::All
        } else {
            SiteScope::Site(self.site_id)
        }
    }

    /// Landing dashboard after login
    pub fn landing_dashboard(&self) -> Dashboard {
        match self.role {
            Some(Role::ResearchAssistant) => Dashboard::Ra,
            Some(Role::ResearchOfficer) => Dashboard::Ro,
            Some(Role::Admin) => Dashboard::Summary,
            None => Dashboard::Ra,
        }
    }

    /// Dashboard to return to after editing a participant
    pub fn after_update_dashboard(&self) -> Dashboard {
        match self.role {
            Some(Role::ResearchAssistant) if !self.is_superuser => Dashboard::Ra,
            Some(Role::ResearchOfficer) if !self.is_superuser => Dashboard::Ro,
            _ => Dashboard::Summary,
        }
    }
}

/// Which sites a query may return rows for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteScope {
    All,
    /// A user without a site sees nothing
    Site(Option<i64>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Option<Role>, site_id: Option<i64>, is_superuser: bool) -> Principal {
        Principal {
            user_id: 1,
            username: "tester".to_string(),
            role,
            site_id,
            is_superuser,
        }
    }

    #[test]
    fn test_role_codes() {
        for role in Role::ALL {
            assert_eq!(Role::from_code(role.code()), Some(role));
        }
        assert_eq!(Role::from_code("XX"), None);
        assert_eq!(Role::Admin.display_name(), "PI");
    }

    #[test]
    fn test_role_serializes_as_code() {
        let json = serde_json::to_string(&Role::ResearchOfficer).unwrap();
        assert_eq!(json, "\"RO\"");
        let role: Role = serde_json::from_str("\"AD\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_landing_dashboard_by_role() {
        assert_eq!(
            principal(Some(Role::ResearchAssistant), Some(1), false).landing_dashboard(),
            Dashboard::Ra
        );
        assert_eq!(
            principal(Some(Role::ResearchOfficer), Some(1), false).landing_dashboard(),
            Dashboard::Ro
        );
        assert_eq!(
            principal(Some(Role::Admin), Some(1), false).landing_dashboard(),
            Dashboard::Summary
        );
        assert_eq!(principal(None, None, true).landing_dashboard(), Dashboard::Ra);
    }

    #[test]
    fn test_permissions() {
        let ra = principal(Some(Role::ResearchAssistant), Some(1), false);
        let ro = principal(Some(Role::ResearchOfficer), Some(1), false);
        let superuser = principal(None, None, true);

        assert!(!ra.can_confirm_items());
        assert!(ro.can_confirm_items());
        assert!(superuser.can_confirm_items());
        assert!(!ro.is_admin());
        assert!(superuser.is_admin());

        assert!(ra.can_see_site(1));
        assert!(!ra.can_see_site(2));
        assert!(superuser.can_see_site(2));
        assert_eq!(superuser.site_scope(), SiteScope::All);
        assert_eq!(ra.site_scope(), SiteScope::Site(Some(1)));
    }
}
