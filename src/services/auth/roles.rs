use std::fmt;

/// Closed role set used by the route policy.
///
/// Identity-service role strings are free-form; `normalize` is the only way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    Advisor,
    Teacher,
    Admin,
}

// (synonym, role) - matched after trim + ASCII lowercase
const SYNONYMS: &[(&str, Role)] = &[
    ("student", Role::Student),
    ("learner", Role::Student),
    ("pupil", Role::Student),
    ("advisor", Role::Advisor),
    ("adviser", Role::Advisor),
    ("counselor", Role::Advisor),
    ("mentor", Role::Advisor),
    ("teacher", Role::Teacher),
    ("instructor", Role::Teacher),
    ("professor", Role::Teacher),
    ("faculty", Role::Teacher),
    ("admin", Role::Admin),
    ("administrator", Role::Admin),
    ("superadmin", Role::Admin),
    ("super_admin", Role::Admin),
];

/// Landing page for an authenticated user without a recognized role.
pub const DEFAULT_HOME: &str = "/home";

impl Role {
    /// Map a raw claim onto the closed set. Unknown values are "no role".
    pub fn normalize(raw: &str) -> Option<Role> {
        let key = raw.trim().to_ascii_lowercase();
        SYNONYMS
            .iter()
            .find(|(synonym, _)| *synonym == key)
            .map(|(_, role)| *role)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Advisor => "advisor",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }

    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Student => "/student",
            Role::Advisor => "/advisor",
            Role::Teacher => "/teacher",
            Role::Admin => "/admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Home path for an optional role.
pub fn home_for(role: Option<Role>) -> &'static str {
    role.map(|r| r.home_path()).unwrap_or(DEFAULT_HOME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_synonyms_case_insensitively() {
        assert_eq!(Role::normalize("advisor"), Some(Role::Advisor));
        assert_eq!(Role::normalize("  Adviser "), Some(Role::Advisor));
        assert_eq!(Role::normalize("PROFESSOR"), Some(Role::Teacher));
        assert_eq!(Role::normalize("Super_Admin"), Some(Role::Admin));
        assert_eq!(Role::normalize("pupil"), Some(Role::Student));
    }

    #[test]
    fn unknown_roles_have_no_role() {
        assert_eq!(Role::normalize(""), None);
        assert_eq!(Role::normalize("root"), None);
        assert_eq!(Role::normalize("admin,teacher"), None);
    }

    #[test]
    fn home_paths() {
        assert_eq!(home_for(Some(Role::Teacher)), "/teacher");
        assert_eq!(home_for(None), DEFAULT_HOME);
    }
}
