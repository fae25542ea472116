//! # Identity and Access Policy
//!
//! Roles carried by verified tokens and the `{subject, method, path}` rule
//! table every service consults before dispatching a request.
//!
//! Token signing and verification live in the app crate. This module only
//! knows what a verified identity looks like and whether it may call a route.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// ROLES
// =============================================================================

/// Role of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Policajac")]
    Police,
    #[serde(rename = "Gradjanin")]
    Citizen,
    #[serde(rename = "GranicniSluzbenik")]
    BorderOfficer,
    #[serde(rename = "Tuzioc")]
    Prosecutor,
    #[serde(rename = "Istrazitelj")]
    Investigator,
    #[serde(rename = "Sudija")]
    Judge,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Police,
        Self::Citizen,
        Self::BorderOfficer,
        Self::Prosecutor,
        Self::Investigator,
        Self::Judge,
    ];

    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Police => "Policajac",
            Self::Citizen => "Gradjanin",
            Self::BorderOfficer => "GranicniSluzbenik",
            Self::Prosecutor => "Tuzioc",
            Self::Investigator => "Istrazitelj",
            Self::Judge => "Sudija",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = crate::EupravaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::EupravaError::InvalidRequest(format!("unknown role '{}'", s)))
    }
}

/// Verified claims of a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Id of the user account the token was issued to.
    pub sub: u64,
    pub role: Role,
    /// Expiry as unix seconds.
    pub exp: i64,
}

impl Claims {
    /// Whether the claims are still valid at `now_unix` (seconds).
    #[must_use]
    pub const fn is_live(&self, now_unix: i64) -> bool {
        now_unix < self.exp
    }
}

// =============================================================================
// ACCESS POLICY
// =============================================================================

/// Who a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// Anyone, with or without a token.
    Anonymous,
    /// Any caller holding a valid token.
    Authenticated,
    Role(Role),
}

/// One allowed `{subject, method, path template}` tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pub subject: Subject,
    pub method: String,
    /// Path template; `{name}` matches any single non-empty segment.
    pub path: String,
}

/// Decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// No token and the route is not public.
    Unauthenticated,
    /// Token present but no rule grants its role this route.
    Forbidden,
}

/// Allow-list of routes per role.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
}

impl AccessPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule.
    #[must_use]
    pub fn allow(mut self, subject: Subject, method: &str, path: &str) -> Self {
        self.rules.push(AccessRule {
            subject,
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
        });
        self
    }

    /// Add the same route for several roles.
    #[must_use]
    pub fn allow_roles(mut self, roles: &[Role], method: &str, path: &str) -> Self {
        for role in roles {
            self = self.allow(Subject::Role(*role), method, path);
        }
        self
    }

    /// Routes reachable without a token.
    #[must_use]
    pub fn public(self, method: &str, path: &str) -> Self {
        self.allow(Subject::Anonymous, method, path)
    }

    /// The configured rules.
    #[must_use]
    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    fn matching<'a>(
        &'a self,
        method: &'a str,
        path: &'a str,
    ) -> impl Iterator<Item = &'a AccessRule> {
        self.rules.iter().filter(move |rule| {
            rule.method.eq_ignore_ascii_case(method) && template_matches(&rule.path, path)
        })
    }

    /// Whether the route is reachable without a token.
    #[must_use]
    pub fn is_public(&self, method: &str, path: &str) -> bool {
        self.matching(method, path)
            .any(|rule| rule.subject == Subject::Anonymous)
    }

    /// Decide a request made by a caller with `role` (`None` = no token).
    #[must_use]
    pub fn decide(&self, role: Option<Role>, method: &str, path: &str) -> Decision {
        let allowed = self.matching(method, path).any(|rule| match rule.subject {
            Subject::Anonymous => true,
            Subject::Authenticated => role.is_some(),
            Subject::Role(required) => role == Some(required),
        });

        match (allowed, role) {
            (true, _) => Decision::Allow,
            (false, None) => Decision::Unauthenticated,
            (false, Some(_)) => Decision::Forbidden,
        }
    }
}

/// Match a concrete path against a template such as `/predmeti/{id}`.
fn template_matches(template: &str, path: &str) -> bool {
    let mut expected = template.trim_end_matches('/').split('/');
    let mut actual = path.trim_end_matches('/').split('/');

    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return true,
            (Some(want), Some(got)) => {
                let is_param = want.starts_with('{') && want.ends_with('}');
                if is_param {
                    if got.is_empty() {
                        return false;
                    }
                } else if want != got {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
