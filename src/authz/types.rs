use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subject whose grants are shared with every member of the `public` group.
pub const PUBLIC_SUBJECT: &str = "public";

/// Resource name used for introspection requests.
pub const SCHEMA_RESOURCE: &str = "__schema";

/// What a caller wants to do with a field: read it or change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    Query,
    Mutation,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Query => "Query",
            Action::Mutation => "Mutation",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Query" => Ok(Action::Query),
            "Mutation" => Ok(Action::Mutation),
            other => Err(other.to_string()),
        }
    }
}

/// A grant: `subject` (an identity or a group) may perform `action` on `resource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    pub subject: String,
    pub resource: String,
    pub action: Action,
}

impl Permission {
    pub fn new(subject: impl Into<String>, resource: impl Into<String>, action: Action) -> Self {
        Self {
            subject: subject.into(),
            resource: resource.into(),
            action,
        }
    }
}

/// `member` inherits every grant held by `group`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Membership {
    pub member: String,
    pub group: String,
}

/// Intermediate result from parsing a single KDL file.
#[derive(Debug, Clone, Default)]
pub struct ParsedPolicy {
    pub permissions: Vec<Permission>,
    pub memberships: Vec<Membership>,
}

// ---------- API request/response types ----------

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// e.g. "alice"
    pub subject: String,
    /// e.g. "foo"
    pub resource: String,
    /// "Query" or "Mutation"
    pub action: Action,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
}
