use std::fmt::Display;

/// What a name in the catalog resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceKind {
    Single,
    /// A group, listing its member names in order
    Group(Vec<String>),
}

impl WorkspaceKind {
    pub fn is_group(&self) -> bool {
        matches!(self, WorkspaceKind::Group(_))
    }
}

impl Display for WorkspaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkspaceKind::Single => write!(f, "single"),
            WorkspaceKind::Group(members) => write!(f, "group of {}", members.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("workspace '{0}' does not exist")]
    NotFound(String),

    #[error("cannot build group '{group}': member '{member}' does not exist")]
    MissingMember { group: String, member: String },
}

/// Shared registry of named workspaces owned by the host.
///
/// Workspaces themselves are never handed out through this trait; callers
/// only ask what a name is, whether it exists, and request removal or
/// grouping. The host is free to reclaim a workspace once its name is removed.
pub trait WorkspaceCatalog: Send + Sync {
    fn kind(&self, name: &str) -> Result<WorkspaceKind, CatalogError>;
    fn contains(&self, name: &str) -> bool;
    fn remove(&self, name: &str) -> Result<(), CatalogError>;
    /// Register `name` as a group of `members`, all of which must exist.
    fn group(&self, name: &str, members: &[String]) -> Result<(), CatalogError>;
}
