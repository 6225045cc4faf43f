use serde::{Deserialize, Serialize};

/// The two well-known classes that must always exist after initialization.
pub const ALL_CLASS: &str = "ALL";
pub const FARM_CLASS: &str = "FARM";

/// A named group of hosts. Atomic classes are tags on hosts; composite classes
/// are sets whose extension is the *intersection* of their members' extensions.
/// Members are stored by name and resolved through the registry; a `Class`
/// never holds another `Class` by value, which keeps a renamed or deleted
/// class from leaving stale copies behind in every composite that once
/// referenced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    pub description: String,
    pub resource: bool,
    /// Names of member classes. Non-empty only for composite classes; a
    /// resource class must have no members.
    pub members: Vec<String>,
}

impl Class {
    pub fn new(name: impl Into<String>, description: impl Into<String>, resource: bool) -> Self {
        Class { name: name.into(), description: description.into(), resource, members: Vec::new() }
    }

    pub fn composite(name: impl Into<String>, description: impl Into<String>, members: Vec<String>) -> Self {
        Class { name: name.into(), description: description.into(), resource: false, members }
    }

    pub fn is_composite(&self) -> bool {
        !self.members.is_empty()
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Class {}

/// By member count ascending, then name ascending.
impl PartialOrd for Class {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Class {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.members.len().cmp(&other.members.len()).then_with(|| self.name.cmp(&other.name))
    }
}

/// A name token valid for a class: `\w+`.
pub fn is_valid_class_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
