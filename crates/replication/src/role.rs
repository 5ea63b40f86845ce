//! Role change requests.

use std::fmt;

/// Promote `new_master` (a slave of `group`) to master.
///
/// The current master, if any, is demoted to slave.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RoleChange {
    pub group: String,
    pub new_master: String,
}

impl RoleChange {
    pub fn new(group: impl Into<String>, new_master: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            new_master: new_master.into(),
        }
    }
}

impl fmt::Display for RoleChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.group, self.new_master)
    }
}
