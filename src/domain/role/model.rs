/// Named authorization tag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Role {
    pub id: String,
    pub name: String,
}

/// Role required for privileged user lookups
pub const ADMIN_ROLE: &str = "Admin";
