use serde::{Deserialize, Serialize};

pub const ANONYMOUS_USER: &str = "anonymous";

/// Acting user as resolved by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: String,
    #[serde(default)]
    is_admin: bool,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: false,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: true,
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_USER)
    }

    #[must_use]
    pub fn effective_id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.is_admin
    }
}
