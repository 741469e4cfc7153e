//! Account roles
//!
//! Roles travel inside bearer tokens so downstream handlers can make
//! authorization decisions without another store lookup.

use serde::{Deserialize, Serialize};

/// Role of an account on the platform.
///
/// The hierarchy is: User < Admin
///
/// # Examples
///
/// ```
/// use zust_accounts::Role;
///
/// assert!(Role::Admin.is_admin());
/// assert!(!Role::User.is_admin());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular account
    #[default]
    User = 0,

    /// Moderator with the right to lock, unlock and ban other accounts
    Admin = 1,
}

impl Role {
    /// Check if this role has admin privileges.
    pub fn is_admin(&self) -> bool {
        *self >= Role::Admin
    }

    /// Parse role from string representation.
    ///
    /// # Arguments
    ///
    /// * `s` - String to parse (case-insensitive)
    ///
    /// # Examples
    ///
    /// ```
    /// use zust_accounts::Role;
    ///
    /// assert_eq!(Role::parse("admin"), Some(Role::Admin));
    /// assert_eq!(Role::parse("USER"), Some(Role::User));
    /// assert_eq!(Role::parse("owner"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Get string representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
