//! Staff identity model.
//!
//! # Responsibility
//! - Describe the engine's view of an externally managed account.
//! - Define the role seniority order and declared translation languages.
//!
//! # Invariants
//! - A `STAFF` user always carries a role; subscribers never do.
//! - `StaffRole` ordering is the read-seniority order, not a write grant.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a user account.
pub type UserId = Uuid;

/// Newsroom roles ordered by read seniority.
///
/// Write capability is decided per stage by the role policy, so
/// `Editor > Journalist` must never be read as "an editor can do anything a
/// journalist can".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StaffRole {
    Intern,
    Journalist,
    SubEditor,
    Editor,
    Admin,
    SuperAdmin,
}

impl StaffRole {
    pub const ALL: [StaffRole; 6] = [
        StaffRole::Intern,
        StaffRole::Journalist,
        StaffRole::SubEditor,
        StaffRole::Editor,
        StaffRole::Admin,
        StaffRole::SuperAdmin,
    ];

    /// Stable storage/wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Intern => "INTERN",
            Self::Journalist => "JOURNALIST",
            Self::SubEditor => "SUB_EDITOR",
            Self::Editor => "EDITOR",
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPERADMIN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INTERN" => Some(Self::Intern),
            "JOURNALIST" => Some(Self::Journalist),
            "SUB_EDITOR" => Some(Self::SubEditor),
            "EDITOR" => Some(Self::Editor),
            "ADMIN" => Some(Self::Admin),
            "SUPERADMIN" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    /// Returns whether this role is at least `other` in read seniority.
    pub fn is_at_least(self, other: StaffRole) -> bool {
        self >= other
    }
}

impl Display for StaffRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account class. Only staff take part in editorial workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    Staff,
    Subscriber,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Staff => "STAFF",
            Self::Subscriber => "SUBSCRIBER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "STAFF" => Some(Self::Staff),
            "SUBSCRIBER" => Some(Self::Subscriber),
            _ => None,
        }
    }
}

/// Broadcast languages a story can be written or translated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Language {
    English,
    Afrikaans,
    Xhosa,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::English => "ENGLISH",
            Self::Afrikaans => "AFRIKAANS",
            Self::Xhosa => "XHOSA",
        }
    }

    /// Parses a language name, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ENGLISH" => Some(Self::English),
            "AFRIKAANS" => Some(Self::Afrikaans),
            "XHOSA" => Some(Self::Xhosa),
            _ => None,
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account record as seen by the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub user_type: UserType,
    /// Required for staff, absent for subscribers.
    pub role: Option<StaffRole>,
    /// Language this user translates into, if any.
    pub translation_language: Option<Language>,
    pub is_active: bool,
}

/// Validation failures for user records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    BlankDisplayName,
    StaffWithoutRole,
    SubscriberWithRole,
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankDisplayName => write!(f, "user display name must not be blank"),
            Self::StaffWithoutRole => write!(f, "staff users must carry a role"),
            Self::SubscriberWithRole => write!(f, "subscriber users must not carry a staff role"),
        }
    }
}

impl Error for UserValidationError {}

impl User {
    /// Creates an active staff user with a generated ID.
    pub fn staff(display_name: impl Into<String>, role: StaffRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            user_type: UserType::Staff,
            role: Some(role),
            translation_language: None,
            is_active: true,
        }
    }

    /// Creates an active subscriber (radio station) account.
    pub fn subscriber(display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            user_type: UserType::Subscriber,
            role: None,
            translation_language: None,
            is_active: true,
        }
    }

    /// Builder-style helper for declaring a translation language.
    pub fn with_translation_language(mut self, language: Language) -> Self {
        self.translation_language = Some(language);
        self
    }

    /// Returns the staff role when this user is active staff.
    pub fn active_staff_role(&self) -> Option<StaffRole> {
        if self.is_active && self.user_type == UserType::Staff {
            self.role
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<(), UserValidationError> {
        if self.display_name.trim().is_empty() {
            return Err(UserValidationError::BlankDisplayName);
        }
        match (self.user_type, self.role) {
            (UserType::Staff, None) => Err(UserValidationError::StaffWithoutRole),
            (UserType::Subscriber, Some(_)) => Err(UserValidationError::SubscriberWithRole),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Language, StaffRole, User, UserValidationError};

    #[test]
    fn roles_are_ordered_by_read_seniority() {
        assert!(StaffRole::SuperAdmin > StaffRole::Admin);
        assert!(StaffRole::Editor.is_at_least(StaffRole::SubEditor));
        assert!(!StaffRole::Intern.is_at_least(StaffRole::Journalist));
    }

    #[test]
    fn role_strings_round_trip() {
        for role in StaffRole::ALL {
            assert_eq!(StaffRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(StaffRole::parse("editor"), None);
    }

    #[test]
    fn language_parse_is_case_insensitive() {
        assert_eq!(Language::parse(" afrikaans "), Some(Language::Afrikaans));
        assert_eq!(Language::parse("XHOSA"), Some(Language::Xhosa));
        assert_eq!(Language::parse("klingon"), None);
    }

    #[test]
    fn inactive_staff_has_no_active_role() {
        let mut user = User::staff("Thandi", StaffRole::Journalist);
        assert_eq!(user.active_staff_role(), Some(StaffRole::Journalist));
        user.is_active = false;
        assert_eq!(user.active_staff_role(), None);
    }

    #[test]
    fn subscriber_with_role_is_invalid() {
        let mut user = User::subscriber("Radio Zibonele");
        user.role = Some(StaffRole::Editor);
        assert_eq!(user.validate(), Err(UserValidationError::SubscriberWithRole));
    }
}
