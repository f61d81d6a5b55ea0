//! User data model.
//!
//! A user is created on first sign-in (OAuth), on registration, or as a
//! baseline record when their profile is first read. The access role gates
//! administrative behaviour; the onboarding persona seeds preference defaults.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Validation errors raised while constructing user values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserValidationError {
    /// The identifier was not a UUID.
    #[error("user id must be a valid UUID")]
    InvalidId,
    /// The email address was blank.
    #[error("email must not be empty")]
    EmptyEmail,
    /// The email address was not of the form `local@domain`.
    #[error("email must look like name@example.com")]
    InvalidEmail,
    /// The display name was blank.
    #[error("name must not be empty")]
    EmptyName,
    /// The role string is not one of the known access roles.
    #[error("unknown role: {0}")]
    UnknownRole(String),
    /// The persona string is not one of the known onboarding personas.
    #[error("unknown persona: {0}")]
    UnknownPersona(String),
}

/// Stable user identifier stored as a UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Validate and construct a [`UserId`] from its string form.
    pub fn new(id: impl AsRef<str>) -> Result<Self, UserValidationError> {
        let raw = id.as_ref();
        if raw.trim() != raw {
            return Err(UserValidationError::InvalidId);
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| UserValidationError::InvalidId)
    }

    /// Generate a new random [`UserId`].
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = UserValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Normalised (trimmed, lower-cased) email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate and normalise an email address.
    ///
    /// # Examples
    /// ```
    /// use cervello::domain::EmailAddress;
    ///
    /// let email = EmailAddress::new("  Ada@Example.COM ").expect("valid email");
    /// assert_eq!(email.as_str(), "ada@example.com");
    /// ```
    pub fn new(raw: impl AsRef<str>) -> Result<Self, UserValidationError> {
        let normalised = raw.as_ref().trim().to_lowercase();
        if normalised.is_empty() {
            return Err(UserValidationError::EmptyEmail);
        }
        let Some((local, domain)) = normalised.split_once('@') else {
            return Err(UserValidationError::InvalidEmail);
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
            return Err(UserValidationError::InvalidEmail);
        }
        Ok(Self(normalised))
    }

    /// Borrow the normalised address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// Access role controlling administrative privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
    /// Regular account.
    #[default]
    User,
    /// Full administrative access.
    Admin,
    /// Moderation access.
    Moderator,
}

impl AccessRole {
    /// Stable storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Moderator => "moderator",
        }
    }
}

impl FromStr for AccessRole {
    type Err = UserValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            other => Err(UserValidationError::UnknownRole(other.to_owned())),
        }
    }
}

/// Onboarding persona used to seed preference defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Software developer.
    Developer,
    /// Teacher or educator.
    Teacher,
    /// Business user.
    Business,
    /// Researcher.
    Researcher,
}

impl Persona {
    /// Stable storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Developer => "developer",
            Self::Teacher => "teacher",
            Self::Business => "business",
            Self::Researcher => "researcher",
        }
    }

    /// Personas accepted by the onboarding endpoint.
    #[must_use]
    pub const fn is_onboarding_choice(self) -> bool {
        matches!(self, Self::Developer | Self::Teacher)
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = UserValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "developer" => Ok(Self::Developer),
            "teacher" => Ok(Self::Teacher),
            "business" => Ok(Self::Business),
            "researcher" => Ok(Self::Researcher),
            other => Err(UserValidationError::UnknownPersona(other.to_owned())),
        }
    }
}

/// Login and usage counters kept alongside the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetadata {
    /// Timestamp of the most recent sign-in.
    pub last_login: Option<DateTime<Utc>>,
    /// Number of sign-ins.
    pub login_count: u32,
    /// Number of questions asked.
    pub query_count: u32,
}

/// Application user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Stable identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Unique email address.
    pub email: EmailAddress,
    /// Avatar URL.
    pub image: Option<String>,
    /// When the identity provider verified the email, if it did.
    pub email_verified: Option<DateTime<Utc>>,
    /// Access role.
    pub role: AccessRole,
    /// Onboarding persona, set once onboarding completes.
    pub persona: Option<Persona>,
    /// bcrypt hash for credential accounts; `None` for OAuth-only accounts.
    pub password_hash: Option<String>,
    /// Usage counters.
    pub metadata: UserMetadata,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a fresh user record with default role and empty counters.
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        email: EmailAddress,
        now: DateTime<Utc>,
    ) -> Result<Self, UserValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(UserValidationError::EmptyName);
        }
        Ok(Self {
            id,
            name,
            email,
            image: None,
            email_verified: None,
            role: AccessRole::default(),
            persona: None,
            password_hash: None,
            metadata: UserMetadata::default(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether onboarding has been completed.
    #[must_use]
    pub const fn onboarded(&self) -> bool {
        self.persona.is_some()
    }

    /// Whether the user holds the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == AccessRole::Admin
    }

    /// Record a successful sign-in.
    pub fn record_login(&mut self, now: DateTime<Utc>) {
        self.metadata.last_login = Some(now);
        self.metadata.login_count = self.metadata.login_count.saturating_add(1);
        self.updated_at = now;
    }

    /// Record a submitted question.
    pub fn record_query(&mut self, now: DateTime<Utc>) {
        self.metadata.query_count = self.metadata.query_count.saturating_add(1);
        self.updated_at = now;
    }
}
