//! User preferences domain types.
//!
//! Preferences are stored per user and upserted on demand. Partial updates
//! arrive as [`PreferencesPatch`] values and are merged over the stored record
//! (or the defaults when nothing is stored yet).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Persona, UserId};

/// Colour theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light theme.
    Light,
    /// Dark theme.
    Dark,
    /// Follow the operating system.
    #[default]
    System,
}

impl Theme {
    /// Stable storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown theme.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown theme: {0}")]
pub struct ParseThemeError(pub String);

impl FromStr for Theme {
    type Err = ParseThemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(ParseThemeError(other.to_owned())),
        }
    }
}

/// Per-user preference record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPreferences {
    /// Owner of the preferences.
    pub user_id: UserId,
    /// Colour theme.
    pub theme: Theme,
    /// Whether to show notifications.
    pub notifications: bool,
    /// Whether answers include their source citations.
    pub show_sources: bool,
    /// Prefer answers with code snippets.
    pub code_snippets: bool,
    /// Prefer technical terminology.
    pub technical_terms: bool,
    /// Prefer simplified explanations.
    pub simplified_explanations: bool,
    /// Include educational resources.
    pub educational_resources: bool,
    /// Persist asked questions in history.
    pub query_saving: bool,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl UserPreferences {
    /// Defaults applied before any explicit choice is made.
    ///
    /// # Examples
    /// ```
    /// use cervello::domain::{Theme, UserId, UserPreferences};
    ///
    /// let prefs = UserPreferences::defaults(UserId::random(), chrono::Utc::now());
    /// assert_eq!(prefs.theme, Theme::System);
    /// assert!(prefs.notifications && prefs.show_sources);
    /// assert!(!prefs.code_snippets);
    /// ```
    #[must_use]
    pub const fn defaults(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            theme: Theme::System,
            notifications: true,
            show_sources: true,
            code_snippets: false,
            technical_terms: false,
            simplified_explanations: false,
            educational_resources: false,
            query_saving: true,
            updated_at: now,
        }
    }

    /// Defaults seeded by an onboarding persona.
    #[must_use]
    pub fn for_persona(user_id: UserId, persona: Persona, now: DateTime<Utc>) -> Self {
        let mut prefs = Self::defaults(user_id, now);
        prefs.apply(&PreferencesPatch::for_persona(persona), now);
        prefs
    }

    /// Merge a partial update over this record.
    pub fn apply(&mut self, patch: &PreferencesPatch, now: DateTime<Utc>) {
        let PreferencesPatch {
            theme,
            notifications,
            show_sources,
            code_snippets,
            technical_terms,
            simplified_explanations,
            educational_resources,
            query_saving,
        } = *patch;

        if let Some(value) = theme {
            self.theme = value;
        }
        merge(&mut self.notifications, notifications);
        merge(&mut self.show_sources, show_sources);
        merge(&mut self.code_snippets, code_snippets);
        merge(&mut self.technical_terms, technical_terms);
        merge(&mut self.simplified_explanations, simplified_explanations);
        merge(&mut self.educational_resources, educational_resources);
        merge(&mut self.query_saving, query_saving);
        self.updated_at = now;
    }
}

fn merge(slot: &mut bool, value: Option<bool>) {
    if let Some(flag) = value {
        *slot = flag;
    }
}

/// Partial preferences update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreferencesPatch {
    /// New theme.
    pub theme: Option<Theme>,
    /// New notification flag.
    pub notifications: Option<bool>,
    /// New show-sources flag.
    pub show_sources: Option<bool>,
    /// New code-snippets flag.
    pub code_snippets: Option<bool>,
    /// New technical-terms flag.
    pub technical_terms: Option<bool>,
    /// New simplified-explanations flag.
    pub simplified_explanations: Option<bool>,
    /// New educational-resources flag.
    pub educational_resources: Option<bool>,
    /// New query-saving flag.
    pub query_saving: Option<bool>,
}

impl PreferencesPatch {
    /// Flags switched on for each persona.
    #[must_use]
    pub fn for_persona(persona: Persona) -> Self {
        match persona {
            Persona::Developer => Self {
                code_snippets: Some(true),
                technical_terms: Some(true),
                ..Self::default()
            },
            Persona::Teacher => Self {
                simplified_explanations: Some(true),
                educational_resources: Some(true),
                ..Self::default()
            },
            Persona::Business => Self {
                simplified_explanations: Some(true),
                ..Self::default()
            },
            Persona::Researcher => Self {
                technical_terms: Some(true),
                show_sources: Some(true),
                ..Self::default()
            },
        }
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
