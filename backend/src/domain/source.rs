//! Ingestible content sources managed by webhook events.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Source identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(Uuid);

impl SourceId {
    /// Generate a new identifier.
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

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SourceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Stable storage representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok(Self::$variant), )+
                    other => Err(format!(concat!("unknown ", stringify!($name), ": {}"), other)),
                }
            }
        }
    };
}

string_enum! {
    /// Kind of content behind a source.
    pub enum SourceKind {
        /// Uploaded document.
        Document => "document",
        /// Crawled website.
        Website => "website",
        /// External API.
        Api => "api",
        /// Database extract.
        Database => "database",
        /// Anything else.
        Other => "other",
    }
}

string_enum! {
    /// Indexing state of a source.
    pub enum SourceStatus {
        /// Waiting to be indexed.
        Pending => "pending",
        /// Indexed and searchable.
        Indexed => "indexed",
        /// Indexing failed.
        Failed => "failed",
        /// Content changed since the last index run.
        Outdated => "outdated",
    }
}

/// Content item indexed by the answer service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Identifier.
    pub id: SourceId,
    /// Title (required).
    pub title: String,
    /// Description.
    pub description: String,
    /// Content kind.
    pub kind: SourceKind,
    /// Origin URL.
    pub url: String,
    /// Raw content.
    pub content: String,
    /// Free-form string metadata.
    pub metadata: BTreeMap<String, String>,
    /// Owner.
    pub user_id: UserId,
    /// Whether other users may see it.
    pub is_public: bool,
    /// Tags.
    pub tags: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Last successful index run.
    pub last_indexed: Option<DateTime<Utc>>,
    /// Indexing state.
    pub status: SourceStatus,
}

/// Fields supplied when a source is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSource {
    /// Title (required, non-blank).
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Optional kind; defaults to [`SourceKind::Document`].
    pub kind: Option<SourceKind>,
    /// Optional URL.
    pub url: Option<String>,
    /// Optional content.
    pub content: Option<String>,
    /// Metadata map.
    pub metadata: BTreeMap<String, String>,
    /// Owner.
    pub user_id: UserId,
    /// Visibility.
    pub is_public: bool,
    /// Tags.
    pub tags: Vec<String>,
}

impl Source {
    /// Materialise a new pending source.
    #[must_use]
    pub fn create(new: NewSource, now: DateTime<Utc>) -> Self {
        Self {
            id: SourceId::random(),
            title: new.title.trim().to_owned(),
            description: new.description.unwrap_or_default(),
            kind: new.kind.unwrap_or(SourceKind::Document),
            url: new.url.unwrap_or_default(),
            content: new.content.unwrap_or_default(),
            metadata: new.metadata,
            user_id: new.user_id,
            is_public: new.is_public,
            tags: new.tags.into_iter().map(|tag| tag.trim().to_owned()).collect(),
            created_at: now,
            updated_at: now,
            last_indexed: None,
            status: SourceStatus::Pending,
        }
    }

    /// Replace content and metadata, marking the source for re-indexing.
    pub fn mark_updated(
        &mut self,
        content: Option<String>,
        metadata: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) {
        if let Some(value) = content {
            self.content = value;
        }
        self.metadata = metadata;
        self.updated_at = now;
        self.status = SourceStatus::Outdated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn new_source() -> NewSource {
        NewSource {
            title: "  Handbook ".to_owned(),
            description: None,
            kind: None,
            url: None,
            content: None,
            metadata: BTreeMap::new(),
            user_id: UserId::random(),
            is_public: false,
            tags: vec![" intro ".to_owned()],
        }
    }

    #[rstest]
    fn create_applies_defaults() {
        let source = Source::create(new_source(), Utc::now());
        assert_eq!(source.title, "Handbook");
        assert_eq!(source.kind, SourceKind::Document);
        assert_eq!(source.status, SourceStatus::Pending);
        assert_eq!(source.tags, vec!["intro".to_owned()]);
    }

    #[rstest]
    fn update_marks_outdated() {
        let mut source = Source::create(new_source(), Utc::now());
        source.mark_updated(Some("v2".to_owned()), BTreeMap::new(), Utc::now());
        assert_eq!(source.status, SourceStatus::Outdated);
        assert_eq!(source.content, "v2");
    }

    #[rstest]
    #[case("website", SourceKind::Website)]
    #[case("other", SourceKind::Other)]
    fn parses_kinds(#[case] raw: &str, #[case] expected: SourceKind) {
        assert_eq!(raw.parse::<SourceKind>(), Ok(expected));
        assert_eq!(expected.as_str(), raw);
    }

    #[rstest]
    fn rejects_unknown_status() {
        assert!("archived".parse::<SourceStatus>().is_err());
    }
}
