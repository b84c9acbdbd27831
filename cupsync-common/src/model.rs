//! Archive record types
//!
//! One `CampaignRecord` per cup edition, keyed by the edition number.
//! The serialized form is a flat JSON object so the archive document stays
//! hand-editable; the `AuthorField` tagging exists only in memory.

use serde::{Deserialize, Serialize};

/// Winner value used until the override sheet supplies a real one.
pub const UNKNOWN_WINNER: &str = "Unknown";

/// Account identifiers are long hyphenated tokens; display names are not.
/// The shape is decided once, when a value enters the system.
const ACCOUNT_ID_MIN_LEN: usize = 30;

/// A map author: either a resolved display name or the opaque account
/// identifier the remote API handed us.
///
/// Serialized as the plain string either way. Deserialization re-applies
/// the shape check, so a resolved name stays resolved across round trips
/// and is never sent for resolution again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthorField {
    /// Human-readable display name
    Resolved(String),
    /// Opaque account identifier, not yet resolved
    Unresolved(String),
}

impl AuthorField {
    /// The underlying string, whichever side of the tag it is on.
    pub fn as_str(&self) -> &str {
        match self {
            AuthorField::Resolved(name) => name,
            AuthorField::Unresolved(id) => id,
        }
    }

    /// The account identifier, if this author still needs resolution.
    pub fn account_id(&self) -> Option<&str> {
        match self {
            AuthorField::Unresolved(id) => Some(id),
            AuthorField::Resolved(_) => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, AuthorField::Unresolved(_))
    }
}

impl From<String> for AuthorField {
    fn from(value: String) -> Self {
        if value.len() > ACCOUNT_ID_MIN_LEN && value.contains('-') {
            AuthorField::Unresolved(value)
        } else {
            AuthorField::Resolved(value)
        }
    }
}

impl From<AuthorField> for String {
    fn from(value: AuthorField) -> Self {
        match value {
            AuthorField::Resolved(name) => name,
            AuthorField::Unresolved(id) => id,
        }
    }
}

/// One map in a cup edition's playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRecord {
    pub name: String,
    pub author: AuthorField,
    /// Author medal time in milliseconds, if the API reported one
    pub author_score: Option<i64>,
    /// Map identifier, unique within the parent record's map list
    pub map_id: String,
}

/// One archived cup edition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    /// Edition number, primary key of the archive
    pub edition: u32,
    /// Campaign name as published by the remote API
    pub name: String,
    /// Publish timestamp, kept as the opaque string the API returned
    #[serde(default)]
    pub publish_date: Option<String>,
    /// Cup winner, supplied by the override sheet
    #[serde(default = "default_winner")]
    pub winner: String,
    /// Display date from the override sheet; absent until the sheet has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_date: Option<String>,
    /// Browser URL of the campaign on the source site
    pub source_url: String,
    #[serde(default)]
    pub maps: Vec<MapRecord>,
}

fn default_winner() -> String {
    UNKNOWN_WINNER.to_string()
}
