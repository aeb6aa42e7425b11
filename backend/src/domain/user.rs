//! Platform users and their stored documents.
//!
//! Users are stored as JSON documents keyed by the platform id rendered as
//! text. Older documents used snake_case profile fields and a `lastLogin`
//! timestamp; [`UserDocument::into_record`] merges those names into the
//! canonical camelCase shape whenever a document is read.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Platform-assigned numeric user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformUserId(i64);

impl PlatformUserId {
    /// Wrap a raw platform id.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw numeric value.
    pub fn get(self) -> i64 {
        self.0
    }

    /// Store key for the user document.
    pub fn document_key(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for PlatformUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User profile as delivered by the platform launch context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformIdentity {
    /// Platform user id.
    pub id: PlatformUserId,
    /// Given name.
    pub first_name: String,
    /// Family name, if shared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Public handle, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// IETF language tag of the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    /// Premium subscription flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_premium: Option<bool>,
}

/// Canonical stored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Platform user id.
    pub telegram_id: i64,
    /// Given name.
    pub first_name: String,
    /// Family name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Public handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// IETF language tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    /// Premium subscription flag.
    #[serde(default)]
    pub is_premium: bool,
    /// First sighting.
    pub created_at: DateTime<Utc>,
    /// Last write to the document.
    pub updated_at: DateTime<Utc>,
    /// Last login.
    pub last_seen: DateTime<Utc>,
    /// Group identifiers the user belongs to; not written by any flow yet.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserRecord {
    /// Record for a user seen for the first time.
    pub fn first_sighting(identity: &PlatformIdentity, now: DateTime<Utc>) -> Self {
        Self {
            telegram_id: identity.id.get(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            username: identity.username.clone(),
            language_code: identity.language_code.clone(),
            is_premium: identity.is_premium.unwrap_or(false),
            created_at: now,
            updated_at: now,
            last_seen: now,
            groups: Vec::new(),
        }
    }

    /// Refresh profile attributes and login timestamps.
    ///
    /// `created_at` and `groups` are preserved.
    #[must_use]
    pub fn refreshed(self, identity: &PlatformIdentity, now: DateTime<Utc>) -> Self {
        Self {
            telegram_id: identity.id.get(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            username: identity.username.clone(),
            language_code: identity.language_code.clone(),
            is_premium: identity.is_premium.unwrap_or(false),
            updated_at: now,
            last_seen: now,
            ..self
        }
    }

    /// Serialise into a store document.
    pub fn to_document(&self) -> Result<UserDocument, UserDocumentError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => Ok(UserDocument(fields)),
            Ok(_) => Err(UserDocumentError::new("user record did not serialise to an object")),
            Err(err) => Err(UserDocumentError::new(err.to_string())),
        }
    }
}

/// A stored user document could not be read or written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid user document: {message}")]
pub struct UserDocumentError {
    message: String,
}

impl UserDocumentError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

const LEGACY_FIELDS: [(&str, &str); 6] = [
    ("id", "telegramId"),
    ("first_name", "firstName"),
    ("last_name", "lastName"),
    ("language_code", "languageCode"),
    ("is_premium", "isPremium"),
    ("lastLogin", "lastSeen"),
];

/// Raw user document as held by the store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserDocument(Map<String, Value>);

impl UserDocument {
    /// Wrap a JSON object.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Parse a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, UserDocumentError> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(UserDocumentError::new(format!(
                "expected an object, found {other}"
            ))),
        }
    }

    /// Underlying JSON object.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Merge legacy field names and decode the canonical record.
    ///
    /// Canonical fields win when both spellings are present. Missing
    /// `updatedAt`/`lastSeen`/`createdAt` are back-filled from whichever of
    /// the three is present.
    ///
    /// # Examples
    /// ```
    /// use serde_json::json;
    /// use taskboard::domain::UserDocument;
    ///
    /// let doc = UserDocument::from_value(json!({
    ///     "id": 7,
    ///     "first_name": "Ada",
    ///     "createdAt": "2024-01-01T00:00:00Z",
    ///     "lastLogin": "2024-02-01T00:00:00Z"
    /// }))
    /// .expect("object");
    /// let record = doc.into_record().expect("legacy document migrates");
    /// assert_eq!(record.first_name, "Ada");
    /// assert_eq!(record.telegram_id, 7);
    /// ```
    pub fn into_record(self) -> Result<UserRecord, UserDocumentError> {
        let mut fields = self.0;
        for (legacy, canonical) in LEGACY_FIELDS {
            if let Some(value) = fields.remove(legacy) {
                fields.entry(canonical).or_insert(value);
            }
        }

        let fallback_time = ["lastSeen", "updatedAt", "createdAt"]
            .iter()
            .find_map(|key| fields.get(*key).cloned());
        if let Some(time) = fallback_time {
            for key in ["createdAt", "updatedAt", "lastSeen"] {
                fields.entry(key).or_insert_with(|| time.clone());
            }
        }

        serde_json::from_value(Value::Object(fields))
            .map_err(|err| UserDocumentError::new(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn identity() -> PlatformIdentity {
        PlatformIdentity {
            id: PlatformUserId::new(12345),
            first_name: "Test".to_owned(),
            last_name: Some("User".to_owned()),
            username: Some("testuser".to_owned()),
            language_code: Some("en".to_owned()),
            is_premium: None,
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[rstest]
    fn first_sighting_sets_all_timestamps(identity: PlatformIdentity) {
        let record = UserRecord::first_sighting(&identity, at(1));
        assert_eq!(record.created_at, at(1));
        assert_eq!(record.updated_at, at(1));
        assert_eq!(record.last_seen, at(1));
        assert!(record.groups.is_empty());
        assert!(!record.is_premium);
    }

    #[rstest]
    fn refresh_preserves_creation_and_groups(identity: PlatformIdentity) {
        let mut record = UserRecord::first_sighting(&identity, at(1));
        record.groups = vec!["g1".to_owned()];
        let renamed = PlatformIdentity {
            first_name: "Renamed".to_owned(),
            ..identity
        };

        let refreshed = record.refreshed(&renamed, at(5));
        assert_eq!(refreshed.created_at, at(1));
        assert_eq!(refreshed.last_seen, at(5));
        assert_eq!(refreshed.updated_at, at(5));
        assert_eq!(refreshed.first_name, "Renamed");
        assert_eq!(refreshed.groups, vec!["g1".to_owned()]);
    }

    #[rstest]
    fn document_round_trips_canonical_record(identity: PlatformIdentity) {
        let record = UserRecord::first_sighting(&identity, at(2));
        let document = record.to_document().expect("serialise");
        assert_eq!(document.fields()["telegramId"], json!(12345));
        assert_eq!(document.into_record().expect("decode"), record);
    }

    #[rstest]
    fn legacy_names_are_merged() {
        let document = UserDocument::from_value(json!({
            "id": 99,
            "first_name": "Legacy",
            "last_name": "Person",
            "language_code": "ja",
            "is_premium": true,
            "createdAt": "2025-01-01T00:00:00Z",
            "lastLogin": "2025-06-01T00:00:00Z",
            "groups": []
        }))
        .expect("object");

        let record = document.into_record().expect("migrates");
        assert_eq!(record.telegram_id, 99);
        assert_eq!(record.last_name.as_deref(), Some("Person"));
        assert_eq!(record.language_code.as_deref(), Some("ja"));
        assert!(record.is_premium);
        assert_eq!(record.last_seen.to_rfc3339(), "2025-06-01T00:00:00+00:00");
        assert_eq!(record.updated_at, record.last_seen);
    }

    #[rstest]
    fn canonical_fields_win_over_legacy_ones() {
        let document = UserDocument::from_value(json!({
            "telegramId": 1,
            "firstName": "Canonical",
            "first_name": "Legacy",
            "createdAt": "2025-01-01T00:00:00Z"
        }))
        .expect("object");

        let record = document.into_record().expect("migrates");
        assert_eq!(record.first_name, "Canonical");
        assert_eq!(record.last_seen, record.created_at);
    }

    #[rstest]
    fn document_without_timestamps_is_rejected() {
        let document = UserDocument::from_value(json!({
            "telegramId": 1,
            "firstName": "NoTime"
        }))
        .expect("object");
        assert!(document.into_record().is_err());
    }

    #[rstest]
    fn non_object_values_are_rejected() {
        assert!(UserDocument::from_value(json!([1, 2])).is_err());
    }

    #[rstest]
    fn identity_deserializes_platform_payload() {
        let identity: PlatformIdentity = serde_json::from_value(json!({
            "id": 5,
            "first_name": "Ada",
            "is_premium": true,
            "allows_write_to_pm": true
        }))
        .expect("platform payload");
        assert_eq!(identity.id, PlatformUserId::new(5));
        assert_eq!(identity.is_premium, Some(true));
        assert!(identity.username.is_none());
    }
}
