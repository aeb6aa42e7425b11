//! Group identifiers and the launch-parameter contract.
//!
//! A group is the partition key for tasks. The companion bot embeds the chat
//! identifier in the mini-app URL as standard Base64 text; the web session
//! decodes it exactly once per connection. The encoding only survives URL
//! transport. Possession of a group identifier is the whole access model, so
//! the decoded value is validated for shape and nothing else.

use std::fmt;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, general_purpose};
use serde::{Deserialize, Serialize};
use tracing::{Span, debug, warn};
use url::Url;

use super::{Error, ErrorCode, RunMode};

/// Group used when development sessions arrive without a launch parameter.
pub const FALLBACK_GROUP_ID: &str = "test-group-1";

/// Query parameter carrying the encoded group identifier.
pub const LAUNCH_PARAM: &str = "startapp";

/// Maximum accepted length of a decoded group identifier.
pub const GROUP_ID_MAX: usize = 128;

// Standard alphabet; padding is optional on decode as browsers' `atob` allows.
const LAUNCH_PARAM_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    general_purpose::PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Validation errors for [`GroupId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupIdValidationError {
    /// The identifier was empty or whitespace.
    #[error("group id must not be empty")]
    Empty,
    /// The identifier exceeded [`GROUP_ID_MAX`] characters.
    #[error("group id must be at most {max} characters")]
    TooLong {
        /// Maximum permitted length.
        max: usize,
    },
    /// The identifier contained whitespace padding or control characters.
    #[error("group id must not contain control characters or surrounding whitespace")]
    InvalidCharacters,
}

/// Opaque partition key scoping a set of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupId(String);

impl GroupId {
    /// Validate and construct a [`GroupId`].
    ///
    /// # Examples
    /// ```
    /// use taskboard::domain::GroupId;
    ///
    /// let group = GroupId::new("-1001234567890").expect("valid group");
    /// assert_eq!(group.as_ref(), "-1001234567890");
    /// assert!(GroupId::new("  ").is_err());
    /// ```
    pub fn new(value: impl Into<String>) -> Result<Self, GroupIdValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(GroupIdValidationError::Empty);
        }
        if value.chars().count() > GROUP_ID_MAX {
            return Err(GroupIdValidationError::TooLong { max: GROUP_ID_MAX });
        }
        if value.trim() != value || value.chars().any(char::is_control) {
            return Err(GroupIdValidationError::InvalidCharacters);
        }
        Ok(Self(value))
    }

    /// The development fallback group.
    pub fn fallback() -> Self {
        Self(FALLBACK_GROUP_ID.to_owned())
    }

    /// Group identifier for a messaging-platform chat.
    pub fn from_chat_id(chat_id: i64) -> Self {
        Self(chat_id.to_string())
    }
}

impl AsRef<str> for GroupId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<GroupId> for String {
    fn from(value: GroupId) -> Self {
        value.0
    }
}

impl TryFrom<String> for GroupId {
    type Error = GroupIdValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Failures raised while resolving the group for a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupResolutionError {
    /// The launch parameter was present but did not decode to a group id.
    #[error("launch parameter is not a valid group identifier: {message}")]
    InvalidFormat {
        /// Decoder or validation detail.
        message: String,
    },
    /// No launch parameter was supplied.
    #[error("no group identifier was provided")]
    NotProvided,
}

impl From<GroupResolutionError> for Error {
    fn from(value: GroupResolutionError) -> Self {
        match value {
            GroupResolutionError::InvalidFormat { .. } => {
                Self::new(ErrorCode::InvalidGroup, "group identifier format is invalid")
            }
            GroupResolutionError::NotProvided => {
                Self::new(ErrorCode::GroupRequired, "a group identifier is required")
            }
        }
    }
}

/// Encode raw group text as a launch parameter.
pub fn encode_group_id(raw: &str) -> String {
    LAUNCH_PARAM_ENGINE.encode(raw.as_bytes())
}

/// Decode a launch parameter into a [`GroupId`].
///
/// Query-string decoding turns a literal `+` into a space, so spaces are read
/// back as `+` before decoding. Other surrounding whitespace is ignored.
///
/// # Examples
/// ```
/// use taskboard::domain::{decode_group_id, encode_group_id};
///
/// let encoded = encode_group_id("-1001234567890");
/// let group = decode_group_id(&encoded).expect("round trip");
/// assert_eq!(group.as_ref(), "-1001234567890");
/// ```
pub fn decode_group_id(encoded: &str) -> Result<GroupId, GroupResolutionError> {
    let normalised = encoded
        .trim_matches(|c: char| c.is_whitespace() && c != ' ')
        .replace(' ', "+");
    let bytes = LAUNCH_PARAM_ENGINE
        .decode(normalised.as_bytes())
        .map_err(|err| GroupResolutionError::InvalidFormat {
            message: err.to_string(),
        })?;
    let text = String::from_utf8(bytes).map_err(|_| GroupResolutionError::InvalidFormat {
        message: "decoded value is not UTF-8 text".to_owned(),
    })?;
    GroupId::new(text).map_err(|err| GroupResolutionError::InvalidFormat {
        message: err.to_string(),
    })
}

/// Build the mini-app deep link for a chat.
///
/// # Examples
/// ```
/// use taskboard::domain::deep_link;
/// use url::Url;
///
/// let base = Url::parse("https://tasks.example/app").expect("url");
/// let link = deep_link(&base, 42);
/// assert_eq!(link.as_str(), "https://tasks.example/app?startapp=NDI%3D");
/// ```
pub fn deep_link(webapp_url: &Url, chat_id: i64) -> Url {
    let mut link = webapp_url.clone();
    link.query_pairs_mut()
        .append_pair(LAUNCH_PARAM, &encode_group_id(&chat_id.to_string()));
    link
}

/// Resolves the group for a session from its launch parameter.
#[derive(Debug, Clone)]
pub struct GroupContextResolver {
    mode: RunMode,
    span: Span,
}

impl GroupContextResolver {
    /// Create a resolver for the given run mode, logging into `span`.
    pub fn new(mode: RunMode, span: Span) -> Self {
        Self { mode, span }
    }

    /// Resolve the session group.
    ///
    /// An empty parameter is treated as absent. In development an absent or
    /// undecodable parameter falls back to [`FALLBACK_GROUP_ID`].
    pub fn resolve(&self, launch_param: Option<&str>) -> Result<GroupId, GroupResolutionError> {
        let _entered = self.span.enter();
        let param = launch_param.filter(|value| !value.trim().is_empty());

        let Some(param) = param else {
            if self.mode.is_development() {
                debug!(group = FALLBACK_GROUP_ID, "no launch parameter; using fallback group");
                return Ok(GroupId::fallback());
            }
            return Err(GroupResolutionError::NotProvided);
        };

        match decode_group_id(param) {
            Ok(group) => {
                debug!(group = %group, "resolved group from launch parameter");
                Ok(group)
            }
            Err(error) if self.mode.is_development() => {
                warn!(error = %error, group = FALLBACK_GROUP_ID, "undecodable launch parameter; using fallback group");
                Ok(GroupId::fallback())
            }
            Err(error) => {
                warn!(error = %error, "rejected undecodable launch parameter");
                Err(error)
            }
        }
    }
}
