//! Conversational activities and watermarks.
//!
//! Only the fields the session inspects are modelled explicitly. Everything
//! else an endpoint sends is kept in [`Activity::extra`] and forwarded as-is.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Activity type of a plain text message.
pub const MESSAGE: &str = "message";

/// Activity type of the end-of-conversation marker.
pub const END_OF_CONVERSATION: &str = "endOfConversation";

/// A participant reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// A single conversational activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Activity type (`message`, `typing`, `endOfConversation`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Fields not inspected by the session.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Activity {
    /// Create an activity of the given type sent by `sender`.
    pub fn new(kind: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            from: Some(ChannelAccount::new(sender)),
            text: None,
            extra: Map::new(),
        }
    }

    /// Create a text message sent by `sender`.
    pub fn message(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(MESSAGE, sender)
        }
    }

    /// Create the end-of-conversation marker sent by `sender`.
    pub fn end_of_conversation(sender: impl Into<String>) -> Self {
        Self::new(END_OF_CONVERSATION, sender)
    }

    /// Id of the sender, if present.
    pub fn sender_id(&self) -> Option<&str> {
        self.from.as_ref().map(|f| f.id.as_str())
    }

    /// Check whether this activity was sent by `user_id`.
    pub fn is_from(&self, user_id: &str) -> bool {
        self.sender_id() == Some(user_id)
    }

    pub fn is_end_of_conversation(&self) -> bool {
        self.kind == END_OF_CONVERSATION
    }
}

/// A batch of activities as delivered by either channel variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySet {
    #[serde(default)]
    pub activities: Vec<Activity>,
    /// Watermark reported with the batch, as sent on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
}

impl ActivitySet {
    pub fn new(activities: Vec<Activity>, watermark: impl Into<String>) -> Self {
        Self {
            activities,
            watermark: Some(watermark.into()),
        }
    }
}

/// Numeric position marker of an incorporated batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(u64);

impl Watermark {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Parse the wire representation of a batch watermark.
    ///
    /// Returns `None` for a missing or non-numeric value.
    pub fn from_wire(value: Option<&str>) -> Option<Self> {
        value.and_then(|v| v.parse().ok())
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Watermark {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Watermark)
    }
}
