//! Typed views of board rows, decoded from query snapshots.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub partner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medium {
    pub id: String,
    pub name: String,
}

/// A `message` row. `timestamp` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "senderID")]
    pub sender_id: String,
    #[serde(rename = "mediumID")]
    pub medium_id: String,
    #[serde(rename = "replyToID", default)]
    pub reply_to_id: Option<String>,
    pub body: String,
    pub timestamp: i64,
}

impl Message {
    pub fn is_reply(&self) -> bool {
        self.reply_to_id.is_some()
    }
}

/// A message with its sender and medium embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedMessage {
    #[serde(flatten)]
    pub message: Message,
    #[serde(default)]
    pub sender: Option<User>,
    #[serde(default)]
    pub medium: Option<Medium>,
}

impl FeedMessage {
    pub fn sender_name(&self) -> &str {
        self.sender.as_ref().map_or("", |u| u.name.as_str())
    }

    pub fn medium_name(&self) -> &str {
        self.medium.as_ref().map_or("", |m| m.name.as_str())
    }
}

/// A top-level post and its replies, oldest reply first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    #[serde(flatten)]
    pub post: FeedMessage,
    #[serde(default)]
    pub replies: Vec<FeedMessage>,
}
