//! User actions on the board: random posts, bulk resize, edits and deletes.
//!
//! Edit and delete carry a soft guard: when the write is bound to be denied
//! upstream, the action returns a warning instead of issuing it, unless
//! `force` is set. The guard is a courtesy; enforcement is upstream.

use std::ops::Range;

use poast_sync::mutate::MutationReceipt;
use poast_sync::Client;
use rand::Rng;
use serde_json::json;

use crate::error::Result;
use crate::models::{Medium, Message, User};

pub const DELETE_WARNING: &str = "You must be logged in to delete. Hold shift to try anyway.";
pub const EDIT_WARNING: &str = "You aren't logged in as the sender of this message. \
Editing won't be permitted. Hold the shift key to try anyway.";

/// Upper bound of the resize slider.
pub const MAX_POSTS: usize = 50;

/// Window random posts are dated in (epoch millis).
pub const TIMESTAMP_RANGE: Range<i64> = 1_727_395_200_000..1_728_180_000_000;

/// Delay of a reply after its post: one minute to one hour.
const REPLY_DELAY_MS: Range<i64> = 60 * 1000..60 * 60 * 1000;

const REQUESTS: &[&str] = &[
    "Hey guys, is the zero package ready yet?",
    "I tried installing the package, but it's not there.",
    "The package does not install...",
    "Hey Nate, can you ask Aaron when the npm package will be ready?",
    "npm npm npm npm npm",
    "n --- p --- m",
    "npm wen",
    "npm package?",
];

const RESPONSES: &[&str] = &[
    "It will be ready next week",
    "We'll let you know",
    "It's not ready - next week",
    "Aaron says next week",
    "Didn't we say next week",
    "I could send you a tarball, but it won't work",
];

/// Result of a guarded action.
#[derive(Debug)]
pub enum Guarded<T> {
    Done(T),
    /// Not attempted; show this to the user.
    Warned(&'static str),
}

impl<T> Guarded<T> {
    pub fn warning(&self) -> Option<&'static str> {
        match self {
            Guarded::Warned(w) => Some(*w),
            Guarded::Done(_) => None,
        }
    }
}

// ============================================================================
// Random content
// ============================================================================

/// A short random base-36 id.
pub fn random_id(rng: &mut impl Rng) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    (0..10)
        .map(|_| DIGITS[rng.random_range(0..DIGITS.len())] as char)
        .collect()
}

fn pick<'a, T>(rng: &mut impl Rng, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    items.get(rng.random_range(0..items.len()))
}

/// A top-level post and 0 to 2 replies, or `None` without users or mediums.
///
/// Dax asks; everyone else answers.
pub fn random_thread(rng: &mut impl Rng, users: &[User], mediums: &[Medium]) -> Option<Vec<Message>> {
    let medium = pick(rng, mediums)?;
    let asker = users
        .iter()
        .find(|u| u.name == "Dax")
        .or_else(|| pick(rng, users))?;
    let responders: Vec<&User> = users.iter().filter(|u| u.id != asker.id).collect();

    let post = Message {
        id: random_id(rng),
        sender_id: asker.id.clone(),
        medium_id: medium.id.clone(),
        reply_to_id: None,
        body: pick(rng, REQUESTS).copied().unwrap_or_default().to_string(),
        timestamp: rng.random_range(TIMESTAMP_RANGE),
    };

    let reply_count = if responders.is_empty() { 0 } else { rng.random_range(0..=2) };
    let mut thread = Vec::with_capacity(1 + reply_count);
    for _ in 0..reply_count {
        let Some(responder) = pick(rng, &responders) else {
            break;
        };
        thread.push(Message {
            id: random_id(rng),
            sender_id: responder.id.clone(),
            medium_id: medium.id.clone(),
            reply_to_id: Some(post.id.clone()),
            body: pick(rng, RESPONSES).copied().unwrap_or_default().to_string(),
            timestamp: post.timestamp + rng.random_range(REPLY_DELAY_MS),
        });
    }
    thread.insert(0, post);
    Some(thread)
}

// ============================================================================
// Actions
// ============================================================================

fn insert_message(client: &Client, message: &Message) -> Result<MutationReceipt> {
    let row = json!({
        "id": message.id,
        "senderID": message.sender_id,
        "mediumID": message.medium_id,
        "replyToID": message.reply_to_id,
        "body": message.body,
        "timestamp": message.timestamp,
    });
    Ok(client.mutate("message")?.insert(row)?)
}

/// Post one random thread. Returns the receipts, post first.
pub fn add_random_thread(
    client: &Client,
    rng: &mut impl Rng,
    users: &[User],
    mediums: &[Medium],
) -> Result<Vec<MutationReceipt>> {
    let Some(thread) = random_thread(rng, users, mediums) else {
        tracing::debug!("no users or mediums yet; nothing to add");
        return Ok(Vec::new());
    };
    thread.iter().map(|m| insert_message(client, m)).collect()
}

/// Delete one message picked at random from `messages`.
pub fn remove_random_message(
    client: &Client,
    rng: &mut impl Rng,
    messages: &[Message],
    force: bool,
) -> Result<Guarded<Option<MutationReceipt>>> {
    if client.is_anonymous() && !force {
        return Ok(Guarded::Warned(DELETE_WARNING));
    }
    let Some(victim) = pick(rng, messages) else {
        return Ok(Guarded::Done(None));
    };
    let receipt = client.mutate("message")?.delete(json!({ "id": victim.id }))?;
    Ok(Guarded::Done(Some(receipt)))
}

/// Grow or shrink the board to `target` top-level posts (clamped to
/// [`MAX_POSTS`]). Shrinking deletes the newest-listed surplus posts.
pub fn resize(
    client: &Client,
    rng: &mut impl Rng,
    posts: &[Message],
    target: usize,
    users: &[User],
    mediums: &[Medium],
) -> Result<Vec<MutationReceipt>> {
    let target = target.min(MAX_POSTS);
    let mut receipts = Vec::new();

    if target < posts.len() {
        let mutator = client.mutate("message")?;
        for post in &posts[target..] {
            receipts.push(mutator.delete(json!({ "id": post.id }))?);
        }
    } else {
        for _ in posts.len()..target {
            receipts.extend(add_random_thread(client, rng, users, mediums)?);
        }
    }
    tracing::debug!(from = posts.len(), to = target, mutations = receipts.len(), "resized board");
    Ok(receipts)
}

/// Replace a message's body.
pub fn edit_message(
    client: &Client,
    message: &Message,
    body: &str,
    force: bool,
) -> Result<Guarded<MutationReceipt>> {
    if message.sender_id != client.user_id() && !force {
        return Ok(Guarded::Warned(EDIT_WARNING));
    }
    let receipt = client
        .mutate("message")?
        .update(json!({ "id": message.id, "body": body }))?;
    Ok(Guarded::Done(receipt))
}
