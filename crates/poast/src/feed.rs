//! Feed and thread view models: queries, summary text and table rendering.
//!
//! Every renderer returns `None` while its snapshot is still
//! [`Unknown`](SnapshotState::Unknown): before the first pull there is
//! nothing trustworthy to show, so the board shows nothing at all.

use chrono::{Local, TimeZone};
use poast_sync::query::{escape_like, Operator, Query, QueryFactory, SortDirection};
use poast_sync::reactive::{Snapshot, SnapshotState};
use serde_json::Value;

use crate::error::Result;
use crate::models::{FeedMessage, Thread};

pub const EMPTY_STATE: &str = "No posts found";

// ============================================================================
// Queries
// ============================================================================

/// The "From" and "Contains" filters of the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    /// Sender user id.
    pub from: Option<String>,
    /// Body substring, matched literally.
    pub contains: Option<String>,
}

impl FeedFilter {
    pub fn is_active(&self) -> bool {
        self.from.as_deref().is_some_and(|s| !s.is_empty())
            || self.contains.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Every message, unfiltered. Used for the "of M" count.
pub fn all_messages_query(q: &QueryFactory) -> Query {
    q.table("message")
}

/// Newest first, with sender and medium, narrowed by `filter`.
pub fn feed_query(q: &QueryFactory, filter: &FeedFilter) -> Query {
    let mut query = q
        .table("message")
        .related("medium", |m| m.one())
        .related("sender", |s| s.one())
        .order_by("timestamp", SortDirection::Desc);

    if let Some(from) = filter.from.as_deref().filter(|s| !s.is_empty()) {
        query = query.where_eq("senderID", from);
    }
    if let Some(text) = filter.contains.as_deref().filter(|s| !s.is_empty()) {
        query = query.where_op("body", Operator::Like, format!("%{}%", escape_like(text)));
    }
    query
}

/// Top-level posts, oldest first, each with its replies in timestamp order.
pub fn threads_query(q: &QueryFactory) -> Query {
    q.table("message")
        .where_eq("replyToID", Value::Null)
        .related("sender", |s| s.one())
        .related("medium", |m| m.one())
        .related("replies", |r| {
            r.related("sender", |s| s.one())
                .related("medium", |m| m.one())
                .order_by("timestamp", SortDirection::Asc)
        })
        .order_by("timestamp", SortDirection::Asc)
}

// ============================================================================
// Text
// ============================================================================

pub fn summary_line(shown: usize, total: usize, filtered: bool) -> String {
    if filtered {
        format!("Showing {shown} of {total} messages")
    } else {
        format!("Showing all {shown} messages")
    }
}

/// `YYYY-MM-DD HH:MM` in `tz`.
pub fn format_timestamp_in<Tz: TimeZone>(millis: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match tz.timestamp_millis_opt(millis).single() {
        Some(at) => at.format("%Y-%m-%d %H:%M").to_string(),
        None => String::from("?"),
    }
}

/// `YYYY-MM-DD HH:MM` in local time.
pub fn format_timestamp(millis: i64) -> String {
    format_timestamp_in(millis, &Local)
}

struct TextTable {
    rows: Vec<[String; 4]>,
}

impl TextTable {
    fn new() -> Self {
        Self {
            rows: vec![["Sender", "Medium", "Message", "Sent"].map(String::from)],
        }
    }

    fn push(&mut self, prefix: &str, m: &FeedMessage, sent: String) {
        self.rows.push([
            format!("{prefix}{}", m.sender_name()),
            m.medium_name().to_string(),
            m.message.body.clone(),
            sent,
        ]);
    }

    fn render(&self) -> String {
        let mut widths = [0usize; 4];
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }
        let mut out = String::new();
        for row in &self.rows {
            let line = format!(
                "{:<w0$}  {:<w1$}  {:<w2$}  {:>w3$}",
                row[0],
                row[1],
                row[2],
                row[3],
                w0 = widths[0],
                w1 = widths[1],
                w2 = widths[2],
                w3 = widths[3],
            );
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}

// ============================================================================
// Renderers
// ============================================================================

/// Summary line plus one row per message. `total` is the unfiltered count.
pub fn render_feed(
    snapshot: &Snapshot,
    total: usize,
    filter: &FeedFilter,
    format_time: impl Fn(i64) -> String,
) -> Result<Option<String>> {
    if snapshot.state() == SnapshotState::Unknown {
        return Ok(None);
    }
    let messages: Vec<FeedMessage> = snapshot.decode()?;

    let mut out = summary_line(messages.len(), total, filter.is_active());
    out.push('\n');
    if messages.is_empty() {
        out.push_str(EMPTY_STATE);
        out.push('\n');
        return Ok(Some(out));
    }

    let mut table = TextTable::new();
    for m in &messages {
        table.push("", m, format_time(m.message.timestamp));
    }
    out.push_str(&table.render());
    Ok(Some(out))
}

/// Posts with their replies indented beneath them.
pub fn render_threads(snapshot: &Snapshot, format_time: impl Fn(i64) -> String) -> Result<Option<String>> {
    if snapshot.state() == SnapshotState::Unknown {
        return Ok(None);
    }
    let threads: Vec<Thread> = snapshot.decode()?;
    if threads.is_empty() {
        return Ok(Some(format!("{EMPTY_STATE}\n")));
    }

    let mut table = TextTable::new();
    for thread in &threads {
        table.push("", &thread.post, format_time(thread.post.message.timestamp));
        for reply in &thread.replies {
            table.push("↪ ", reply, format_time(reply.message.timestamp));
        }
    }
    Ok(Some(table.render()))
}
