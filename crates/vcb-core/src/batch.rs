//! Multi-line batch parsing shared by the bulk-add commands.
//!
//! Each payload line is parsed independently; a malformed line is collected
//! into the skipped report and never aborts the batch or rolls back earlier
//! lines.

use crate::domain::{User, UserId};

#[derive(Clone, Debug, Default)]
pub struct BatchOutcome<T> {
    pub accepted: Vec<T>,
    pub skipped: Vec<String>,
}

/// Run `parse` over every non-empty payload line, splitting the results into
/// accepted values and skipped raw lines.
pub fn process_lines<T>(payload: &str, parse: impl Fn(&str) -> Option<T>) -> BatchOutcome<T> {
    let mut out = BatchOutcome {
        accepted: Vec::new(),
        skipped: Vec::new(),
    };

    for raw in payload.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match parse(line) {
            Some(v) => out.accepted.push(v),
            None => out.skipped.push(line.to_string()),
        }
    }

    out
}

/// `id first last...` — the last name may span several tokens.
pub fn parse_user_line(line: &str) -> Option<User> {
    let mut parts = line.split_whitespace();
    let id = parts.next()?.parse::<i64>().ok()?;
    let first_name = parts.next()?.to_string();
    let rest: Vec<&str> = parts.collect();
    if rest.is_empty() {
        return None;
    }

    Some(User {
        id: UserId(id),
        first_name,
        last_name: rest.join(" "),
    })
}

/// One parsed bulk-add video line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoLine {
    /// Placement directive taken from a leading `"N. "` title prefix.
    pub requested: Option<u32>,
    pub title: String,
    pub link: String,
}

/// `[N.] title : link` — the separator is a spaced colon so links (which
/// carry their own colon) never split the line themselves.
pub fn parse_video_line(line: &str) -> Option<VideoLine> {
    let (raw_title, raw_link) = line.rsplit_once(" : ")?;
    let link = raw_link.trim();
    if !has_uri_scheme(link) {
        return None;
    }

    let (requested, title) = split_position_prefix(raw_title.trim());
    if title.is_empty() {
        return None;
    }

    Some(VideoLine {
        requested,
        title: title.to_string(),
        link: link.to_string(),
    })
}

/// Split a leading `"N. "` placement prefix off a title. The prefix is a
/// directive, not display text, so it never reaches storage.
pub fn split_position_prefix(title: &str) -> (Option<u32>, &str) {
    let Some((head, rest)) = title.split_once(". ") else {
        return (None, title);
    };
    match head.parse::<u32>() {
        Ok(n) => (Some(n), rest.trim_start()),
        Err(_) => (None, title),
    }
}

const URI_SCHEMES: &[&str] = &["http://", "https://", "ftp://"];

pub fn has_uri_scheme(link: &str) -> bool {
    URI_SCHEMES.iter().any(|s| link.starts_with(s))
}
