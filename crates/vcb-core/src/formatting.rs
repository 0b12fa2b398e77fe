//! Telegram-HTML rendering for replies and broadcasts.

use crate::domain::{User, VideoEntry};

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// `<b>N. Title</b>` + link, entries separated by a blank line.
pub fn format_video_list(videos: &[VideoEntry]) -> String {
    videos
        .iter()
        .map(|v| {
            format!(
                "<b>{}. {}</b>\n{}",
                v.number,
                escape_html(&v.title),
                escape_html(&v.link)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `id — First Last`, one user per line.
pub fn format_user_list(users: &[User]) -> String {
    users
        .iter()
        .map(|u| format!("{} — {}", u.id.0, escape_html(&u.full_name())))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a rendered message into pieces of at most `max_len` bytes.
///
/// Splits on line boundaries so the `<b>…</b>` tags of a list entry stay in
/// one piece; a single oversized line is hard-cut on a char boundary.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();

    for line in text.split('\n') {
        if !cur.is_empty() && cur.len() + 1 + line.len() > max_len {
            out.push(std::mem::take(&mut cur));
        }
        if line.len() > max_len {
            for ch in line.chars() {
                if cur.len() + ch.len_utf8() > max_len {
                    out.push(std::mem::take(&mut cur));
                }
                cur.push(ch);
            }
            continue;
        }
        if !cur.is_empty() {
            cur.push('\n');
        }
        cur.push_str(line);
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}
