//! Dense theme-number maintenance.
//!
//! Both store implementations keep the catalog as a contiguous `1..=N` range
//! with no gaps and no duplicates; these helpers carry the shared arithmetic
//! and an in-memory rendition of the shift operations.

use crate::domain::VideoEntry;

/// Resolve a requested theme number against the current catalog size.
///
/// `None` appends. An explicit request is clamped to `1..=count+1` so the
/// range stays dense (a request of 0 means 1, a request past the end appends).
pub fn placement(requested: Option<u32>, count: u32) -> u32 {
    match requested {
        None => count + 1,
        Some(0) => 1,
        Some(n) => n.min(count + 1),
    }
}

/// Insert at `number` (already resolved via [`placement`]), shifting every
/// entry at or above it up by one. Highest numbers move first so no two
/// entries ever share a number. `entries` must be dense and ascending.
pub fn insert_at(entries: &mut Vec<VideoEntry>, number: u32, title: &str, link: &str) -> VideoEntry {
    for e in entries.iter_mut().rev() {
        if e.number >= number {
            e.number += 1;
        }
    }
    let entry = VideoEntry {
        number,
        title: title.to_string(),
        link: link.to_string(),
    };
    let idx = (number - 1) as usize;
    entries.insert(idx.min(entries.len()), entry.clone());
    entry
}

/// Remove the entry at `number` and close the gap. Returns false (leaving the
/// catalog untouched) when no entry sits there.
pub fn delete_at(entries: &mut Vec<VideoEntry>, number: u32) -> bool {
    let Some(idx) = entries.iter().position(|e| e.number == number) else {
        return false;
    };
    entries.remove(idx);
    for e in entries.iter_mut() {
        if e.number > number {
            e.number -= 1;
        }
    }
    true
}

/// Remove every entry with this exact link, then renumber the remainder once.
pub fn delete_by_link(entries: &mut Vec<VideoEntry>, link: &str) -> u32 {
    let before = entries.len();
    entries.retain(|e| e.link != link);
    let removed = (before - entries.len()) as u32;
    if removed > 0 {
        renumber(entries);
    }
    removed
}

/// Reassign `1..=N` in current order.
pub fn renumber(entries: &mut [VideoEntry]) {
    for (i, e) in entries.iter_mut().enumerate() {
        e.number = (i + 1) as u32;
    }
}

/// The invariant every mutation preserves: numbers are exactly `1..=N`,
/// ascending.
pub fn is_dense(entries: &[VideoEntry]) -> bool {
    entries
        .iter()
        .enumerate()
        .all(|(i, e)| e.number == (i + 1) as u32)
}
