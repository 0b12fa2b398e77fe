//! Pending-registration table.
//!
//! A `/registration` request parks the requester's details here under a
//! generated request id; only the id travels inside the approval button's
//! callback data, so names can never collide with the payload delimiter.
//! Entries live in memory only and are consumed exactly once.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{ChatId, User};

const CALLBACK_PREFIX: &str = "approve:";

#[derive(Clone, Debug)]
pub struct PendingRegistration {
    pub id: String,
    pub user: User,
    /// Where to send the confirmation once approved.
    pub chat_id: ChatId,
    pub requested_at: DateTime<Utc>,
}

impl PendingRegistration {
    pub fn callback_data(&self) -> String {
        format!("{CALLBACK_PREFIX}{}", self.id)
    }
}

/// Parse an approval callback payload back into a request id.
pub fn parse_approval(data: &str) -> Option<&str> {
    data.strip_prefix(CALLBACK_PREFIX).filter(|id| !id.is_empty())
}

#[derive(Default)]
pub struct PendingRegistrations {
    seq: AtomicU64,
    inner: Mutex<HashMap<String, PendingRegistration>>,
}

impl PendingRegistrations {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, user: User, chat_id: ChatId) -> PendingRegistration {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let pending = PendingRegistration {
            id: format!("{:x}-{seq}", Utc::now().timestamp_millis()),
            user,
            chat_id,
            requested_at: Utc::now(),
        };

        self.inner
            .lock()
            .await
            .insert(pending.id.clone(), pending.clone());
        pending
    }

    /// Consume a request. The second caller gets `None`.
    pub async fn take(&self, id: &str) -> Option<PendingRegistration> {
        self.inner.lock().await.remove(id)
    }
}
