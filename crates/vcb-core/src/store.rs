use async_trait::async_trait;

use crate::{
    domain::{User, UserId, VideoEntry},
    Result,
};

/// Port for the durable two-table store (allow-list + ordered catalog).
///
/// Implementations own the renumbering transaction boundaries: every catalog
/// mutation must be atomic, so no reader ever observes a gapped theme-number
/// range. SQLite is the first implementation; tests use an in-memory fake.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Idempotent: an existing id is left untouched.
    async fn add_user(&self, user: &User) -> Result<()>;

    async fn user_ids(&self) -> Result<Vec<UserId>>;

    /// All users with names, ordered by id.
    async fn users_detailed(&self) -> Result<Vec<User>>;

    /// No-op if the id is absent.
    async fn remove_user(&self, id: UserId) -> Result<()>;

    /// Insert at `requested` (clamped to `1..=count+1`, existing entries at or
    /// above it shift up) or append when `None`. Returns the stored entry with
    /// its assigned theme number.
    async fn insert_video(
        &self,
        requested: Option<u32>,
        title: &str,
        link: &str,
    ) -> Result<VideoEntry>;

    /// Returns false (and changes nothing) if no entry sits at `number`.
    async fn delete_video_by_number(&self, number: u32) -> Result<bool>;

    /// Removes every entry whose link equals `link` exactly, then renumbers
    /// the remainder once. Returns the number of removed entries.
    async fn delete_video_by_link(&self, link: &str) -> Result<u32>;

    /// Always ascending by theme number.
    async fn videos_ordered(&self) -> Result<Vec<VideoEntry>>;

    /// Case-insensitive substring match on the title, catalog order.
    async fn search_videos_by_title(&self, keyword: &str) -> Result<Vec<VideoEntry>>;
}
