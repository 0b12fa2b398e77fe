//! In-memory fakes of the store and messenger ports for dispatcher tests.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicI32, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef, User, UserId, VideoEntry},
    messaging::{InlineKeyboard, MessagingCapabilities, MessagingPort},
    renumber,
    store::CatalogStore,
    Error, Result,
};

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
    videos: Mutex<Vec<VideoEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video_count(&self) -> usize {
        self.videos.lock().unwrap().len()
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn assert_dense(&self) {
        let videos = self.videos.lock().unwrap();
        assert!(renumber::is_dense(&videos), "gapped catalog: {videos:?}");
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn add_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.lock().unwrap();
        if !users.iter().any(|u| u.id == user.id) {
            users.push(user.clone());
        }
        Ok(())
    }

    async fn user_ids(&self) -> Result<Vec<UserId>> {
        Ok(self.users.lock().unwrap().iter().map(|u| u.id).collect())
    }

    async fn users_detailed(&self) -> Result<Vec<User>> {
        let mut users = self.users.lock().unwrap().clone();
        users.sort_by_key(|u| u.id.0);
        Ok(users)
    }

    async fn remove_user(&self, id: UserId) -> Result<()> {
        self.users.lock().unwrap().retain(|u| u.id != id);
        Ok(())
    }

    async fn insert_video(
        &self,
        requested: Option<u32>,
        title: &str,
        link: &str,
    ) -> Result<VideoEntry> {
        let mut videos = self.videos.lock().unwrap();
        let number = renumber::placement(requested, videos.len() as u32);
        Ok(renumber::insert_at(&mut videos, number, title, link))
    }

    async fn delete_video_by_number(&self, number: u32) -> Result<bool> {
        Ok(renumber::delete_at(&mut self.videos.lock().unwrap(), number))
    }

    async fn delete_video_by_link(&self, link: &str) -> Result<u32> {
        Ok(renumber::delete_by_link(
            &mut self.videos.lock().unwrap(),
            link,
        ))
    }

    async fn videos_ordered(&self) -> Result<Vec<VideoEntry>> {
        Ok(self.videos.lock().unwrap().clone())
    }

    async fn search_videos_by_title(&self, keyword: &str) -> Result<Vec<VideoEntry>> {
        let keyword = keyword.to_lowercase();
        Ok(self
            .videos
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.title.to_lowercase().contains(&keyword))
            .cloned()
            .collect())
    }
}

#[derive(Clone, Debug)]
pub struct SentMessage {
    pub chat_id: i64,
    pub html: String,
}

#[derive(Clone, Debug)]
pub struct SentKeyboard {
    pub chat_id: i64,
    pub text: String,
    pub callback_data: Vec<String>,
}

/// Records everything sent and can simulate unreachable chats.
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<SentMessage>>,
    pub keyboards: Mutex<Vec<SentKeyboard>>,
    pub edits: Mutex<Vec<(MessageRef, String)>>,
    pub answers: Mutex<Vec<(String, Option<String>)>>,
    fail_chats: Mutex<HashSet<i64>>,
    next_msg_id: AtomicI32,
    max_message_len: usize,
}

impl Default for RecordingMessenger {
    fn default() -> Self {
        Self {
            sent: Mutex::default(),
            keyboards: Mutex::default(),
            edits: Mutex::default(),
            answers: Mutex::default(),
            fail_chats: Mutex::default(),
            next_msg_id: AtomicI32::default(),
            max_message_len: 4096,
        }
    }
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_message_len(max_message_len: usize) -> Self {
        Self {
            max_message_len,
            ..Self::default()
        }
    }

    pub fn fail_chat(&self, chat_id: i64) {
        self.fail_chats.lock().unwrap().insert(chat_id);
    }

    pub fn texts_for(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .map(|m| m.html.clone())
            .collect()
    }

    fn check_reachable(&self, chat_id: i64) -> Result<()> {
        if self.fail_chats.lock().unwrap().contains(&chat_id) {
            return Err(Error::External(format!("chat {chat_id} unreachable")));
        }
        Ok(())
    }

    fn next_ref(&self, chat_id: ChatId) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: MessageId(self.next_msg_id.fetch_add(1, Ordering::Relaxed)),
        }
    }
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: self.max_message_len,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.check_reachable(chat_id.0)?;
        self.sent.lock().unwrap().push(SentMessage {
            chat_id: chat_id.0,
            html: html.to_string(),
        });
        Ok(self.next_ref(chat_id))
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        self.edits.lock().unwrap().push((msg, html.to_string()));
        Ok(())
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.check_reachable(chat_id.0)?;
        self.keyboards.lock().unwrap().push(SentKeyboard {
            chat_id: chat_id.0,
            text: text.to_string(),
            callback_data: keyboard
                .buttons
                .iter()
                .map(|b| b.callback_data.clone())
                .collect(),
        });
        Ok(self.next_ref(chat_id))
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(|s| s.to_string())));
        Ok(())
    }
}
