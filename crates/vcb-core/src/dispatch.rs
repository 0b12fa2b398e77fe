//! Command dispatch: parse inbound text, authorize, route, reply.
//!
//! Routing is a single prefix lookup against [`COMMANDS`]; each row declares
//! the handler and the minimum access class, so handlers stay testable in
//! isolation behind the store and messaging ports.

use std::sync::Arc;

use tracing::warn;

use crate::{
    access::{self, AccessClass},
    audit::{AuditEvent, AuditLogger},
    batch,
    config::Config,
    domain::{ChatId, MessageRef, User, UserId, VideoEntry},
    formatting::{self, escape_html, format_user_list, format_video_list},
    messaging::{InlineKeyboard, MessagingPort},
    registration::{self, PendingRegistration, PendingRegistrations},
    store::CatalogStore,
    Result,
};

const NO_ACCESS: &str = "🚫 No access.";
const GENERIC_FAILURE: &str = "⚠️ Something went wrong. Please try again.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Registration,
    Users,
    AddUser,
    AddVideo,
    DelUser,
    DelVideoLink,
    DelVideoNum,
    Videos,
    Find,
}

pub struct CommandSpec {
    pub name: &'static str,
    pub command: Command,
    pub min_class: AccessClass,
}

/// Fixed routing table. Matching is a case-sensitive prefix check against the
/// first line, so longer names sit above their prefixes (`/add_video` before
/// `/add`). Anything that matches no row is not a command and stays silent.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "/registration",
        command: Command::Registration,
        min_class: AccessClass::Unknown,
    },
    CommandSpec {
        name: "/del_video_link",
        command: Command::DelVideoLink,
        min_class: AccessClass::Admin,
    },
    CommandSpec {
        name: "/del_video_num",
        command: Command::DelVideoNum,
        min_class: AccessClass::Admin,
    },
    CommandSpec {
        name: "/add_video",
        command: Command::AddVideo,
        min_class: AccessClass::Admin,
    },
    CommandSpec {
        name: "/add_user",
        command: Command::AddUser,
        min_class: AccessClass::Admin,
    },
    CommandSpec {
        name: "/del_user",
        command: Command::DelUser,
        min_class: AccessClass::Admin,
    },
    CommandSpec {
        name: "/videos",
        command: Command::Videos,
        min_class: AccessClass::Registered,
    },
    CommandSpec {
        name: "/users",
        command: Command::Users,
        min_class: AccessClass::Admin,
    },
    CommandSpec {
        name: "/start",
        command: Command::Start,
        min_class: AccessClass::Unknown,
    },
    CommandSpec {
        name: "/find",
        command: Command::Find,
        min_class: AccessClass::Registered,
    },
    CommandSpec {
        name: "/help",
        command: Command::Help,
        min_class: AccessClass::Unknown,
    },
    // Short alias; must stay below /add_user and /add_video.
    CommandSpec {
        name: "/add",
        command: Command::AddVideo,
        min_class: AccessClass::Admin,
    },
];

pub fn resolve(first_line: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| first_line.starts_with(spec.name))
}

/// The sender of one inbound update, as reported by the platform.
#[derive(Clone, Debug)]
pub struct Caller {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub first_name: String,
    pub last_name: String,
}

impl Caller {
    fn as_user(&self) -> User {
        User {
            id: self.user_id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

pub struct Dispatcher {
    cfg: Arc<Config>,
    store: Arc<dyn CatalogStore>,
    messenger: Arc<dyn MessagingPort>,
    pending: Arc<PendingRegistrations>,
    audit: AuditLogger,
}

impl Dispatcher {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<dyn CatalogStore>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        let audit = AuditLogger::new(cfg.audit_log_path.clone());
        Self {
            cfg,
            store,
            messenger,
            pending: Arc::new(PendingRegistrations::new()),
            audit,
        }
    }

    /// Handle one inbound text message. Store failures are reported to the
    /// caller as a generic failure for this invocation only; the dispatcher
    /// itself never gives up.
    pub async fn dispatch(&self, caller: &Caller, text: &str) -> Result<()> {
        let text = text.trim();
        let Some(spec) = resolve(text.lines().next().unwrap_or("")) else {
            return Ok(());
        };

        if let Err(e) = self.run(caller, spec, text).await {
            warn!(command = spec.name, error = %e, "command failed");
            let _ = self
                .audit
                .write(AuditEvent::error(caller.user_id.0, spec.name, &e.to_string()));
            let _ = self.messenger.send_html(caller.chat_id, GENERIC_FAILURE).await;
        }
        Ok(())
    }

    async fn run(&self, caller: &Caller, spec: &CommandSpec, text: &str) -> Result<()> {
        let class = access::classify(caller.user_id, &self.cfg.admin_ids, &self.store).await?;
        if !access::authorize(class, spec.min_class) {
            let _ = self
                .audit
                .write(AuditEvent::auth(caller.user_id.0, spec.name, false));
            self.messenger.send_html(caller.chat_id, NO_ACCESS).await?;
            return Ok(());
        }
        let _ = self
            .audit
            .write(AuditEvent::command(caller.user_id.0, spec.name));

        let first_line = text.lines().next().unwrap_or("");
        let args = first_line[spec.name.len()..].trim();
        let payload = text.split_once('\n').map(|(_, rest)| rest).unwrap_or("");

        match spec.command {
            Command::Start => self.start(caller, class).await,
            Command::Help => self.help(caller, class).await,
            Command::Registration => self.registration(caller, class, args).await,
            Command::Users => self.users(caller).await,
            Command::AddUser => self.add_user(caller, payload).await,
            Command::AddVideo => self.add_video(caller, payload).await,
            Command::DelUser => self.del_user(caller, args).await,
            Command::DelVideoLink => self.del_video_link(caller, args).await,
            Command::DelVideoNum => self.del_video_num(caller, args).await,
            Command::Videos => self.videos(caller).await,
            Command::Find => self.find(caller, args).await,
        }
    }

    async fn reply(&self, caller: &Caller, html: &str) -> Result<()> {
        self.send_to(caller.chat_id, html).await
    }

    /// Output longer than the messenger allows goes out as several messages,
    /// split on line boundaries.
    async fn send_to(&self, chat_id: ChatId, html: &str) -> Result<()> {
        let max = self.messenger.capabilities().max_message_len;
        for piece in formatting::split_message(html, max) {
            self.messenger.send_html(chat_id, &piece).await?;
        }
        Ok(())
    }

    async fn start(&self, caller: &Caller, class: AccessClass) -> Result<()> {
        if self.store.user_ids().await?.contains(&caller.user_id) {
            return self
                .reply(caller, "👋 Welcome back! You have access to the videos.")
                .await;
        }
        if class == AccessClass::Admin {
            // Admin implies registered: enroll so /videos works for them too.
            self.store.add_user(&caller.as_user()).await?;
            return self
                .reply(caller, "👋 You were automatically added as an administrator.")
                .await;
        }
        self.reply(
            caller,
            "🚫 You don't have access yet. Use /registration First Last to request it.",
        )
        .await
    }

    async fn help(&self, caller: &Caller, class: AccessClass) -> Result<()> {
        let text = match class {
            AccessClass::Admin => {
                "🤖 Administrator commands:\n\
                 /start — register yourself as admin\n\
                 /users — list users\n\
                 /add_user — bulk add users (one `id first last` per line)\n\
                 /del_user id — remove a user\n\
                 /add_video — bulk add videos (one `[N.] title : link` per line)\n\
                 /del_video_num N — delete the video at number N\n\
                 /del_video_link link — delete all videos with that link\n\
                 /videos — list videos\n\
                 /find keyword — search by title"
            }
            AccessClass::Registered => {
                "🤖 Available commands:\n\
                 /start — check your access\n\
                 /videos — list available videos\n\
                 /find keyword — search by title"
            }
            AccessClass::Unknown => {
                "🤖 You don't have access yet.\n\
                 /registration First Last — request access from an administrator"
            }
        };
        self.reply(caller, text).await
    }

    async fn registration(&self, caller: &Caller, class: AccessClass, args: &str) -> Result<()> {
        if class != AccessClass::Unknown {
            return self.reply(caller, "✅ You already have access.").await;
        }

        let tokens: Vec<&str> = args.split_whitespace().collect();
        let [first, last] = tokens.as_slice() else {
            return self
                .reply(caller, "❗ Example: /registration Ann Lee")
                .await;
        };

        let requester = User {
            id: caller.user_id,
            first_name: (*first).to_string(),
            last_name: (*last).to_string(),
        };
        let pending = self
            .pending
            .create(requester, caller.chat_id)
            .await;

        self.notify_admins(&pending).await;
        self.reply(caller, "✅ Request sent. An administrator will review it.")
            .await
    }

    /// Best-effort fan-out of the approval prompt; an unreachable admin never
    /// fails the request.
    async fn notify_admins(&self, pending: &PendingRegistration) {
        let prompt = format!(
            "📨 <b>Registration request</b>\n\n{} (id {})\nrequested at {}",
            escape_html(&pending.user.full_name()),
            pending.user.id.0,
            pending.requested_at.format("%Y-%m-%d %H:%M UTC"),
        );
        let keyboard = InlineKeyboard::single("✅ Approve", pending.callback_data());

        for &admin_id in &self.cfg.admin_ids {
            if let Err(e) = self
                .messenger
                .send_inline_keyboard(ChatId(admin_id), &prompt, keyboard.clone())
                .await
            {
                warn!(admin_id, error = %e, "approval prompt delivery failed");
            }
        }
    }

    /// Resolve an approval-button tap. Consuming the pending entry is the
    /// idempotency point: the second tap finds nothing and answers "expired".
    pub async fn approve(
        &self,
        admin_id: UserId,
        callback_id: &str,
        data: &str,
        prompt: Option<MessageRef>,
    ) -> Result<()> {
        if !self.cfg.admin_ids.contains(&admin_id.0) {
            let _ = self.audit.write(AuditEvent::auth(admin_id.0, "approve", false));
            self.messenger
                .answer_callback_query(callback_id, Some(NO_ACCESS))
                .await?;
            return Ok(());
        }

        let Some(request_id) = registration::parse_approval(data) else {
            self.messenger.answer_callback_query(callback_id, None).await?;
            return Ok(());
        };

        let Some(pending) = self.pending.take(request_id).await else {
            self.messenger
                .answer_callback_query(callback_id, Some("Request expired or already handled."))
                .await?;
            return Ok(());
        };

        if let Err(e) = self.resolve_approval(callback_id, &pending, prompt).await {
            warn!(request_id, error = %e, "approval failed");
            let _ = self
                .audit
                .write(AuditEvent::error(admin_id.0, "approve", &e.to_string()));
            let _ = self
                .messenger
                .answer_callback_query(callback_id, Some(GENERIC_FAILURE))
                .await;
        }
        Ok(())
    }

    async fn resolve_approval(
        &self,
        callback_id: &str,
        pending: &PendingRegistration,
        prompt: Option<MessageRef>,
    ) -> Result<()> {
        self.store.add_user(&pending.user).await?;
        let _ = self
            .audit
            .write(AuditEvent::command(pending.user.id.0, "approved"));

        // Requester confirmation is best-effort; the approval already stuck.
        if let Err(e) = self
            .messenger
            .send_html(
                pending.chat_id,
                "🎉 Your registration was approved. Use /videos to browse.",
            )
            .await
        {
            warn!(user_id = pending.user.id.0, error = %e, "approval notice delivery failed");
        }

        if let Some(prompt) = prompt {
            let resolved = format!(
                "✅ Approved: {} (id {})",
                escape_html(&pending.user.full_name()),
                pending.user.id.0,
            );
            let _ = self.messenger.edit_html(prompt, &resolved).await;
        }

        self.messenger
            .answer_callback_query(callback_id, Some("Approved"))
            .await?;
        Ok(())
    }

    async fn users(&self, caller: &Caller) -> Result<()> {
        let users = self.store.users_detailed().await?;
        if users.is_empty() {
            return self.reply(caller, "📭 No users yet.").await;
        }
        let msg = format!("👥 Users:\n{}", format_user_list(&users));
        self.reply(caller, &msg).await
    }

    async fn add_user(&self, caller: &Caller, payload: &str) -> Result<()> {
        if payload.trim().is_empty() {
            return self
                .reply(caller, "❗ Example:\n/add_user\n123456789 Ann Lee")
                .await;
        }

        let outcome = batch::process_lines(payload, batch::parse_user_line);
        if outcome.accepted.is_empty() {
            return self
                .reply(
                    caller,
                    "❗ No valid user lines found. Example:\n/add_user\n123456789 Ann Lee",
                )
                .await;
        }

        let mut added = Vec::new();
        for user in &outcome.accepted {
            self.store.add_user(user).await?;
            added.push(format!("{} ({})", escape_html(&user.full_name()), user.id.0));
        }

        let mut msg = format!("✅ Added {} user(s):\n{}", added.len(), added.join("\n"));
        append_skip_report(&mut msg, &outcome.skipped);
        self.reply(caller, &msg).await
    }

    async fn add_video(&self, caller: &Caller, payload: &str) -> Result<()> {
        if payload.trim().is_empty() {
            return self
                .reply(
                    caller,
                    "❗ Example:\n/add_video\nLecture 1 : https://...\n2. Lecture 2 : https://...",
                )
                .await;
        }

        let outcome = batch::process_lines(payload, batch::parse_video_line);
        if outcome.accepted.is_empty() {
            return self
                .reply(
                    caller,
                    "❗ No valid video lines found. Example:\n/add_video\nLecture 1 : https://...",
                )
                .await;
        }

        // Dispatch order: lines land one by one, each in its own transaction.
        let mut added = Vec::new();
        for line in &outcome.accepted {
            let entry = self
                .store
                .insert_video(line.requested, &line.title, &line.link)
                .await?;
            added.push(entry);
        }

        let delivered = self.broadcast_new_videos(&added).await;

        let mut msg = format!(
            "✅ Added {} video(s), broadcast to {} user(s).",
            added.len(),
            delivered,
        );
        append_skip_report(&mut msg, &outcome.skipped);
        self.reply(caller, &msg).await
    }

    /// Fire-and-forget fan-out to every current registered user. Returns the
    /// delivered count; failures are logged and dropped.
    async fn broadcast_new_videos(&self, added: &[VideoEntry]) -> usize {
        let body = added
            .iter()
            .map(|v| format!("<b>{}</b>\n{}", escape_html(&v.title), escape_html(&v.link)))
            .collect::<Vec<_>>()
            .join("\n\n");
        let notice = format!("📢 New videos added:\n\n{body}");

        let recipients = match self.store.user_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "broadcast recipient lookup failed");
                return 0;
            }
        };

        let mut delivered = 0usize;
        for id in recipients {
            match self.send_to(ChatId(id.0), &notice).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(user_id = id.0, error = %e, "broadcast delivery failed"),
            }
        }
        delivered
    }

    async fn del_user(&self, caller: &Caller, args: &str) -> Result<()> {
        let Ok(id) = args.parse::<i64>() else {
            return self.reply(caller, "❗ Example: /del_user 123456789").await;
        };
        self.store.remove_user(UserId(id)).await?;
        self.reply(caller, &format!("✅ User {id} removed.")).await
    }

    async fn del_video_link(&self, caller: &Caller, args: &str) -> Result<()> {
        if args.is_empty() {
            return self
                .reply(caller, "❗ Example: /del_video_link https://...")
                .await;
        }
        let removed = self.store.delete_video_by_link(args).await?;
        if removed == 0 {
            return self.reply(caller, "🙁 No videos matched that link.").await;
        }
        self.reply(
            caller,
            &format!("✅ Removed {removed} video(s); catalog renumbered."),
        )
        .await
    }

    async fn del_video_num(&self, caller: &Caller, args: &str) -> Result<()> {
        let Ok(number) = args.parse::<u32>() else {
            return self.reply(caller, "❗ Example: /del_video_num 3").await;
        };
        if self.store.delete_video_by_number(number).await? {
            self.reply(
                caller,
                &format!("✅ Video {number} removed; catalog renumbered."),
            )
            .await
        } else {
            self.reply(caller, &format!("🙁 No video at number {number}."))
                .await
        }
    }

    async fn videos(&self, caller: &Caller) -> Result<()> {
        let videos = self.store.videos_ordered().await?;
        if videos.is_empty() {
            return self.reply(caller, "📭 No videos yet.").await;
        }
        self.reply(caller, &format_video_list(&videos)).await
    }

    async fn find(&self, caller: &Caller, args: &str) -> Result<()> {
        if args.is_empty() {
            return self
                .reply(caller, "❗ Give me a keyword. Example: /find lecture")
                .await;
        }
        let results = self.store.search_videos_by_title(args).await?;
        if results.is_empty() {
            return self.reply(caller, "🙁 Nothing found.").await;
        }
        let msg = format!("🔍 Found:\n\n{}", format_video_list(&results));
        self.reply(caller, &msg).await
    }
}

fn append_skip_report(msg: &mut String, skipped: &[String]) {
    if skipped.is_empty() {
        return;
    }
    msg.push_str(&format!("\n\n⚠️ Skipped {} line(s):\n", skipped.len()));
    msg.push_str(
        &skipped
            .iter()
            .map(|s| escape_html(s))
            .collect::<Vec<_>>()
            .join("\n"),
    );
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::domain::MessageId;
    use crate::testing::{MemoryStore, RecordingMessenger};

    fn test_cfg(admins: &[i64]) -> Arc<Config> {
        Arc::new(Config {
            telegram_bot_token: "test-token".to_string(),
            admin_ids: admins.to_vec(),
            database_path: PathBuf::from(":memory:"),
            audit_log_path: None,
        })
    }

    fn setup(admins: &[i64]) -> (Dispatcher, Arc<MemoryStore>, Arc<RecordingMessenger>) {
        let store = Arc::new(MemoryStore::new());
        let messenger = Arc::new(RecordingMessenger::new());
        let dispatcher = Dispatcher::new(test_cfg(admins), store.clone(), messenger.clone());
        (dispatcher, store, messenger)
    }

    fn caller(id: i64) -> Caller {
        Caller {
            user_id: UserId(id),
            chat_id: ChatId(id),
            first_name: format!("U{id}"),
            last_name: "Test".to_string(),
        }
    }

    async fn enroll(store: &MemoryStore, id: i64) {
        store
            .add_user(&User {
                id: UserId(id),
                first_name: format!("U{id}"),
                last_name: "Test".to_string(),
            })
            .await
            .unwrap();
    }

    #[test]
    fn routing_prefers_longest_prefix() {
        assert_eq!(resolve("/add_video").unwrap().command, Command::AddVideo);
        assert_eq!(resolve("/add_user").unwrap().command, Command::AddUser);
        assert_eq!(resolve("/add").unwrap().command, Command::AddVideo);
        assert_eq!(
            resolve("/del_video_link https://x").unwrap().command,
            Command::DelVideoLink
        );
        assert_eq!(
            resolve("/del_video_num 3").unwrap().command,
            Command::DelVideoNum
        );
        assert!(resolve("hello").is_none());
        assert!(resolve("/bogus").is_none());
    }

    #[tokio::test]
    async fn unknown_caller_videos_is_denied() {
        let (d, store, messenger) = setup(&[9]);
        d.dispatch(&caller(5), "/videos").await.unwrap();

        assert_eq!(messenger.texts_for(5), vec![NO_ACCESS.to_string()]);
        assert_eq!(store.video_count(), 0);
    }

    #[tokio::test]
    async fn registered_caller_empty_catalog_is_not_an_error() {
        let (d, store, messenger) = setup(&[9]);
        enroll(&store, 5).await;

        d.dispatch(&caller(5), "/videos").await.unwrap();
        assert_eq!(messenger.texts_for(5), vec!["📭 No videos yet.".to_string()]);
    }

    #[tokio::test]
    async fn unrecognized_text_is_silently_ignored() {
        let (d, _store, messenger) = setup(&[9]);
        d.dispatch(&caller(9), "hello there").await.unwrap();
        d.dispatch(&caller(9), "/bogus").await.unwrap();

        assert!(messenger.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn admin_start_self_enrolls_exactly_once() {
        let (d, store, messenger) = setup(&[9]);

        d.dispatch(&caller(9), "/start").await.unwrap();
        d.dispatch(&caller(9), "/start").await.unwrap();

        assert_eq!(store.user_count(), 1);
        let texts = messenger.texts_for(9);
        assert!(texts[0].contains("automatically added"));
        assert!(texts[1].contains("Welcome back"));
    }

    #[tokio::test]
    async fn unknown_start_reports_missing_access() {
        let (d, store, messenger) = setup(&[9]);
        d.dispatch(&caller(5), "/start").await.unwrap();

        assert_eq!(store.user_count(), 0);
        assert!(messenger.texts_for(5)[0].contains("/registration"));
    }

    #[tokio::test]
    async fn oversized_catalog_reply_is_split_into_several_messages() {
        let store = Arc::new(MemoryStore::new());
        let messenger = Arc::new(RecordingMessenger::with_max_message_len(120));
        let d = Dispatcher::new(test_cfg(&[9]), store.clone(), messenger.clone());
        enroll(&store, 5).await;
        for i in 0..12 {
            store
                .insert_video(None, &format!("Lecture {i}"), &format!("https://e/{i}"))
                .await
                .unwrap();
        }

        d.dispatch(&caller(5), "/videos").await.unwrap();

        let texts = messenger.texts_for(5);
        assert!(texts.len() > 1);
        for text in &texts {
            assert!(text.len() <= 120);
        }
        let joined = texts.join("\n");
        assert!(joined.contains("<b>1. Lecture 0</b>"));
        assert!(joined.contains("<b>12. Lecture 11</b>"));
    }

    #[tokio::test]
    async fn bulk_add_video_commits_valid_lines_and_reports_skips() {
        let (d, store, messenger) = setup(&[9]);
        enroll(&store, 5).await;

        let text = "/add_video\n\
                    Lecture 1 : https://example.com/1\n\
                    broken line\n\
                    Lecture 2 : https://example.com/2\n\
                    Lecture 3 : https://example.com/3";
        d.dispatch(&caller(9), text).await.unwrap();

        assert_eq!(store.video_count(), 3);
        store.assert_dense();

        let reply = messenger.texts_for(9).pop().unwrap();
        assert!(reply.contains("Added 3 video(s)"));
        assert!(reply.contains("Skipped 1 line(s)"));
        assert!(reply.contains("broken line"));

        // Registered user got the broadcast.
        let notice = messenger.texts_for(5).pop().unwrap();
        assert!(notice.starts_with("📢"));
        assert!(notice.contains("Lecture 2"));
    }

    #[tokio::test]
    async fn broadcast_failure_is_swallowed_per_recipient() {
        let (d, store, messenger) = setup(&[9]);
        enroll(&store, 5).await;
        enroll(&store, 6).await;
        messenger.fail_chat(6);

        d.dispatch(&caller(9), "/add_video\nLecture : https://example.com/v")
            .await
            .unwrap();

        assert_eq!(store.video_count(), 1);
        let reply = messenger.texts_for(9).pop().unwrap();
        assert!(reply.contains("broadcast to 1 user(s)"));
        assert_eq!(messenger.texts_for(5).len(), 1);
        assert!(messenger.texts_for(6).is_empty());
    }

    #[tokio::test]
    async fn explicit_number_inserts_at_position_and_shifts() {
        let (d, store, _messenger) = setup(&[9]);

        d.dispatch(
            &caller(9),
            "/add_video\nFirst : https://example.com/1\nSecond : https://example.com/2",
        )
        .await
        .unwrap();
        d.dispatch(&caller(9), "/add_video\n1. Zeroth : https://example.com/0")
            .await
            .unwrap();

        let videos = store.videos_ordered().await.unwrap();
        let titles: Vec<&str> = videos.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["Zeroth", "First", "Second"]);
        store.assert_dense();
    }

    #[tokio::test]
    async fn registration_round_trip_with_idempotent_approval() {
        let (d, store, messenger) = setup(&[9]);

        d.dispatch(&caller(777), "/registration Ann Lee").await.unwrap();

        assert!(messenger.texts_for(777)[0].contains("Request sent"));
        let prompt = messenger.keyboards.lock().unwrap().last().cloned().unwrap();
        assert_eq!(prompt.chat_id, 9);
        assert!(prompt.text.contains("Ann Lee"));
        let data = prompt.callback_data[0].clone();

        let prompt_ref = MessageRef {
            chat_id: ChatId(9),
            message_id: MessageId(1),
        };
        d.approve(UserId(9), "cb-1", &data, Some(prompt_ref))
            .await
            .unwrap();

        let ids = store.user_ids().await.unwrap();
        assert!(ids.contains(&UserId(777)));
        assert!(messenger.texts_for(777).last().unwrap().contains("approved"));

        let edits = messenger.edits.lock().unwrap().clone();
        assert!(edits[0].1.contains("Approved: Ann Lee"));
        assert_eq!(
            messenger.answers.lock().unwrap().last().unwrap().1.as_deref(),
            Some("Approved")
        );

        // Second tap: request already consumed, no duplicate row.
        d.approve(UserId(9), "cb-2", &data, None).await.unwrap();
        assert_eq!(store.user_count(), 1);
        let (_, answer) = messenger.answers.lock().unwrap().last().cloned().unwrap();
        assert!(answer.unwrap().contains("expired"));
    }

    #[tokio::test]
    async fn non_admin_cannot_approve() {
        let (d, store, messenger) = setup(&[9]);
        d.dispatch(&caller(777), "/registration Ann Lee").await.unwrap();
        let data = messenger.keyboards.lock().unwrap()[0].callback_data[0].clone();

        d.approve(UserId(5), "cb-1", &data, None).await.unwrap();

        assert_eq!(store.user_count(), 0);
        let (_, answer) = messenger.answers.lock().unwrap().last().cloned().unwrap();
        assert_eq!(answer.as_deref(), Some(NO_ACCESS));
    }

    #[tokio::test]
    async fn registration_with_access_already_granted() {
        let (d, store, messenger) = setup(&[9]);
        enroll(&store, 5).await;

        d.dispatch(&caller(5), "/registration Ann Lee").await.unwrap();

        assert!(messenger.texts_for(5)[0].contains("already have access"));
        assert!(messenger.keyboards.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn registration_requires_two_name_tokens() {
        let (d, _store, messenger) = setup(&[9]);
        d.dispatch(&caller(5), "/registration Ann").await.unwrap();
        assert!(messenger.texts_for(5)[0].contains("Example"));
    }

    #[tokio::test]
    async fn find_matches_case_insensitively_in_catalog_order() {
        let (d, store, messenger) = setup(&[9]);
        enroll(&store, 5).await;
        for (title, link) in [
            ("Lecture 1", "https://example.com/1"),
            ("lecture intro", "https://example.com/2"),
            ("Seminar", "https://example.com/3"),
        ] {
            store.insert_video(None, title, link).await.unwrap();
        }

        d.dispatch(&caller(5), "/find lecture").await.unwrap();

        let reply = messenger.texts_for(5).pop().unwrap();
        assert!(reply.contains("Lecture 1"));
        assert!(reply.contains("lecture intro"));
        assert!(!reply.contains("Seminar"));
        let first = reply.find("Lecture 1").unwrap();
        let second = reply.find("lecture intro").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn deleting_a_missing_number_is_reported_not_fatal() {
        let (d, _store, messenger) = setup(&[9]);
        d.dispatch(&caller(9), "/del_video_num 4").await.unwrap();
        assert!(messenger.texts_for(9)[0].contains("No video at number 4"));
    }

    #[tokio::test]
    async fn malformed_arguments_get_a_usage_reply() {
        let (d, _store, messenger) = setup(&[9]);
        d.dispatch(&caller(9), "/del_user abc").await.unwrap();
        d.dispatch(&caller(9), "/del_video_num x").await.unwrap();
        d.dispatch(&caller(9), "/add_user").await.unwrap();

        let texts = messenger.texts_for(9);
        assert!(texts.iter().all(|t| t.contains("Example")));
    }

    #[tokio::test]
    async fn registered_caller_is_denied_admin_commands() {
        let (d, store, messenger) = setup(&[9]);
        enroll(&store, 5).await;

        d.dispatch(&caller(5), "/users").await.unwrap();
        d.dispatch(&caller(5), "/add_video\nX : https://example.com/x")
            .await
            .unwrap();

        assert_eq!(
            messenger.texts_for(5),
            vec![NO_ACCESS.to_string(), NO_ACCESS.to_string()]
        );
        assert_eq!(store.video_count(), 0);
    }

    #[tokio::test]
    async fn help_is_scoped_to_the_caller_class() {
        let (d, store, messenger) = setup(&[9]);
        enroll(&store, 5).await;

        d.dispatch(&caller(9), "/help").await.unwrap();
        d.dispatch(&caller(5), "/help").await.unwrap();
        d.dispatch(&caller(6), "/help").await.unwrap();

        assert!(messenger.texts_for(9)[0].contains("/add_video"));
        let registered = &messenger.texts_for(5)[0];
        assert!(registered.contains("/videos") && !registered.contains("/add_video"));
        assert!(messenger.texts_for(6)[0].contains("/registration"));
    }

    #[tokio::test]
    async fn bulk_add_users_commits_valid_lines() {
        let (d, store, messenger) = setup(&[9]);

        let text = "/add_user\n111 Ann Lee\nnot a user\n222 Bo van Dam";
        d.dispatch(&caller(9), text).await.unwrap();

        assert_eq!(store.user_count(), 2);
        let ids = store.user_ids().await.unwrap();
        assert!(ids.contains(&UserId(111)) && ids.contains(&UserId(222)));

        let reply = messenger.texts_for(9).pop().unwrap();
        assert!(reply.contains("Added 2 user(s)"));
        assert!(reply.contains("Skipped 1 line(s)"));
    }

    #[tokio::test]
    async fn del_video_link_removes_all_matches() {
        let (d, store, messenger) = setup(&[9]);
        store
            .insert_video(None, "a", "https://example.com/dup")
            .await
            .unwrap();
        store
            .insert_video(None, "b", "https://example.com/keep")
            .await
            .unwrap();
        store
            .insert_video(None, "c", "https://example.com/dup")
            .await
            .unwrap();

        d.dispatch(&caller(9), "/del_video_link https://example.com/dup")
            .await
            .unwrap();

        assert_eq!(store.video_count(), 1);
        store.assert_dense();
        assert!(messenger.texts_for(9)[0].contains("Removed 2 video(s)"));
    }
}
