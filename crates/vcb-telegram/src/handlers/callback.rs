use std::sync::Arc;

use teloxide::prelude::*;

use vcb_core::domain::{ChatId, MessageId, MessageRef, UserId};

use crate::router::AppState;

/// Approval-button taps. The core consumes the pending request and answers
/// the callback query; this adapter only extracts the teloxide fields.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let data = q.data.clone().unwrap_or_default();
    if data.is_empty() {
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    }

    let admin_id = UserId(q.from.id.0 as i64);
    let prompt = q.message.as_ref().map(|m| MessageRef {
        chat_id: ChatId(m.chat.id.0),
        message_id: MessageId(m.id.0),
    });

    if let Err(e) = state.dispatcher.approve(admin_id, &q.id, &data, prompt).await {
        tracing::error!(error = %e, "callback handling failed");
        // Make sure the spinner stops even on failure.
        let _ = bot.answer_callback_query(q.id.clone()).await;
    }
    Ok(())
}
