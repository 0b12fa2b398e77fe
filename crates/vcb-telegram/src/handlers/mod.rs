//! Telegram update handlers.
//!
//! These are thin adapters: they turn teloxide updates into core dispatcher
//! calls. Authorization is not checked here; the core access policy owns it,
//! so Unknown callers still reach `/start`, `/help` and `/registration`.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use vcb_core::{
    dispatch::Caller,
    domain::{ChatId, UserId},
};

use crate::router::AppState;

mod callback;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    // Only text carries commands; everything else is not for this bot.
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let caller = Caller {
        user_id: UserId(user.id.0 as i64),
        chat_id: ChatId(msg.chat.id.0),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone().unwrap_or_default(),
    };

    if let Err(e) = state.dispatcher.dispatch(&caller, text).await {
        tracing::error!(error = %e, "message dispatch failed");
    }
    Ok(())
}
