use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tracing::info;

use vcb_core::{
    config::Config, dispatch::Dispatcher as CommandDispatcher, messaging::port::MessagingPort,
    store::CatalogStore,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub dispatcher: Arc<CommandDispatcher>,
}

pub async fn run_polling(cfg: Arc<Config>, store: Arc<dyn CatalogStore>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // Basic startup info.
    if let Ok(me) = bot.get_me().await {
        info!("vcb started: @{}", me.username());
    }
    info!(admins = cfg.admin_ids.len(), "static admin ids configured");

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let dispatcher = Arc::new(CommandDispatcher::new(cfg.clone(), store, messenger));

    let state = Arc::new(AppState { cfg, dispatcher });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
