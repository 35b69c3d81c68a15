use std::sync::Arc;

use teloxide::Bot;

use dgb_core::{
    api::{ModerationApi, ThrottleConfig, ThrottledApi},
    classify::ChannelBinding,
    config::Config,
    coordinator::Coordinator,
    dispatch::{DispatchConfig, Dispatcher},
    notify::AdminNotifier,
    policy::EscalationTable,
    store::SqliteStore,
};
use dgb_telegram::TelegramApi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dgb_core::logging::init("dgb");

    let cfg = Arc::new(Config::load()?);

    // No durable state, no moderation: store failure at startup is fatal.
    let store = Arc::new(SqliteStore::open(&cfg.db_path)?);

    let bot = Bot::new(cfg.bot_token.clone());

    // Raw adapter wrapped with the process-wide rate budget; the dispatcher
    // still honors explicit RetryAfter signals on top.
    let raw_api: Arc<dyn ModerationApi> = Arc::new(TelegramApi::new(bot.clone()));
    let api: Arc<dyn ModerationApi> = Arc::new(ThrottledApi::new(raw_api, ThrottleConfig::default()));

    let dispatcher = Dispatcher::new(
        api.clone(),
        DispatchConfig {
            max_rate_limit_wait: cfg.dispatch_max_retry_wait,
            ..DispatchConfig::default()
        },
    );

    let coordinator = Arc::new(Coordinator::new(
        ChannelBinding {
            channel_id: cfg.channel_id,
        },
        EscalationTable::from_config(&cfg),
        store,
        dispatcher,
    ));

    let notifier = Arc::new(AdminNotifier::new(api, cfg.admin_id));

    dgb_telegram::router::run_polling(bot, cfg, coordinator, notifier).await
}
