use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use dgb_core::{config::Config, coordinator::Coordinator, notify::AdminNotifier};

use crate::admin::AdminCache;
use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub coordinator: Arc<Coordinator>,
    pub notifier: Arc<AdminNotifier>,
    pub admins: Arc<AdminCache>,
}

/// Run long polling until a shutdown signal arrives, then drain in-flight
/// handlers up to the configured timeout.
pub async fn run_polling(
    bot: Bot,
    cfg: Arc<Config>,
    coordinator: Arc<Coordinator>,
    notifier: Arc<AdminNotifier>,
) -> anyhow::Result<()> {
    if let Ok(me) = bot.get_me().await {
        info!(username = %me.username(), "dgb started");
    }

    let admins = Arc::new(AdminCache::new(
        bot.clone(),
        teloxide::types::ChatId(cfg.group_id.0),
        cfg.admin_cache_ttl,
    ));

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        coordinator,
        notifier: notifier.clone(),
        admins,
    });

    // Startup notification is best-effort and must not delay polling.
    {
        let notifier = notifier.clone();
        tokio::spawn(async move {
            notifier.send_startup().await;
        });
    }

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build();
    let shutdown = dispatcher.shutdown_token();

    let dispatch = dispatcher.dispatch();
    tokio::pin!(dispatch);

    tokio::select! {
        _ = &mut dispatch => {}
        _ = shutdown_signal() => {
            info!("shutdown signal received, draining in-flight handlers");
            // Stop accepting updates; in-flight handlers run to completion
            // within the drain budget.
            if let Ok(fut) = shutdown.shutdown() {
                drop(fut);
            }
            if tokio::time::timeout(cfg.drain_timeout, &mut dispatch).await.is_err() {
                warn!(
                    timeout = ?cfg.drain_timeout,
                    "drain timeout exceeded, abandoning remaining work"
                );
            }
        }
    }

    notifier.send_shutdown().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
