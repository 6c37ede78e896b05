use deadpool_postgres::Pool;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::utils::command::BotCommands;

use crate::config::Config;
use crate::handlers::{AdminHandler, CallbackHandler, CommandHandler, PaymentHandler};
use crate::keyboards::KeyboardSettings;
use crate::localization::Lang;
use crate::mailing::MailingContent;
use crate::payment::PaymentClient;
use crate::repo::Repositories;
use crate::scenario::{FunctionRegistry, ScenarioHandler, ScenarioStore};
use crate::transport::{ChatTransport, TelegramTransport};
use crate::user_session::{SessionManager, SessionState};

const QUEUE_TICK: Duration = Duration::from_millis(100);
const QUEUE_IDLE_PAUSE: Duration = Duration::from_secs(2);
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start(String),
    #[command(description = "admin menu")]
    Admin,
    #[command(description = "preview a scenario")]
    Scenario(String),
}

pub struct TelegramBot {
    ctx: BotContext,
}

#[derive(Clone)]
pub struct BotContext {
    pub bot: Arc<Bot>,
    pub transport: Arc<dyn ChatTransport>,
    pub repos: Repositories,
    pub sessions: SessionManager,
    pub functions: Arc<FunctionRegistry>,
    pub scenarios: Arc<ScenarioStore>,
    pub payments: PaymentClient,
    pub config: Arc<Config>,
    pub bot_username: String,
}

impl BotContext {
    pub fn keyboard_settings(&self, lang: Lang) -> KeyboardSettings {
        KeyboardSettings {
            lang,
            support_url: self.config.messages.support_url.clone(),
        }
    }

    pub fn scenario_handler(&self, chat_id: i64, lang: Lang) -> ScenarioHandler {
        ScenarioHandler::new(
            self.transport.clone(),
            self.sessions.clone(),
            self.functions.clone(),
            self.keyboard_settings(lang),
            chat_id,
        )
    }
}

impl TelegramBot {
    pub async fn new(config: Config, pool: Pool) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let bot = Arc::new(Bot::new(&config.bot_token));
        let me = bot.get_me().await?;
        let bot_username = me.username().to_string();
        info!("Authorized as @{}", bot_username);

        let repos = Repositories::new(pool);
        let payments = PaymentClient::new(&config.payment)?;
        let scenarios = match config.scenarios_dir.as_deref() {
            Some(dir) => ScenarioStore::load_dir(dir)?,
            None => {
                warn!("SCENARIOS_DIR is not set, deep links will fall back to the main menu");
                ScenarioStore::new()
            }
        };
        let functions = FunctionRegistry::with_repositories(repos.clone());

        let ctx = BotContext {
            transport: Arc::new(TelegramTransport::new(bot.clone())),
            bot,
            repos,
            sessions: SessionManager::new(),
            functions: Arc::new(functions),
            scenarios: Arc::new(scenarios),
            payments,
            config: Arc::new(config),
            bot_username,
        };

        Ok(Self { ctx })
    }

    /// sends queued broadcast messages one at a time, pausing while the queue is empty
    async fn run_message_queue_processor(repos: Repositories, transport: Arc<dyn ChatTransport>) {
        info!("Starting message queue processor");
        let queue = repos.message_queue();
        if let Err(e) = queue.requeue_stale().await {
            error!("Failed to requeue interrupted messages: {}", e);
        }

        let mut interval = tokio::time::interval(QUEUE_TICK);
        loop {
            interval.tick().await;

            let queued = match queue.claim_next().await {
                Ok(Some(queued)) => queued,
                Ok(None) => {
                    tokio::time::sleep(QUEUE_IDLE_PAUSE).await;
                    continue;
                }
                Err(e) => {
                    error!("Failed to query message queue: {}", e);
                    tokio::time::sleep(QUEUE_IDLE_PAUSE).await;
                    continue;
                }
            };

            let Some(content) = MailingContent::from_queued(&queued) else {
                warn!("Queued message {} has unsupported content", queued.id);
                if let Err(e) = queue
                    .mark_failed(queued.id, &format!("unsupported content type {}", queued.content_type))
                    .await
                {
                    error!("Failed to update message status to failed: {}", e);
                }
                continue;
            };

            match content.deliver(transport.as_ref(), queued.telegram_user_id).await {
                Ok(_) => {
                    if let Err(e) = queue.mark_sent(queued.id).await {
                        error!("Failed to update message status to sent: {}", e);
                    }
                }
                Err(e) => {
                    warn!("Failed to deliver queued message {} to {}: {}", queued.id, queued.telegram_user_id, e);
                    if let Err(e) = queue.mark_failed(queued.id, &e.to_string()).await {
                        error!("Failed to update message status to failed: {}", e);
                    }
                }
            }
        }
    }

    async fn run_session_cleanup(sessions: SessionManager) {
        let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sessions.cleanup_old_sessions().await;
            if removed > 0 {
                info!("Removed {} stale sessions", removed);
            }
        }
    }

    pub async fn run(&self) {
        info!("Starting Telegram bot...");

        tokio::spawn(Self::run_message_queue_processor(
            self.ctx.repos.clone(),
            self.ctx.transport.clone(),
        ));
        tokio::spawn(Self::run_session_cleanup(self.ctx.sessions.clone()));

        let ctx = self.ctx.clone();
        let handler = dptree::entry()
            .branch(Update::filter_callback_query().endpoint({
                let ctx = ctx.clone();
                move |query: CallbackQuery| {
                    let ctx = ctx.clone();
                    async move { CallbackHandler::handle_callback_query(ctx, query).await }
                }
            }))
            .branch(
                Update::filter_message()
                    .branch(dptree::entry().filter_command::<Command>().endpoint({
                        let ctx = ctx.clone();
                        move |msg: Message, cmd: Command| {
                            let ctx = ctx.clone();
                            async move { CommandHandler::handle_command(ctx, msg, cmd).await }
                        }
                    }))
                    .branch(dptree::endpoint({
                        let ctx = ctx.clone();
                        move |msg: Message| {
                            let ctx = ctx.clone();
                            async move { Self::handle_message(ctx, msg).await }
                        }
                    })),
            );

        Dispatcher::builder(self.ctx.bot.clone(), handler)
            .error_handler(
                teloxide::error_handlers::LoggingErrorHandler::with_custom_text(
                    "An error from the update listener",
                ),
            )
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    /// plain messages only matter while a conversation step is waiting for input
    async fn handle_message(ctx: BotContext, msg: Message) -> ResponseResult<()> {
        let Some(from) = msg.from.as_ref() else {
            return Ok(());
        };
        let user_id = from.id.0 as i64;
        let lang = Lang::from_code(from.language_code.as_deref());

        match ctx.sessions.get_state(user_id).await {
            SessionState::AwaitingEmail => PaymentHandler::handle_email(ctx, msg, lang).await,
            SessionState::DeeplinkAwaitingLink { source, target } if ctx.config.is_admin(user_id) => {
                AdminHandler::handle_deeplink_link(ctx, msg, source, target, lang).await
            }
            SessionState::BroadcastAwaitingContent if ctx.config.is_admin(user_id) => {
                AdminHandler::handle_broadcast_content(ctx, msg, lang).await
            }
            state => {
                info!("Ignoring message from user {} in state {:?}", user_id, state);
                Ok(())
            }
        }
    }
}
