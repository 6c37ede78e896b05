use log::{error, info, warn};
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, ParseMode};

use crate::bot::BotContext;
use crate::export;
use crate::handlers::edit_or_send;
use crate::keyboards;
use crate::localization::Lang;
use crate::mailing::MailingContent;
use crate::repo::{Deeplink, DeeplinkStats, QueueStatusCounts};
use crate::user_session::SessionState;
use crate::utils::MessageFormatter;

const ADMIN_CALLBACKS: [&str; 9] = [
    "admin_deeplink",
    "create_deeplink",
    "list_deeplinks",
    "stats",
    "admin_back",
    "broadcast",
    "broadcast_confirm",
    "broadcast_cancel",
    "export",
];

pub struct AdminHandler;

impl AdminHandler {
    pub fn is_admin_callback(data: &str) -> bool {
        ADMIN_CALLBACKS.contains(&data)
            || keyboards::unpack_source(data).is_some()
            || keyboards::unpack_target(data).is_some()
    }

    pub fn deeplink_url(bot_username: &str, deeplink_id: i32) -> String {
        format!("https://t.me/{}?start={}", bot_username, deeplink_id)
    }

    pub fn format_stats(
        lang: Lang,
        users: i64,
        paid_users: i64,
        per_link: &[DeeplinkStats],
        queue: &QueueStatusCounts,
    ) -> String {
        let mut text = lang.stats(users, paid_users);
        if !per_link.is_empty() {
            text.push_str(lang.stats_by_deeplink_header());
            for stats in per_link {
                text.push_str(&format!(
                    "\n#{} {} → {}: {} / {}",
                    stats.deeplink.id,
                    MessageFormatter::escape_html(&stats.deeplink.source),
                    lang.target_name(&stats.deeplink.target),
                    stats.users,
                    stats.paid_users
                ));
            }
        }
        // rows being sent right now are still waiting from the admin's point of view
        text.push_str(&lang.stats_queue(queue.pending + queue.sending, queue.sent, queue.failed));
        text
    }

    pub fn format_deeplink_list(lang: Lang, bot_username: &str, deeplinks: &[Deeplink]) -> String {
        if deeplinks.is_empty() {
            return lang.deeplink_list_empty().to_string();
        }
        deeplinks
            .iter()
            .map(|deeplink| {
                let mut line = format!(
                    "#{} {} → {}\n{}",
                    deeplink.id,
                    MessageFormatter::escape_html(&deeplink.source),
                    lang.target_name(&deeplink.target),
                    Self::deeplink_url(bot_username, deeplink.id)
                );
                if let Some(link) = deeplink.link.as_deref().filter(|link| !link.is_empty()) {
                    line.push_str(&format!("\n📍 {}", MessageFormatter::escape_html(link)));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub async fn handle_admin_command(ctx: BotContext, msg: Message) -> ResponseResult<()> {
        let Some(from) = msg.from.as_ref() else {
            return Ok(());
        };
        let user_id = from.id.0 as i64;
        if !ctx.config.is_admin(user_id) {
            info!("Ignoring /admin from non-admin user {}", user_id);
            return Ok(());
        }
        let lang = Lang::from_code(from.language_code.as_deref());

        ctx.sessions.set_state(user_id, SessionState::Idle).await;
        ctx.bot
            .send_message(msg.chat.id, lang.admin_greeting())
            .reply_markup(keyboards::admin_keyboard(lang))
            .await?;
        Ok(())
    }

    /// runs a scenario in the admin's own chat
    pub async fn handle_scenario_preview(ctx: BotContext, msg: Message, name: &str) -> ResponseResult<()> {
        let Some(from) = msg.from.as_ref() else {
            return Ok(());
        };
        if !ctx.config.is_admin(from.id.0 as i64) {
            return Ok(());
        }
        let lang = Lang::from_code(from.language_code.as_deref());

        match ctx.scenarios.get(name) {
            Some(scenario) => {
                info!("Admin {} previews scenario '{}'", from.id, name);
                ctx.scenario_handler(msg.chat.id.0, lang)
                    .spawn_scenario(scenario.clone());
            }
            None => {
                let mut text = lang.scenario_not_found(name);
                let names = ctx.scenarios.names();
                if !names.is_empty() {
                    text.push_str(&format!(
                        "\n\n{}",
                        MessageFormatter::escape_html(&names.join(", "))
                    ));
                }
                ctx.bot
                    .send_message(msg.chat.id, text)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn handle_callback(
        ctx: BotContext,
        chat_id: ChatId,
        message_id: MessageId,
        user_id: i64,
        data: &str,
        lang: Lang,
    ) -> ResponseResult<()> {
        let message_id = Some(message_id);

        if let Some(source) = keyboards::unpack_source(data) {
            ctx.sessions
                .set_state(
                    user_id,
                    SessionState::DeeplinkSelectingTarget {
                        source: source.to_string(),
                    },
                )
                .await;
            return edit_or_send(
                &ctx,
                chat_id,
                message_id,
                lang.deeplink_choose_target(),
                Some(keyboards::target_keyboard(lang)),
            )
            .await;
        }

        if let Some(target) = keyboards::unpack_target(data) {
            let SessionState::DeeplinkSelectingTarget { source } =
                ctx.sessions.get_state(user_id).await
            else {
                warn!("Target selected without a source by admin {}", user_id);
                return edit_or_send(
                    &ctx,
                    chat_id,
                    message_id,
                    lang.deeplink_choose_source(),
                    Some(keyboards::source_keyboard(lang)),
                )
                .await;
            };
            ctx.sessions
                .set_state(
                    user_id,
                    SessionState::DeeplinkAwaitingLink {
                        source,
                        target: target.to_string(),
                    },
                )
                .await;
            return edit_or_send(&ctx, chat_id, message_id, lang.deeplink_enter_link(), None).await;
        }

        match data {
            "admin_deeplink" => {
                edit_or_send(
                    &ctx,
                    chat_id,
                    message_id,
                    lang.deeplink_menu(),
                    Some(keyboards::deeplink_keyboard(lang)),
                )
                .await
            }
            "create_deeplink" => {
                ctx.sessions
                    .set_state(user_id, SessionState::DeeplinkSelectingSource)
                    .await;
                edit_or_send(
                    &ctx,
                    chat_id,
                    message_id,
                    lang.deeplink_choose_source(),
                    Some(keyboards::source_keyboard(lang)),
                )
                .await
            }
            "list_deeplinks" => Self::send_deeplink_list(&ctx, chat_id, message_id, lang).await,
            "stats" => Self::send_stats(&ctx, chat_id, lang).await,
            "admin_back" => {
                ctx.sessions.set_state(user_id, SessionState::Idle).await;
                edit_or_send(
                    &ctx,
                    chat_id,
                    message_id,
                    lang.admin_greeting(),
                    Some(keyboards::admin_keyboard(lang)),
                )
                .await
            }
            "broadcast" => {
                ctx.sessions
                    .set_state(user_id, SessionState::BroadcastAwaitingContent)
                    .await;
                ctx.bot.send_message(chat_id, lang.broadcast_prompt()).await?;
                Ok(())
            }
            "broadcast_confirm" => Self::confirm_broadcast(&ctx, chat_id, user_id, lang).await,
            "broadcast_cancel" => {
                ctx.sessions.set_state(user_id, SessionState::Idle).await;
                ctx.bot
                    .send_message(chat_id, lang.broadcast_cancelled())
                    .await?;
                Ok(())
            }
            "export" => Self::send_export(&ctx, chat_id, lang).await,
            other => {
                warn!("Unknown admin callback: {}", other);
                Ok(())
            }
        }
    }

    async fn send_deeplink_list(
        ctx: &BotContext,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        lang: Lang,
    ) -> ResponseResult<()> {
        let deeplinks = match ctx.repos.deeplinks().get_all_deeplinks().await {
            Ok(deeplinks) => deeplinks,
            Err(e) => {
                error!("Failed to list deep links: {}", e);
                ctx.bot
                    .send_message(chat_id, lang.error_admin_action())
                    .await?;
                return Ok(());
            }
        };

        let text = Self::format_deeplink_list(lang, &ctx.bot_username, &deeplinks);
        edit_or_send(
            ctx,
            chat_id,
            message_id,
            &text,
            Some(keyboards::deeplink_keyboard(lang)),
        )
        .await
    }

    async fn send_stats(ctx: &BotContext, chat_id: ChatId, lang: Lang) -> ResponseResult<()> {
        let stats = async {
            let users = ctx.repos.users().count_users().await?;
            let paid_users = ctx.repos.purchases().paid_users_count().await?;
            let per_link = ctx.repos.deeplinks().deeplink_stats().await?;
            let queue = ctx.repos.message_queue().status_counts().await?;
            Ok::<_, crate::repo::RepoError>(Self::format_stats(
                lang, users, paid_users, &per_link, &queue,
            ))
        }
        .await;

        match stats {
            Ok(text) => {
                ctx.bot
                    .send_message(chat_id, text)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            Err(e) => {
                error!("Failed to collect statistics: {}", e);
                ctx.bot
                    .send_message(chat_id, lang.error_admin_action())
                    .await?;
            }
        }
        Ok(())
    }

    async fn confirm_broadcast(
        ctx: &BotContext,
        chat_id: ChatId,
        user_id: i64,
        lang: Lang,
    ) -> ResponseResult<()> {
        let SessionState::BroadcastConfirm { content } = ctx.sessions.get_state(user_id).await else {
            warn!("Broadcast confirmed by admin {} without content", user_id);
            ctx.bot.send_message(chat_id, lang.broadcast_prompt()).await?;
            return Ok(());
        };
        ctx.sessions.set_state(user_id, SessionState::Idle).await;

        let queued = async {
            let user_ids = ctx.repos.users().all_user_ids().await?;
            ctx.repos
                .message_queue()
                .enqueue_for_all(
                    &user_ids,
                    content.kind.as_str(),
                    content.text.as_deref(),
                    content.file_id.as_deref(),
                )
                .await
        }
        .await;

        match queued {
            Ok(count) => {
                info!("Admin {} queued a {} broadcast for {} users", user_id, content.kind.as_str(), count);
                ctx.bot
                    .send_message(chat_id, lang.broadcast_queued(count))
                    .await?;
            }
            Err(e) => {
                error!("Failed to queue broadcast: {}", e);
                ctx.bot
                    .send_message(chat_id, lang.error_admin_action())
                    .await?;
            }
        }
        Ok(())
    }

    async fn send_export(ctx: &BotContext, chat_id: ChatId, lang: Lang) -> ResponseResult<()> {
        let rows = match ctx.repos.users().export_rows().await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Failed to load users for export: {}", e);
                ctx.bot
                    .send_message(chat_id, lang.error_admin_action())
                    .await?;
                return Ok(());
            }
        };

        let bytes = match export::write_users_csv(&rows) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to build users export: {}", e);
                ctx.bot
                    .send_message(chat_id, lang.error_admin_action())
                    .await?;
                return Ok(());
            }
        };

        let file_name = export::export_file_name(chrono::Utc::now());
        if let Err(e) = ctx
            .transport
            .send_document_bytes(chat_id.0, &file_name, bytes, Some(lang.export_caption(rows.len())))
            .await
        {
            error!("Failed to send users export: {}", e);
            ctx.bot
                .send_message(chat_id, lang.error_admin_action())
                .await?;
        }
        Ok(())
    }

    /// last step of the deep link wizard: the admin typed where the link will be placed
    pub async fn handle_deeplink_link(
        ctx: BotContext,
        msg: Message,
        source: String,
        target: String,
        lang: Lang,
    ) -> ResponseResult<()> {
        let Some(user_id) = msg.from.as_ref().map(|user| user.id.0 as i64) else {
            return Ok(());
        };
        let Some(link) = msg.text().map(str::trim).filter(|text| !text.is_empty()) else {
            ctx.bot
                .send_message(msg.chat.id, lang.deeplink_enter_link())
                .await?;
            return Ok(());
        };

        match ctx
            .repos
            .deeplinks()
            .create_deeplink(&source, &target, Some(link))
            .await
        {
            Ok(deeplink) => {
                ctx.sessions.set_state(user_id, SessionState::Idle).await;
                let url = Self::deeplink_url(&ctx.bot_username, deeplink.id);
                info!("Admin {} created deep link {} ({} → {})", user_id, deeplink.id, source, target);
                ctx.bot
                    .send_message(msg.chat.id, lang.deeplink_created(&url))
                    .reply_markup(keyboards::admin_keyboard(lang))
                    .await?;
            }
            Err(e) => {
                error!("Failed to create deep link: {}", e);
                ctx.bot
                    .send_message(msg.chat.id, lang.error_admin_action())
                    .await?;
            }
        }
        Ok(())
    }

    /// captures the message to broadcast and echoes it back for confirmation
    pub async fn handle_broadcast_content(ctx: BotContext, msg: Message, lang: Lang) -> ResponseResult<()> {
        let Some(user_id) = msg.from.as_ref().map(|user| user.id.0 as i64) else {
            return Ok(());
        };
        let Some(content) = MailingContent::from_message(&msg) else {
            ctx.bot
                .send_message(msg.chat.id, lang.broadcast_unsupported())
                .await?;
            return Ok(());
        };

        if let Err(e) = content.deliver(ctx.transport.as_ref(), msg.chat.id.0).await {
            warn!("Failed to preview broadcast for admin {}: {}", user_id, e);
        }

        ctx.sessions
            .set_state(user_id, SessionState::BroadcastConfirm { content })
            .await;
        ctx.bot
            .send_message(msg.chat.id, lang.broadcast_confirm())
            .reply_markup(keyboards::broadcast_confirm_keyboard(lang))
            .await?;
        Ok(())
    }
}
