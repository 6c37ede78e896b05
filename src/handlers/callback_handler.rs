use log::{error, info, warn};
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQuery, ChatId, InlineKeyboardMarkup, InputFile, InputMedia, InputMediaPhoto,
    MaybeInaccessibleMessage, MessageId, ParseMode,
};

use crate::bot::BotContext;
use crate::handlers::{edit_or_send, AdminHandler, CommandHandler, PaymentHandler};
use crate::keyboards;
use crate::localization::Lang;
use crate::scenario::CALLBACK_PREFIX;

pub struct CallbackHandler;

impl CallbackHandler {
    fn get_chat_id(message: &MaybeInaccessibleMessage) -> ChatId {
        match message {
            MaybeInaccessibleMessage::Regular(msg) => msg.chat.id,
            MaybeInaccessibleMessage::Inaccessible(msg) => msg.chat.id,
        }
    }

    fn get_message_id(message: &MaybeInaccessibleMessage) -> MessageId {
        match message {
            MaybeInaccessibleMessage::Regular(msg) => msg.id,
            MaybeInaccessibleMessage::Inaccessible(msg) => msg.message_id,
        }
    }

    pub async fn handle_callback_query(ctx: BotContext, query: CallbackQuery) -> ResponseResult<()> {
        let (Some(data), Some(message)) = (query.data.as_deref(), query.message.as_ref()) else {
            if let Err(e) = ctx.bot.answer_callback_query(&query.id).await {
                warn!("Failed to answer callback query {}: {}", query.id, e);
            }
            return Ok(());
        };
        let chat_id = Self::get_chat_id(message);
        let message_id = Self::get_message_id(message);
        let lang = Lang::from_code(query.from.language_code.as_deref());

        // check_payment answers with an alert of its own
        if data == "check_payment" {
            return PaymentHandler::handle_check_payment(ctx, &query, chat_id, lang).await;
        }
        // a press queued behind a long update can be too old to answer, still act on it
        if let Err(e) = ctx.bot.answer_callback_query(&query.id).await {
            warn!("Failed to answer callback query {}: {}", query.id, e);
        }

        match data {
            "accept_offer" => Self::handle_accept_offer(ctx, &query, chat_id, message_id, lang).await,
            "buy" => PaymentHandler::handle_buy(ctx, chat_id, query.from.id.0 as i64, lang).await,
            "about" => Self::show_about(&ctx, chat_id, message_id, lang).await,
            "back" => Self::show_main_menu(&ctx, chat_id, message_id, lang).await,
            callback if callback.starts_with(CALLBACK_PREFIX) => {
                let callback_id = &callback[CALLBACK_PREFIX.len()..];
                ctx.scenario_handler(chat_id.0, lang)
                    .spawn_callback(callback_id.to_string());
                Ok(())
            }
            admin if AdminHandler::is_admin_callback(admin) => {
                let user_id = query.from.id.0 as i64;
                if !ctx.config.is_admin(user_id) {
                    warn!("User {} tried admin callback {}", user_id, admin);
                    return Ok(());
                }
                AdminHandler::handle_callback(ctx, chat_id, message_id, user_id, admin, lang).await
            }
            other => {
                info!("Unhandled callback data: {}", other);
                Ok(())
            }
        }
    }

    async fn handle_accept_offer(
        ctx: BotContext,
        query: &CallbackQuery,
        chat_id: ChatId,
        message_id: MessageId,
        lang: Lang,
    ) -> ResponseResult<()> {
        let from = &query.from;
        let user_id = from.id.0 as i64;
        let deeplink_id = ctx.sessions.get_data(user_id).await.deeplink;

        let full_name = from.full_name();
        let created = ctx
            .repos
            .users()
            .get_or_create_user(
                user_id,
                from.username.as_deref(),
                Some(full_name.as_str()),
                Some(from.is_premium),
                deeplink_id,
            )
            .await;
        if let Err(e) = created {
            error!("Failed to create user {}: {}", user_id, e);
            ctx.bot
                .send_message(chat_id, lang.error_account_access())
                .await?;
            return Ok(());
        }
        ctx.sessions.clear_session(user_id).await;
        info!("User {} accepted the offer (deep link {:?})", user_id, deeplink_id);

        // the offer is answered, drop its button
        if let Err(e) = ctx.bot.edit_message_reply_markup(chat_id, message_id).await {
            warn!("Failed to remove offer keyboard in chat {}: {}", chat_id, e);
        }

        let target = match deeplink_id {
            Some(id) => match ctx.repos.deeplinks().get_deeplink_by_id(id).await {
                Ok(deeplink) => deeplink.map(|deeplink| deeplink.target),
                Err(e) => {
                    error!("Failed to load deep link {}: {}", id, e);
                    None
                }
            },
            None => None,
        };

        CommandHandler::enter_funnel(&ctx, chat_id, lang, target.as_deref()).await
    }

    async fn show_about(
        ctx: &BotContext,
        chat_id: ChatId,
        message_id: MessageId,
        lang: Lang,
    ) -> ResponseResult<()> {
        let messages = &ctx.config.messages;
        let caption = if messages.about_course.is_empty() {
            lang.about_course().to_string()
        } else {
            messages.about_course.clone()
        };
        Self::show_page(
            ctx,
            chat_id,
            message_id,
            &messages.photo_about_course,
            caption,
            keyboards::buy_keyboard(lang),
        )
        .await
    }

    async fn show_main_menu(
        ctx: &BotContext,
        chat_id: ChatId,
        message_id: MessageId,
        lang: Lang,
    ) -> ResponseResult<()> {
        let messages = &ctx.config.messages;
        let caption = if messages.course_intro.is_empty() {
            lang.course_intro().to_string()
        } else {
            messages.course_intro.clone()
        };
        Self::show_page(
            ctx,
            chat_id,
            message_id,
            &messages.photo_go_intro,
            caption,
            keyboards::start_keyboard(lang, messages.support_url.as_deref()),
        )
        .await
    }

    /// swaps the menu message in place; a text message or a failed edit gets a fresh message
    async fn show_page(
        ctx: &BotContext,
        chat_id: ChatId,
        message_id: MessageId,
        photo: &str,
        caption: String,
        keyboard: InlineKeyboardMarkup,
    ) -> ResponseResult<()> {
        if photo.is_empty() {
            return edit_or_send(ctx, chat_id, Some(message_id), &caption, Some(keyboard)).await;
        }

        let photo = InputFile::file_id(photo);
        let media = InputMedia::Photo(
            InputMediaPhoto::new(photo.clone())
                .caption(caption.clone())
                .parse_mode(ParseMode::Html),
        );
        match ctx
            .bot
            .edit_message_media(chat_id, message_id, media)
            .reply_markup(keyboard.clone())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("Failed to edit menu media in chat {}: {}", chat_id, e);
                ctx.bot
                    .send_photo(chat_id, photo)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .reply_markup(keyboard)
                    .await?;
                Ok(())
            }
        }
    }
}
