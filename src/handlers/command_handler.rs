use log::{error, info, warn};
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, ParseMode};

use crate::bot::{BotContext, Command};
use crate::handlers::AdminHandler;
use crate::keyboards;
use crate::localization::Lang;

pub struct CommandHandler;

impl CommandHandler {
    pub async fn handle_command(ctx: BotContext, msg: Message, cmd: Command) -> ResponseResult<()> {
        match cmd {
            Command::Start(payload) => {
                Self::handle_start_command(ctx, msg, &payload).await?;
            }
            Command::Admin => {
                AdminHandler::handle_admin_command(ctx, msg).await?;
            }
            Command::Scenario(name) => {
                AdminHandler::handle_scenario_preview(ctx, msg, name.trim()).await?;
            }
        }
        Ok(())
    }

    /// the deep link id from `/start <id>`; anything that is not a number is ignored
    pub fn parse_start_payload(payload: &str) -> Option<i32> {
        let payload = payload.trim();
        if payload.is_empty() {
            return None;
        }
        match payload.parse::<i32>() {
            Ok(id) => Some(id),
            Err(_) => {
                info!("Ignoring non-numeric /start payload: {}", payload);
                None
            }
        }
    }

    async fn handle_start_command(ctx: BotContext, msg: Message, payload: &str) -> ResponseResult<()> {
        let Some(from) = msg.from.as_ref() else {
            return Ok(());
        };
        let user_id = from.id.0 as i64;
        let lang = Lang::from_code(from.language_code.as_deref());

        // validate the deep link before remembering it
        let deeplink = match Self::parse_start_payload(payload) {
            Some(id) => match ctx.repos.deeplinks().get_deeplink_by_id(id).await {
                Ok(Some(deeplink)) => {
                    info!("User {} came from deep link {}", user_id, deeplink.id);
                    ctx.sessions.set_deeplink(user_id, Some(deeplink.id)).await;
                    Some(deeplink)
                }
                Ok(None) => {
                    info!("Deep link {} does not exist", id);
                    None
                }
                Err(e) => {
                    error!("Failed to validate deep link {}: {}", id, e);
                    None
                }
            },
            None => None,
        };

        let user = match ctx.repos.users().get_user_by_id(user_id).await {
            Ok(user) => user,
            Err(e) => {
                error!("Failed to load user {}: {}", user_id, e);
                ctx.bot
                    .send_message(msg.chat.id, lang.error_account_access())
                    .await?;
                return Ok(());
            }
        };

        if user.is_none() {
            return Self::send_offer(&ctx, msg.chat.id, lang).await;
        }

        // returning users skip the offer and go straight into the funnel
        let target = deeplink.map(|deeplink| deeplink.target);
        Self::enter_funnel(&ctx, msg.chat.id, lang, target.as_deref()).await
    }

    async fn send_offer(ctx: &BotContext, chat_id: ChatId, lang: Lang) -> ResponseResult<()> {
        let messages = &ctx.config.messages;
        let text = if messages.offer_agreement.is_empty() {
            lang.offer_agreement(messages.offer_url.as_deref(), messages.privacy_url.as_deref())
        } else {
            messages.offer_agreement.clone()
        };

        ctx.bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboards::offer_keyboard(lang))
            .await?;
        Ok(())
    }

    /// runs the scenario named after the deep link target, or shows the main menu
    pub async fn enter_funnel(
        ctx: &BotContext,
        chat_id: ChatId,
        lang: Lang,
        target: Option<&str>,
    ) -> ResponseResult<()> {
        if let Some(target) = target {
            match ctx.scenarios.get(target) {
                Some(scenario) => {
                    info!("Running scenario '{}' for chat {}", target, chat_id);
                    ctx.scenario_handler(chat_id.0, lang)
                        .spawn_scenario(scenario.clone());
                    return Ok(());
                }
                None => warn!("No scenario for deep link target '{}'", target),
            }
        }
        Self::send_main_menu(ctx, chat_id, lang).await
    }

    pub async fn send_main_menu(ctx: &BotContext, chat_id: ChatId, lang: Lang) -> ResponseResult<()> {
        let messages = &ctx.config.messages;
        let caption = if messages.course_intro.is_empty() {
            lang.course_intro().to_string()
        } else {
            messages.course_intro.clone()
        };
        let keyboard = keyboards::start_keyboard(lang, messages.support_url.as_deref());

        if messages.photo_go_intro.is_empty() {
            ctx.bot
                .send_message(chat_id, caption)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
        } else {
            ctx.bot
                .send_photo(
                    chat_id,
                    InputFile::file_id(messages.photo_go_intro.clone()),
                )
                .caption(caption)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
        }
        Ok(())
    }
}
