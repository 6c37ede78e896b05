pub mod admin_handler;
pub mod callback_handler;
pub mod command_handler;
pub mod payment_handler;

pub use admin_handler::AdminHandler;
pub use callback_handler::CallbackHandler;
pub use command_handler::CommandHandler;
pub use payment_handler::PaymentHandler;

use log::warn;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, MessageId, ParseMode};

use crate::bot::BotContext;

/// replaces the text of a bot message, sending a new one when the original
/// cannot be edited (photo menus, messages older than 48h)
pub async fn edit_or_send(
    ctx: &BotContext,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> ResponseResult<()> {
    if let Some(message_id) = message_id {
        let mut request = ctx
            .bot
            .edit_message_text(chat_id, message_id, text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard.clone() {
            request = request.reply_markup(keyboard);
        }
        match request.await {
            Ok(_) => return Ok(()),
            Err(e) => warn!("Failed to edit message in chat {}: {}", chat_id, e),
        }
    }

    let mut request = ctx.bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
    if let Some(keyboard) = keyboard {
        request = request.reply_markup(keyboard);
    }
    request.await?;
    Ok(())
}
