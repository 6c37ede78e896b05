use log::{error, info, warn};
use regex::Regex;
use std::sync::LazyLock;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId, ParseMode};
use url::Url;

use crate::bot::BotContext;
use crate::keyboards;
use crate::localization::Lang;
use crate::repo::{Product, Purchase};
use crate::user_session::SessionState;
use crate::utils::MessageFormatter;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid e-mail pattern"));

pub struct PaymentHandler;

impl PaymentHandler {
    pub fn is_valid_email(text: &str) -> bool {
        EMAIL_REGEX.is_match(text.trim())
    }

    pub async fn handle_buy(ctx: BotContext, chat_id: ChatId, user_id: i64, lang: Lang) -> ResponseResult<()> {
        ctx.sessions
            .set_state(user_id, SessionState::AwaitingEmail)
            .await;
        ctx.bot.send_message(chat_id, lang.ask_email()).await?;
        Ok(())
    }

    /// e-mail received: prepares the purchase and a payment link, then shows the product
    pub async fn handle_email(ctx: BotContext, msg: Message, lang: Lang) -> ResponseResult<()> {
        let Some(from) = msg.from.as_ref() else {
            return Ok(());
        };
        let user_id = from.id.0 as i64;

        let Some(email) = msg.text().map(str::trim).filter(|text| Self::is_valid_email(text)) else {
            // stay in the e-mail state until a usable address arrives
            ctx.bot
                .send_message(msg.chat.id, lang.error_invalid_email())
                .await?;
            return Ok(());
        };
        ctx.sessions.set_state(user_id, SessionState::Idle).await;

        let product = match ctx
            .repos
            .products()
            .get_product_by_id(ctx.config.product_id)
            .await
        {
            Ok(Some(product)) => product,
            Ok(None) => {
                error!("Product {} is not configured", ctx.config.product_id);
                ctx.bot
                    .send_message(msg.chat.id, lang.error_product_unavailable())
                    .await?;
                return Ok(());
            }
            Err(e) => {
                error!("Failed to load product {}: {}", ctx.config.product_id, e);
                ctx.bot
                    .send_message(msg.chat.id, lang.error_product_unavailable())
                    .await?;
                return Ok(());
            }
        };

        // the purchase references the user row
        let full_name = from.full_name();
        if let Err(e) = ctx
            .repos
            .users()
            .get_or_create_user(
                user_id,
                from.username.as_deref(),
                Some(full_name.as_str()),
                Some(from.is_premium),
                None,
            )
            .await
        {
            error!("Failed to get/create user {}: {}", user_id, e);
            ctx.bot
                .send_message(msg.chat.id, lang.error_account_access())
                .await?;
            return Ok(());
        }

        let purchase = match Self::prepare_purchase(&ctx, user_id, email, &product).await {
            Ok(purchase) => purchase,
            Err(e) => {
                error!("Failed to prepare payment for user {}: {}", user_id, e);
                ctx.bot
                    .send_message(msg.chat.id, lang.error_payment_init())
                    .await?;
                return Ok(());
            }
        };

        if purchase.is_paid {
            ctx.bot
                .send_message(msg.chat.id, lang.payment_confirmed())
                .await?;
            return Ok(());
        }

        let description = MessageFormatter::product_description(product.description.as_deref());
        ctx.bot
            .send_message(msg.chat.id, lang.product_card(&product.name, &description))
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboards::product_keyboard(
                lang,
                purchase.link.as_deref().unwrap_or_default(),
            ))
            .await?;
        Ok(())
    }

    /// reuses the latest purchase while its payment link is valid, otherwise
    /// creates a new purchase and initialises a payment for it
    async fn prepare_purchase(
        ctx: &BotContext,
        user_id: i64,
        email: &str,
        product: &Product,
    ) -> Result<Purchase, Box<dyn std::error::Error + Send + Sync>> {
        let purchases = ctx.repos.purchases();

        if let Some(existing) = purchases.get_purchase_by_user(user_id).await? {
            if existing.is_paid || existing.has_payment_link() {
                info!("Reusing purchase {} for user {}", existing.id, user_id);
                return Ok(existing);
            }
        }

        let purchase = purchases
            .create_purchase(user_id, product.id, product.price)
            .await?;
        let init = ctx
            .payments
            .create_payment(&purchase.id.to_string(), &product.name, email, product)
            .await?;
        let purchase = purchases
            .update_purchase(purchase.id, init.payment_id, &init.payment_url)
            .await?;
        Ok(purchase)
    }

    pub async fn handle_check_payment(
        ctx: BotContext,
        query: &CallbackQuery,
        chat_id: ChatId,
        lang: Lang,
    ) -> ResponseResult<()> {
        let user_id = query.from.id.0 as i64;

        let purchase = match ctx.repos.purchases().get_purchase_by_user(user_id).await {
            Ok(Some(purchase)) => purchase,
            Ok(None) => {
                return Self::alert(&ctx, query, lang.error_no_purchase()).await;
            }
            Err(e) => {
                error!("Failed to load purchase for user {}: {}", user_id, e);
                return Self::alert(&ctx, query, lang.error_payment_check()).await;
            }
        };

        if purchase.is_paid {
            return Self::alert(&ctx, query, lang.payment_confirmed()).await;
        }

        let Some(payment_id) = purchase.payment_id else {
            return Self::alert(&ctx, query, lang.payment_not_confirmed()).await;
        };

        let status = match ctx.payments.get_payment_status(payment_id).await {
            Ok(status) => status,
            Err(e) => {
                error!("Failed to check payment {} for user {}: {}", payment_id, user_id, e);
                return Self::alert(&ctx, query, lang.error_payment_check()).await;
            }
        };

        if !status.is_confirmed() {
            info!("Payment {} for user {} is {}", payment_id, user_id, status.status);
            return Self::alert(&ctx, query, lang.payment_not_confirmed()).await;
        }

        match ctx.repos.purchases().mark_paid(purchase.id).await {
            Ok(Some(_)) => {
                info!("Payment {} confirmed for user {}", payment_id, user_id);
                Self::alert(&ctx, query, lang.payment_confirmed()).await?;
                Self::notify_admins(&ctx, user_id, query.from.username.as_deref(), purchase.amount)
                    .await;
                Self::send_channel_invite(&ctx, chat_id, user_id, lang).await
            }
            // a concurrent check already granted access
            Ok(None) => Self::alert(&ctx, query, lang.payment_confirmed()).await,
            Err(e) => {
                error!("Failed to mark purchase {} as paid: {}", purchase.id, e);
                Self::alert(&ctx, query, lang.error_payment_check()).await
            }
        }
    }

    async fn alert(ctx: &BotContext, query: &CallbackQuery, text: &str) -> ResponseResult<()> {
        ctx.bot
            .answer_callback_query(&query.id)
            .text(text)
            .show_alert(true)
            .await?;
        Ok(())
    }

    async fn notify_admins(ctx: &BotContext, user_id: i64, username: Option<&str>, amount: i32) {
        for admin_id in &ctx.config.admin_ids {
            let text = Lang::default().admin_payment_notification(user_id, username, amount);
            if let Err(e) = ctx
                .bot
                .send_message(ChatId(*admin_id), text)
                .parse_mode(ParseMode::Html)
                .await
            {
                warn!("Failed to notify admin {} about payment: {}", admin_id, e);
            }
        }
    }

    /// single-use invite named after the buyer
    async fn send_channel_invite(
        ctx: &BotContext,
        chat_id: ChatId,
        user_id: i64,
        lang: Lang,
    ) -> ResponseResult<()> {
        let invite = ctx
            .bot
            .create_chat_invite_link(ChatId(ctx.config.channel_id))
            .name(user_id.to_string())
            .member_limit(1)
            .await;

        let invite_url = match invite.map(|invite| Url::parse(&invite.invite_link)) {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                error!("Invite link for user {} is not a url: {}", user_id, e);
                ctx.bot
                    .send_message(chat_id, lang.error_invite_link())
                    .await?;
                return Ok(());
            }
            Err(e) => {
                error!("Failed to create invite link for user {}: {}", user_id, e);
                ctx.bot
                    .send_message(chat_id, lang.error_invite_link())
                    .await?;
                return Ok(());
            }
        };

        ctx.bot
            .send_message(chat_id, lang.channel_link())
            .reply_markup(keyboards::enter_keyboard(lang, &invite_url))
            .await?;
        Ok(())
    }
}
