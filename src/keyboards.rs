use log::warn;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};
use url::Url;

use crate::localization::Lang;

pub const SOURCES: [&str; 2] = ["telegram", "youtube"];
pub const TARGETS: [&str; 2] = ["tripwire", "main"];

const SOURCE_PREFIX: &str = "source:";
const TARGET_PREFIX: &str = "target:";

/// settings the prebuilt keyboards depend on
#[derive(Debug, Clone, Default)]
pub struct KeyboardSettings {
    pub lang: Lang,
    pub support_url: Option<String>,
}

fn parse_url(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!("Skipping button with invalid url {:?}: {}", raw, e);
            None
        }
    }
}

pub fn offer_keyboard(lang: Lang) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        lang.button_confirm_offer(),
        "accept_offer",
    )]])
}

/// main menu; the support row is dropped when no support url is configured
pub fn start_keyboard(lang: Lang, support_url: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows = vec![
        vec![InlineKeyboardButton::callback(lang.button_buy(), "buy")],
        vec![InlineKeyboardButton::callback(lang.button_about(), "about")],
    ];
    if let Some(url) = support_url.and_then(parse_url) {
        rows.push(vec![InlineKeyboardButton::url(lang.button_support(), url)]);
    }
    InlineKeyboardMarkup::new(rows)
}

pub fn buy_keyboard(lang: Lang) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(lang.button_buy(), "buy")],
        vec![InlineKeyboardButton::callback(lang.button_back(), "back")],
    ])
}

pub fn admin_keyboard(lang: Lang) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            lang.button_deeplinks(),
            "admin_deeplink",
        )],
        vec![InlineKeyboardButton::callback(lang.button_stats(), "stats")],
        vec![InlineKeyboardButton::callback(
            lang.button_broadcast(),
            "broadcast",
        )],
        vec![InlineKeyboardButton::callback(lang.button_export(), "export")],
    ])
}

/// payment page: the gateway form opens as a web app
pub fn product_keyboard(lang: Lang, payment_url: &str) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(url) = parse_url(payment_url) {
        rows.push(vec![InlineKeyboardButton::web_app(
            lang.button_pay(),
            WebAppInfo { url },
        )]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        lang.button_paid(),
        "check_payment",
    )]);
    rows.push(vec![InlineKeyboardButton::callback(lang.button_back(), "back")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn enter_keyboard(lang: Lang, invite_link: &Url) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        lang.button_join(),
        invite_link.clone(),
    )]])
}

pub fn deeplink_keyboard(lang: Lang) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            lang.button_create_deeplink(),
            "create_deeplink",
        )],
        vec![InlineKeyboardButton::callback(
            lang.button_list_deeplinks(),
            "list_deeplinks",
        )],
        vec![InlineKeyboardButton::callback(lang.button_back(), "admin_back")],
    ])
}

pub fn source_keyboard(lang: Lang) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("Telegram", pack_source("telegram")),
            InlineKeyboardButton::callback("Youtube", pack_source("youtube")),
        ],
        vec![InlineKeyboardButton::callback(lang.button_back(), "admin_back")],
    ])
}

pub fn target_keyboard(lang: Lang) -> InlineKeyboardMarkup {
    let targets = TARGETS
        .iter()
        .map(|target| InlineKeyboardButton::callback(lang.target_name(target), pack_target(target)))
        .collect();
    InlineKeyboardMarkup::new(vec![
        targets,
        vec![InlineKeyboardButton::callback(lang.button_back(), "admin_back")],
    ])
}

pub fn broadcast_confirm_keyboard(lang: Lang) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(lang.button_send(), "broadcast_confirm"),
        InlineKeyboardButton::callback(lang.button_cancel(), "broadcast_cancel"),
    ]])
}

/// prebuilt keyboards scenarios can refer to by name
pub fn named(name: &str, settings: &KeyboardSettings) -> Option<InlineKeyboardMarkup> {
    let lang = settings.lang;
    let keyboard = match name {
        "offer_keyboard" => offer_keyboard(lang),
        "start_keyboard" => start_keyboard(lang, settings.support_url.as_deref()),
        "buy_keyboard" => buy_keyboard(lang),
        "admin_keyboard" => admin_keyboard(lang),
        "deeplink_keyboard" => deeplink_keyboard(lang),
        "source_keyboard" => source_keyboard(lang),
        "target_keyboard" => target_keyboard(lang),
        _ => return None,
    };
    Some(keyboard)
}

pub fn pack_source(source: &str) -> String {
    format!("{}{}", SOURCE_PREFIX, source)
}

pub fn pack_target(target: &str) -> String {
    format!("{}{}", TARGET_PREFIX, target)
}

pub fn unpack_source(data: &str) -> Option<&str> {
    data.strip_prefix(SOURCE_PREFIX)
        .filter(|source| SOURCES.contains(source))
}

pub fn unpack_target(data: &str) -> Option<&str> {
    data.strip_prefix(TARGET_PREFIX)
        .filter(|target| TARGETS.contains(target))
}
