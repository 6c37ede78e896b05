use chrono::{TimeZone, Utc};
use tg_funnel::config::{Config, ConfigError, DEFAULT_PAYMENT_API_URL};
use tg_funnel::export::{export_file_name, write_users_csv, EXPORT_HEADERS};
use tg_funnel::handlers::{AdminHandler, CommandHandler, PaymentHandler};
use tg_funnel::keyboards::{self, KeyboardSettings};
use tg_funnel::localization::Lang;
use tg_funnel::repo::{Deeplink, DeeplinkStats, QueueStatusCounts, UserExportRow};
use tg_funnel::utils::message_formatter::MAX_CAPTION_LENGTH;
use tg_funnel::utils::MessageFormatter;

use super::mock_bot::{button_texts, callback_data};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let pairs: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

const REQUIRED: [(&str, &str); 5] = [
    ("BOT_TOKEN", "123:abc"),
    ("CHANNEL_ID", "-1001234567890"),
    ("DATABASE_URL", "postgresql://localhost/funnel"),
    ("PAYMENT_TERMINAL_KEY", "TK"),
    ("PAYMENT_PASSWORD", "pw"),
];

#[test]
fn test_config_defaults() {
    let config = Config::from_lookup(env(&REQUIRED)).unwrap();

    assert_eq!(config.channel_id, -1001234567890);
    assert_eq!(config.product_id, 1);
    assert!(config.admin_ids.is_empty());
    assert_eq!(config.payment.api_url, DEFAULT_PAYMENT_API_URL);
    assert!(config.scenarios_dir.is_none());
    assert!(config.messages.course_intro.is_empty());
    assert!(!config.is_admin(1));
}

#[test]
fn test_config_parses_admins_and_texts() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("ADMINS", "11, 22,33"));
    pairs.push(("PRODUCT_ID", "3"));
    pairs.push(("PAYMENT_API_URL", "https://pay.example.com/"));
    pairs.push(("COURSE_INTRO", "<strong>Курс</strong><br>Цена"));
    pairs.push(("SUPPORT_URL", "https://t.me/support"));

    let config = Config::from_lookup(env(&pairs)).unwrap();

    assert_eq!(config.admin_ids, vec![11, 22, 33]);
    assert!(config.is_admin(22));
    assert_eq!(config.product_id, 3);
    assert_eq!(config.payment.api_url, "https://pay.example.com");
    assert_eq!(config.messages.course_intro, "<b>Курс</b>\nЦена");
    assert_eq!(config.messages.support_url.as_deref(), Some("https://t.me/support"));
}

#[test]
fn test_config_errors() {
    let missing: Vec<_> = REQUIRED
        .iter()
        .copied()
        .filter(|(key, _)| *key != "BOT_TOKEN")
        .collect();
    assert!(matches!(
        Config::from_lookup(env(&missing)),
        Err(ConfigError::Missing("BOT_TOKEN"))
    ));

    let mut bad_admins = REQUIRED.to_vec();
    bad_admins.push(("ADMINS", "11,abc"));
    assert!(matches!(
        Config::from_lookup(env(&bad_admins)),
        Err(ConfigError::Invalid { var: "ADMINS", .. })
    ));

    let mut blank = REQUIRED.to_vec();
    blank.retain(|(key, _)| *key != "PAYMENT_PASSWORD");
    blank.push(("PAYMENT_PASSWORD", "   "));
    assert!(matches!(
        Config::from_lookup(env(&blank)),
        Err(ConfigError::Missing("PAYMENT_PASSWORD"))
    ));
}

#[test]
fn test_process_message() {
    assert_eq!(
        MessageFormatter::process_message("Привет<br/>мир<ol><li>один</li></ol>"),
        "Привет\nмир- один\n"
    );
    assert_eq!(
        MessageFormatter::process_message("<b>жирный</b> <a href=\"https://t.me\">ссылка</a>"),
        "<b>жирный</b> <a href=\"https://t.me\">ссылка</a>"
    );
    assert_eq!(
        MessageFormatter::product_description(Some("Уроки+br+Эфиры")),
        "Уроки\nЭфиры"
    );
    assert_eq!(MessageFormatter::product_description(None), "");
}

#[test]
fn test_escape_and_links() {
    assert_eq!(MessageFormatter::escape_html("<a & b>"), "&lt;a &amp; b&gt;");
    assert_eq!(
        MessageFormatter::link("оферта", "https://example.com/?a=1&b=\"2\""),
        "<a href=\"https://example.com/?a=1&amp;b=&quot;2&quot;\">оферта</a>"
    );
}

#[test]
fn test_truncate_caption_counts_utf16() {
    let short = "коротко";
    assert_eq!(MessageFormatter::truncate_caption(short), short);

    // emoji take two utf-16 units each
    let long = "😀".repeat(MAX_CAPTION_LENGTH);
    let truncated = MessageFormatter::truncate_caption(&long);
    assert!(MessageFormatter::count_utf16_code_units(&truncated) <= MAX_CAPTION_LENGTH);
    assert!(truncated.ends_with('…'));
}

#[test]
fn test_truncate_caption_closes_open_tags() {
    let caption = format!("{}<b>{}</b>", "a".repeat(1000), "b".repeat(100));
    let truncated = MessageFormatter::truncate_caption(&caption);

    assert!(truncated.ends_with("…</b>"));
    assert_eq!(truncated.matches("<b>").count(), truncated.matches("</b>").count());
    assert_eq!(MessageFormatter::visible_length(&truncated), MAX_CAPTION_LENGTH);

    // markup does not count towards the limit
    let linked = format!(
        "{}{}",
        "<a href=\"https://example.com/very/long/path\">x</a>".repeat(100),
        "&amp;".repeat(200)
    );
    assert!(linked.len() > MAX_CAPTION_LENGTH);
    assert_eq!(MessageFormatter::visible_length(&linked), 300);
    assert_eq!(MessageFormatter::truncate_caption(&linked), linked);
}

#[test]
fn test_offer_agreement_links() {
    let text = Lang::Ru.offer_agreement(Some("https://example.com/offer"), None);
    assert!(text.contains("<a href=\"https://example.com/offer\">офертой</a>"));
    assert!(text.contains("политикой конфиденциальности"));
    assert_eq!(Lang::from_code(Some("en-US")), Lang::En);
    assert_eq!(Lang::from_code(Some("uk")), Lang::Ru);
    assert_eq!(Lang::from_code(None), Lang::Ru);
}

#[test]
fn test_menu_keyboards() {
    let start = keyboards::start_keyboard(Lang::Ru, Some("https://t.me/support"));
    assert_eq!(callback_data(&start), vec!["buy", "about"]);
    assert_eq!(start.inline_keyboard.len(), 3);

    let without_support = keyboards::start_keyboard(Lang::Ru, None);
    assert_eq!(without_support.inline_keyboard.len(), 2);

    let product = keyboards::product_keyboard(Lang::Ru, "https://securepay.tinkoff.ru/new/abc");
    assert_eq!(callback_data(&product), vec!["check_payment", "back"]);
    assert_eq!(button_texts(&product).len(), 3);

    let settings = KeyboardSettings::default();
    assert!(keyboards::named("offer_keyboard", &settings).is_some());
    assert!(keyboards::named("unknown", &settings).is_none());
}

#[test]
fn test_deeplink_wizard_callback_data() {
    assert_eq!(keyboards::unpack_source(&keyboards::pack_source("youtube")), Some("youtube"));
    assert_eq!(keyboards::unpack_source("source:vk"), None);
    assert_eq!(keyboards::unpack_target("target:tripwire"), Some("tripwire"));
    assert_eq!(keyboards::unpack_target("source:main"), None);

    assert!(AdminHandler::is_admin_callback("stats"));
    assert!(AdminHandler::is_admin_callback("source:telegram"));
    assert!(AdminHandler::is_admin_callback("target:main"));
    assert!(!AdminHandler::is_admin_callback("buy"));
    assert!(!AdminHandler::is_admin_callback("target:nowhere"));

    assert_eq!(
        AdminHandler::deeplink_url("funnel_bot", 7),
        "https://t.me/funnel_bot?start=7"
    );
}

#[test]
fn test_start_payload_and_email() {
    assert_eq!(CommandHandler::parse_start_payload(" 15 "), Some(15));
    assert_eq!(CommandHandler::parse_start_payload(""), None);
    assert_eq!(CommandHandler::parse_start_payload("promo"), None);

    assert!(PaymentHandler::is_valid_email("buyer@example.com"));
    assert!(PaymentHandler::is_valid_email(" name.surname@mail.ru "));
    assert!(!PaymentHandler::is_valid_email("buyer@example"));
    assert!(!PaymentHandler::is_valid_email("not an email"));
    assert!(!PaymentHandler::is_valid_email("a b@c.d"));
}

#[test]
fn test_stats_text() {
    let per_link = vec![DeeplinkStats {
        deeplink: Deeplink {
            id: 4,
            source: "youtube".to_string(),
            target: "tripwire".to_string(),
            link: Some("описание под видео".to_string()),
        },
        users: 10,
        paid_users: 3,
    }];
    let queue = QueueStatusCounts {
        pending: 5,
        sending: 1,
        sent: 20,
        failed: 2,
    };

    let text = AdminHandler::format_stats(Lang::Ru, 12, 4, &per_link, &queue);

    assert!(text.contains("Количество пользователей: 12"));
    assert!(text.contains("Количество покупок: 4"));
    assert!(text.contains("#4 youtube → Трипвайр: 10 / 3"));
    assert!(text.contains("в очереди 6, отправлено 20, ошибок 2"));
}

#[test]
fn test_deeplink_list_text() {
    assert_eq!(
        AdminHandler::format_deeplink_list(Lang::Ru, "funnel_bot", &[]),
        "Диплинков пока нет"
    );

    let list = AdminHandler::format_deeplink_list(
        Lang::En,
        "funnel_bot",
        &[Deeplink {
            id: 1,
            source: "telegram".to_string(),
            target: "main".to_string(),
            link: None,
        }],
    );
    assert_eq!(list, "#1 telegram → Main\nhttps://t.me/funnel_bot?start=1");
}

#[test]
fn test_users_csv() {
    let rows = vec![
        UserExportRow {
            id: 100,
            full_name: Some("Иван Петров".to_string()),
            username: Some("ivan".to_string()),
            deeplink: Some(3),
            has_paid: true,
            is_premium: Some(false),
            lesson_number: Some(2),
            created_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()),
        },
        UserExportRow {
            id: 101,
            full_name: None,
            username: None,
            deeplink: None,
            has_paid: false,
            is_premium: None,
            lesson_number: None,
            created_at: None,
        },
    ];

    let csv = String::from_utf8(write_users_csv(&rows).unwrap()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines[0], EXPORT_HEADERS.join(","));
    assert_eq!(lines[1], "100,Иван Петров,@ivan,3,✅,❌,2,2024-05-01 12:30:00");
    assert_eq!(lines[2], "101,—,—,—,❌,-,—,—");

    assert_eq!(
        export_file_name(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 5).unwrap()),
        "users_20240501_080005.csv"
    );
}
