use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use teloxide::types::InlineKeyboardButtonKind;
use tg_funnel::keyboards::KeyboardSettings;
use tg_funnel::scenario::functions::{opt_i64, Params};
use tg_funnel::scenario::{
    build_keyboard, Action, ButtonType, FunctionRegistry, KeyboardSpec, ScenarioError,
    ScenarioStore, CALLBACK_PREFIX,
};
use tg_funnel::transport::{MediaKind, MediaSource};

use super::mock_bot::{button_texts, callback_data, Outgoing};
use super::test_utils::{params, TestScenario, TEST_CHAT};

/// registry with a single function that records every call
fn recording_registry() -> (FunctionRegistry, Arc<Mutex<Vec<Params>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = FunctionRegistry::new();
    let recorded = calls.clone();
    registry
        .register("lessons.update_lesson_progress", move |params: Params| {
            let recorded = recorded.clone();
            async move {
                let user_id = opt_i64(&params, "user_id")?;
                recorded.lock().unwrap().push(params);
                Ok(json!({ "user_id": user_id, "lesson_number": 2 }))
            }
        })
        .unwrap();
    (registry, calls)
}

fn action(value: Value) -> Action {
    serde_json::from_value(value).expect("valid action")
}

#[tokio::test]
async fn test_send_text_formats_html_and_builds_keyboard() {
    let scenario = TestScenario::new(FunctionRegistry::new());

    scenario
        .handler
        .handle_action(&action(json!({
            "action": "send_text",
            "params": {
                "text": "<strong>Урок 1</strong><br><ul><li>теория</li><li>практика</li></ul>",
                "keyboard": [
                    [{"type": "url", "text": "Сайт", "url": "https://example.com"}],
                    [{"type": "callback_data", "text": "Дальше", "callback_data": "next"}]
                ]
            }
        })))
        .await
        .expect("send_text failed");

    let sent = scenario.bot.get_sent_for_chat(TEST_CHAT);
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].text(),
        Some("<b>Урок 1</b>\n- теория\n- практика\n")
    );
    let keyboard = sent[0].keyboard().expect("keyboard missing");
    assert_eq!(button_texts(keyboard), vec!["Сайт", "Дальше"]);
    assert_eq!(callback_data(keyboard), vec!["next"]);
}

#[tokio::test]
async fn test_send_text_without_text_uses_default() {
    let scenario = TestScenario::new(FunctionRegistry::new());

    scenario
        .handler
        .handle_send_text(&params(json!({})))
        .await
        .expect("send_text failed");

    assert!(scenario
        .bot
        .chat_received_message_containing(TEST_CHAT, "Default Text Message"));
}

#[tokio::test]
async fn test_inline_functions_are_stored_in_session() {
    let scenario = TestScenario::new(FunctionRegistry::new());

    scenario
        .handler
        .handle_send_text(&params(json!({
            "text": "Готовы?",
            "keyboard": [[{
                "type": "execute_function",
                "text": "Да",
                "functions": [
                    {"function_name": "send_text", "params": {"text": "Поехали"}}
                ]
            }]]
        })))
        .await
        .expect("send_text failed");

    let sent = scenario.bot.get_sent_for_chat(TEST_CHAT);
    let data = callback_data(sent[0].keyboard().expect("keyboard missing"));
    assert_eq!(data.len(), 1);
    let callback_id = data[0]
        .strip_prefix(CALLBACK_PREFIX)
        .expect("callback prefix missing");
    assert_eq!(callback_id.len(), 12);

    let stored = scenario
        .sessions
        .callback(TEST_CHAT, callback_id)
        .await
        .expect("callback not stored");
    assert_eq!(stored[0].function_name, "send_text");

    // pressing the button replays the stored functions
    scenario
        .handler
        .handle_callback(callback_id)
        .await
        .expect("callback failed");
    assert!(scenario.bot.chat_received_message_containing(TEST_CHAT, "Поехали"));
}

#[tokio::test]
async fn test_scenario_callbacks_are_reachable_by_id() {
    let (registry, calls) = recording_registry();
    let scenario = TestScenario::new(registry);

    let parsed = ScenarioStore::parse(
        r#"{
            "actions": [
                {"action": "send_text", "params": {
                    "text": "Урок пройден?",
                    "keyboard": [[{"type": "execute_function", "text": "Да", "callback_id": "lesson_done"}]]
                }}
            ],
            "callbacks": {
                "lesson_done": [
                    {"function_name": "lessons.update_lesson_progress", "params": {}},
                    {"function_name": "send_text", "params": {"text": "Отлично!"}}
                ]
            }
        }"#,
    )
    .expect("scenario parses");

    scenario.handler.handle_scenario(&parsed).await;

    let sent = scenario.bot.get_sent_for_chat(TEST_CHAT);
    assert_eq!(
        callback_data(sent[0].keyboard().expect("keyboard missing")),
        vec!["callback:lesson_done"]
    );

    scenario
        .handler
        .handle_callback("lesson_done")
        .await
        .expect("callback failed");

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].get("user_id"), Some(&json!(TEST_CHAT)));
    assert!(scenario.bot.chat_received_message_containing(TEST_CHAT, "Отлично!"));
}

#[tokio::test]
async fn test_unknown_callback_reports_missing_action() {
    let scenario = TestScenario::new(FunctionRegistry::new());

    scenario
        .handler
        .handle_callback("nope")
        .await
        .expect("callback failed");

    assert_eq!(
        scenario.bot.texts_for_chat(TEST_CHAT),
        vec!["Произошла ошибка: действие не найдено.".to_string()]
    );
}

#[tokio::test]
async fn test_execute_function_keeps_explicit_user_id() {
    let (registry, calls) = recording_registry();
    let scenario = TestScenario::new(registry);

    let result = scenario
        .handler
        .execute_function(
            "lessons.update_lesson_progress",
            params(json!({"user_id": "7"})),
        )
        .await;

    assert_eq!(result, Some(json!({"user_id": 7, "lesson_number": 2})));
    assert_eq!(calls.lock().unwrap()[0].get("user_id"), Some(&json!("7")));
    assert!(scenario.bot.get_sent().is_empty());
}

#[tokio::test]
async fn test_execute_function_reports_unknown_function() {
    let (registry, _) = recording_registry();
    let scenario = TestScenario::new(registry);

    let result = scenario
        .handler
        .execute_function("lessons.missing", Params::new())
        .await;
    assert_eq!(result, None);

    let result = scenario
        .handler
        .execute_function("payments.create", Params::new())
        .await;
    assert_eq!(result, None);

    assert_eq!(
        scenario.bot.texts_for_chat(TEST_CHAT),
        vec![
            "Error: Function 'missing' not found in 'lessons'".to_string(),
            "Error: Repository 'payments' not found".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_execute_function_routes_senders() {
    let scenario = TestScenario::new(FunctionRegistry::new());

    scenario
        .handler
        .handle_action(&action(json!({
            "action": "execute_function",
            "params": {"functions": [
                {"function_name": "send_text", "params": {"text": "из функции"}},
                {"function_name": "send_photo", "params": {"photo": {"id": "AgACphoto"}}}
            ]}
        })))
        .await
        .expect("execute_function failed");

    let sent = scenario.bot.get_sent_for_chat(TEST_CHAT);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].text(), Some("из функции"));
    assert!(matches!(
        &sent[1],
        Outgoing::Media { kind: MediaKind::Photo, source: MediaSource::FileId(id), .. } if id == "AgACphoto"
    ));
}

#[tokio::test]
async fn test_send_media_variants() {
    let scenario = TestScenario::new(FunctionRegistry::new());

    scenario
        .handler
        .handle_send_media(
            "send_video",
            &params(json!({
                "video": {"url": "https://cdn.example.com/intro.mp4"},
                "caption": "Вступление<br>смотреть до конца"
            })),
        )
        .await
        .expect("send_video failed");
    scenario
        .handler
        .handle_send_media(
            "send_sticker",
            &params(json!({"sticker": "CAACsticker", "caption": "ignored"})),
        )
        .await
        .expect("send_sticker failed");
    scenario
        .handler
        .handle_send_media("send_video_note", &params(json!({"note": {"id": "DQACnote"}})))
        .await
        .expect("send_video_note failed");

    let sent = scenario.bot.get_sent_for_chat(TEST_CHAT);
    match &sent[0] {
        Outgoing::Media {
            kind,
            source,
            caption,
            ..
        } => {
            assert_eq!(*kind, MediaKind::Video);
            assert!(matches!(source, MediaSource::Url(url) if url.as_str() == "https://cdn.example.com/intro.mp4"));
            assert_eq!(caption.as_deref(), Some("Вступление\nсмотреть до конца"));
        }
        other => panic!("expected a video, got {:?}", other),
    }
    assert!(matches!(
        &sent[1],
        Outgoing::Media { kind: MediaKind::Sticker, caption: None, .. }
    ));
    assert!(matches!(
        &sent[2],
        Outgoing::Media { kind: MediaKind::VideoNote, source: MediaSource::FileId(id), .. } if id == "DQACnote"
    ));
}

#[tokio::test]
async fn test_send_media_without_file_fails() {
    let scenario = TestScenario::new(FunctionRegistry::new());

    let err = scenario
        .handler
        .handle_send_media("send_document", &params(json!({"caption": "без файла"})))
        .await
        .expect_err("missing document must fail");
    assert!(matches!(err, ScenarioError::MissingMedia(MediaKind::Document)));

    let err = scenario
        .handler
        .handle_send_media("send_hologram", &params(json!({})))
        .await
        .expect_err("unknown media must fail");
    assert!(matches!(err, ScenarioError::UnsupportedMedia(_)));
    assert!(scenario.bot.get_sent().is_empty());
}

#[tokio::test]
async fn test_send_media_group() {
    let scenario = TestScenario::new(FunctionRegistry::new());

    scenario
        .handler
        .handle_send_media(
            "send_media_group",
            &params(json!({
                "media": [
                    {"type": "photo", "media": "AgACfirst"},
                    {"type": "video", "media": "https://cdn.example.com/second.mp4"},
                    {"media": "AgACthird"}
                ],
                // groups cannot carry keyboards, the update is skipped
                "update_keyboard": "start_keyboard"
            })),
        )
        .await
        .expect("media group failed");

    let sent = scenario.bot.get_sent_for_chat(TEST_CHAT);
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Outgoing::MediaGroup { items, .. } => {
            let kinds: Vec<MediaKind> = items.iter().map(|(kind, _)| *kind).collect();
            assert_eq!(kinds, vec![MediaKind::Photo, MediaKind::Video, MediaKind::Photo]);
        }
        other => panic!("expected a media group, got {:?}", other),
    }
}

#[tokio::test]
async fn test_update_keyboard_edits_sent_message() {
    let scenario = TestScenario::new(FunctionRegistry::new());

    scenario
        .handler
        .handle_send_text(&params(json!({
            "text": "Смотрите урок",
            "keyboard": [[{"text": "Позже", "callback_data": "later"}]],
            "update_keyboard": {"keyboard": "buy_keyboard", "delay": 0.01}
        })))
        .await
        .expect("send_text failed");

    let sent = scenario.bot.get_sent_for_chat(TEST_CHAT);
    assert_eq!(sent.len(), 2);
    let Outgoing::Text { message_id, .. } = &sent[0] else {
        panic!("expected text first");
    };
    match &sent[1] {
        Outgoing::EditMarkup {
            message_id: edited,
            keyboard,
            ..
        } => {
            assert_eq!(edited, message_id);
            assert_eq!(
                callback_data(keyboard.as_ref().expect("keyboard missing")),
                vec!["buy", "back"]
            );
        }
        other => panic!("expected an edit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_update_keyboard_falls_back_to_new_message() {
    let scenario = TestScenario::new(FunctionRegistry::new());
    scenario.bot.fail_edits();

    scenario
        .handler
        .handle_send_media(
            "send_photo",
            &params(json!({
                "photo": {"id": "AgACphoto"},
                "update_keyboard": [[{"type": "url", "text": "Канал", "url": "https://t.me/channel"}]]
            })),
        )
        .await
        .expect("send_photo failed");

    let texts = scenario.bot.texts_for_chat(TEST_CHAT);
    assert_eq!(texts, vec!["Обновлённые кнопки:".to_string()]);
    let sent = scenario.bot.get_sent_for_chat(TEST_CHAT);
    assert_eq!(
        button_texts(sent[1].keyboard().expect("keyboard missing")),
        vec!["Канал"]
    );
}

#[tokio::test]
async fn test_failed_keyboard_removal_sends_nothing() {
    let scenario = TestScenario::new(FunctionRegistry::new());
    scenario.bot.fail_edits();

    scenario
        .handler
        .handle_send_text(&params(json!({
            "text": "Кнопка исчезнет",
            "keyboard": "start_keyboard",
            "update_keyboard": {"delay": 0}
        })))
        .await
        .expect("send_text failed");

    assert_eq!(scenario.bot.get_sent_for_chat(TEST_CHAT).len(), 1);
}

#[tokio::test]
async fn test_scenario_continues_after_failed_action() {
    let scenario = TestScenario::new(FunctionRegistry::new());

    let parsed = ScenarioStore::parse(
        r#"{"actions": [
            {"action": "send_audio", "params": {}},
            {"action": "teleport", "params": {}},
            {"action": "delay", "params": {"seconds": 0.01}},
            {"action": "send_text", "params": {"text": "Всё ещё здесь"}}
        ]}"#,
    )
    .expect("scenario parses");

    scenario.handler.handle_scenario(&parsed).await;

    assert_eq!(
        scenario.bot.texts_for_chat(TEST_CHAT),
        vec!["Всё ещё здесь".to_string()]
    );
}

#[test]
fn test_build_keyboard_rules() {
    let settings = KeyboardSettings::default();

    let empty: KeyboardSpec = serde_json::from_value(json!([])).unwrap();
    assert!(build_keyboard(Some(&empty), &settings).unwrap().markup.is_none());
    assert!(build_keyboard(None, &settings).unwrap().markup.is_none());

    let unknown: KeyboardSpec = serde_json::from_value(json!("secret_keyboard")).unwrap();
    assert!(matches!(
        build_keyboard(Some(&unknown), &settings),
        Err(ScenarioError::UnknownKeyboard(name)) if name == "secret_keyboard"
    ));

    let no_callback: KeyboardSpec =
        serde_json::from_value(json!([[{"type": "execute_function", "text": "Пусто"}]])).unwrap();
    assert!(matches!(
        build_keyboard(Some(&no_callback), &settings),
        Err(ScenarioError::MissingCallbackId(text)) if text == "Пусто"
    ));

    let long_data: KeyboardSpec = serde_json::from_value(
        json!([[{"text": "Длинная", "callback_data": "x".repeat(65)}]]),
    )
    .unwrap();
    assert!(matches!(
        build_keyboard(Some(&long_data), &settings),
        Err(ScenarioError::CallbackDataTooLong(_))
    ));

    let bad_url: KeyboardSpec =
        serde_json::from_value(json!([[{"type": "url", "text": "Сайт", "url": "not a url"}]])).unwrap();
    assert!(matches!(
        build_keyboard(Some(&bad_url), &settings),
        Err(ScenarioError::InvalidUrl(_))
    ));

    // buttons without data fall back to their text, the default text is "Button"
    let fallback: KeyboardSpec = serde_json::from_value(json!([[{"text": "Ок"}, {}]])).unwrap();
    let built = build_keyboard(Some(&fallback), &settings).unwrap();
    assert_eq!(callback_data(&built.markup.unwrap()), vec!["Ок", "Button"]);
}

#[test]
fn test_build_keyboard_web_app_button() {
    let spec: KeyboardSpec = serde_json::from_value(json!([[{
        "type": "web_app",
        "text": "Оплатить",
        "web_app": "https://pay.example.com/form"
    }]]))
    .unwrap();
    let built = build_keyboard(Some(&spec), &KeyboardSettings::default()).unwrap();
    let markup = built.markup.unwrap();
    match &markup.inline_keyboard[0][0].kind {
        InlineKeyboardButtonKind::WebApp(info) => {
            assert_eq!(info.url.as_str(), "https://pay.example.com/form")
        }
        other => panic!("expected a web app button, got {:?}", other),
    }
}

#[test]
fn test_scenario_store_loads_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("tripwire.json"),
        r#"{"actions": [{"action": "send_text", "params": {"text": "Трипваер"}}]}"#,
    )
    .unwrap();
    std::fs::write(dir.path().join("main.json"), r#"{"actions": []}"#).unwrap();
    std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let store = ScenarioStore::load_dir(dir.path()).expect("load_dir failed");

    assert_eq!(store.names(), vec!["main", "tripwire"]);
    assert_eq!(store.get("tripwire").unwrap().actions.len(), 1);
    assert!(store.get("broken").is_none());
}

#[test]
fn test_registry_rejects_malformed_paths() {
    let mut registry = FunctionRegistry::new();
    let result = registry.register("no_dot", |_params: Params| async { Ok(Value::Null) });
    assert!(matches!(result, Err(ScenarioError::InvalidFunctionPath(_))));
    assert!(!registry.contains("no_dot"));
    assert!(matches!(
        registry.resolve(".update"),
        Err(ScenarioError::InvalidFunctionPath(_))
    ));
}

#[tokio::test]
async fn test_unknown_button_type_is_a_callback_button() {
    let scenario = TestScenario::new(FunctionRegistry::new());

    scenario
        .handler
        .handle_send_text(&params(json!({
            "text": "Выберите",
            "keyboard": [[
                {"type": "switch_inline_query", "text": "Go", "callback_data": "go"},
                {"text": "Без типа", "callback_data": "plain"}
            ]]
        })))
        .await
        .expect("send_text failed");

    let sent = scenario.bot.get_sent_for_chat(TEST_CHAT);
    assert_eq!(sent.len(), 1);
    let keyboard = sent[0].keyboard().expect("keyboard missing");
    assert_eq!(button_texts(keyboard), vec!["Go", "Без типа"]);
    assert_eq!(callback_data(keyboard), vec!["go", "plain"]);
    assert_eq!(
        ButtonType::from_name("switch_inline_query"),
        ButtonType::CallbackData
    );
    assert_eq!(ButtonType::from_name("web_app"), ButtonType::WebApp);
}

#[tokio::test]
async fn test_callbacks_run_while_scenario_waits_on_delay() {
    let scenario = TestScenario::new(FunctionRegistry::new());

    let parsed = ScenarioStore::parse(
        r#"{
            "actions": [
                {"action": "send_text", "params": {
                    "text": "first",
                    "keyboard": [[{"type": "execute_function", "text": "Дальше", "callback_id": "next"}]]
                }},
                {"action": "delay", "params": {"seconds": 1}},
                {"action": "send_text", "params": {"text": "after"}}
            ],
            "callbacks": {
                "next": [{"function_name": "send_text", "params": {"text": "next"}}]
            }
        }"#,
    )
    .expect("scenario parses");

    let running = scenario.handler.clone().spawn_scenario(parsed);
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    scenario
        .handler
        .clone()
        .spawn_callback("next".to_string())
        .await
        .expect("callback task panicked");
    assert_eq!(scenario.bot.texts_for_chat(TEST_CHAT), vec!["first", "next"]);

    running.await.expect("scenario task panicked");
    assert_eq!(
        scenario.bot.texts_for_chat(TEST_CHAT),
        vec!["first", "next", "after"]
    );
}
