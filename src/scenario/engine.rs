use log::{error, info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::functions::Params;
use super::keyboard::build_keyboard;
use super::{media, Action, FunctionCall, FunctionRegistry, KeyboardSpec, KeyboardUpdate, Scenario, ScenarioError};
use crate::keyboards::KeyboardSettings;
use crate::transport::{ChatTransport, MediaKind, SentMessage};
use crate::user_session::SessionManager;
use crate::utils::MessageFormatter;

const DEFAULT_TEXT: &str = "Default Text Message";

/// runs scenarios and their callbacks for a single chat
#[derive(Clone)]
pub struct ScenarioHandler {
    transport: Arc<dyn ChatTransport>,
    sessions: SessionManager,
    functions: Arc<FunctionRegistry>,
    keyboards: KeyboardSettings,
    chat_id: i64,
}

/// what a send step produced; media groups cannot carry keyboards
enum Delivered {
    Single(SentMessage),
    Group(Vec<SentMessage>),
}

impl ScenarioHandler {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        sessions: SessionManager,
        functions: Arc<FunctionRegistry>,
        keyboards: KeyboardSettings,
        chat_id: i64,
    ) -> Self {
        Self {
            transport,
            sessions,
            functions,
            keyboards,
            chat_id,
        }
    }

    /// runs the scenario in its own task; its delays must not hold back the
    /// chat's next updates, which the dispatcher handles one at a time
    pub fn spawn_scenario(self, scenario: Scenario) -> JoinHandle<()> {
        tokio::spawn(async move { self.handle_scenario(&scenario).await })
    }

    pub fn spawn_callback(self, callback_id: String) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.handle_callback(&callback_id).await {
                error!(
                    "Scenario callback {} failed for chat {}: {}",
                    callback_id, self.chat_id, e
                );
            }
        })
    }

    pub async fn handle_scenario(&self, scenario: &Scenario) {
        self.sessions
            .store_callbacks(self.chat_id, scenario.callbacks.clone())
            .await;

        for action in &scenario.actions {
            if let Err(e) = self.handle_action(action).await {
                error!(
                    "Scenario action '{}' failed for chat {}: {}",
                    action.action, self.chat_id, e
                );
            }
        }
    }

    pub async fn handle_action(&self, action: &Action) -> Result<(), ScenarioError> {
        match action.action.as_str() {
            "execute_function" => {
                let functions: Vec<FunctionCall> = match action.params.get("functions") {
                    Some(value) => serde_json::from_value(value.clone())?,
                    None => Vec::new(),
                };
                for function in functions {
                    self.execute_function(&function.function_name, function.params)
                        .await;
                }
                Ok(())
            }
            "send_text" => self.handle_send_text(&action.params).await,
            "delay" => {
                Self::delay(action.params.get("seconds")).await;
                Ok(())
            }
            name if name.starts_with("send_") => self.handle_send_media(name, &action.params).await,
            other => {
                warn!("Unknown action type: {}", other);
                Ok(())
            }
        }
    }

    async fn delay(seconds: Option<&Value>) {
        let seconds = seconds.and_then(Value::as_f64).unwrap_or(0.0);
        match Duration::try_from_secs_f64(seconds) {
            Ok(duration) if !duration.is_zero() => tokio::time::sleep(duration).await,
            Ok(_) => {}
            Err(_) => warn!("Ignoring invalid delay of {} seconds", seconds),
        }
    }

    /// builds the keyboard and keeps any inline button functions in the session
    async fn keyboard_from(
        &self,
        spec: Option<&KeyboardSpec>,
    ) -> Result<Option<teloxide::types::InlineKeyboardMarkup>, ScenarioError> {
        let built = build_keyboard(spec, &self.keyboards)?;
        self.sessions
            .store_callbacks(self.chat_id, built.callbacks)
            .await;
        Ok(built.markup)
    }

    fn keyboard_spec(params: &Params) -> Result<Option<KeyboardSpec>, ScenarioError> {
        match params.get("keyboard") {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    fn keyboard_update(params: &Params) -> Result<Option<KeyboardUpdate>, ScenarioError> {
        match params.get("update_keyboard") {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    pub async fn handle_send_text(&self, params: &Params) -> Result<(), ScenarioError> {
        let text = params
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TEXT);
        let keyboard = self
            .keyboard_from(Self::keyboard_spec(params)?.as_ref())
            .await?;

        let sent = self
            .transport
            .send_text(self.chat_id, &MessageFormatter::process_message(text), keyboard)
            .await?;

        if let Some(update) = Self::keyboard_update(params)? {
            self.update_keyboard(&update, Delivered::Single(sent)).await?;
        }
        Ok(())
    }

    pub async fn handle_send_media(&self, action: &str, params: &Params) -> Result<(), ScenarioError> {
        let delivered = if action == "send_media_group" {
            let items = media::media_group(params)?;
            Delivered::Group(self.transport.send_media_group(self.chat_id, items).await?)
        } else {
            let kind = MediaKind::from_action(action)
                .ok_or_else(|| ScenarioError::UnsupportedMedia(action.to_string()))?;
            let source = media::media_source(kind, params)?;
            let caption = media::caption(kind, params).map(|caption| {
                MessageFormatter::truncate_caption(&MessageFormatter::process_message(&caption))
            });
            let keyboard = self
                .keyboard_from(Self::keyboard_spec(params)?.as_ref())
                .await?;
            Delivered::Single(
                self.transport
                    .send_media(self.chat_id, kind, source, caption, keyboard)
                    .await?,
            )
        };

        if let Some(update) = Self::keyboard_update(params)? {
            self.update_keyboard(&update, delivered).await?;
        }
        Ok(())
    }

    /// runs `repository.function`, or a sender when the path starts with send_.
    /// failures are reported to the chat; the return value is the function result
    pub async fn execute_function(&self, path: &str, mut params: Params) -> Option<Value> {
        if path.is_empty() {
            return None;
        }

        if path.starts_with("send_") {
            let result = if path == "send_text" {
                self.handle_send_text(&params).await
            } else {
                self.handle_send_media(path, &params).await
            };
            if let Err(e) = result {
                error!("Failed to run {} for chat {}: {}", path, self.chat_id, e);
            }
            return None;
        }

        if !params.contains_key("user_id") {
            params.insert("user_id".to_string(), Value::from(self.chat_id));
        }

        let result = match self.functions.resolve(path) {
            Ok(function) => function(params).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(value) => {
                info!("Executed function {} for chat {}", path, self.chat_id);
                Some(value)
            }
            Err(e) => {
                error!("Error executing function {} for chat {}: {}", path, self.chat_id, e);
                let text = if e.is_user_facing() {
                    self.keyboards.lang.error_scenario_function(&e.to_string())
                } else {
                    self.keyboards.lang.error_unexpected().to_string()
                };
                let text = MessageFormatter::escape_html(&text);
                if let Err(send_err) = self.transport.send_text(self.chat_id, &text, None).await {
                    error!("Failed to report function error to chat {}: {}", self.chat_id, send_err);
                }
                None
            }
        }
    }

    /// waits if asked to, then swaps or removes the keyboard of the sent
    /// message; a failed edit falls back to a new message with the keyboard
    async fn update_keyboard(&self, update: &KeyboardUpdate, delivered: Delivered) -> Result<(), ScenarioError> {
        let sent = match delivered {
            Delivered::Single(sent) => sent,
            Delivered::Group(_) => {
                warn!("Media groups cannot carry a keyboard, skipping update");
                return Ok(());
            }
        };

        if let Some(seconds) = update.delay() {
            Self::delay(Some(&Value::from(seconds))).await;
        }

        let keyboard = self.keyboard_from(update.keyboard()).await?;
        let removing = keyboard.is_none();

        if let Err(e) = self
            .transport
            .edit_reply_markup(sent.chat_id, sent.message_id, keyboard.clone())
            .await
        {
            if removing {
                error!("Error while removing keyboard: {}", e);
                return Ok(());
            }
            warn!("Error while editing keyboard: {}. Sending a new message instead", e);
            self.transport
                .send_text(self.chat_id, self.keyboards.lang.keyboard_updated(), keyboard)
                .await?;
        }
        Ok(())
    }

    pub async fn handle_callback(&self, callback_id: &str) -> Result<(), ScenarioError> {
        let actions = match self.sessions.callback(self.chat_id, callback_id).await {
            Some(actions) => actions,
            None => {
                warn!("No callback actions for id {} (chat {})", callback_id, self.chat_id);
                self.transport
                    .send_text(
                        self.chat_id,
                        self.keyboards.lang.error_action_not_found(),
                        None,
                    )
                    .await?;
                return Ok(());
            }
        };

        for action in actions {
            let name = action.function_name.as_str();
            let result = match name {
                "send_text" => self.handle_send_text(&action.params).await,
                "delay" => {
                    Self::delay(action.params.get("seconds")).await;
                    Ok(())
                }
                _ if name.starts_with("send_") => self.handle_send_media(name, &action.params).await,
                _ => {
                    self.execute_function(name, action.params.clone()).await;
                    Ok(())
                }
            };
            if let Err(e) = result {
                error!("Callback {} step '{}' failed: {}", callback_id, name, e);
            }
        }
        Ok(())
    }
}
