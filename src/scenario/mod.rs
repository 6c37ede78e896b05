//! JSON-driven conversation scripts.
//!
//! A scenario is a list of actions (send text or media, run a function,
//! wait) plus named callbacks that inline buttons can trigger later:
//!
//! ```json
//! {
//!   "actions": [
//!     {"action": "send_photo", "params": {"photo": {"id": "AgAC..."}, "caption": "Hi",
//!      "keyboard": [[{"type": "execute_function", "text": "Next", "callback_id": "next"}]]}},
//!     {"action": "delay", "params": {"seconds": 2}}
//!   ],
//!   "callbacks": {
//!     "next": [{"function_name": "lessons.update_lesson_progress", "params": {}}]
//!   }
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use crate::repo::RepoError;
use crate::transport::{MediaKind, TransportError};

pub mod engine;
pub mod functions;
pub mod keyboard;
pub mod media;
pub mod store;

pub use engine::ScenarioHandler;
pub use functions::FunctionRegistry;
pub use keyboard::{build_keyboard, BuiltKeyboard};
pub use store::ScenarioStore;

/// telegram rejects callback data longer than this many bytes
pub const MAX_CALLBACK_DATA_LEN: usize = 64;
pub const CALLBACK_PREFIX: &str = "callback:";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub callbacks: HashMap<String, Vec<FunctionCall>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub function_name: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyboardSpec {
    Named(String),
    Rows(Vec<Vec<ButtonSpec>>),
}

impl KeyboardSpec {
    pub fn is_empty(&self) -> bool {
        match self {
            KeyboardSpec::Named(name) => name.is_empty(),
            KeyboardSpec::Rows(rows) => rows.iter().all(|row| row.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonType {
    Url,
    WebApp,
    #[default]
    CallbackData,
    ExecuteFunction,
}

impl ButtonType {
    /// any type other than url, web_app and execute_function is a callback button
    pub fn from_name(name: &str) -> Self {
        match name {
            "url" => ButtonType::Url,
            "web_app" => ButtonType::WebApp,
            "execute_function" => ButtonType::ExecuteFunction,
            _ => ButtonType::CallbackData,
        }
    }
}

impl<'de> Deserialize<'de> for ButtonType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = Option::<String>::deserialize(deserializer)?;
        Ok(name.as_deref().map(Self::from_name).unwrap_or_default())
    }
}

fn default_button_text() -> String {
    "Button".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonSpec {
    #[serde(rename = "type", default)]
    pub kind: ButtonType,
    #[serde(default = "default_button_text")]
    pub text: String,
    pub url: Option<String>,
    pub web_app: Option<String>,
    pub callback_data: Option<String>,
    pub callback_id: Option<String>,
    pub functions: Option<Vec<FunctionCall>>,
}

/// `update_keyboard` accepts a bare keyboard or an object with an optional delay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyboardUpdate {
    Plain(KeyboardSpec),
    Detailed {
        #[serde(default)]
        keyboard: Option<KeyboardSpec>,
        #[serde(default)]
        delay: Option<f64>,
    },
}

impl KeyboardUpdate {
    pub fn keyboard(&self) -> Option<&KeyboardSpec> {
        match self {
            KeyboardUpdate::Detailed { keyboard, .. } => keyboard.as_ref(),
            KeyboardUpdate::Plain(spec) => Some(spec),
        }
    }

    pub fn delay(&self) -> Option<f64> {
        match self {
            KeyboardUpdate::Detailed { delay, .. } => *delay,
            KeyboardUpdate::Plain(_) => None,
        }
    }
}

#[derive(Debug)]
pub enum ScenarioError {
    UnknownKeyboard(String),
    MissingCallbackId(String), // button text
    CallbackDataTooLong(String),
    InvalidUrl(String),
    MissingMedia(MediaKind),
    UnsupportedMedia(String),
    InvalidFunctionPath(String),
    UnknownRepository(String),
    UnknownFunction { repository: String, function: String },
    InvalidParams(String),
    Repository(RepoError),
    Transport(TransportError),
    Parse(serde_json::Error),
    Io(std::io::Error),
}

impl ScenarioError {
    /// errors whose message is safe and useful to show to the user
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ScenarioError::InvalidFunctionPath(_)
                | ScenarioError::UnknownRepository(_)
                | ScenarioError::UnknownFunction { .. }
                | ScenarioError::InvalidParams(_)
                | ScenarioError::Repository(_)
        )
    }
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::UnknownKeyboard(name) => write!(f, "Keyboard '{}' not found", name),
            ScenarioError::MissingCallbackId(text) => write!(
                f,
                "Button '{}' with type 'execute_function' must have 'callback_id' or 'functions'",
                text
            ),
            ScenarioError::CallbackDataTooLong(data) => write!(
                f,
                "Callback data '{}' exceeds {} bytes",
                data, MAX_CALLBACK_DATA_LEN
            ),
            ScenarioError::InvalidUrl(url) => write!(f, "Invalid url: {}", url),
            ScenarioError::MissingMedia(kind) => write!(f, "No {} given", kind),
            ScenarioError::UnsupportedMedia(what) => write!(f, "No sender for media type: {}", what),
            ScenarioError::InvalidFunctionPath(path) => {
                write!(f, "Function path '{}' must look like 'repository.function'", path)
            }
            ScenarioError::UnknownRepository(name) => write!(f, "Repository '{}' not found", name),
            ScenarioError::UnknownFunction {
                repository,
                function,
            } => write!(f, "Function '{}' not found in '{}'", function, repository),
            ScenarioError::InvalidParams(msg) => write!(f, "Invalid parameters: {}", msg),
            ScenarioError::Repository(e) => write!(f, "{}", e),
            ScenarioError::Transport(e) => write!(f, "{}", e),
            ScenarioError::Parse(e) => write!(f, "Invalid scenario: {}", e),
            ScenarioError::Io(e) => write!(f, "Failed to read scenario: {}", e),
        }
    }
}

impl Error for ScenarioError {}

impl From<RepoError> for ScenarioError {
    fn from(err: RepoError) -> Self {
        ScenarioError::Repository(err)
    }
}

impl From<TransportError> for ScenarioError {
    fn from(err: TransportError) -> Self {
        ScenarioError::Transport(err)
    }
}

impl From<serde_json::Error> for ScenarioError {
    fn from(err: serde_json::Error) -> Self {
        ScenarioError::Parse(err)
    }
}

impl From<std::io::Error> for ScenarioError {
    fn from(err: std::io::Error) -> Self {
        ScenarioError::Io(err)
    }
}
