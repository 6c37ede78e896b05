use std::collections::HashMap;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};
use url::Url;

use super::{
    ButtonSpec, ButtonType, FunctionCall, KeyboardSpec, ScenarioError, CALLBACK_PREFIX,
    MAX_CALLBACK_DATA_LEN,
};
use crate::keyboards::{self, KeyboardSettings};

/// rendered keyboard plus the inline button functions that must be kept in
/// the user's session under their generated ids
#[derive(Debug, Clone, Default)]
pub struct BuiltKeyboard {
    pub markup: Option<InlineKeyboardMarkup>,
    pub callbacks: HashMap<String, Vec<FunctionCall>>,
}

fn generate_callback_id() -> String {
    (0..12).map(|_| fastrand::alphanumeric()).collect()
}

fn parse_url(raw: Option<&str>) -> Result<Url, ScenarioError> {
    let raw = raw.unwrap_or_default();
    Url::parse(raw).map_err(|_| ScenarioError::InvalidUrl(raw.to_string()))
}

fn callback_button(text: &str, data: String) -> Result<InlineKeyboardButton, ScenarioError> {
    if data.len() > MAX_CALLBACK_DATA_LEN {
        return Err(ScenarioError::CallbackDataTooLong(data));
    }
    Ok(InlineKeyboardButton::callback(text, data))
}

fn build_button(
    button: &ButtonSpec,
    callbacks: &mut HashMap<String, Vec<FunctionCall>>,
) -> Result<InlineKeyboardButton, ScenarioError> {
    match button.kind {
        ButtonType::Url => Ok(InlineKeyboardButton::url(
            button.text.clone(),
            parse_url(button.url.as_deref())?,
        )),
        ButtonType::WebApp => Ok(InlineKeyboardButton::web_app(
            button.text.clone(),
            WebAppInfo {
                url: parse_url(button.web_app.as_deref())?,
            },
        )),
        ButtonType::ExecuteFunction => {
            let callback_id = match (&button.callback_id, &button.functions) {
                (Some(id), _) if !id.is_empty() => id.clone(),
                (_, Some(functions)) if !functions.is_empty() => {
                    let id = generate_callback_id();
                    callbacks.insert(id.clone(), functions.clone());
                    id
                }
                _ => return Err(ScenarioError::MissingCallbackId(button.text.clone())),
            };
            callback_button(&button.text, format!("{}{}", CALLBACK_PREFIX, callback_id))
        }
        ButtonType::CallbackData => {
            // telegram refuses empty callback data, fall back to the text
            let data = button
                .callback_data
                .clone()
                .filter(|data| !data.is_empty())
                .unwrap_or_else(|| button.text.clone());
            callback_button(&button.text, data)
        }
    }
}

pub fn build_keyboard(
    spec: Option<&KeyboardSpec>,
    settings: &KeyboardSettings,
) -> Result<BuiltKeyboard, ScenarioError> {
    let spec = match spec {
        Some(spec) if !spec.is_empty() => spec,
        _ => return Ok(BuiltKeyboard::default()),
    };

    match spec {
        KeyboardSpec::Named(name) => {
            let markup = keyboards::named(name, settings)
                .ok_or_else(|| ScenarioError::UnknownKeyboard(name.clone()))?;
            Ok(BuiltKeyboard {
                markup: Some(markup),
                callbacks: HashMap::new(),
            })
        }
        KeyboardSpec::Rows(rows) => {
            let mut callbacks = HashMap::new();
            let rows = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| build_button(button, &mut callbacks))
                        .collect::<Result<Vec<_>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(BuiltKeyboard {
                markup: Some(InlineKeyboardMarkup::new(rows)),
                callbacks,
            })
        }
    }
}
