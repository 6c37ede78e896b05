use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use teloxide::types::{InlineKeyboardButtonKind, InlineKeyboardMarkup};
use tg_funnel::transport::{ChatTransport, MediaKind, MediaSource, SentMessage, TransportError};

/// everything the bot pushed to telegram, in order
#[derive(Debug, Clone)]
pub enum Outgoing {
    Text {
        chat_id: i64,
        message_id: i32,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    },
    Media {
        chat_id: i64,
        message_id: i32,
        kind: MediaKind,
        source: MediaSource,
        caption: Option<String>,
        keyboard: Option<InlineKeyboardMarkup>,
    },
    MediaGroup {
        chat_id: i64,
        items: Vec<(MediaKind, MediaSource)>,
    },
    EditMarkup {
        chat_id: i64,
        message_id: i32,
        keyboard: Option<InlineKeyboardMarkup>,
    },
    Document {
        chat_id: i64,
        file_name: String,
        bytes: Vec<u8>,
        caption: Option<String>,
    },
}

impl Outgoing {
    pub fn chat_id(&self) -> i64 {
        match self {
            Outgoing::Text { chat_id, .. }
            | Outgoing::Media { chat_id, .. }
            | Outgoing::MediaGroup { chat_id, .. }
            | Outgoing::EditMarkup { chat_id, .. }
            | Outgoing::Document { chat_id, .. } => *chat_id,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Outgoing::Text { text, .. } => Some(text),
            Outgoing::Media { caption, .. } | Outgoing::Document { caption, .. } => caption.as_deref(),
            _ => None,
        }
    }

    pub fn keyboard(&self) -> Option<&InlineKeyboardMarkup> {
        match self {
            Outgoing::Text { keyboard, .. }
            | Outgoing::Media { keyboard, .. }
            | Outgoing::EditMarkup { keyboard, .. } => keyboard.as_ref(),
            _ => None,
        }
    }
}

/// mock telegram bot that records what would have been sent
#[derive(Debug, Clone, Default)]
pub struct MockTelegramBot {
    pub sent: Arc<Mutex<Vec<Outgoing>>>,
    next_message_id: Arc<AtomicI32>,
    fail_edits: Arc<AtomicBool>,
    fail_chat: Arc<Mutex<Option<i64>>>,
}

impl MockTelegramBot {
    pub fn new() -> Self {
        Self::default()
    }

    /// makes every edit_reply_markup call fail, like editing a message that is too old
    pub fn fail_edits(&self) {
        self.fail_edits.store(true, Ordering::SeqCst);
    }

    /// makes every send to the chat fail, like a user who blocked the bot
    pub fn fail_chat(&self, chat_id: i64) {
        *self.fail_chat.lock().unwrap() = Some(chat_id);
    }

    pub fn get_sent(&self) -> Vec<Outgoing> {
        self.sent.lock().unwrap().clone()
    }

    pub fn get_sent_for_chat(&self, chat_id: i64) -> Vec<Outgoing> {
        self.get_sent()
            .into_iter()
            .filter(|item| item.chat_id() == chat_id)
            .collect()
    }

    pub fn texts_for_chat(&self, chat_id: i64) -> Vec<String> {
        self.get_sent_for_chat(chat_id)
            .iter()
            .filter_map(|item| item.text().map(str::to_string))
            .collect()
    }

    pub fn chat_received_message_containing(&self, chat_id: i64, text: &str) -> bool {
        self.texts_for_chat(chat_id).iter().any(|sent| sent.contains(text))
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn check_chat(&self, chat_id: i64) -> Result<(), TransportError> {
        if *self.fail_chat.lock().unwrap() == Some(chat_id) {
            return Err(TransportError::Unsupported(format!(
                "chat {} blocked the bot",
                chat_id
            )));
        }
        Ok(())
    }

    fn record(&self, item: Outgoing) {
        self.sent.lock().unwrap().push(item);
    }

    fn next_id(&self) -> i32 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl ChatTransport for MockTelegramBot {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<SentMessage, TransportError> {
        self.check_chat(chat_id)?;
        let message_id = self.next_id();
        self.record(Outgoing::Text {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard,
        });
        Ok(SentMessage {
            chat_id,
            message_id,
        })
    }

    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        source: MediaSource,
        caption: Option<String>,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<SentMessage, TransportError> {
        self.check_chat(chat_id)?;
        let message_id = self.next_id();
        self.record(Outgoing::Media {
            chat_id,
            message_id,
            kind,
            source,
            caption,
            keyboard,
        });
        Ok(SentMessage {
            chat_id,
            message_id,
        })
    }

    async fn send_media_group(
        &self,
        chat_id: i64,
        items: Vec<(MediaKind, MediaSource)>,
    ) -> Result<Vec<SentMessage>, TransportError> {
        self.check_chat(chat_id)?;
        let sent = items
            .iter()
            .map(|_| SentMessage {
                chat_id,
                message_id: self.next_id(),
            })
            .collect();
        self.record(Outgoing::MediaGroup { chat_id, items });
        Ok(sent)
    }

    async fn edit_reply_markup(
        &self,
        chat_id: i64,
        message_id: i32,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TransportError> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(TransportError::Unsupported(
                "message can't be edited".to_string(),
            ));
        }
        self.record(Outgoing::EditMarkup {
            chat_id,
            message_id,
            keyboard,
        });
        Ok(())
    }

    async fn send_document_bytes(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        caption: Option<String>,
    ) -> Result<SentMessage, TransportError> {
        self.check_chat(chat_id)?;
        let message_id = self.next_id();
        self.record(Outgoing::Document {
            chat_id,
            file_name: file_name.to_string(),
            bytes,
            caption,
        });
        Ok(SentMessage {
            chat_id,
            message_id,
        })
    }
}

/// callback data of every callback button, row by row
pub fn callback_data(keyboard: &InlineKeyboardMarkup) -> Vec<String> {
    keyboard
        .inline_keyboard
        .iter()
        .flatten()
        .filter_map(|button| match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
            _ => None,
        })
        .collect()
}

pub fn button_texts(keyboard: &InlineKeyboardMarkup) -> Vec<String> {
    keyboard
        .inline_keyboard
        .iter()
        .flatten()
        .map(|button| button.text.clone())
        .collect()
}
