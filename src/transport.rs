use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardMarkup, InputFile, InputMedia, InputMediaPhoto, InputMediaVideo,
    MessageId, ParseMode,
};
use url::Url;

#[derive(Debug)]
pub enum TransportError {
    Request(teloxide::RequestError),
    Unsupported(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Request(e) => write!(f, "Telegram request failed: {}", e),
            TransportError::Unsupported(what) => write!(f, "Unsupported: {}", what),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<teloxide::RequestError> for TransportError {
    fn from(err: teloxide::RequestError) -> Self {
        TransportError::Request(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Document,
    Sticker,
    Voice,
    VideoNote,
    Animation,
}

impl MediaKind {
    pub const ALL: [MediaKind; 8] = [
        MediaKind::Photo,
        MediaKind::Video,
        MediaKind::Audio,
        MediaKind::Document,
        MediaKind::Sticker,
        MediaKind::Voice,
        MediaKind::VideoNote,
        MediaKind::Animation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
            MediaKind::Sticker => "sticker",
            MediaKind::Voice => "voice",
            MediaKind::VideoNote => "video_note",
            MediaKind::Animation => "animation",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// "send_photo" -> Photo
    pub fn from_action(action: &str) -> Option<Self> {
        action.strip_prefix("send_").and_then(Self::from_name)
    }

    /// stickers and video notes are sent without a caption
    pub fn supports_caption(&self) -> bool {
        !matches!(self, MediaKind::Sticker | MediaKind::VideoNote)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MediaSource {
    FileId(String),
    Url(Url),
}

impl MediaSource {
    /// strings that parse as http(s) urls are urls, anything else is a file id
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => MediaSource::Url(url),
            _ => MediaSource::FileId(raw.to_string()),
        }
    }

    fn into_input_file(self) -> InputFile {
        match self {
            MediaSource::FileId(id) => InputFile::file_id(id),
            MediaSource::Url(url) => InputFile::url(url),
        }
    }
}

/// identifies a delivered message so its keyboard can be edited later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub message_id: i32,
}

impl From<&Message> for SentMessage {
    fn from(msg: &Message) -> Self {
        Self {
            chat_id: msg.chat.id.0,
            message_id: msg.id.0,
        }
    }
}

/// outbound side of the bot; everything that drives conversations without
/// a live update (scenarios, broadcasts) goes through this
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<SentMessage, TransportError>;

    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        source: MediaSource,
        caption: Option<String>,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<SentMessage, TransportError>;

    async fn send_media_group(
        &self,
        chat_id: i64,
        items: Vec<(MediaKind, MediaSource)>,
    ) -> Result<Vec<SentMessage>, TransportError>;

    /// None removes the keyboard
    async fn edit_reply_markup(
        &self,
        chat_id: i64,
        message_id: i32,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TransportError>;

    async fn send_document_bytes(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        caption: Option<String>,
    ) -> Result<SentMessage, TransportError>;
}

macro_rules! with_caption_and_keyboard {
    ($request:expr, $caption:expr, $keyboard:expr) => {{
        let mut request = $request;
        if let Some(caption) = $caption {
            request = request.caption(caption).parse_mode(ParseMode::Html);
        }
        if let Some(keyboard) = $keyboard {
            request = request.reply_markup(keyboard);
        }
        request.await?
    }};
}

macro_rules! with_keyboard {
    ($request:expr, $keyboard:expr) => {{
        let mut request = $request;
        if let Some(keyboard) = $keyboard {
            request = request.reply_markup(keyboard);
        }
        request.await?
    }};
}

pub struct TelegramTransport {
    bot: Arc<Bot>,
}

impl TelegramTransport {
    pub fn new(bot: Arc<Bot>) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<SentMessage, TransportError> {
        let message = with_keyboard!(
            self.bot
                .send_message(ChatId(chat_id), text)
                .parse_mode(ParseMode::Html),
            keyboard
        );
        Ok(SentMessage::from(&message))
    }

    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        source: MediaSource,
        caption: Option<String>,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<SentMessage, TransportError> {
        let chat = ChatId(chat_id);
        let file = source.into_input_file();
        let message = match kind {
            MediaKind::Photo => {
                with_caption_and_keyboard!(self.bot.send_photo(chat, file), caption, keyboard)
            }
            MediaKind::Video => {
                with_caption_and_keyboard!(self.bot.send_video(chat, file), caption, keyboard)
            }
            MediaKind::Audio => {
                with_caption_and_keyboard!(self.bot.send_audio(chat, file), caption, keyboard)
            }
            MediaKind::Document => {
                with_caption_and_keyboard!(self.bot.send_document(chat, file), caption, keyboard)
            }
            MediaKind::Voice => {
                with_caption_and_keyboard!(self.bot.send_voice(chat, file), caption, keyboard)
            }
            MediaKind::Animation => {
                with_caption_and_keyboard!(self.bot.send_animation(chat, file), caption, keyboard)
            }
            MediaKind::Sticker => with_keyboard!(self.bot.send_sticker(chat, file), keyboard),
            MediaKind::VideoNote => with_keyboard!(self.bot.send_video_note(chat, file), keyboard),
        };
        Ok(SentMessage::from(&message))
    }

    async fn send_media_group(
        &self,
        chat_id: i64,
        items: Vec<(MediaKind, MediaSource)>,
    ) -> Result<Vec<SentMessage>, TransportError> {
        let media = items
            .into_iter()
            .map(|(kind, source)| match kind {
                MediaKind::Photo => Ok(InputMedia::Photo(InputMediaPhoto::new(
                    source.into_input_file(),
                ))),
                MediaKind::Video => Ok(InputMedia::Video(InputMediaVideo::new(
                    source.into_input_file(),
                ))),
                other => Err(TransportError::Unsupported(format!(
                    "{} in a media group",
                    other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let messages = self.bot.send_media_group(ChatId(chat_id), media).await?;
        Ok(messages.iter().map(SentMessage::from).collect())
    }

    async fn edit_reply_markup(
        &self,
        chat_id: i64,
        message_id: i32,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TransportError> {
        with_keyboard!(
            self.bot
                .edit_message_reply_markup(ChatId(chat_id), MessageId(message_id)),
            keyboard
        );
        Ok(())
    }

    async fn send_document_bytes(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        caption: Option<String>,
    ) -> Result<SentMessage, TransportError> {
        let file = InputFile::memory(bytes).file_name(file_name.to_string());
        let message = with_caption_and_keyboard!(
            self.bot.send_document(ChatId(chat_id), file),
            caption,
            None::<InlineKeyboardMarkup>
        );
        Ok(SentMessage::from(&message))
    }
}
