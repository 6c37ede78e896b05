use serde::{Deserialize, Serialize};
use teloxide::types::Message;

use crate::repo::QueuedMessage;
use crate::transport::{ChatTransport, MediaKind, MediaSource, SentMessage, TransportError};
use crate::utils::MessageFormatter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    Text,
    Media(MediaKind),
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Media(kind) => kind.as_str(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "text" => Some(ContentKind::Text),
            other => MediaKind::from_name(other).map(ContentKind::Media),
        }
    }
}

/// a broadcast message reduced to what is needed to resend it: html text
/// (or caption) and the telegram file id of the attachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailingContent {
    pub kind: ContentKind,
    pub text: Option<String>,
    pub file_id: Option<String>,
}

impl MailingContent {
    pub fn text(text: &str) -> Self {
        Self {
            kind: ContentKind::Text,
            text: Some(text.to_string()),
            file_id: None,
        }
    }

    fn media(kind: MediaKind, file_id: String, caption: Option<&str>) -> Self {
        Self {
            kind: ContentKind::Media(kind),
            text: caption.map(MessageFormatter::escape_html),
            file_id: Some(file_id),
        }
    }

    /// None for message types that cannot be broadcast (polls, locations, ...)
    pub fn from_message(msg: &Message) -> Option<Self> {
        let caption = msg.caption();

        if let Some(text) = msg.text() {
            return Some(Self::text(&MessageFormatter::escape_html(text)));
        }
        if let Some(sizes) = msg.photo() {
            // the last size is the largest
            let photo = sizes.last()?;
            return Some(Self::media(MediaKind::Photo, photo.file.id.to_string(), caption));
        }
        // animations also carry a document, check them first
        if let Some(animation) = msg.animation() {
            return Some(Self::media(MediaKind::Animation, animation.file.id.to_string(), caption));
        }
        if let Some(video) = msg.video() {
            return Some(Self::media(MediaKind::Video, video.file.id.to_string(), caption));
        }
        if let Some(audio) = msg.audio() {
            return Some(Self::media(MediaKind::Audio, audio.file.id.to_string(), caption));
        }
        if let Some(document) = msg.document() {
            return Some(Self::media(MediaKind::Document, document.file.id.to_string(), caption));
        }
        if let Some(voice) = msg.voice() {
            return Some(Self::media(MediaKind::Voice, voice.file.id.to_string(), caption));
        }
        if let Some(video_note) = msg.video_note() {
            return Some(Self::media(MediaKind::VideoNote, video_note.file.id.to_string(), None));
        }
        if let Some(sticker) = msg.sticker() {
            return Some(Self::media(MediaKind::Sticker, sticker.file.id.to_string(), None));
        }
        None
    }

    pub fn from_queued(queued: &QueuedMessage) -> Option<Self> {
        let kind = ContentKind::from_name(&queued.content_type)?;
        match kind {
            ContentKind::Text => queued.text.as_deref().map(Self::text),
            ContentKind::Media(_) => Some(Self {
                kind,
                text: queued.text.clone(),
                file_id: Some(queued.file_id.clone()?),
            }),
        }
    }

    pub async fn deliver(
        &self,
        transport: &dyn ChatTransport,
        chat_id: i64,
    ) -> Result<SentMessage, TransportError> {
        match self.kind {
            ContentKind::Text => {
                transport
                    .send_text(chat_id, self.text.as_deref().unwrap_or_default(), None)
                    .await
            }
            ContentKind::Media(kind) => {
                let file_id = self.file_id.clone().ok_or_else(|| {
                    TransportError::Unsupported(format!("{} without a file id", kind))
                })?;
                let caption = if kind.supports_caption() {
                    self.text.clone()
                } else {
                    None
                };
                transport
                    .send_media(chat_id, kind, MediaSource::FileId(file_id), caption, None)
                    .await
            }
        }
    }
}
