use serde_json::{Map, Value};

use super::ScenarioError;
use crate::transport::{MediaKind, MediaSource};

/// older scenarios name the video note key "note"
fn media_keys(kind: MediaKind) -> &'static [&'static str] {
    match kind {
        MediaKind::VideoNote => &["video_note", "note"],
        MediaKind::Photo => &["photo"],
        MediaKind::Video => &["video"],
        MediaKind::Audio => &["audio"],
        MediaKind::Document => &["document"],
        MediaKind::Sticker => &["sticker"],
        MediaKind::Voice => &["voice"],
        MediaKind::Animation => &["animation"],
    }
}

/// `{"id": ...}` wins over `{"url": ...}`; a bare string is a file id or url
fn source_from_value(value: &Value) -> Option<MediaSource> {
    match value {
        Value::String(raw) if !raw.is_empty() => Some(MediaSource::parse(raw)),
        Value::Object(obj) => {
            if let Some(id) = obj.get("id").and_then(Value::as_str).filter(|s| !s.is_empty()) {
                return Some(MediaSource::FileId(id.to_string()));
            }
            obj.get("url")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(MediaSource::parse)
        }
        _ => None,
    }
}

pub fn media_source(kind: MediaKind, params: &Map<String, Value>) -> Result<MediaSource, ScenarioError> {
    media_keys(kind)
        .iter()
        .find_map(|key| params.get(*key).and_then(source_from_value))
        .ok_or(ScenarioError::MissingMedia(kind))
}

pub fn caption(kind: MediaKind, params: &Map<String, Value>) -> Option<String> {
    if !kind.supports_caption() {
        return None;
    }
    params
        .get("caption")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// reads `params.media = [{"type": "photo" | "video", "media": id-or-url}]`
pub fn media_group(params: &Map<String, Value>) -> Result<Vec<(MediaKind, MediaSource)>, ScenarioError> {
    let items = params
        .get("media")
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .ok_or_else(|| ScenarioError::InvalidParams("media_group needs a non-empty 'media' list".to_string()))?;

    items
        .iter()
        .map(|item| {
            let kind = match item.get("type").and_then(Value::as_str) {
                Some("video") => MediaKind::Video,
                Some("photo") | None => MediaKind::Photo,
                Some(other) => {
                    return Err(ScenarioError::UnsupportedMedia(format!(
                        "{} in a media group",
                        other
                    )))
                }
            };
            let source = item
                .get("media")
                .and_then(source_from_value)
                .ok_or(ScenarioError::MissingMedia(kind))?;
            Ok((kind, source))
        })
        .collect()
}
