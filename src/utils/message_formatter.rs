/// telegram limit for media captions, in UTF-16 code units
pub const MAX_CAPTION_LENGTH: usize = 1024;

pub struct MessageFormatter;

impl MessageFormatter {
    pub fn escape_html(text: &str) -> String {
        html_escape::encode_text(text).to_string()
    }

    /// escapes a value for use inside a double-quoted html attribute
    pub fn escape_attribute(text: &str) -> String {
        html_escape::encode_double_quoted_attribute(text).to_string()
    }

    pub fn link(text: &str, url: &str) -> String {
        format!(
            "<a href=\"{}\">{}</a>",
            Self::escape_attribute(url),
            Self::escape_html(text)
        )
    }

    /// converts loosely written html (as stored in env vars and scenarios) into
    /// the subset telegram accepts: b, i and a survive, lists become dashes
    /// and line breaks become newlines
    pub fn process_message(message: &str) -> String {
        message
            .replace("<strong>", "<b>")
            .replace("</strong>", "</b>")
            .replace("<em>", "<i>")
            .replace("</em>", "</i>")
            .replace("<br>", "\n")
            .replace("<br/>", "\n")
            .replace("<br />", "\n")
            .replace("<ul>", "")
            .replace("</ul>", "")
            .replace("<ol>", "")
            .replace("</ol>", "")
            .replace("<li>", "- ")
            .replace("</li>", "\n")
    }

    /// product descriptions are stored with "+br+" as the line separator
    pub fn product_description(description: Option<&str>) -> String {
        description.unwrap_or_default().replace("+br+", "\n")
    }

    /// counts UTF-16 code units as Telegram does for message length limits
    pub fn count_utf16_code_units(text: &str) -> usize {
        text.encode_utf16().count()
    }

    /// length of the text telegram shows once the html is parsed: tags are
    /// dropped and every entity such as `&amp;` is one character
    pub fn visible_length(html: &str) -> usize {
        Self::html_tokens(html)
            .iter()
            .map(|token| match token {
                HtmlToken::Text(ch) => ch.len_utf16(),
                HtmlToken::Entity(_) => 1,
                HtmlToken::Tag(_) => 0,
            })
            .sum()
    }

    /// cuts an html caption down to telegram's limit without splitting a
    /// character, a tag or an entity; tags left open at the cut are closed
    pub fn truncate_caption(html: &str) -> String {
        if Self::visible_length(html) <= MAX_CAPTION_LENGTH {
            return html.to_string();
        }

        let mut result = String::new();
        let mut open_tags: Vec<String> = Vec::new();
        let mut units = 0;
        for token in Self::html_tokens(html) {
            match token {
                HtmlToken::Tag(tag) => {
                    match tag_name(tag) {
                        TagName::Open(name) => open_tags.push(name),
                        TagName::Close(name) => {
                            if let Some(pos) = open_tags.iter().rposition(|open| *open == name) {
                                open_tags.remove(pos);
                            }
                        }
                        TagName::Other => {}
                    }
                    result.push_str(tag);
                }
                HtmlToken::Entity(entity) => {
                    units += 1;
                    if units > MAX_CAPTION_LENGTH - 1 {
                        break;
                    }
                    result.push_str(entity);
                }
                HtmlToken::Text(ch) => {
                    units += ch.len_utf16();
                    if units > MAX_CAPTION_LENGTH - 1 {
                        break;
                    }
                    result.push(ch);
                }
            }
        }
        result.push('…');
        for name in open_tags.iter().rev() {
            result.push_str(&format!("</{}>", name));
        }
        result
    }

    fn html_tokens(html: &str) -> Vec<HtmlToken<'_>> {
        let mut tokens = Vec::new();
        let mut rest = html;
        while let Some(ch) = rest.chars().next() {
            let delimited = match ch {
                '<' => rest.find('>').map(|end| HtmlToken::Tag(&rest[..=end])),
                '&' => rest
                    .find(';')
                    .filter(|end| *end <= MAX_ENTITY_LENGTH)
                    .map(|end| HtmlToken::Entity(&rest[..=end])),
                _ => None,
            };
            let token = delimited.unwrap_or(HtmlToken::Text(ch));
            let consumed = match token {
                HtmlToken::Tag(tag) | HtmlToken::Entity(tag) => tag.len(),
                HtmlToken::Text(ch) => ch.len_utf8(),
            };
            tokens.push(token);
            rest = &rest[consumed..];
        }
        tokens
    }
}

// longest entity we expect, e.g. "&#x1F600;"
const MAX_ENTITY_LENGTH: usize = 10;

#[derive(Clone, Copy)]
enum HtmlToken<'a> {
    Tag(&'a str),
    Entity(&'a str),
    Text(char),
}

enum TagName {
    Open(String),
    Close(String),
    Other,
}

fn tag_name(tag: &str) -> TagName {
    let inner = tag.trim_start_matches('<').trim_end_matches('>');
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(inner) => (true, inner),
        None => (false, inner),
    };
    let name: String = inner
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '-')
        .collect::<String>()
        .to_lowercase();
    if name.is_empty() || inner.ends_with('/') {
        return TagName::Other;
    }
    if closing {
        TagName::Close(name)
    } else {
        TagName::Open(name)
    }
}
