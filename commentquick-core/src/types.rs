use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest description allowed into a prompt, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSortOrder {
    Relevance,
    Time,
}

impl CommentSortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentSortOrder::Relevance => "relevance",
            CommentSortOrder::Time => "time",
        }
    }
}

impl fmt::Display for CommentSortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tone {
    Casual,
    Professional,
    Humorous,
    Engaging,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Casual => "casual",
            Tone::Professional => "professional",
            Tone::Humorous => "humorous",
            Tone::Engaging => "engaging",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tone::Casual => "Friendly and laid-back like chatting with a friend",
            Tone::Professional => "Polished and respectful, suited for serious topics",
            Tone::Humorous => "Playful and witty, adding light fun to replies",
            Tone::Engaging => "Encourages conversation and thoughtful responses",
        }
    }
}

impl From<&str> for Tone {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "casual" => Tone::Casual,
            "professional" => Tone::Professional,
            "humorous" => Tone::Humorous,
            "engaging" => Tone::Engaging,
            // Unknown tones read as the safe default, never an error
            _ => Tone::Professional,
        }
    }
}

impl From<String> for Tone {
    fn from(value: String) -> Self {
        Tone::from(value.as_str())
    }
}

impl From<Tone> for String {
    fn from(value: Tone) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReplyLength {
    Short,
    Medium,
    Long,
}

impl ReplyLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyLength::Short => "short",
            ReplyLength::Medium => "medium",
            ReplyLength::Long => "long",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ReplyLength::Short => "One-line replies, quick and snappy",
            ReplyLength::Medium => "Two sentences, thoughtful and easy to read",
            ReplyLength::Long => "Three to five sentences, detailed and engaging",
        }
    }
}

impl From<&str> for ReplyLength {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "short" => ReplyLength::Short,
            "medium" => ReplyLength::Medium,
            "long" => ReplyLength::Long,
            _ => ReplyLength::Medium,
        }
    }
}

impl From<String> for ReplyLength {
    fn from(value: String) -> Self {
        ReplyLength::from(value.as_str())
    }
}

impl From<ReplyLength> for String {
    fn from(value: ReplyLength) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ReplyLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplySettings {
    pub tone: Tone,
    pub length: ReplyLength,
    pub use_emojis: bool,
    #[serde(default)]
    pub custom_instructions: String,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            tone: Tone::Professional,
            length: ReplyLength::Medium,
            use_emojis: true,
            custom_instructions: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub author_display_name: String,
    pub author_profile_image_url: Option<String>,
    /// Relative age at fetch time, e.g. "2 days ago".
    pub published_at: String,
    pub like_count: i64,
    pub reply_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub next_page_token: Option<String>,
    pub total_results: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoDetails {
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
}

/// Video title and description as they enter a prompt. Construction
/// truncates the description first, then sanitizes both fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoContext {
    pub title: String,
    pub description: String,
}

impl VideoContext {
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            title: sanitize_prompt_text(title),
            description: sanitize_prompt_text(truncate_description(description)),
        }
    }
}

impl From<&VideoDetails> for VideoContext {
    fn from(details: &VideoDetails) -> Self {
        VideoContext::new(&details.title, &details.description)
    }
}

/// Caps a description at [`MAX_DESCRIPTION_CHARS`] characters. Applying it
/// to an already-truncated string is a no-op.
pub fn truncate_description(description: &str) -> &str {
    match description.char_indices().nth(MAX_DESCRIPTION_CHARS) {
        Some((idx, _)) => &description[..idx],
        None => description,
    }
}

/// Strips control characters, escapes double quotes and collapses whitespace
/// runs so external text cannot break the quoting inside a prompt.
pub fn sanitize_prompt_text(input: &str) -> String {
    let mut cleaned = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_control() {
            continue;
        }
        if c == '"' {
            cleaned.push('\\');
        }
        cleaned.push(c);
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedReply {
    /// Absent when a single comment was answered with multiple candidates.
    pub comment_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub used: i64,
    pub limit: i64,
}

impl UsageSnapshot {
    pub fn remaining(&self) -> i64 {
        (self.limit - self.used).max(0)
    }
}

/// Authenticated principal a quota counter is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(token: impl Into<String>) -> Result<Self, CoreError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(CoreError::Unauthenticated {
                reason: "empty identity token".to_string(),
            });
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
