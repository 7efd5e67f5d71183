use crate::client::ChatMessage;
use commentquick_core::{Comment, ReplySettings, VideoContext};

/// The id/text pair of a comment as it enters a prompt.
#[derive(Debug, Clone, Copy)]
pub struct CommentRef<'a> {
    pub id: &'a str,
    pub text: &'a str,
}

impl<'a> From<&'a Comment> for CommentRef<'a> {
    fn from(comment: &'a Comment) -> Self {
        Self {
            id: &comment.id,
            text: &comment.text,
        }
    }
}

/// Builds the two-message payload for tagged batch replies. Pure: identical
/// inputs produce a byte-identical payload.
pub fn build_batch_messages(
    comments: &[CommentRef<'_>],
    settings: &ReplySettings,
    context: Option<&VideoContext>,
) -> Vec<ChatMessage> {
    let mut lines: Vec<String> = Vec::new();
    lines.push(
        "You are helping a YouTube creator craft smart, relevant replies to comments.".to_string(),
    );
    if let Some(ctx) = context {
        lines.push(format!("The video title is: \"{}\"", ctx.title));
        if !ctx.description.is_empty() {
            lines.push(format!("The description is: \"{}\"", ctx.description));
        }
    }
    lines.push(String::new());
    lines.push("Reply settings:".to_string());
    lines.push(format!(
        "- Tone: {} — {}",
        settings.tone,
        settings.tone.description()
    ));
    lines.push(format!(
        "- Length: {} — {}",
        settings.length,
        settings.length.description()
    ));
    lines.push(format!(
        "- Emojis: {}",
        if settings.use_emojis {
            "ON — Add 1-2 fitting emojis naturally"
        } else {
            "OFF — Keep replies text-only"
        }
    ));
    if !settings.custom_instructions.trim().is_empty() {
        lines.push(String::new());
        lines.push("Custom Instructions:".to_string());
        lines.push(settings.custom_instructions.trim().to_string());
    }

    let mut user_lines: Vec<String> = comments
        .iter()
        .map(|comment| format!("Comment {}: {}", comment.id, comment.text))
        .collect();
    user_lines.push(String::new());
    user_lines.push("Reply to each comment using this format:".to_string());
    user_lines.push("Reply <id>: <reply text>".to_string());
    user_lines.push(String::new());
    user_lines
        .push("Only include the reply text. Do not repeat the comment or explain it.".to_string());

    vec![
        ChatMessage::system(lines.join("\n")),
        ChatMessage::user(user_lines.join("\n")),
    ]
}

/// Builds the two-message payload for untagged candidate replies to one
/// comment. Pure, like the batch builder.
pub fn build_suggestion_messages(
    comment_text: &str,
    settings: &ReplySettings,
    context: Option<&VideoContext>,
) -> Vec<ChatMessage> {
    let mut prompt = format!(
        "You are an expert AI assistant helping a YouTube creator reply to comments naturally and thoughtfully.\n\
         \n\
         Instructions:\n\
         Please follow all the preset reply settings first.\n\
         \n\
         Preset Settings:\n\
         - Reply Length: {} — {}\n\
         - Reply Tone: {} — {}\n\
         - Include Emojis: {}",
        settings.length,
        settings.length.description(),
        settings.tone,
        settings.tone.description(),
        if settings.use_emojis {
            "Yes — Add fitting emojis naturally."
        } else {
            "No — Keep replies text-only."
        }
    );

    if !settings.custom_instructions.trim().is_empty() {
        prompt.push_str(&format!(
            "\n\nUser-defined instruction to apply **after** the above settings:\n{}",
            settings.custom_instructions.trim()
        ));
    }

    prompt.push_str(
        "\n\nStyle Guidelines:\n\
         - Keep replies human, relatable, and in natural language.\n\
         - Respect the sentiment of the original comment (positive/negative/neutral).\n\
         - Encourage conversation if tone is set to \"Engaging\".\n\
         - If emojis are ON, use 1-2 relevant emojis naturally, not forced.\n\
         - Do not include numbers or bullet points in your replies.",
    );

    if let Some(ctx) = context {
        prompt.push_str(&format!(
            "\n\nContext:\n\
             - This comment is on a video titled: \"{}\"\n\
             - Consider the video's topic when crafting replies to make them more relevant and contextual.",
            ctx.title
        ));
    }

    prompt.push_str(
        "\n\nOutput Format:\n\
         Generate three replies separated by newlines, without any numbering or bullet points.\n\
         \n\
         Example:\n\
         For comment \"This was amazing!\", settings casual/short/emojis ON:\n\
         So happy you liked it! 😄\n\
         Thanks a bunch! Means a lot! 👌\n\
         Appreciate it! More great stuff coming soon! 🚀\n\
         \n\
         Now generate 3 replies accordingly.",
    );

    vec![ChatMessage::system(prompt), ChatMessage::user(comment_text)]
}
