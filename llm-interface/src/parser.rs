use crate::client::GenerationParams;
use commentquick_core::{CoreError, GeneratedReply, LlmError};
use regex::Regex;
use std::sync::OnceLock;

/// How many candidate replies a single comment is answered with.
pub const SUGGESTIONS_PER_COMMENT: usize = 3;

fn reply_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Reply\s+([A-Za-z0-9_-]+):").expect("valid reply tag pattern"))
}

/// The two reply-output contracts the model is asked for. The batch contract
/// tags each reply with a comment id; the single-comment contract returns
/// bare lines. They are kept as one type with mode-specific parsing so the
/// orchestration path does not fork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationMode {
    /// One tagged reply per comment in a batch.
    CommentBatch { comment_ids: Vec<String> },
    /// Several untagged candidate replies to a single comment.
    SingleComment,
}

impl GenerationMode {
    pub fn comment_batch<I>(ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        GenerationMode::CommentBatch {
            comment_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of replies a successful call reserves quota for. Single-comment
    /// calls may deliver fewer; batch calls deliver exactly this many.
    pub fn requested_replies(&self) -> usize {
        match self {
            GenerationMode::CommentBatch { comment_ids } => comment_ids.len(),
            GenerationMode::SingleComment => SUGGESTIONS_PER_COMMENT,
        }
    }

    pub fn params(&self) -> GenerationParams {
        match self {
            GenerationMode::CommentBatch { .. } => GenerationParams {
                temperature: 0.7,
                max_tokens: 500,
            },
            GenerationMode::SingleComment => GenerationParams {
                temperature: 0.7,
                max_tokens: 400,
            },
        }
    }

    pub fn parse(&self, raw: &str) -> Result<Vec<GeneratedReply>, CoreError> {
        match self {
            GenerationMode::CommentBatch { comment_ids } => parse_tagged_replies(raw, comment_ids),
            GenerationMode::SingleComment => Ok(parse_suggestion_lines(raw)?
                .into_iter()
                .map(|text| GeneratedReply {
                    comment_id: None,
                    text,
                })
                .collect()),
        }
    }
}

/// Recovers `Reply <id>: <text>` pairs from free text. Each reply runs from
/// its tag to the next tag or end of input. The result must cover every
/// input comment id exactly once; anything else is a structural failure
/// because an orphaned reply cannot safely be attributed to a comment.
pub fn parse_tagged_replies(
    raw: &str,
    comment_ids: &[String],
) -> Result<Vec<GeneratedReply>, CoreError> {
    let headers: Vec<(String, usize, usize)> = reply_header_re()
        .captures_iter(raw)
        .map(|caps| {
            let whole = caps.get(0).expect("match has a full capture");
            (caps[1].to_string(), whole.start(), whole.end())
        })
        .collect();

    let mut replies = Vec::with_capacity(headers.len());
    for (index, (id, _, text_start)) in headers.iter().enumerate() {
        let text_end = headers
            .get(index + 1)
            .map(|next| next.1)
            .unwrap_or(raw.len());
        replies.push(GeneratedReply {
            comment_id: Some(id.clone()),
            text: raw[*text_start..text_end].trim().to_string(),
        });
    }

    if replies.len() != comment_ids.len() {
        return Err(CoreError::Llm(LlmError::IncompleteGeneration {
            expected: comment_ids.len(),
            received: replies.len(),
        }));
    }
    for id in comment_ids {
        let count = replies
            .iter()
            .filter(|reply| reply.comment_id.as_deref() == Some(id.as_str()))
            .count();
        if count != 1 {
            return Err(CoreError::Llm(LlmError::IncompleteGeneration {
                expected: comment_ids.len(),
                received: replies.len(),
            }));
        }
    }
    Ok(replies)
}

/// Recovers up to three candidate replies from untagged model output. Blank
/// lines and numbering/bullet artifacts the model was told not to produce
/// are dropped; surviving duplicates pass through untouched.
pub fn parse_suggestion_lines(raw: &str) -> Result<Vec<String>, CoreError> {
    let lines: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !is_list_marker(line))
        .take(SUGGESTIONS_PER_COMMENT)
        .map(str::to_string)
        .collect();

    if lines.is_empty() {
        return Err(CoreError::Llm(LlmError::EmptyGeneration));
    }
    Ok(lines)
}

fn is_list_marker(line: &str) -> bool {
    if line.starts_with('-') || line.starts_with('•') {
        return true;
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && line[digits..].starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_tagged_parse_recovers_every_reply() {
        let raw = "Reply a1: hi there\nReply b2: thanks!";
        let replies = parse_tagged_replies(raw, &ids(&["a1", "b2"])).unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].comment_id.as_deref(), Some("a1"));
        assert_eq!(replies[0].text, "hi there");
        assert_eq!(replies[1].comment_id.as_deref(), Some("b2"));
        assert_eq!(replies[1].text, "thanks!");
    }

    #[test]
    fn test_tagged_parse_allows_multiline_reply_text() {
        let raw = "Reply a1: first sentence.\nSecond sentence.\nReply b2: short one";
        let replies = parse_tagged_replies(raw, &ids(&["a1", "b2"])).unwrap();
        assert_eq!(replies[0].text, "first sentence.\nSecond sentence.");
        assert_eq!(replies[1].text, "short one");
    }

    #[test]
    fn test_tagged_parse_ignores_preamble_and_whitespace() {
        let raw = "  Sure, here you go:\nReply Ugx-abc_12345: Glad you liked it!  \n";
        let replies = parse_tagged_replies(raw, &ids(&["Ugx-abc_12345"])).unwrap();
        assert_eq!(replies[0].text, "Glad you liked it!");
    }

    #[test]
    fn test_tagged_parse_fails_on_missing_comment() {
        let raw = "Reply a1: hi there";
        let result = parse_tagged_replies(raw, &ids(&["a1", "b2"]));
        assert!(matches!(
            result,
            Err(CoreError::Llm(LlmError::IncompleteGeneration {
                expected: 2,
                received: 1,
            }))
        ));
    }

    #[test]
    fn test_tagged_parse_fails_on_unknown_id() {
        let raw = "Reply a1: hi\nReply zz: stray";
        let result = parse_tagged_replies(raw, &ids(&["a1", "b2"]));
        assert!(matches!(
            result,
            Err(CoreError::Llm(LlmError::IncompleteGeneration { .. }))
        ));
    }

    #[test]
    fn test_tagged_parse_fails_on_duplicate_id() {
        let raw = "Reply a1: hi\nReply a1: hello again";
        let result = parse_tagged_replies(raw, &ids(&["a1", "b2"]));
        assert!(matches!(
            result,
            Err(CoreError::Llm(LlmError::IncompleteGeneration { .. }))
        ));
    }

    #[test]
    fn test_suggestion_parse_drops_markers_and_caps_at_three() {
        let raw = "1. Thanks!\nGreat point!\n\nAwesome 🎉\nLove it";
        let lines = parse_suggestion_lines(raw).unwrap();
        assert_eq!(lines, vec!["Great point!", "Awesome 🎉", "Love it"]);
    }

    #[test]
    fn test_suggestion_parse_drops_bullets() {
        let raw = "- bulleted\n• dotted\nKept line";
        let lines = parse_suggestion_lines(raw).unwrap();
        assert_eq!(lines, vec!["Kept line"]);
    }

    #[test]
    fn test_suggestion_parse_accepts_fewer_than_three() {
        let lines = parse_suggestion_lines("  Only one reply  ").unwrap();
        assert_eq!(lines, vec!["Only one reply"]);
    }

    #[test]
    fn test_suggestion_parse_keeps_verbatim_duplicates() {
        let lines = parse_suggestion_lines("Thanks!\nThanks!").unwrap();
        assert_eq!(lines, vec!["Thanks!", "Thanks!"]);
    }

    #[test]
    fn test_suggestion_parse_fails_when_nothing_survives() {
        let result = parse_suggestion_lines("1. one\n2. two\n\n- three\n");
        assert!(matches!(
            result,
            Err(CoreError::Llm(LlmError::EmptyGeneration))
        ));
    }

    #[test]
    fn test_numbered_lines_need_a_dot_to_be_dropped() {
        let lines = parse_suggestion_lines("10. dropped\n100% agree with this").unwrap();
        assert_eq!(lines, vec!["100% agree with this"]);
    }

    // The two modes are separate endpoints with incompatible output
    // contracts; this pins the divergence so it cannot be unified silently.
    #[test]
    fn test_modes_disagree_on_untagged_text() {
        let raw = "Great reply\nAnother option";

        let single = GenerationMode::SingleComment.parse(raw).unwrap();
        assert_eq!(single.len(), 2);
        assert!(single.iter().all(|reply| reply.comment_id.is_none()));

        let batch = GenerationMode::comment_batch(["a1"]).parse(raw);
        assert!(matches!(
            batch,
            Err(CoreError::Llm(LlmError::IncompleteGeneration {
                expected: 1,
                received: 0,
            }))
        ));
    }

    #[test]
    fn test_mode_parameters() {
        let batch = GenerationMode::comment_batch(["a1", "b2"]);
        assert_eq!(batch.requested_replies(), 2);
        assert_eq!(batch.params().max_tokens, 500);

        let single = GenerationMode::SingleComment;
        assert_eq!(single.requested_replies(), 3);
        assert_eq!(single.params().max_tokens, 400);
    }
}
