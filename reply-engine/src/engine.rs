use crate::retry::{RetryConfig, RetryExecutor};
use commentquick_core::{
    Comment, CommentSortOrder, CoreError, GeneratedReply, ReplySettings, UsageSnapshot, UserId,
    VideoContext,
};
use database::UsageStore;
use llm_interface::{
    build_batch_messages, build_suggestion_messages, ChatMessage, ChatModel, CommentRef,
    GenerationMode,
};
use tracing::{error, info, warn};
use uuid::Uuid;
use youtube_client::{extract_video_id, CommentSource, MetadataSource};

/// Upper bound on comments answered in one batch request.
pub const MAX_COMMENTS_PER_BATCH: usize = 5;

/// Composes comment retrieval, prompt construction, the model call, reply
/// parsing and quota accounting into one linear pipeline. Each stage fails
/// with its own error kind; a failure anywhere aborts the rest and returns
/// the quota reservation.
#[derive(Debug)]
pub struct ReplyEngine<S, M> {
    source: S,
    model: M,
    usage: UsageStore,
    retry: RetryExecutor,
}

impl<S, M> ReplyEngine<S, M>
where
    S: CommentSource + MetadataSource,
    M: ChatModel,
{
    pub fn new(source: S, model: M, usage: UsageStore, retry: RetryConfig) -> Self {
        Self {
            source,
            model,
            usage,
            retry: RetryExecutor::new(retry),
        }
    }

    /// Fetches up to `max_comments` comments for a video URL, in the order
    /// the source returns them for `sort_order`. Zero comments is a valid
    /// empty result.
    pub async fn fetch_comments(
        &self,
        video_url: &str,
        max_comments: usize,
        sort_order: CommentSortOrder,
    ) -> Result<Vec<Comment>, CoreError> {
        let video_id = extract_video_id(video_url)?;
        youtube_client::fetch_comments(&self.source, &video_id, max_comments, sort_order).await
    }

    /// Fetches video metadata and shapes it for prompt use.
    pub async fn video_context(&self, video_url: &str) -> Result<VideoContext, CoreError> {
        let video_id = extract_video_id(video_url)?;
        let details = self.source.fetch_metadata(&video_id).await?;
        Ok(VideoContext::from(&details))
    }

    /// Generates one tagged reply per comment. Every input comment maps to
    /// exactly one reply or the whole call fails.
    pub async fn generate_replies(
        &self,
        user: &UserId,
        comments: &[Comment],
        settings: &ReplySettings,
        context: Option<&VideoContext>,
    ) -> Result<Vec<GeneratedReply>, CoreError> {
        if comments.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "at least one comment is required".to_string(),
            });
        }
        if comments.len() > MAX_COMMENTS_PER_BATCH {
            return Err(CoreError::InvalidInput {
                message: format!(
                    "at most {} comments per request, got {}",
                    MAX_COMMENTS_PER_BATCH,
                    comments.len()
                ),
            });
        }

        let refs: Vec<CommentRef<'_>> = comments.iter().map(CommentRef::from).collect();
        let mode = GenerationMode::comment_batch(comments.iter().map(|c| c.id.clone()));
        let messages = build_batch_messages(&refs, settings, context);
        self.run_generation(user, mode, messages).await
    }

    /// Generates up to three candidate replies to a single comment.
    pub async fn generate_suggestions(
        &self,
        user: &UserId,
        comment_text: &str,
        settings: &ReplySettings,
        context: Option<&VideoContext>,
    ) -> Result<Vec<String>, CoreError> {
        if comment_text.trim().is_empty() {
            return Err(CoreError::InvalidInput {
                message: "comment text is required".to_string(),
            });
        }

        let messages = build_suggestion_messages(comment_text, settings, context);
        let replies = self
            .run_generation(user, GenerationMode::SingleComment, messages)
            .await?;
        Ok(replies.into_iter().map(|reply| reply.text).collect())
    }

    /// Current quota snapshot for an identity.
    pub async fn usage(&self, user: &UserId) -> Result<UsageSnapshot, CoreError> {
        self.usage.usage(user.as_str()).await
    }

    async fn run_generation(
        &self,
        user: &UserId,
        mode: GenerationMode,
        messages: Vec<ChatMessage>,
    ) -> Result<Vec<GeneratedReply>, CoreError> {
        let request_id = short_request_id();
        let requested = mode.requested_replies() as i64;

        // The reservation settles strictly before the model runs
        self.usage.reserve(user.as_str(), requested).await?;
        info!(
            "[{}] Reserved {} replies for {}",
            request_id, requested, user
        );

        match self.complete_and_parse(&mode, &messages).await {
            Ok(replies) => {
                let delivered = replies.len() as i64;
                self.usage
                    .commit(user.as_str(), requested, delivered)
                    .await?;
                info!("[{}] Generated {} replies", request_id, delivered);
                Ok(replies)
            }
            Err(stage_error) => {
                if let Err(release_error) = self.usage.release(user.as_str(), requested).await {
                    // The stage failure is what the caller must see; an
                    // unreleased reservation only over-counts
                    warn!(
                        "[{}] Failed to release reservation: {}",
                        request_id, release_error
                    );
                }
                error!("[{}] Generation failed: {}", request_id, stage_error);
                Err(stage_error)
            }
        }
    }

    async fn complete_and_parse(
        &self,
        mode: &GenerationMode,
        messages: &[ChatMessage],
    ) -> Result<Vec<GeneratedReply>, CoreError> {
        let params = mode.params();
        let model = &self.model;
        self.retry
            .execute("reply_generation", move || async move {
                let raw = model.complete(messages, params).await?;
                mode.parse(&raw)
            })
            .await
    }
}

fn short_request_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use commentquick_core::{CommentPage, LlmError, QuotaError, VideoDetails};
    use database::Database;
    use llm_interface::GenerationParams;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeModel {
        responses: Mutex<VecDeque<Result<String, CoreError>>>,
        calls: AtomicUsize,
    }

    impl FakeModel {
        fn scripted<I>(responses: I) -> Self
        where
            I: IntoIterator<Item = Result<String, CoreError>>,
        {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn replying(text: &str) -> Self {
            Self::scripted([Ok(text.to_string())])
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChatModel for &FakeModel {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _params: GenerationParams,
        ) -> Result<String, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(CoreError::Internal {
                        message: "no scripted response left".to_string(),
                    })
                })
        }
    }

    struct FakeSource {
        comments: Vec<Comment>,
    }

    impl CommentSource for FakeSource {
        async fn fetch_page(
            &self,
            _video_id: &str,
            _page_token: Option<&str>,
            _sort_order: CommentSortOrder,
            page_size: u32,
        ) -> Result<CommentPage, CoreError> {
            let comments: Vec<Comment> = self
                .comments
                .iter()
                .take(page_size as usize)
                .cloned()
                .collect();
            Ok(CommentPage {
                total_results: comments.len() as i64,
                comments,
                next_page_token: None,
            })
        }
    }

    impl MetadataSource for FakeSource {
        async fn fetch_metadata(&self, _video_id: &str) -> Result<VideoDetails, CoreError> {
            Ok(VideoDetails {
                title: "Studio Tour".to_string(),
                description: "Behind   the scenes.".to_string(),
                thumbnail_url: None,
            })
        }
    }

    fn make_comment(id: &str) -> Comment {
        Comment {
            id: id.to_string(),
            text: format!("comment {id}"),
            author_display_name: "viewer".to_string(),
            author_profile_image_url: None,
            published_at: "1 hour ago".to_string(),
            like_count: 0,
            reply_count: 0,
        }
    }

    async fn setup_usage(ceiling: i64) -> UsageStore {
        let db_path = std::env::temp_dir().join(format!(
            "test_reply_engine_{}.db",
            Uuid::new_v4()
        ));
        let db = Database::connect(&format!("sqlite://{}", db_path.display()))
            .await
            .expect("Failed to connect to test database");
        db.run_migrations().await.expect("Failed to run migrations");
        UsageStore::new(&db, ceiling)
    }

    async fn engine_with<'a>(
        model: &'a FakeModel,
        ceiling: i64,
    ) -> ReplyEngine<FakeSource, &'a FakeModel> {
        let source = FakeSource {
            comments: vec![make_comment("a1"), make_comment("b2"), make_comment("c3")],
        };
        let usage = setup_usage(ceiling).await;
        ReplyEngine::new(source, model, usage, RetryConfig::default())
    }

    fn user() -> UserId {
        UserId::new("user-123").unwrap()
    }

    #[tokio::test]
    async fn test_batch_generation_commits_one_reply_per_comment() {
        let model = FakeModel::replying("Reply a1: Thanks so much!\nReply b2: Great question!");
        let engine = engine_with(&model, 100).await;
        let comments = vec![make_comment("a1"), make_comment("b2")];

        let replies = engine
            .generate_replies(&user(), &comments, &ReplySettings::default(), None)
            .await
            .unwrap();

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].comment_id.as_deref(), Some("a1"));
        assert_eq!(engine.usage(&user()).await.unwrap().used, 2);
    }

    #[tokio::test]
    async fn test_quota_rejection_happens_before_the_model_runs() {
        let model = FakeModel::replying("Reply a1: unused");
        let engine = engine_with(&model, 100).await;
        engine.usage.reserve(user().as_str(), 99).await.unwrap();

        let comments = vec![make_comment("a1"), make_comment("b2")];
        let result = engine
            .generate_replies(&user(), &comments, &ReplySettings::default(), None)
            .await;

        assert!(matches!(
            result,
            Err(CoreError::Quota(QuotaError::LimitExceeded {
                used: 99,
                requested: 2,
                limit: 100,
            }))
        ));
        assert_eq!(model.calls(), 0);
        assert_eq!(engine.usage(&user()).await.unwrap().used, 99);
    }

    #[tokio::test]
    async fn test_parse_failure_releases_the_reservation() {
        let model = FakeModel::replying("I could not think of anything to say.");
        let engine = engine_with(&model, 100).await;
        let comments = vec![make_comment("a1"), make_comment("b2")];

        let result = engine
            .generate_replies(&user(), &comments, &ReplySettings::default(), None)
            .await;

        assert!(matches!(
            result,
            Err(CoreError::Llm(LlmError::IncompleteGeneration { .. }))
        ));
        assert_eq!(engine.usage(&user()).await.unwrap().used, 0);
    }

    #[tokio::test]
    async fn test_suggestions_commit_only_what_was_delivered() {
        let model = FakeModel::replying("Love it!\nThanks a bunch!");
        let engine = engine_with(&model, 100).await;

        let suggestions = engine
            .generate_suggestions(&user(), "Great video!", &ReplySettings::default(), None)
            .await
            .unwrap();

        assert_eq!(suggestions, vec!["Love it!", "Thanks a bunch!"]);
        // Three were reserved, two delivered
        assert_eq!(engine.usage(&user()).await.unwrap().used, 2);
    }

    #[tokio::test]
    async fn test_batch_size_validation() {
        let model = FakeModel::replying("unused");
        let engine = engine_with(&model, 100).await;

        let result = engine
            .generate_replies(&user(), &[], &ReplySettings::default(), None)
            .await;
        assert!(matches!(result, Err(CoreError::InvalidInput { .. })));

        let oversized: Vec<Comment> = (0..6).map(|i| make_comment(&format!("c{i}"))).collect();
        let result = engine
            .generate_replies(&user(), &oversized, &ReplySettings::default(), None)
            .await;
        assert!(matches!(result, Err(CoreError::InvalidInput { .. })));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_comment_text_is_rejected() {
        let model = FakeModel::replying("unused");
        let engine = engine_with(&model, 100).await;
        let result = engine
            .generate_suggestions(&user(), "   ", &ReplySettings::default(), None)
            .await;
        assert!(matches!(result, Err(CoreError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_configured_retry_regenerates_after_transient_failure() {
        let model = FakeModel::scripted([
            Err(CoreError::Llm(LlmError::ServiceUnavailable {
                provider: "openai".to_string(),
            })),
            Ok("Reply a1: second try worked".to_string()),
        ]);
        let source = FakeSource {
            comments: vec![make_comment("a1")],
        };
        let usage = setup_usage(100).await;
        let retry = RetryConfig {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        };
        let engine = ReplyEngine::new(source, &model, usage, retry);

        let replies = engine
            .generate_replies(
                &user(),
                &[make_comment("a1")],
                &ReplySettings::default(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(replies[0].text, "second try worked");
        assert_eq!(model.calls(), 2);
        assert_eq!(engine.usage(&user()).await.unwrap().used, 1);
    }

    #[tokio::test]
    async fn test_fetch_comments_resolves_the_video_url() {
        let model = FakeModel::replying("unused");
        let engine = engine_with(&model, 100).await;

        let comments = engine
            .fetch_comments(
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                2,
                CommentSortOrder::Relevance,
            )
            .await
            .unwrap();
        assert_eq!(comments.len(), 2);

        let result = engine
            .fetch_comments("https://example.com/nope", 2, CommentSortOrder::Relevance)
            .await;
        assert!(matches!(result, Err(CoreError::YouTube(_))));
    }

    #[tokio::test]
    async fn test_video_context_is_sanitized() {
        let model = FakeModel::replying("unused");
        let engine = engine_with(&model, 100).await;

        let context = engine
            .video_context("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap();
        assert_eq!(context.title, "Studio Tour");
        assert_eq!(context.description, "Behind the scenes.");
    }
}
