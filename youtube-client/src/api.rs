use crate::pagination::CommentSource;
use crate::text::{decode_html_entities, relative_time_string};
use chrono::{DateTime, Utc};
use commentquick_core::{
    truncate_description, Comment, CommentPage, CommentSortOrder, CoreError, VideoDetails,
    YouTubeApiError, YouTubeConfig,
};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

const USER_AGENT: &str = "commentquick/0.1";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadListResponse {
    /// Absent when a video has no comments; any non-sequence shape is a
    /// protocol violation and fails deserialization outright.
    #[serde(default)]
    pub items: Vec<CommentThread>,
    pub next_page_token: Option<String>,
    pub page_info: Option<PageInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total_results: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentThread {
    pub id: String,
    pub snippet: CommentThreadSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadSnippet {
    pub top_level_comment: TopLevelComment,
    #[serde(default)]
    pub total_reply_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopLevelComment {
    pub snippet: CommentSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSnippet {
    pub text_display: String,
    pub author_display_name: String,
    pub author_profile_image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub like_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoItem {
    pub snippet: VideoSnippet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnails {
    pub medium: Option<Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorItem {
    reason: Option<String>,
}

/// Title and description provider for the video a batch of comments
/// belongs to.
pub trait MetadataSource {
    async fn fetch_metadata(&self, video_id: &str) -> Result<VideoDetails, CoreError>;
}

#[derive(Debug)]
pub struct YouTubeApiClient {
    http_client: Client,
    api_base: String,
    api_key: String,
}

impl YouTubeApiClient {
    pub fn new(config: &YouTubeConfig) -> Self {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    async fn get(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> Result<Response, CoreError> {
        let url = format!("{}/{}", self.api_base, endpoint);
        info!("Making YouTube API request: GET {}", endpoint);

        let result = self
            .http_client
            .get(&url)
            .query(query_params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(e) => {
                error!("Network error for GET {}: {}", endpoint, e);
                if e.is_timeout() {
                    Err(CoreError::YouTube(YouTubeApiError::RequestTimeout))
                } else {
                    Err(CoreError::Network(e))
                }
            }
        }
    }

    /// Maps a non-success status onto the typed error family, reading the
    /// error envelope for the YouTube-specific failure reason.
    async fn map_error_status(
        &self,
        response: Response,
        endpoint: &str,
        video_id: &str,
    ) -> CoreError {
        let status = response.status();
        let reason = match response.json::<ApiErrorEnvelope>().await {
            Ok(envelope) => envelope.error,
            Err(_) => None,
        };
        let api_reason = reason
            .as_ref()
            .and_then(|body| body.errors.first())
            .and_then(|item| item.reason.clone())
            .unwrap_or_default();
        let message = reason
            .and_then(|body| body.message)
            .unwrap_or_else(|| "no error details".to_string());
        error!(
            "Request failed with status {} for {} (reason: {})",
            status, endpoint, api_reason
        );

        let api_error = match status.as_u16() {
            400 | 404 => YouTubeApiError::VideoNotFound {
                video_id: video_id.to_string(),
            },
            401 => YouTubeApiError::InvalidApiKey,
            403 => match api_reason.as_str() {
                "commentsDisabled" => YouTubeApiError::CommentsDisabled {
                    video_id: video_id.to_string(),
                },
                "quotaExceeded" | "rateLimitExceeded" => {
                    YouTubeApiError::RateLimitExceeded { retry_after: 60 }
                }
                _ => YouTubeApiError::Forbidden {
                    resource: endpoint.to_string(),
                },
            },
            429 => YouTubeApiError::RateLimitExceeded { retry_after: 60 },
            s if s >= 500 => YouTubeApiError::ServerError { status_code: s },
            s => YouTubeApiError::InvalidResponse {
                details: format!("unexpected status {} for {}: {}", s, endpoint, message),
            },
        };
        CoreError::YouTube(api_error)
    }

    pub async fn fetch_comments_page(
        &self,
        video_id: &str,
        page_token: Option<&str>,
        sort_order: CommentSortOrder,
        page_size: u32,
    ) -> Result<CommentPage, CoreError> {
        let page_size_str = page_size.to_string();
        let mut params = vec![
            ("part", "snippet"),
            ("videoId", video_id),
            ("maxResults", page_size_str.as_str()),
            ("order", sort_order.as_str()),
            ("textFormat", "plainText"),
            ("moderationStatus", "published"),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let response = self.get("commentThreads", &params).await?;
        if !response.status().is_success() {
            return Err(self
                .map_error_status(response, "commentThreads", video_id)
                .await);
        }

        let body: CommentThreadListResponse = response.json().await.map_err(|e| {
            error!("Failed to parse comment threads: {}", e);
            YouTubeApiError::InvalidResponse {
                details: format!("malformed comment listing for video {}", video_id),
            }
        })?;

        let now = Utc::now();
        let total_results = body
            .page_info
            .and_then(|info| info.total_results)
            .unwrap_or(body.items.len() as i64);
        let comments: Vec<Comment> = body
            .items
            .into_iter()
            .map(|thread| comment_from_thread(thread, now))
            .collect();

        debug!(
            "Retrieved {} comments for video {} (next page: {})",
            comments.len(),
            video_id,
            body.next_page_token.is_some()
        );
        Ok(CommentPage {
            comments,
            next_page_token: body.next_page_token,
            total_results,
        })
    }

    pub async fn fetch_video_details(&self, video_id: &str) -> Result<VideoDetails, CoreError> {
        let params = [("part", "snippet"), ("id", video_id)];

        let response = self.get("videos", &params).await?;
        if !response.status().is_success() {
            return Err(self.map_error_status(response, "videos", video_id).await);
        }

        let body: VideoListResponse = response.json().await.map_err(|e| {
            error!("Failed to parse video details: {}", e);
            YouTubeApiError::InvalidResponse {
                details: format!("malformed video listing for {}", video_id),
            }
        })?;

        let item = body.items.into_iter().next().ok_or_else(|| {
            CoreError::YouTube(YouTubeApiError::VideoNotFound {
                video_id: video_id.to_string(),
            })
        })?;

        debug!("Retrieved video details for {}", video_id);
        Ok(VideoDetails {
            title: item.snippet.title,
            description: truncate_description(&item.snippet.description).to_string(),
            thumbnail_url: item
                .snippet
                .thumbnails
                .and_then(|t| t.medium)
                .map(|t| t.url),
        })
    }
}

impl CommentSource for YouTubeApiClient {
    async fn fetch_page(
        &self,
        video_id: &str,
        page_token: Option<&str>,
        sort_order: CommentSortOrder,
        page_size: u32,
    ) -> Result<CommentPage, CoreError> {
        self.fetch_comments_page(video_id, page_token, sort_order, page_size)
            .await
    }
}

impl MetadataSource for YouTubeApiClient {
    async fn fetch_metadata(&self, video_id: &str) -> Result<VideoDetails, CoreError> {
        self.fetch_video_details(video_id).await
    }
}

fn comment_from_thread(thread: CommentThread, now: DateTime<Utc>) -> Comment {
    let snippet = thread.snippet.top_level_comment.snippet;
    Comment {
        id: thread.id,
        text: decode_html_entities(&snippet.text_display),
        author_display_name: snippet.author_display_name,
        author_profile_image_url: snippet.author_profile_image_url,
        published_at: relative_time_string(snippet.published_at, now),
        like_count: snippet.like_count,
        reply_count: thread.snippet.total_reply_count,
    }
}
