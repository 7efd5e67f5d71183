use commentquick_core::{Comment, CommentPage, CommentSortOrder, CoreError};
use tracing::{debug, info};

/// Hard cap the comment source imposes on a single page request.
pub const SOURCE_PAGE_CAP: u32 = 50;

/// One page of a cursor-paginated comment listing.
pub trait CommentSource {
    async fn fetch_page(
        &self,
        video_id: &str,
        page_token: Option<&str>,
        sort_order: CommentSortOrder,
        page_size: u32,
    ) -> Result<CommentPage, CoreError>;
}

/// Walks the comment source page by page until `target_count` comments are
/// collected or the source runs out, concatenating pages in receipt order.
///
/// Every invocation starts from the first page; cursors obtained under one
/// sort order are never carried into another fetch. Any page failure aborts
/// the whole aggregation. Ordering within pages is whatever the source
/// returned for the requested sort order.
pub async fn fetch_comments<S: CommentSource>(
    source: &S,
    video_id: &str,
    target_count: usize,
    sort_order: CommentSortOrder,
) -> Result<Vec<Comment>, CoreError> {
    let mut collected: Vec<Comment> = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let remaining = target_count.saturating_sub(collected.len());
        if remaining == 0 {
            break;
        }
        let page_size = remaining.min(SOURCE_PAGE_CAP as usize) as u32;

        let page = source
            .fetch_page(video_id, page_token.as_deref(), sort_order, page_size)
            .await?;
        debug!(
            "Fetched page of {} comments for video {} ({} collected)",
            page.comments.len(),
            video_id,
            collected.len()
        );

        collected.extend(page.comments);
        page_token = page.next_page_token;

        if collected.len() >= target_count || page_token.is_none() {
            break;
        }
    }

    // The last page may have over-fetched past the target
    collected.truncate(target_count);
    info!(
        "Aggregated {} comments for video {} (sort: {})",
        collected.len(),
        video_id,
        sort_order
    );
    Ok(collected)
}
