use commentquick_core::{CoreError, YouTubeApiError};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

fn video_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid video id pattern"))
}

/// Pulls the 11-character video id out of the URL forms viewers paste:
/// watch pages, youtu.be short links, embeds and Shorts.
pub fn extract_video_id(input: &str) -> Result<String, CoreError> {
    let invalid = || {
        CoreError::YouTube(YouTubeApiError::InvalidVideoUrl {
            url: input.to_string(),
        })
    };

    let url = Url::parse(input)
        .or_else(|_| Url::parse(&format!("https://{}", input)))
        .map_err(|_| invalid())?;
    let host = url.host_str().ok_or_else(invalid)?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    let host = host.strip_prefix("m.").unwrap_or(host);

    let candidate = match host {
        "youtu.be" => url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_string),
        "youtube.com" | "music.youtube.com" => {
            let segments: Vec<&str> = url
                .path_segments()
                .map(|segments| segments.collect())
                .unwrap_or_default();
            match segments.first().copied() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("shorts") | Some("embed") | Some("v") | Some("live") => {
                    segments.get(1).map(|s| s.to_string())
                }
                _ => None,
            }
        }
        _ => None,
    };

    match candidate {
        Some(id) if video_id_re().is_match(&id) => Ok(id),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_urls() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://m.youtube.com/watch?v=dQw4w9WgXcQ&t=43s").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_short_links() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("youtu.be/dQw4w9WgXcQ?si=share").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_shorts_and_embeds() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_rejects_non_video_urls() {
        assert!(extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ").is_err());
        assert!(extract_video_id("https://www.youtube.com/feed/subscriptions").is_err());
        assert!(extract_video_id("https://www.youtube.com/watch?v=tooshort").is_err());
        assert!(extract_video_id("not a url at all").is_err());
    }
}
