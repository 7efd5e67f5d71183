use clap::{Parser, Subcommand};
use commentquick_core::{
    AppConfig, CommentSortOrder, CoreError, ErrorExt, ErrorReporter, ReplyLength, ReplySettings,
    Tone, UserId,
};
use database::{Database, UsageStore};
use llm_interface::OpenAiClient;
use reply_engine::{ReplyEngine, RetryConfig, MAX_COMMENTS_PER_BATCH};
use std::path::PathBuf;
use youtube_client::YouTubeApiClient;

#[derive(Parser)]
#[command(name = "commentquick", version, about = "AI-drafted replies to YouTube comments")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Identity token the reply quota is attributed to
    #[arg(long, global = true, default_value = "local-user")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch comments for a video
    Fetch {
        video_url: String,
        #[arg(long, default_value_t = 20)]
        max: usize,
        /// Source-side ordering: relevance or time
        #[arg(long, default_value = "relevance")]
        sort: String,
    },
    /// Generate one tagged reply per fetched comment
    Reply {
        video_url: String,
        /// How many comments to answer (capped per request)
        #[arg(long, default_value_t = MAX_COMMENTS_PER_BATCH)]
        comments: usize,
        #[arg(long, default_value = "professional")]
        tone: String,
        #[arg(long, default_value = "medium")]
        length: String,
        #[arg(long)]
        no_emojis: bool,
        #[arg(long, default_value = "")]
        instructions: String,
    },
    /// Generate candidate replies to a single comment
    Suggest {
        text: String,
        #[arg(long, default_value = "professional")]
        tone: String,
        #[arg(long, default_value = "medium")]
        length: String,
        #[arg(long)]
        no_emojis: bool,
        #[arg(long, default_value = "")]
        instructions: String,
    },
    /// Show quota usage for the identity
    Usage,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "commentquick=info".to_string()),
        )
        .init();

    tracing::info!("Starting CommentQuick - AI comment replies");

    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        ErrorReporter::new().report_error(&error);
        return Err(anyhow::anyhow!(error.user_friendly_message()));
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CoreError> {
    let config = AppConfig::load(cli.config.as_deref())?;

    let database = Database::connect(&config.database.url).await?;
    database.run_migrations().await?;
    let usage = UsageStore::new(&database, config.quota.ceiling);

    let youtube = YouTubeApiClient::new(&config.youtube);
    let model = OpenAiClient::new(&config.openai);
    let engine = ReplyEngine::new(youtube, model, usage, RetryConfig::from(&config.retry));
    let user = UserId::new(cli.user)?;

    match cli.command {
        Command::Fetch {
            video_url,
            max,
            sort,
        } => {
            let sort_order = parse_sort(&sort)?;
            let comments = engine.fetch_comments(&video_url, max, sort_order).await?;
            if comments.is_empty() {
                println!("No comments found.");
            }
            for comment in &comments {
                println!(
                    "[{}] {} ({}, {} likes)\n  {}",
                    comment.id,
                    comment.author_display_name,
                    comment.published_at,
                    comment.like_count,
                    comment.text
                );
            }
        }
        Command::Reply {
            video_url,
            comments,
            tone,
            length,
            no_emojis,
            instructions,
        } => {
            let settings = build_settings(&tone, &length, no_emojis, instructions);
            let count = comments.min(MAX_COMMENTS_PER_BATCH);
            let fetched = engine
                .fetch_comments(&video_url, count, CommentSortOrder::Relevance)
                .await?;
            if fetched.is_empty() {
                println!("No comments to reply to.");
                return Ok(());
            }
            let context = engine.video_context(&video_url).await?;
            let replies = engine
                .generate_replies(&user, &fetched, &settings, Some(&context))
                .await?;
            for reply in &replies {
                println!(
                    "Reply {}: {}",
                    reply.comment_id.as_deref().unwrap_or("-"),
                    reply.text
                );
            }
        }
        Command::Suggest {
            text,
            tone,
            length,
            no_emojis,
            instructions,
        } => {
            let settings = build_settings(&tone, &length, no_emojis, instructions);
            let suggestions = engine
                .generate_suggestions(&user, &text, &settings, None)
                .await?;
            for (index, suggestion) in suggestions.iter().enumerate() {
                println!("{}. {}", index + 1, suggestion);
            }
        }
        Command::Usage => {
            let snapshot = engine.usage(&user).await?;
            println!(
                "{} of {} replies used ({} remaining)",
                snapshot.used,
                snapshot.limit,
                snapshot.remaining()
            );
        }
    }
    Ok(())
}

fn parse_sort(value: &str) -> Result<CommentSortOrder, CoreError> {
    match value.to_ascii_lowercase().as_str() {
        "relevance" => Ok(CommentSortOrder::Relevance),
        "time" => Ok(CommentSortOrder::Time),
        other => Err(CoreError::InvalidInput {
            message: format!("unknown sort order: {}", other),
        }),
    }
}

fn build_settings(
    tone: &str,
    length: &str,
    no_emojis: bool,
    instructions: String,
) -> ReplySettings {
    ReplySettings {
        tone: Tone::from(tone),
        length: ReplyLength::from(length),
        use_emojis: !no_emojis,
        custom_instructions: instructions,
    }
}
