//! SkyLibrary Uploadr - upload client for the SkyLibrary media backend
//!
//! Uploads files through pre-signed storage URLs and runs the media page
//! actions from the command line.

use anyhow::Context;
use clap::{Parser, Subcommand};
use skylibrary_uploadr::{
    backend::BackendClient,
    config::{Config, UploadMode},
    form::UploadForm,
    metrics,
    page::{
        ActionOutcome, MediaFilter, Message, MessageBoard, PageClient, SearchOutcome, Vote,
        VoteOutcome,
    },
    storage::ObjectStorageClient,
    telemetry,
    upload::{
        ChunkSource, ChunkedUploader, DirectUploader, FileSource, UploadOutcome, UploadPresenter,
        UploadState, Uploader,
    },
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

/// SkyLibrary Uploadr - chunked S3 uploads and media page actions
#[derive(Parser, Debug)]
#[command(name = "skylibrary-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Print collected metrics in Prometheus text format before exiting
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file and print its storage key
    Upload {
        path: PathBuf,

        /// Use a single pre-signed POST instead of multipart
        #[arg(long)]
        direct: bool,
    },

    /// Search media on a page
    Search {
        #[arg(long)]
        page: String,

        #[arg(long, default_value = "")]
        text: String,

        /// Tag names, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Filter media by title, author, tags, rating and uploader
    Filter {
        #[arg(long)]
        page: String,

        #[arg(long, default_value = "")]
        title: String,

        #[arg(long, default_value = "")]
        author: String,

        /// Tag ids, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long, default_value = "")]
        rating_direction: String,

        #[arg(long)]
        min_rating: Option<f64>,

        #[arg(long)]
        max_rating: Option<f64>,

        #[arg(long, default_value = "")]
        added_by: String,
    },

    /// Rate a media item from 1 to 5
    Rate {
        #[arg(long)]
        page: String,

        #[arg(long)]
        media_id: String,

        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
    },

    /// Post a comment or a reply
    Comment {
        #[arg(long)]
        page: String,

        #[arg(long)]
        content: String,

        /// Comment to reply to
        #[arg(long)]
        parent: Option<u64>,
    },

    /// Report a comment to moderators
    Report {
        #[arg(long)]
        page: String,

        #[arg(long)]
        comment_id: u64,

        #[arg(long)]
        reason: String,
    },

    /// Vote a comment up or down
    Vote {
        #[arg(long)]
        page: String,

        #[arg(long)]
        comment_id: u64,

        #[arg(long, conflicts_with = "down", required_unless_present = "down")]
        up: bool,

        #[arg(long)]
        down: bool,
    },

    /// Count a download and print the new total
    Download {
        #[arg(long)]
        page: String,
    },

    /// Fetch the next moderation task
    ModeratorTask {
        #[arg(long)]
        page: String,
    },
}

/// Logs what the upload form would display
struct ConsolePresenter;

impl UploadPresenter for ConsolePresenter {
    fn on_progress(&self, percent: u8) {
        info!(percent = percent, "Upload progress");
    }

    fn on_state(&self, state: UploadState) {
        info!(state = state.label(), "Upload state changed");
    }
}

/// One tab-separated line per result; false when the server sent messages
fn print_results(outcome: SearchOutcome) -> bool {
    for result in &outcome.results {
        let tags: Vec<&str> = result.tags.iter().map(|t| t.name.as_str()).collect();
        println!(
            "{}\t{}\t{}\t{}",
            result.title,
            result.rating,
            result.link,
            tags.join(",")
        );
    }
    let ok = outcome.messages.is_empty();
    print_messages(outcome.messages);
    ok
}

fn print_messages(messages: Vec<Message>) {
    let mut board = MessageBoard::default();
    board.replace(messages);
    for message in board.messages() {
        eprintln!("[{}] {}", message.tags, message.message);
    }
}

async fn run_upload(config: &Config, path: PathBuf, direct: bool) -> anyhow::Result<bool> {
    let backend = Arc::new(BackendClient::new(&config.backend)?);
    let store = Arc::new(ObjectStorageClient::new(config.backend.timeout())?);

    let mode = if direct {
        UploadMode::Direct
    } else {
        config.upload.mode
    };
    let uploader: Arc<dyn Uploader> = match mode {
        UploadMode::Chunked => Arc::new(ChunkedUploader::new(backend, store)),
        UploadMode::Direct => Arc::new(DirectUploader::new(backend, store)),
    };

    let source: Arc<dyn ChunkSource> = Arc::new(
        FileSource::open(&path)
            .await
            .with_context(|| format!("cannot open {}", path.display()))?,
    );

    let form = UploadForm::new(uploader, Arc::new(ConsolePresenter));
    let Some(mut handle) = form.select(vec![source]) else {
        return Ok(false);
    };

    let outcome = tokio::select! {
        result = &mut handle => result.context("upload task panicked")??,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling upload");
            form.cancel_and_wait(handle).await;
            return Ok(false);
        }
    };

    match outcome {
        UploadOutcome::Uploaded { file_key, .. } => {
            let submission = form.prepare_submit();
            println!("{}", file_key);
            info!(
                file_key = %submission.file_key,
                clear_previous = submission.clear_previous,
                "Ready to submit"
            );
            Ok(true)
        }
        UploadOutcome::Failed {
            failed_part,
            reason,
            ..
        } => {
            eprintln!(
                "Upload failed{}: {}",
                failed_part
                    .map(|p| format!(" at part {}", p))
                    .unwrap_or_default(),
                reason
            );
            Ok(false)
        }
        UploadOutcome::Cancelled => Ok(false),
    }
}

async fn run(config: &Config, command: Command) -> anyhow::Result<bool> {
    let page_client = || PageClient::new(&config.backend);

    match command {
        Command::Upload { path, direct } => run_upload(config, path, direct).await,
        Command::Search { page, text, tags } => {
            let outcome = page_client()?.search(&page, &text, &tags).await?;
            Ok(print_results(outcome))
        }
        Command::Filter {
            page,
            title,
            author,
            tags,
            rating_direction,
            min_rating,
            max_rating,
            added_by,
        } => {
            let filter = MediaFilter {
                title,
                author,
                tags,
                rating_direction,
                rating_minimum_value: min_rating,
                rating_maximum_value: max_rating,
                user_who_added: added_by,
            };
            let outcome = page_client()?.filter(&page, &filter).await?;
            Ok(print_results(outcome))
        }
        Command::Rate {
            page,
            media_id,
            rating,
        } => {
            match page_client()?.rate_media(&page, &media_id, rating).await? {
                Some(average) => println!("{}", average),
                None => eprintln!("Rating was not accepted"),
            }
            Ok(true)
        }
        Command::Comment {
            page,
            parent,
            content,
        } => report_action(page_client()?.comment(&page, &content, parent).await?),
        Command::Report {
            page,
            comment_id,
            reason,
        } => report_action(page_client()?.report(&page, comment_id, &reason).await?),
        Command::Vote {
            page,
            comment_id,
            up,
            ..
        } => {
            let vote = if up { Vote::Up } else { Vote::Down };
            match page_client()?.vote(&page, comment_id, vote).await? {
                VoteOutcome::Counted { rating } => {
                    println!("{}", rating);
                    Ok(true)
                }
                VoteOutcome::ValidationFailed(messages) => {
                    print_messages(messages);
                    Ok(false)
                }
            }
        }
        Command::Download { page } => {
            println!("{}", page_client()?.download(&page).await?);
            Ok(true)
        }
        Command::ModeratorTask { page } => {
            match page_client()?.receive_moderator_task(&page).await? {
                Some(task) => println!("{}", task),
                None => eprintln!("No moderation task available"),
            }
            Ok(true)
        }
    }
}

fn report_action(outcome: ActionOutcome) -> anyhow::Result<bool> {
    match outcome {
        ActionOutcome::Created(comment) => {
            println!("{}", comment.id);
            Ok(true)
        }
        ActionOutcome::Reported(message) => {
            println!("{}", message);
            Ok(true)
        }
        ActionOutcome::ValidationFailed(messages) => {
            print_messages(messages);
            Ok(false)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Load configuration
    let mut config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        Config::default()
    };
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    telemetry::init_subscriber(&config.logging)?;

    info!("Starting SkyLibrary Uploadr v{}", skylibrary_uploadr::VERSION);
    info!("Loaded configuration from {:?}", args.config);

    let success = run(&config, args.command).await?;

    if args.print_metrics && config.metrics.enabled {
        print!("{}", metrics::gather_text());
    }

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
