//! crosspost - publish posts to Reddit and X at the same time

use anyhow::Context;
use clap::{Parser, ValueEnum};
use libcrosspost::logging::{LogFormat, LoggingConfig};
use libcrosspost::{
    create_platforms, Config, CrosspostError, DispatchReport, Dispatcher, PostData, PostsFile,
    Result,
};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "crosspost")]
#[command(version)]
#[command(about = "Publish posts to Reddit and X concurrently", long_about = None)]
struct Cli {
    /// TOML file with one or more [[posts]] tables
    #[arg(long, value_name = "FILE", conflicts_with_all = ["title", "body", "target", "image"])]
    posts: Option<PathBuf>,

    /// Post title
    #[arg(long)]
    title: Option<String>,

    /// Post body
    #[arg(long)]
    body: Option<String>,

    /// Subreddit to submit to
    #[arg(long)]
    target: Option<String>,

    /// Image to attach
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Only publish to these platforms (repeatable or comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    platform: Vec<String>,

    /// Load credentials from this dotenv file instead of ./.env
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Report format on stdout
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log format on stderr (text, json or pretty)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.log_format, cli.verbose).init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let posts = collect_posts(&cli)?;
    let config = Config::load(cli.env_file.as_deref())?;

    let filter = (!cli.platform.is_empty()).then_some(cli.platform.as_slice());
    let platforms = create_platforms(&config, filter)?;
    debug!(
        "Dispatching {} post(s) to {} platform(s)",
        posts.len(),
        platforms.len()
    );

    let report = Dispatcher::new(platforms).run(&posts).await;

    if let Err(e) = print_report(&report, cli.format) {
        eprintln!("Error: {:#}", e);
        return Ok(report.exit_code().max(1));
    }

    Ok(report.exit_code())
}

/// Posts come from `--posts` or from the single-post flags, never both
fn collect_posts(cli: &Cli) -> Result<Vec<PostData>> {
    if let Some(path) = &cli.posts {
        let file = PostsFile::load_from_path(path)?;
        if file.posts.is_empty() {
            return Err(CrosspostError::InvalidInput(format!(
                "{} contains no [[posts]]",
                path.display()
            )));
        }
        return Ok(file.posts);
    }

    match (&cli.title, &cli.body, &cli.target) {
        (None, None, None) => Err(CrosspostError::InvalidInput(
            "No posts given: use --posts FILE or --title/--body/--target".to_string(),
        )),
        (Some(title), Some(body), Some(target)) => {
            let mut post = PostData::new(title.as_str(), body.as_str(), target.as_str());
            if let Some(image) = &cli.image {
                post = post.with_image(image.clone());
            }
            Ok(vec![post])
        }
        _ => Err(CrosspostError::InvalidInput(
            "--title, --body and --target must be given together".to_string(),
        )),
    }
}

fn print_report(report: &DispatchReport, format: OutputFormat) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(report).context("Failed to serialize report")?;
            writeln!(out, "{}", json)?;
        }
        OutputFormat::Text => {
            for result in &report.results {
                if result.success {
                    writeln!(
                        out,
                        "ok {} {} {}",
                        result.platform,
                        result.post_title,
                        result.platform_post_id.as_deref().unwrap_or("")
                    )?;
                } else {
                    writeln!(
                        out,
                        "failed {} {} {}: {}",
                        result.platform,
                        result.post_title,
                        result.error_kind.as_deref().unwrap_or("unknown"),
                        result.error.as_deref().unwrap_or("")
                    )?;
                }
            }
        }
    }

    out.flush().context("Failed to write report")?;
    Ok(())
}
