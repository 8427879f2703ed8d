use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobclip::config::Config;
use jobclip::models::{ApplicationStatus, FieldKind, PostingId, PostingPreview, PostingSource};
use jobclip::normalize::Normalizer;
use jobclip::{Confirmer, Database, Fetcher, OrchestrationError, Orchestrator, PostingEdits, PostingStore, SuggestionIndex};

#[derive(Parser)]
#[command(name = "jobclip")]
#[command(about = "Capture job postings from a URL and track your applications")]
struct Cli {
    /// SQLite database path (overrides JOBCLIP_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Fetch every site with plain HTTP instead of a browser
    #[arg(long, global = true)]
    no_render: bool,

    /// Per-fetch deadline in seconds (overrides JOBCLIP_FETCH_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// WebDriver endpoint (overrides JOBCLIP_WEBDRIVER_URL)
    #[arg(long, global = true)]
    webdriver_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Fetch a posting and show what would be saved, without saving it
    Preview {
        url: String,

        /// Print the preview as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch a posting and save it as an application
    Add {
        url: String,

        #[arg(short, long)]
        company: Option<String>,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long, value_enum)]
        status: Option<ApplicationStatus>,

        #[arg(short, long)]
        notes: Option<String>,

        /// Skip fetching and save only what is given on the command line
        #[arg(long)]
        manual: bool,
    },

    /// List saved postings
    List {
        #[arg(short, long, value_enum)]
        status: Option<ApplicationStatus>,

        /// linkedin, glassdoor, indeed or unknown
        #[arg(long)]
        source: Option<PostingSource>,
    },

    /// Show a saved posting
    Show { id: i64 },

    /// Update the application status of a posting
    Status {
        id: i64,
        #[arg(value_enum)]
        status: ApplicationStatus,
    },

    /// Print or save the page captured when the posting was added
    Snapshot {
        id: i64,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a posting and its snapshot
    Delete { id: i64 },

    /// Suggest titles or companies from saved postings
    Suggest {
        query: String,

        #[arg(short, long, value_enum, default_value_t = FieldKind::Title)]
        kind: FieldKind,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if cli.no_render {
        config.render = false;
    }
    if let Some(secs) = cli.timeout {
        config.set_fetch_timeout_secs(secs);
    }
    if let Some(url) = &cli.webdriver_url {
        config.webdriver_url = url.clone();
    }
    Ok(config)
}

fn load_index(db: &Database, config: &Config) -> Result<Arc<SuggestionIndex>> {
    let corpus = db.suggestion_corpus()?;
    Ok(Arc::new(SuggestionIndex::from_corpus(corpus, config.suggestion_limit)))
}

fn orchestrator(config: &Config, index: Arc<SuggestionIndex>) -> Result<Orchestrator> {
    let fetcher = Fetcher::new(&config.fetch_settings())?;
    Ok(Orchestrator::new(
        Arc::new(fetcher),
        index,
        Normalizer::new(config.preview_chars),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,html5ever=warn,selectors=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let db = Database::open(&config.db_path)?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Preview { url, json } => {
            db.ensure_initialized()?;
            let index = load_index(&db, &config)?;
            let preview = orchestrator(&config, index)?
                .preview(&url)
                .await
                .map_err(explain_preview_error)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&preview)?);
            } else {
                print_preview(&preview);
            }
        }

        Commands::Add {
            url,
            company,
            title,
            location,
            status,
            notes,
            manual,
        } => {
            db.ensure_initialized()?;
            let index = load_index(&db, &config)?;
            let edits = PostingEdits {
                company_name: company,
                job_title: title,
                location,
                description: None,
                status,
                notes,
            };
            let confirmer = Confirmer::new(&db, &index);

            let id = if manual {
                confirmer.confirm_manual(&url, edits)?
            } else {
                let preview = orchestrator(&config, Arc::clone(&index))?
                    .preview(&url)
                    .await
                    .map_err(explain_preview_error)?;
                print_preview(&preview);
                confirmer.confirm(&preview, edits)?
            };
            println!("Saved posting #{}", id);
        }

        Commands::List { status, source } => {
            db.ensure_initialized()?;
            let postings = db.list_postings(status, source)?;
            if postings.is_empty() {
                println!("No postings found.");
            } else {
                println!(
                    "{:<6} {:<10} {:<10} {:<30} {:<22} {:<10}",
                    "ID", "STATUS", "SOURCE", "TITLE", "COMPANY", "APPLIED"
                );
                println!("{}", "-".repeat(92));
                for record in postings {
                    let p = &record.posting;
                    println!(
                        "{:<6} {:<10} {:<10} {:<30} {:<22} {:<10}",
                        record.id,
                        p.status,
                        p.source,
                        truncate(&p.job_title, 28),
                        truncate(&p.company_name, 20),
                        p.applied_at.format("%Y-%m-%d")
                    );
                }
            }
        }

        Commands::Show { id } => {
            db.ensure_initialized()?;
            match db.get_posting(PostingId(id))? {
                Some(record) => {
                    let p = &record.posting;
                    println!("Posting #{}", record.id);
                    println!("Title: {}", p.job_title);
                    println!("Company: {}", p.company_name);
                    if let Some(location) = &p.location {
                        println!("Location: {}", location);
                    }
                    println!("Status: {}", p.status);
                    println!("Source: {}", p.source);
                    println!("URL: {}", p.job_url);
                    if let Some(external_id) = &p.external_id {
                        println!("Job ID: {}", external_id);
                    }
                    println!("Applied: {}", p.applied_at.format("%Y-%m-%d %H:%M"));
                    println!("Snapshot: {}", if record.has_snapshot { "yes" } else { "no" });
                    if let Some(notes) = &p.notes {
                        println!("Notes: {}", notes);
                    }
                    if let Some(description) = &p.description {
                        println!("\n--- Description ---\n{}", description);
                    }
                }
                None => {
                    println!("Posting #{} not found.", id);
                }
            }
        }

        Commands::Status { id, status } => {
            db.ensure_initialized()?;
            if db.set_status(PostingId(id), status)? {
                println!("Posting #{} marked as {}.", id, status);
            } else {
                return Err(anyhow!("Posting #{} not found", id));
            }
        }

        Commands::Snapshot { id, output } => {
            db.ensure_initialized()?;
            let snapshot = db
                .get_snapshot(PostingId(id))?
                .ok_or_else(|| anyhow!("No snapshot stored for posting #{}", id))?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &snapshot.html)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!(
                        "Snapshot of {} (captured {}) written to {}",
                        snapshot.final_url,
                        snapshot.captured_at.format("%Y-%m-%d %H:%M"),
                        path.display()
                    );
                }
                None => print!("{}", snapshot.html),
            }
        }

        Commands::Delete { id } => {
            db.ensure_initialized()?;
            if db.delete_posting(PostingId(id))? {
                println!("Deleted posting #{}.", id);
            } else {
                println!("Posting #{} not found.", id);
            }
        }

        Commands::Suggest { query, kind } => {
            db.ensure_initialized()?;
            let index = load_index(&db, &config)?;
            for suggestion in index.query(&query, kind) {
                println!("{}", suggestion);
            }
        }
    }

    Ok(())
}

fn explain_preview_error(err: OrchestrationError) -> anyhow::Error {
    if matches!(err, OrchestrationError::FetchFailed(_)) {
        anyhow::Error::new(err).context("Could not fetch the posting; use 'jobclip add --manual' to enter it by hand")
    } else {
        err.into()
    }
}

fn print_preview(preview: &PostingPreview) {
    let fields = &preview.fields;
    let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    println!("Source:   {} (strategy: {})", preview.source, preview.strategy);
    println!("URL:      {}", preview.url);
    println!("Title:    {}", show(&fields.job_title));
    println!("Company:  {}", show(&fields.company_name));
    println!("Location: {}", show(&fields.location));
    if let Some(external_id) = &preview.external_id {
        println!("Job ID:   {}", external_id);
    }
    if let Some(text) = &fields.description_preview {
        println!("\n{}\n", text);
    }
    if !preview.suggested_titles.is_empty() {
        println!("Similar titles: {}", preview.suggested_titles.join(", "));
    }
    if let Some(reason) = &preview.fallback_reason {
        println!("Note: used generic extraction ({})", reason);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
