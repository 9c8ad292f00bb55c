//! Daily knowledge bot: binary entrypoint.
//! Loads configuration, wires the real HTTP capabilities into the pipeline
//! and maps the outcome to an exit status.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use daily_knowledge_bot::ai::perplexity::PerplexityClient;
use daily_knowledge_bot::artifacts::ArtifactStore;
use daily_knowledge_bot::confirm::{AutoApprove, PublishGate, TerminalPrompt};
use daily_knowledge_bot::illustration::gemini::GeminiImageClient;
use daily_knowledge_bot::illustration::ImageGenerator;
use daily_knowledge_bot::publish::linkedin::LinkedInClient;
use daily_knowledge_bot::publish::Publisher;
use daily_knowledge_bot::source::ledger::UsedSourceLedger;
use daily_knowledge_bot::topics::load_topics;
use daily_knowledge_bot::{
    BotConfig, BotError, Capabilities, ContentBundle, Identity, Pipeline, PipelineSettings,
    PublishOptions, PublishOutcome, RunOptions, Tone,
};

/// Daily knowledge bot: one topic, one fresh article, one post.
#[derive(Parser)]
#[command(name = "daily-knowledge-bot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find a fresh article for today's topic, summarize it and draft a social post")]
struct Cli {
    /// TOML config file (else $BOT_CONFIG_PATH, else config/bot.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging for the bot
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce today's fact and post drafts
    Run {
        /// Also generate an illustration
        #[arg(long)]
        image: bool,

        /// Leave the illustration without the brand mark
        #[arg(long)]
        no_mark: bool,

        #[arg(long, value_enum, default_value_t = Tone::Standard)]
        tone: Tone,

        /// Append the configured promotional trailer
        #[arg(long)]
        trailer: bool,
    },

    /// Produce drafts, confirm, then publish to LinkedIn
    Publish {
        /// Post as the person or as the organization page
        #[arg(long = "as", value_enum, default_value_t = Identity::Personal)]
        identity: Identity,

        /// Publish text only
        #[arg(long)]
        no_image: bool,

        /// Leave the illustration without the brand mark
        #[arg(long)]
        no_mark: bool,

        #[arg(long, value_enum, default_value_t = Tone::Standard)]
        tone: Tone,

        /// Append the configured promotional trailer
        #[arg(long)]
        trailer: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Stdout (compact, or JSON with LOG_FORMAT=json) plus a plain log file in
/// the output directory.
fn init_tracing(cfg: &BotConfig, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("daily_knowledge_bot=debug,warn")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("daily_knowledge_bot=info,warn"))
    };
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    fs::create_dir_all(&cfg.paths.output_dir)
        .with_context(|| format!("creating {}", cfg.paths.output_dir.display()))?;
    let log_path = cfg.log_path();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer().compact()))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(())
}

/// Text capabilities are mandatory; the image generator is optional and only
/// built when asked for; the publisher only for `publish`.
fn build_capabilities(cfg: &BotConfig, want_images: bool, want_publisher: bool) -> Result<Capabilities> {
    let perplexity = Arc::new(PerplexityClient::new(cfg.perplexity_settings()?)?);

    let images: Option<Arc<dyn ImageGenerator>> = if want_images {
        match cfg.gemini_settings() {
            Ok(settings) => Some(Arc::new(GeminiImageClient::new(settings)?)),
            Err(e) => {
                warn!(error = %e, "image generation unavailable, continuing without images");
                None
            }
        }
    } else {
        None
    };

    let publisher: Option<Arc<dyn Publisher>> = if want_publisher {
        Some(Arc::new(LinkedInClient::new(cfg.linkedin_settings()?)?))
    } else {
        None
    };

    Ok(Capabilities {
        search: perplexity.clone(),
        summarizer: perplexity.clone(),
        writer: perplexity,
        images,
        publisher,
    })
}

fn build_pipeline(cfg: &BotConfig, caps: Capabilities) -> Pipeline {
    Pipeline::new(
        caps,
        load_topics(&cfg.paths.topics_file),
        ArtifactStore::new(&cfg.paths.output_dir),
        UsedSourceLedger::new(cfg.ledger_path()),
        PipelineSettings::from(cfg),
    )
}

fn report(bundle: &ContentBundle) {
    println!("Topic:  {}", bundle.topic);
    println!("Source: {}", bundle.source);
    println!("Fact:   {}", bundle.fact_path.display());
    println!("Post:   {}", bundle.post_path.display());
    match &bundle.image {
        Some(img) => println!("Image:  {}", img.path.display()),
        None => println!("Image:  none"),
    }
}

async fn execute(cli: Cli, cfg: &BotConfig) -> Result<()> {
    match cli.command {
        Commands::Run {
            image,
            no_mark,
            tone,
            trailer,
        } => {
            let pipeline = build_pipeline(cfg, build_capabilities(cfg, image, false)?);
            let opts = RunOptions {
                tone,
                generate_image: image,
                apply_mark: !no_mark,
                trailer,
                ..RunOptions::now()
            };
            let bundle = pipeline.run(&opts).await?;
            report(&bundle);
            println!("\n{}", bundle.post.text);
            info!("drafts ready; source is recorded only after publishing");
        }
        Commands::Publish {
            identity,
            no_image,
            no_mark,
            tone,
            trailer,
            yes,
        } => {
            let caps = build_capabilities(cfg, !no_image, true)?;
            let pipeline = build_pipeline(cfg, caps);
            let publish_opts = PublishOptions {
                identity,
                include_image: !no_image,
            };
            pipeline.check_publish(&publish_opts)?;
            let opts = RunOptions {
                tone,
                generate_image: !no_image,
                apply_mark: !no_mark,
                trailer,
                ..RunOptions::now()
            };
            let bundle = pipeline.run(&opts).await?;
            report(&bundle);

            let gate: Box<dyn PublishGate> = if yes {
                Box::new(AutoApprove)
            } else {
                Box::new(TerminalPrompt)
            };
            match pipeline.publish(&bundle, &publish_opts, gate.as_ref()).await? {
                PublishOutcome::Declined => println!("Not published. Drafts are kept."),
                PublishOutcome::Published(receipt) => println!(
                    "Published as {} (post id: {})",
                    receipt.identity,
                    receipt.post_id.as_deref().unwrap_or("unknown")
                ),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let cfg = match BotConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            return ExitCode::from(1);
        }
    };
    if let Err(e) = init_tracing(&cfg, cli.verbose) {
        eprintln!("logging setup failed: {e:#}");
        return ExitCode::from(1);
    }

    match execute(cli, &cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<BotError>()
                .map(BotError::exit_code)
                .unwrap_or(1);
            error!(error = %format!("{e:#}"), exit_code = code, "bot run ended with an error");
            if code == 0 {
                println!("Not published: {e}. Drafts are kept.");
            }
            ExitCode::from(code as u8)
        }
    }
}
