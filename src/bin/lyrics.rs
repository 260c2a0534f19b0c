#![forbid(unsafe_code)]

use std::fs;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lyrics_sentiment::server::{self, AppState};
use lyrics_sentiment::{AnalyzerConfig, LyricsAnalyzer, ProviderGateway, TracingUsageSink};

#[derive(Parser)]
#[command(name = "lyrics", version, about = "LLM sentiment analysis for song lyrics")]
struct Cli {
    /// Model id (overrides LYRICS_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Lines per model request (overrides LYRICS_BATCH_SIZE)
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze lyrics from a file, inline text, or stdin and print JSON
    Analyze {
        /// Read lyrics from this file
        #[arg(long, group = "source")]
        input: Option<PathBuf>,

        /// Inline lyrics
        #[arg(long, group = "source")]
        text: Option<String>,

        /// Write the result here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Serve POST /api/analyze
    Serve {
        #[arg(long, env = "LYRICS_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lyrics_sentiment=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = AnalyzerConfig::from_env()?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(batch_size) = cli.batch_size {
        if batch_size == 0 {
            return Err("--batch-size must be >= 1".into());
        }
        config.batch_size = batch_size;
    }

    let gateway = ProviderGateway::from_env(Arc::new(TracingUsageSink))?;
    let analyzer = Arc::new(LyricsAnalyzer::new(Arc::new(gateway), config));

    match cli.command {
        Commands::Analyze { input, text, out } => {
            let lyrics = match (input, text) {
                (Some(path), _) => fs::read_to_string(path)?,
                (None, Some(text)) => text,
                (None, None) => {
                    let mut buf = String::new();
                    io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };

            let result = analyzer.analyze(&lyrics).await?;
            let json = serde_json::to_string_pretty(&result)?;
            match out {
                Some(path) => fs::write(path, json)?,
                None => println!("{json}"),
            }
        }
        Commands::Serve { bind } => {
            server::serve(bind, AppState::new(analyzer)).await?;
        }
    }

    Ok(())
}
