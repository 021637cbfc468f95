use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use tgw_core::{
    aggregate::MultiChatAggregator,
    config::Config,
    context::AnalysisContext,
    export::{user_stats, ChatExport},
    frequency::RegexFrequencyCounter,
    oracle::client::ClassifierClient,
    pipeline::ChatInput,
};
use tgw_openai::OpenAiOracle;

#[derive(Parser)]
#[command(
    name = "tgw",
    about = "Year-in-review analysis of chat exports",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List senders found in the exports, busiest first
    Users {
        /// Export files (`{"data": {"<chat_id>": [...]}}`)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Analyze one user across every export and print the report as JSON
    Analyze {
        /// Sender id to analyze
        #[arg(short, long)]
        user: String,

        /// Override ORACLE_MODEL
        #[arg(long)]
        model: Option<String>,

        /// Pretty-print the JSON report
        #[arg(long)]
        pretty: bool,

        /// Export files, one chat each
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tgw_core::logging::init("tgw")?;

    match cli.command {
        Commands::Users { files } => {
            let exports = load_exports(&files)?;
            println!("{}", serde_json::to_string_pretty(&user_stats(&exports))?);
        }
        Commands::Analyze {
            user,
            model,
            pretty,
            files,
        } => {
            let mut cfg = Config::load()?;
            if let Some(m) = model {
                cfg.oracle_model = m;
            }

            let chats: Vec<ChatInput> = load_exports(&files)?
                .into_iter()
                .map(ChatExport::into_chat_input)
                .collect();
            let ctx = build_context(&cfg)?;

            info!(
                user = %user,
                chats = chats.len(),
                model = %cfg.oracle_model,
                "analysis started"
            );
            let report = MultiChatAggregator::new(&ctx).analyze(&chats, &user).await;

            let out = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{out}");
        }
    }

    Ok(())
}

fn load_exports(files: &[PathBuf]) -> Result<Vec<ChatExport>> {
    files
        .iter()
        .map(|p| ChatExport::from_path(p).with_context(|| format!("loading {}", p.display())))
        .collect()
}

fn build_context(cfg: &Config) -> Result<AnalysisContext> {
    let oracle = Arc::new(OpenAiOracle::new(
        cfg.openai_api_key.clone(),
        cfg.openai_base_url.clone(),
        cfg.classifier.call_timeout,
    )?);
    let catalog = cfg.catalog().context("loading persona catalog")?;

    Ok(AnalysisContext {
        classifier: Arc::new(ClassifierClient::new(
            oracle,
            cfg.oracle_model.clone(),
            cfg.classifier,
        )),
        catalog: Arc::new(catalog),
        frequency: Arc::new(RegexFrequencyCounter::new()),
        settings: cfg.analysis,
    })
}
