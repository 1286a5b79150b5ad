use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use recall_service::{AssistRequest, PipelineResult, RecallService, SearchRequest};
use recall_storage::qdrant::QdrantStore;

#[derive(Debug, Parser)]
#[command(
	version = recall_cli::VERSION,
	rename_all = "kebab",
	styles = recall_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Gather past tickets and advice for a task.
	Assist {
		task: String,
		#[arg(long, value_name = "TEXT")]
		context: Option<String>,
	},
	/// Answer a question from past tickets.
	Search {
		query: String,
		#[arg(long, value_name = "N")]
		limit: Option<u32>,
		/// Skip auxiliary plugin lookups.
		#[arg(long)]
		no_context: bool,
	},
}
impl Command {
	async fn execute(self, service: &RecallService) -> recall_service::Result<PipelineResult> {
		match self {
			Self::Assist { task, context } => service.assist(AssistRequest { task, context }).await,
			Self::Search { query, limit, no_context } =>
				service
					.search(SearchRequest { query, limit, include_context: Some(!no_context) })
					.await,
		}
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = recall_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let qdrant = QdrantStore::new(&config.storage.qdrant)?;
	let service = RecallService::new(config, qdrant);
	let result = args.command.execute(&service).await?;
	let json = serde_json::to_string_pretty(&result)?;

	println!("{json}");

	Ok(())
}
