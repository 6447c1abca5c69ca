use anyhow::{Context, Result};
use clap::Parser;
use command::{parse_input, Command, HELP};
use pagewise_common::observability::init_logging;
use pagewise_config::{load_dotenv, PagewiseConfig, PagewiseConfigLoader};
use pagewise_llm::{ensure_llm_ready, LlmSettings};
use pagewise_web::HttpPageFetcher;
use session::Session;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

mod command;
mod session;

/// Ask questions about a single web page.
#[derive(Debug, Parser)]
#[command(name = "pagewise", version, about)]
struct Cli {
    /// Page to load; prompted for when omitted.
    #[arg(long, env = "PAGEWISE_URL")]
    url: Option<String>,

    /// YAML config file. Defaults to pagewise.yaml in the config dir and the working dir.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the completion model.
    #[arg(long)]
    model: Option<String>,

    /// Mirror logs to stderr.
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    // 1) Environment, then config (env wins)
    load_dotenv();
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => PagewiseConfigLoader::new().with_file(path),
        None => PagewiseConfigLoader::new().with_default_locations(),
    };
    let mut cfg: PagewiseConfig = loader.load().context("failed to load configuration")?;
    if let Some(model) = cli.model {
        cfg.llm.model = model;
    }

    let mut log_config = cfg.logging.to_log_config();
    log_config.emit_stderr |= cli.verbose;
    let log_path = init_logging(log_config)?;
    tracing::info!(log = %log_path.display(), "pagewise.start");

    // 2) Collaborators. The key is checked before anything touches the network.
    let api_key = cfg.llm.resolve_api_key()?;
    let mut settings = LlmSettings::openai(api_key)
        .with_model(cfg.llm.model.clone())
        .with_endpoint(cfg.llm.endpoint.clone());
    settings.temperature = cfg.llm.temperature;
    settings.max_tokens = cfg.llm.max_tokens;
    let llm = ensure_llm_ready(&settings)?;

    let fetcher = HttpPageFetcher::new(
        Duration::from_secs(cfg.fetch.timeout_secs),
        cfg.fetch.retries,
        &cfg.fetch.user_agent,
    )?;
    let mut session = Session::new(Arc::new(fetcher), llm);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // 3) Initial page; without it there is nothing to answer from.
    let url = match cli.url {
        Some(url) => url,
        None => match prompt(&mut lines, "Enter the website URL: ").await? {
            Some(url) => url,
            None => return Ok(ExitCode::FAILURE),
        },
    };
    if let Err(e) = session.load(&url).await {
        tracing::error!(%url, error = %e, "pagewise.load.failed");
        println!("Failed to load page: {e}. Exiting...");
        return Ok(ExitCode::FAILURE);
    }

    println!("Website content loaded! You can now ask questions about it.");
    println!("Type 'quit' to exit");

    // 4) Question loop
    while let Some(line) = prompt(&mut lines, "\nYour question: ").await? {
        match parse_input(&line) {
            Command::Quit => break,
            Command::Empty => continue,
            Command::Help => println!("{HELP}"),
            Command::Context => println!("{}", session.rendered_context().unwrap_or_default()),
            Command::Load(url) => match session.load(&url).await {
                Ok(doc) => {
                    let title = doc.title().to_string();
                    let loaded = session.url().map_or(url.as_str(), |u| u.as_str());
                    println!("Loaded {title:?} from {loaded}.");
                }
                Err(e) => {
                    tracing::warn!(%url, error = %e, "pagewise.reload.failed");
                    println!("Failed to load page: {e}. Keeping the current page.");
                }
            },
            Command::Unknown(input) => println!("Unknown command {input:?}. Type /help."),
            Command::Ask(question) => {
                let answer = session.ask(&question).await;
                println!("\nChatbot: {answer}");
            }
        }
    }

    tracing::info!("pagewise.exit");
    Ok(ExitCode::SUCCESS)
}

/// Print `label` and read one line; `None` on end of input.
async fn prompt(lines: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<Option<String>> {
    print!("{label}");
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?)
}
