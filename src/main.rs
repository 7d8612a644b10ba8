use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use credkeep::app;
use credkeep::clock::SystemClock;
use credkeep::config::Config;
use credkeep::context::RequestContext;
use credkeep::duration::parse_duration;
use credkeep::input::{parse_input, ParsedInputs, Verb};
use credkeep::keystore::{FileKeystore, Keystore};
use credkeep::mode::Mode;
use credkeep::retry::with_retry;
use credkeep::tool::{OpCli, ToolRunner};

#[derive(Parser)]
#[command(name = "credkeep")]
#[command(about = "Credential helper backed by an external secret manager")]
struct Cli {
    /// Credential mode: git, docker, npm, or a custom label
    #[arg(short, long, default_value = "git")]
    mode: String,

    /// Path to config file (defaults to the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Max time to wait for stdin, e.g. "30s"
    #[arg(long)]
    stdin_deadline: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the stored credential for the key read from stdin
    Get,
    /// Store the credential read from stdin
    Store,
    /// Remove the stored credential for the key read from stdin
    Erase,
    /// Print or change the vault credentials are stored in
    Vault {
        name: Option<String>,

        /// Create the vault if it does not exist
        #[arg(long)]
        create: bool,
    },
    /// Force a fresh interactive sign-in
    Signin,
}

impl Command {
    fn verb(&self) -> Option<Verb> {
        match self {
            Command::Get => Some(Verb::Get),
            Command::Store => Some(Verb::Store),
            Command::Erase => Some(Verb::Erase),
            Command::Vault { .. } | Command::Signin => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout belongs to the credential protocol.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode: Mode = cli.mode.parse()?;
    let config = Config::load_or_default(cli.config.as_deref())?;

    let deadline = match &cli.stdin_deadline {
        Some(value) => parse_duration(value)?,
        None => config.stdin_deadline,
    };

    let inputs = match cli.command.verb() {
        Some(verb) => parse_input(&mode, verb, tokio::io::stdin(), deadline).await?,
        None => ParsedInputs::default(),
    };

    let keystore: Arc<dyn Keystore> = Arc::new(FileKeystore::open_default()?);
    let runner: Arc<dyn ToolRunner> = Arc::new(OpCli::new(&config.tool));
    let ctx = RequestContext::new(
        mode,
        inputs,
        keystore,
        runner,
        Arc::new(SystemClock),
        config.vault.clone(),
    );

    match &cli.command {
        Command::Get => {
            let output = with_retry(&ctx.session, || app::get(&ctx)).await?;
            print!("{output}");
        }
        Command::Store => {
            with_retry(&ctx.session, || app::store(&ctx)).await?;
        }
        Command::Erase => {
            with_retry(&ctx.session, || app::erase(&ctx)).await?;
        }
        Command::Vault { name, create } => {
            let printed =
                with_retry(&ctx.session, || app::vault(&ctx, name.as_deref(), *create)).await?;
            if let Some(name) = printed {
                println!("{name}");
            }
        }
        Command::Signin => {
            app::signin(&ctx).await?;
        }
    }

    Ok(())
}
