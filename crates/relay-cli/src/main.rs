//! relay - chat with a data assistant from the terminal

mod commands;
mod config;
mod session;
mod ui;
mod utils;

use clap::Parser;
use relay_agent::{
    Bootstrapper, Interaction, InteractionEvent, MemoryStore, ResourceManifest, Session,
    SessionStore,
};
use relay_ai::providers::get_api_key;
use relay_ai::{AssistantsApi, OpenAIAssistants};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::commands::{CommandResult, ThreadCommand};
use crate::config::{Config, Overrides, Settings};
use crate::session::JsonlStore;

/// relay - ask questions about a dataset through an OpenAI assistant
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model the assistant is created with (default: gpt-4o-mini)
    #[arg(short, long)]
    model: Option<String>,

    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for history, resource manifest and saved charts
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Run in non-interactive mode with a single question
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Disable TUI mode (use simple stdin/stdout)
    #[arg(long)]
    no_tui: bool,

    /// Keep the history in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Print the stored chat history and exit
    #[arg(long)]
    history: bool,

    /// Print resource and thread state and exit
    #[arg(long)]
    status: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::config_path);

    // Initialize config and exit
    if args.init_config {
        match Config::init(&config_path) {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Merge config with CLI args (CLI takes precedence)
    let overrides = Overrides {
        model: args.model.clone(),
        data_dir: args.data_dir.clone(),
    };
    let settings = Config::load_from(&config_path).resolve(&overrides, |key| std::env::var(key).ok());

    let interactive = args.command.is_none() && !args.history && !args.status;
    let use_tui = interactive && !args.no_tui && settings.tui;
    init_tracing(args.verbose, use_tui, &settings)?;

    if args.history {
        return print_history(&settings);
    }
    if args.status {
        return print_status(&settings);
    }

    let api_key = match get_api_key(settings.api_key.as_deref(), "OPENAI_API_KEY") {
        Ok(key) => key,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("Set your API key with: export OPENAI_API_KEY=your-key");
            eprintln!("Or add it to the config file: relay --init-config");
            std::process::exit(1);
        }
    };

    let mut client = OpenAIAssistants::new(api_key);
    if let Some(ref base_url) = settings.base_url {
        client = client.with_base_url(base_url.clone());
    }
    let api: Arc<dyn AssistantsApi> = Arc::new(client);

    // Upload the dataset and create the assistant unless already known
    let mut bootstrapper = Bootstrapper::open(api.clone(), settings.manifest_path())?;
    bootstrapper.seed(settings.seed_file.clone(), settings.seed_assistant.clone())?;
    let resources = match bootstrapper.ensure_all(&settings.dataset, &settings.assistant).await {
        Ok(resources) => resources,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("Check that {} exists and the API key is valid.", settings.dataset.display());
            std::process::exit(1);
        }
    };
    tracing::info!(
        file = %resources.file_id(),
        assistant = %resources.assistant_id(),
        "resources ready"
    );

    let store: Box<dyn SessionStore> = if args.ephemeral {
        Box::new(MemoryStore::new())
    } else {
        Box::new(JsonlStore::open(settings.history_path())?.with_max_history(settings.max_history))
    };
    let mut session = Session::open(store)?.with_max_history(settings.max_history);

    let interaction = Interaction::new(api, resources.assistant_id().clone())
        .with_poll_config(settings.poll.clone())
        .with_image_dir(settings.image_dir());

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&mut session, &interaction, &command).await;
    }

    // TUI mode
    if use_tui {
        return ui::run_tui(&mut session, &interaction, bootstrapper.manifest(), &settings).await;
    }

    // Interactive mode (simple stdin/stdout)
    run_interactive(&mut session, &interaction, bootstrapper.manifest(), &settings).await
}

/// Install the tracing subscriber when `--verbose` is given.
///
/// In TUI mode logs go to a file so the screen is left alone.
fn init_tracing(verbose: bool, tui: bool, settings: &Settings) -> anyhow::Result<()> {
    if !verbose {
        return Ok(());
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("relay=debug"));

    if tui {
        let path = settings.log_path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = std::fs::File::options().create(true).append(true).open(&path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn print_history(settings: &Settings) -> anyhow::Result<()> {
    let mut store = JsonlStore::open(settings.history_path())?
        .with_max_history(settings.max_history)
        .without_compaction();
    let stored = store.load()?;

    if stored.messages.is_empty() {
        println!("No history at {}", store.path().display());
        return Ok(());
    }

    for message in &stored.messages {
        let avatar = if message.is_user() { "👤" } else { "🤖" };
        println!("{} {}", avatar, utils::preview(&message.content, 200));
    }
    println!();
    println!(
        "{} messages{}",
        stored.messages.len(),
        stored
            .thread_id
            .map(|t| format!(" on thread {}", t))
            .unwrap_or_default()
    );
    Ok(())
}

fn print_status(settings: &Settings) -> anyhow::Result<()> {
    let store = JsonlStore::open(settings.history_path())?
        .with_max_history(settings.max_history)
        .without_compaction();
    let session = Session::open(Box::new(store))?;
    let manifest = ResourceManifest::load(&settings.manifest_path())?;

    if let CommandResult::Message(status) = ThreadCommand::execute(&session, &manifest) {
        println!("{}", status);
    }
    println!("Data dir: {}", settings.data_dir.display());
    Ok(())
}

/// Print run progress to stderr as it arrives
fn spawn_progress_printer(interaction: &Interaction) -> tokio::task::JoinHandle<()> {
    let mut receiver = interaction.subscribe();
    tokio::spawn(async move {
        let mut last_status = None;
        while let Ok(event) = receiver.recv().await {
            match event {
                InteractionEvent::RunStatus { status, .. } => {
                    if last_status != Some(status) {
                        eprintln!("[{}]", status);
                        last_status = Some(status);
                    }
                }
                InteractionEvent::ThreadCreated { thread_id } => {
                    eprintln!("[thread {}]", thread_id);
                }
                InteractionEvent::ImageSaved { path } => {
                    eprintln!("[chart saved to {}]", path.display());
                }
                InteractionEvent::Reply { .. } | InteractionEvent::Error { .. } => {
                    last_status = None;
                }
                _ => {}
            }
        }
    })
}

/// Run one interaction, cancelling it on Ctrl+C
async fn ask(
    session: &mut Session,
    interaction: &Interaction,
    prompt: &str,
) -> relay_agent::Result<relay_agent::Reply> {
    let handle = interaction.handle();
    let mut pending = std::pin::pin!(interaction.ask(session, prompt));
    loop {
        tokio::select! {
            result = &mut pending => return result,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n[Cancelling...]");
                handle.abort();
            }
        }
    }
}

async fn run_command(
    session: &mut Session,
    interaction: &Interaction,
    command: &str,
) -> anyhow::Result<()> {
    let printer = spawn_progress_printer(interaction);
    let result = ask(session, interaction, command).await;
    printer.abort();

    match result {
        Ok(reply) => {
            println!("{}", reply.message.content);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_interactive(
    session: &mut Session,
    interaction: &Interaction,
    manifest: &ResourceManifest,
    settings: &Settings,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    // Show minimal startup info (only if TTY)
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        eprintln!("{} ({})", settings.title, settings.assistant.model);
        if !session.history().is_empty() {
            eprintln!("{} messages in history. /clear to start over.", session.history().len());
        }
        eprintln!();
    }

    let printer = spawn_progress_printer(interaction);

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        // Handle slash commands
        if input.starts_with('/') {
            match commands::execute_command(input, session, manifest) {
                Some(CommandResult::ClearHistory) => match commands::clear_history(session) {
                    Ok(notice) => println!("{}", notice),
                    Err(e) => eprintln!("Error: {}", e),
                },
                Some(CommandResult::NewThread) => {
                    match commands::new_thread(session, interaction.controller()).await {
                        Ok(notice) => println!("{}", notice),
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                Some(CommandResult::Message(msg)) => println!("{}", msg),
                Some(CommandResult::Exit) => break,
                Some(CommandResult::Unknown(cmd)) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
                None => {}
            }
            continue;
        }

        match ask(session, interaction, input).await {
            Ok(reply) => {
                println!();
                println!("🤖 {}", reply.message.content);
                println!();
            }
            Err(e) if e.is_cancelled() => println!("Cancelled."),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    printer.abort();
    Ok(())
}
