use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use secagent::ai::{self, LlmClient, OfflineClient};
use secagent::config::{Config, DEFAULT_CONFIG_FILE};
use secagent::core::{Assistant, ControlCommand, Mode, PasteTerminator, SessionStore};
use secagent::terminal::{display, is_affirmative, prompt, spawn_stdin_reader, InputEvent, PasteCollector};

#[derive(Parser, Debug)]
#[command(name = "secagent", version, about = "Kill chain assistant for authorized security assessments")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Operating mode (overrides the configuration file)
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Model name, e.g. gpt-4, claude-3-opus-20240229, gemini-1.5-pro
    #[arg(long)]
    model: Option<String>,

    /// Assessment target (domain or IP)
    #[arg(short, long)]
    target: Option<String>,

    /// Confirm authorization up front instead of being asked
    #[arg(long)]
    authorized: bool,

    /// Run on templates only, without any model provider
    #[arg(long)]
    offline: bool,

    /// Continue a saved session snapshot
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Write a default configuration file and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    if args.init_config {
        Config::default().save(&args.config)?;
        display::info(&format!("Default configuration written to {}", args.config.display()))?;
        return Ok(());
    }

    let mut config = Config::load(&args.config)?;
    if let Some(mode) = args.mode {
        config.pipeline.mode = mode;
    }
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }

    let mut options = config.pipeline_options();
    options.verbose = args.verbose;

    // Initialize the model provider
    let client: Arc<dyn LlmClient> = if args.offline {
        Arc::new(OfflineClient::new(&config.llm.model))
    } else {
        Arc::from(ai::build_client(&config.llm)?)
    };

    display::setup_terminal()?;
    display::banner(config.pipeline.mode.as_str(), &format!("{} ({})", config.llm.model, client.name()))?;
    if client.name() == "offline" {
        display::notice("No model provider available; suggestions come from templates only")?;
    }

    let mut input = spawn_stdin_reader();

    if !args.authorized {
        prompt("Do you have explicit authorization to test the target? (yes/no): ")?;
        let answer = next_line(&mut input).await.unwrap_or_default();
        if !is_affirmative(&answer) {
            display::error("Authorization is required. Exiting.")?;
            return Ok(());
        }
    }

    let store = match &args.resume {
        Some(path) => {
            let store = SessionStore::load(path)?;
            display::info(&format!(
                "Resumed session {} ({} commands, phase {})",
                store.record().session_id,
                store.command_history().len(),
                store.current_phase()
            ))?;
            store
        }
        None => {
            let target = match &args.target {
                Some(target) => target.clone(),
                None => {
                    prompt("Enter target (domain or IP): ")?;
                    next_line(&mut input).await.unwrap_or_default()
                }
            };
            SessionStore::new(&target)
        }
    };

    let mut assistant = Assistant::new(
        client,
        store,
        options,
        config.placeholders.clone(),
        &config.session.output_dir,
    );

    display::help()?;
    run_loop(&mut assistant, &mut input).await?;

    prompt("Save session before exiting? (y/n): ")?;
    let answer = next_line(&mut input).await.unwrap_or_default();
    if is_affirmative(&answer) {
        match assistant.save() {
            Ok(path) => display::saved(&path)?,
            Err(e) => display::error(&format!("Failed to save session: {:#}", e))?,
        }
    }

    display::summary(&assistant.store().summary())?;
    Ok(())
}

async fn run_loop(assistant: &mut Assistant, input: &mut mpsc::Receiver<InputEvent>) -> Result<()> {
    loop {
        prompt(&display::prompt_label(assistant.current_phase()))?;

        let event = tokio::select! {
            event = input.recv() => event.unwrap_or(InputEvent::Eof),
            _ = tokio::signal::ctrl_c() => InputEvent::Eof,
        };

        let line = match event {
            InputEvent::Line(line) => line,
            InputEvent::Eof => {
                println!();
                return Ok(());
            }
        };

        let request = line.trim();
        if request.is_empty() {
            continue;
        }

        match handle_line(assistant, input, request).await {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(e) => {
                log::error!("Request failed: {:#}", e);
                display::error(&format!("{:#}", e))?;
            }
        }
    }
}

/// Process one prompt line. Returns `false` when the user quits.
async fn handle_line(assistant: &mut Assistant, input: &mut mpsc::Receiver<InputEvent>, request: &str) -> Result<bool> {
    // Control commands first
    if let Some(command) = ControlCommand::parse(request) {
        let outcome = assistant.execute(command);
        return display::control_outcome(&outcome);
    }

    let verbose = assistant.options().verbose;

    display::info("Generating command...")?;
    let resolution = assistant.suggest(request).await;
    display::suggestion(&resolution, verbose)?;
    let suggestion = resolution.into_value();

    prompt("Did you run the command? (y/n): ")?;
    let answer = next_line(input).await.unwrap_or_default();
    if !is_affirmative(&answer) {
        return Ok(true);
    }

    let terminator = assistant.options().paste_terminator;
    display::notice(match terminator {
        PasteTerminator::EndOfInput => "Paste the output, then press Ctrl-D on an empty line:",
        PasteTerminator::BlankLines(_) => "Paste the output, then press Enter twice:",
    })?;

    let output = collect_paste(input, terminator).await;
    if output.trim().is_empty() {
        display::notice("No output provided; skipping analysis")?;
        return Ok(true);
    }

    let phase = assistant.current_phase();
    display::info("Analyzing output...")?;
    let Some(resolution) = assistant.ingest(request, &suggestion, &output).await else {
        return Ok(true);
    };
    display::analysis(&resolution, verbose)?;

    let analysis = resolution.value();
    if analysis.proposes_advance(phase) {
        let next = analysis.next_phase;
        prompt(&format!("Advance to the {} phase? (y/n): ", next))?;
        let answer = next_line(input).await.unwrap_or_default();
        if is_affirmative(&answer) {
            assistant.advance_to(next);
            display::info(&format!("Now in {} phase: {}", next, next.description()))?;
        }
    }

    Ok(true)
}

async fn next_line(input: &mut mpsc::Receiver<InputEvent>) -> Option<String> {
    match input.recv().await {
        Some(InputEvent::Line(line)) => Some(line.trim().to_string()),
        _ => None,
    }
}

/// Gather pasted output. Ctrl-C abandons the paste.
async fn collect_paste(input: &mut mpsc::Receiver<InputEvent>, terminator: PasteTerminator) -> String {
    let mut collector = PasteCollector::new(terminator);

    loop {
        let event = tokio::select! {
            event = input.recv() => event.unwrap_or(InputEvent::Eof),
            _ = tokio::signal::ctrl_c() => return String::new(),
        };

        if collector.push(event) {
            return collector.finish();
        }
    }
}
