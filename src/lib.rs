pub mod ai;
pub mod capture;
pub mod cli;
pub mod config;
pub mod conversion;
pub mod error;
pub mod format;
pub mod session;

use anyhow::Context;
use clap::Parser;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use ai::AmountExtractor;
use cli::{Cli, Command};
use config::AppConfig;
use session::{commands, ModeKind, Session, SessionState};

const SHELL_HELP: &str = "\
Commands:
  mode manual|photo   switch mode (clears results)
  rate <KRW per THB>  set the exchange rate
  amount <THB>        convert an amount (manual mode)
  image <PATH>        select a photo (photo mode)
  detect              find prices in the selected photo
  clear               clear the current input and results
  show                print the current state
  config              print the active configuration
  providers           list detection providers
  help                this text
  quit                exit";

pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir.clone().or_else(AppConfig::default_dir) {
        Some(dir) => dir,
        None => anyhow::bail!("No config directory available; pass --config-dir"),
    };
    let mut app_config = AppConfig::load(&config_dir);
    cli.apply(&mut app_config);

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(dispatch(cli, app_config))
}

async fn dispatch(cli: Cli, app_config: AppConfig) -> anyhow::Result<()> {
    let mut session = Session::new(app_config.default_exchange_rate());
    if let Some(rate) = &cli.rate {
        session.set_rate(rate);
    }
    let state: SessionState = Arc::new(Mutex::new(session));

    match cli.command {
        Some(Command::Convert { amount }) => {
            commands::convert_manual(&state, &amount);
            finish_one_shot(&state, &app_config)
        }
        Some(Command::Detect { image }) => {
            commands::load_image(&state, &image, app_config.max_image_bytes).await;
            if let Some(error) = state.lock().view(app_config.locale).error {
                anyhow::bail!(error);
            }
            let extractor: Arc<dyn AmountExtractor> = ai::llm::extractor_for(&app_config).into();
            if let Err(e) = commands::detect(&state, extractor).await {
                anyhow::bail!(e.user_message());
            }
            finish_one_shot(&state, &app_config)
        }
        Some(Command::Shell) | None => shell(state, app_config).await,
    }
}

fn finish_one_shot(state: &SessionState, app_config: &AppConfig) -> anyhow::Result<()> {
    let view = state.lock().view(app_config.locale);
    if let Some(error) = view.error {
        anyhow::bail!(error);
    }
    print!("{view}");
    Ok(())
}

async fn shell(state: SessionState, app_config: AppConfig) -> anyhow::Result<()> {
    let extractor: Arc<dyn AmountExtractor> = ai::llm::extractor_for(&app_config).into();
    let locale = app_config.locale;

    log::info!("Session {} started", state.lock().id);
    println!("THB -> KRW converter. Type `help` for commands.");
    print!("{}", state.lock().view(locale));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let line = line.trim();
        let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
        let arg = arg.trim();

        match cmd {
            "" => continue,
            "quit" | "exit" | "q" => break,
            "help" | "?" => println!("{SHELL_HELP}"),
            "mode" => match arg.parse::<ModeKind>() {
                Ok(kind) => commands::switch_mode(&state, kind),
                Err(e) => println!("{}", e.user_message()),
            },
            "rate" => commands::set_rate(&state, arg),
            "amount" => commands::convert_manual(&state, arg),
            "image" => {
                commands::load_image(&state, std::path::Path::new(arg), app_config.max_image_bytes)
                    .await
            }
            "detect" => {
                let state = state.clone();
                let extractor = extractor.clone();
                tokio::spawn(async move {
                    match commands::detect(&state, extractor).await {
                        Ok(()) => print!("{}", state.lock().view(locale)),
                        Err(e) => println!("{}", e.user_message()),
                    }
                });
                println!("Detecting amounts...");
                continue;
            }
            "clear" => commands::clear(&state),
            "show" => {}
            "config" => print_config(&app_config),
            "providers" => {
                for p in ai::llm::get_available_providers() {
                    println!(
                        "  {:<8} credential: {:<3} models: {}",
                        p.name,
                        if p.needs_credential { "yes" } else { "no" },
                        p.models.join(", ")
                    );
                }
                continue;
            }
            other => {
                println!("Unknown command {other:?}. Type `help`.");
                continue;
            }
        }
        if matches!(cmd, "help" | "?" | "config") {
            continue;
        }
        print!("{}", state.lock().view(locale));
    }

    Ok(())
}

fn print_config(app_config: &AppConfig) {
    println!("  provider: {}", app_config.llm_provider.name());
    println!("  model: {}", app_config.active_model());
    println!(
        "  credential: {}",
        match app_config.llm_provider {
            config::LLMProvider::Ollama => "not needed",
            _ if app_config.credential().is_some() => "set",
            _ => "missing",
        }
    );
    println!("  default rate: {}", app_config.default_exchange_rate().value());
    println!("  locale: {}", app_config.locale);
    println!("  max image bytes: {}", app_config.max_image_bytes);
    match app_config.request_timeout_secs {
        Some(secs) => println!("  request timeout: {secs}s"),
        None => println!("  request timeout: transport default"),
    }
}
