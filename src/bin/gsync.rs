use anyhow::Result;
use gsync::cli;
use gsync::client::TasksClient;
use gsync::client::auth::{Authenticator, ClientSecrets};
use gsync::config::Config;
use gsync::context::{SharedContext, StandardContext};
use simplelog::{
    ColorChoice, CombinedLogger, LevelFilter, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

enum Command {
    Sync,
    Loop,
    Auth,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let binary_name = args
        .first()
        .map(String::as_str)
        .unwrap_or("gsync")
        .to_string();

    let mut command = Command::Sync;
    let mut root_override: Option<PathBuf> = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" | "help" => {
                cli::print_help(&binary_name);
                return Ok(());
            }
            "-r" | "--root" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    eprintln!("Missing path after --root");
                    std::process::exit(2);
                };
                root_override = Some(PathBuf::from(path));
            }
            "-v" | "--verbose" => verbose = true,
            "sync" => command = Command::Sync,
            "loop" => command = Command::Loop,
            "auth" => command = Command::Auth,
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!();
                cli::print_help(&binary_name);
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let ctx: SharedContext = Arc::new(StandardContext::new(root_override));

    let config = match Config::load(ctx.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            if Config::is_missing_config_error(&e) {
                eprintln!("No configuration file found.");
                eprintln!(
                    "Create {} with at least:",
                    Config::get_path_string(ctx.as_ref())?
                );
                eprintln!();
                eprintln!("    directory_paths:");
                eprintln!("      - /home/you/notes/lists");
                eprintln!("    daily_path: /home/you/notes/daily");
            } else {
                eprintln!("Error loading configuration:\n{}", e);
            }
            std::process::exit(1);
        }
    };

    init_logging(verbose, &config)?;

    let secrets = ClientSecrets::load(ctx.as_ref())?;
    let auth = Authenticator::new(ctx.clone(), secrets, &config.auth_base_url)?;

    match command {
        Command::Auth => {
            println!("Open this URL in a browser and authorize gsync:");
            println!();
            println!("{}", auth.authorize_url());
            println!();
            print!("Paste the authorization code here: ");
            io::stdout().flush()?;
            let mut code = String::new();
            io::stdin().lock().read_line(&mut code)?;
            if code.trim().is_empty() {
                eprintln!("No code entered; aborting.");
                std::process::exit(1);
            }
            auth.exchange_code(code.trim()).await?;
            println!("Authorization complete; token stored.");
        }
        Command::Sync => {
            let client = TasksClient::new(ctx.clone(), &config.api_base_url, auth)
                .map_err(anyhow::Error::msg)?;
            if !run_pass(&client, &config).await {
                std::process::exit(1);
            }
        }
        Command::Loop => {
            let client = TasksClient::new(ctx.clone(), &config.api_base_url, auth)
                .map_err(anyhow::Error::msg)?;
            let stdin = io::stdin();
            loop {
                run_pass(&client, &config).await;
                if let Err(e) = cli::print_markdown_listing(Path::new(".")) {
                    log::warn!("Cannot list markdown files: {}", e);
                }
                // EOF/interrupt on the prompt leaves without another pass.
                if !cli::prompt_continue(&mut stdin.lock()) {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, config: &Config) -> Result<()> {
    let level = if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(log_file) = &config.log_file {
        loggers.push(WriteLogger::new(
            LevelFilter::Info,
            simplelog::Config::default(),
            std::fs::File::create(log_file.as_std_path())?,
        ));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

async fn run_pass(client: &TasksClient, config: &Config) -> bool {
    match client.sync_all(config).await {
        Ok(summary) => {
            for report in &summary.reports {
                let mut line = format!(
                    "{}: {} completed remotely, {} added remotely",
                    report.file.display(),
                    report.completed_remote,
                    report.inserted_remote
                );
                if report.changed_local {
                    line.push_str(", file updated");
                }
                println!("{}", line);
                for warning in &report.warnings {
                    log::warn!("{}", warning);
                }
            }
            for warning in &summary.warnings {
                log::warn!("{}", warning);
            }
            true
        }
        Err(e) => {
            log::error!("Sync pass failed: {}", e);
            false
        }
    }
}
