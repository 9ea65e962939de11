//! Invoice Relay entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build the inference backend
//!   6. Spawn Ctrl-C → shutdown signal watcher
//!   7. Serve HTTP until shutdown

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use invoice_relay::config::{self, Config};
use invoice_relay::error::AppError;
use invoice_relay::logger;
use invoice_relay::subsystems::{comms, extraction::InvoiceProcessor};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    let force_cli_level = args.log_level.is_some();

    logger::init(effective_log_level, force_cli_level, config.log_file.as_deref())?;

    info!(
        service = %config.service_name,
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        backend = %config.inference.provider,
        "config loaded"
    );

    let processor = InvoiceProcessor::from_config(&config)
        .map_err(|e| AppError::Inference(e.to_string()))?;
    let processor = Arc::new(processor);

    // Shared shutdown token: Ctrl-C cancels it, the server watches it.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    print_startup_summary(&config);

    comms::run(&config, processor, shutdown).await
}

fn print_startup_summary(config: &Config) {
    let fit = |text: String| -> String {
        const WIDTH: usize = 58;
        let char_count = text.chars().count();
        if char_count >= WIDTH {
            let mut out = text.chars().take(WIDTH - 1).collect::<String>();
            out.push('…');
            out
        } else {
            format!("{text:<WIDTH$}")
        }
    };

    let inference = &config.inference;
    let backend_line = match inference.provider.as_str() {
        "remote" => format!("remote url={} timeout={}s", inference.remote.url, inference.remote.timeout_seconds),
        "openai" | "openai-compatible" => format!(
            "openai model={} temp={} max_tokens={} timeout={}s",
            inference.openai.model,
            inference.openai.temperature,
            inference.openai.max_tokens,
            inference.openai.timeout_seconds
        ),
        other => other.to_string(),
    };
    let key_line = if config.llm_api_key.is_some() { "api key: set" } else { "api key: none" };

    let ex = &config.extraction;
    let extraction_line = format!(
        "lang={} format={} line_items={} prompt={}",
        ex.output_language,
        ex.output_format,
        ex.include_line_items,
        config.effective_prompt_style().as_str()
    );

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ 🧾 Invoice Relay                                             ║");
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 🏷️  Service: {:<48}║", config.service_name);
    println!("║ 🧠 PID: {:<52}║", std::process::id());
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 🌐 HTTP                                                      ║");
    println!("║   {}║", fit(format!("bind: {}", config.http.bind)));
    println!("║   {}║", fit(format!("cors: {}", config.http.cors_origins.join(", "))));
    println!("║   {}║", fit(format!("max upload: {} bytes", config.http.max_upload_bytes)));
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 🤖 Inference                                                 ║");
    println!("║   {}║", fit(backend_line));
    println!("║   {}║", fit(key_line.to_string()));
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 📄 Extraction                                                ║");
    println!("║   {}║", fit(extraction_line));
    println!("╚══════════════════════════════════════════════════════════════╝");
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: invoice-relay [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    // Each -v raises verbosity one tier:
    //   -v      → warn
    //   -vv     → info
    //   -vvv    → debug  (per-file flow, request metadata)
    //   -vvvv+  → trace  (prompts and full upstream responses)
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, config_path }
}
