use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use crossterm::execute;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use schnorr_auth::server::{ServerConfig, VerifierServer};
use schnorr_auth::X509Resolver;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Schnorr identification verifier", long_about = None)]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,
}

fn print_colored(color: Color, text: &str) {
    let mut stdout = io::stdout();
    execute!(stdout, SetForegroundColor(color), Print(text), ResetColor).ok();
    stdout.flush().ok();
}

fn println_colored(color: Color, text: &str) {
    print_colored(color, text);
    println!();
}

fn display_banner() {
    println!();
    println_colored(
        Color::Cyan,
        "+---------------------------------------------------------+",
    );
    println_colored(
        Color::Cyan,
        "|          Schnorr Identification Verifier                |",
    );
    println_colored(
        Color::Cyan,
        "+---------------------------------------------------------+",
    );
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    display_banner();

    let mut config = ServerConfig::from_env().unwrap_or_else(|e| {
        error!("Failed to load configuration: {e}");
        info!("Using default configuration");
        ServerConfig::default()
    });
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    if let Err(e) = config.validate() {
        println_colored(Color::Red, &format!("Configuration validation failed: {e}"));
        return Err(format!("Invalid configuration: {e}").into());
    }

    let addr = config.addr().await?;
    let server = VerifierServer::bind(addr, Arc::new(X509Resolver)).await?;
    let shutdown = server.shutdown_handle();

    println_colored(Color::Green, &format!("Verifier listening on {}", server.local_addr()?));
    println_colored(
        Color::Yellow,
        "A client sending /quit or Ctrl+C stops the verifier",
    );
    println!();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C signal");
            shutdown.shutdown();
        }
    });

    match server.run().await {
        Ok(()) => println_colored(Color::Green, "Verifier shutdown complete. Goodbye!"),
        Err(e) => {
            println_colored(Color::Red, &format!("Verifier error: {e}"));
            return Err(e.into());
        }
    }

    println!();
    Ok(())
}
