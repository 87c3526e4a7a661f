use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use crossterm::execute;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use schnorr_auth::client::{self, ClientConfig, ClientUpdate, CloseReason};
use schnorr_auth::{transport, ProverIdentity, Session};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "Schnorr identification prover", long_about = None)]
#[command(version)]
struct Args {
    /// Verifier host
    #[arg(short = 'H', long, env = "CLIENT_HOST")]
    host: Option<String>,

    /// Verifier port
    #[arg(short, long, env = "CLIENT_PORT")]
    port: Option<u16>,

    /// PEM certificate presented in the handshake
    #[arg(short, long, env = "CLIENT_CERT")]
    cert: Option<PathBuf>,

    /// PEM PKCS#8 private key matching the certificate
    #[arg(short, long, env = "CLIENT_KEY")]
    key: Option<PathBuf>,

    /// Send deadline in milliseconds
    #[arg(short, long, env = "CLIENT_TIMEOUT")]
    timeout: Option<u64>,
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
        "|           Schnorr Identification Prover                 |",
    );
    println_colored(
        Color::Cyan,
        "+---------------------------------------------------------+",
    );
    println!();
}

fn display_help() {
    println_colored(Color::Yellow, "Available Commands:");
    println!();
    println!("  /h, /handshake       - Send the certificate");
    println!("  /c, /commitment      - Commit to a fresh nonce");
    println!("  /r, /response        - Answer the verifier's challenge");
    println!("  /read                - Ask for the read privilege");
    println!("  /time                - Ask the verifier for its clock");
    println!("  /q, /quit            - Stop the verifier");
    println!("  /leave               - Disconnect");
    println!();
}

fn display_prompt() {
    print_colored(Color::Green, "prover");
    print_colored(Color::White, "> ");
    io::stdout().flush().ok();
}

fn display_update(update: &ClientUpdate) {
    match update {
        ClientUpdate::Received(line) if line.starts_with("/error") => {
            println_colored(Color::Red, &format!("<- {line}"))
        }
        ClientUpdate::Received(line) if line.ends_with("Success") => {
            println_colored(Color::Green, &format!("<- {line}"))
        }
        ClientUpdate::Received(line) => println_colored(Color::White, &format!("<- {line}")),
        ClientUpdate::Sent(line) => println_colored(Color::DarkGrey, &format!("-> {line}")),
        ClientUpdate::Rejected(reason) => println_colored(Color::Yellow, reason),
    }
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

    let mut config = ClientConfig::from_env().unwrap_or_else(|e| {
        error!("Failed to load configuration: {e}");
        info!("Using default configuration");
        ClientConfig::default()
    });
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(cert) = args.cert {
        config.cert = cert;
    }
    if let Some(key) = args.key {
        config.key = key;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }

    if let Err(e) = config.validate() {
        println_colored(Color::Red, &format!("Configuration validation failed: {e}"));
        return Err(format!("Invalid configuration: {e}").into());
    }

    let identity = ProverIdentity::load(&config.cert, &config.key)?;
    let addr = config.addr().await?;
    let stream = TcpStream::connect(addr).await?;
    println_colored(Color::Green, &format!("Connected to verifier at {addr}"));
    println!();
    display_help();

    let (mut reader, mut writer) = transport::split(stream, Some(config.send_timeout()));
    let (command_tx, command_rx) = mpsc::channel::<String>(16);
    let (update_tx, mut update_rx) = mpsc::unbounded_channel();

    // Blocking stdin reads cannot be cancelled; keep them off the runtime.
    std::thread::spawn(move || {
        display_prompt();
        for line in io::stdin().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                display_prompt();
                continue;
            }
            if command_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        while let Some(update) = update_rx.recv().await {
            println!();
            display_update(&update);
            display_prompt();
        }
    });

    let session = Session::prover(identity);
    let reason = client::run(session, &mut reader, &mut writer, command_rx, update_tx).await;

    println!();
    match reason {
        Ok(CloseReason::PeerLeft) => println_colored(Color::Yellow, "Verifier left. Goodbye!"),
        Ok(CloseReason::Disconnected) => println_colored(Color::Yellow, "Connection closed by verifier."),
        Ok(CloseReason::Left | CloseReason::InputClosed) => {
            writer.shutdown().await.ok();
            println_colored(Color::Green, "Disconnected. Goodbye!");
        }
        Err(e) => {
            println_colored(Color::Red, &format!("Connection error: {e}"));
            return Err(e.into());
        }
    }

    Ok(())
}
