use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use concentration::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(version, about = "Play Concentration against a game server", long_about = None)]
struct Args {
    /// Game server host name or address
    host: String,

    /// Game server port
    port: u16,

    /// Seconds to wait for the TCP connection
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    connect_timeout: u64,

    /// Seconds to wait for the server to announce the board
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    handshake_timeout: u64,

    /// Print the final board as JSON when the game ends
    #[arg(long)]
    summary_json: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.host.clone(), self.port)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout))
            .with_handshake_timeout(Duration::from_secs(self.handshake_timeout))
    }
}

/// `RUST_LOG` wins; otherwise the level comes from `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Terminal rendering
// ---------------------------------------------------------------------------

/// Redraws the board on stdout after every change and publishes the
/// status so the input loop can stop when the game ends.
struct TerminalView {
    status: watch::Sender<GameStatus>,
}

impl Observer for TerminalView {
    fn update(&self, model: &GameModel, card: Option<CardUpdate>) {
        let snapshot = model.snapshot();
        if let Some(card) = card {
            tracing::trace!(position = %card.position, "redrawing");
        }
        println!("{}", render(&snapshot));
        self.status.send_replace(snapshot.status);
    }
}

/// Draws the board with row and column numbers, face-down cards as `#`
/// and matched cards marked with `*`.
fn render(snapshot: &BoardSnapshot) -> String {
    let width = snapshot
        .cells
        .iter()
        .flatten()
        .filter_map(|cell| cell.symbol().map(|s| s.as_str().len() + 1))
        .max()
        .unwrap_or(1)
        .max(snapshot.dimension.saturating_sub(1).to_string().len());

    let mut out = String::new();
    out.push_str(&" ".repeat(4));
    for col in 0..snapshot.dimension {
        out.push_str(&format!(" {col:>width$}"));
    }
    out.push('\n');

    for (row, cells) in snapshot.cells.iter().enumerate() {
        out.push_str(&format!("{row:>3} "));
        for cell in cells {
            let text = match cell {
                Cell::Hidden => "#".to_string(),
                Cell::Revealed {
                    symbol,
                    matched: true,
                } => format!("{symbol}*"),
                Cell::Revealed { symbol, .. } => symbol.to_string(),
            };
            out.push_str(&format!(" {text:>width$}"));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "moves: {}  matches: {}  status: {}",
        snapshot.move_count, snapshot.match_count, snapshot.status
    ));
    if let Some(message) = &snapshot.error_message {
        out.push_str(&format!(" ({message})"));
    }
    out
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Reveal { row: usize, col: usize },
    Quit,
    Blank,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let mut parts = line.split_whitespace();
    let Some(first) = parts.next() else {
        return Ok(Input::Blank);
    };
    if first.eq_ignore_ascii_case("q") || first.eq_ignore_ascii_case("quit") {
        return Ok(Input::Quit);
    }

    let second = parts.next().ok_or("expected `row col`, or `q` to quit")?;
    if parts.next().is_some() {
        return Err("expected exactly two numbers".into());
    }
    let row = first
        .parse()
        .map_err(|_| format!("row must be a number, got {first:?}"))?;
    let col = second
        .parse()
        .map_err(|_| format!("column must be a number, got {second:?}"))?;
    Ok(Input::Reveal { row, col })
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut game = GameController::new(args.client_config());
    let (status_tx, mut status) = watch::channel(GameStatus::InProgress);
    game.subscribe(Arc::new(TerminalView { status: status_tx }));

    game.connect().await?;
    if let Some(model) = game.model() {
        println!("{}", render(&model.snapshot()));
    }
    eprintln!("enter `row col` to turn a card, `q` to quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = status.wait_for(|s| s.is_terminal()) => break,
            () = game.closed() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line) {
                    Ok(Input::Quit) => break,
                    Ok(Input::Blank) => {}
                    Ok(Input::Reveal { row, col }) => match game.reveal_card(row, col).await {
                        Ok(()) => {}
                        Err(e) if e.is_recoverable() => eprintln!("{e}"),
                        Err(e) => {
                            tracing::warn!(error = %e, "could not send move");
                            break;
                        }
                    },
                    Err(message) => eprintln!("{message}"),
                }
            }
        }
    }

    game.close().await?;
    // Give the receive loop a moment to record how the game ended.
    let _ = tokio::time::timeout(Duration::from_secs(1), game.closed()).await;

    let Some(model) = game.model() else {
        return Ok(ExitCode::FAILURE);
    };
    let snapshot = model.snapshot();
    if args.summary_json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    Ok(match snapshot.status {
        GameStatus::Error => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}
