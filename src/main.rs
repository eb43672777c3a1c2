//! `tracklabel` CLI: replay recorded input events against a saved project.
//!
//! Events are read one JSON object per line. Every command the session
//! dispatches, and every notice it raises, is printed to stdout as a JSON
//! line. Logs go to stderr.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tracklabel::command::Command as BusCommand;
use tracklabel::config::{ConfigError, SessionConfig};
use tracklabel::doc::{ItemIndex, LabelId, State};
use tracklabel::geom::{Point, Rect2D};
use tracklabel::input::Key;
use tracklabel::notice::Notice;
use tracklabel::session::Session;
use tracklabel::store::Store;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("invalid project JSON: {0}")]
    State(serde_json::Error),
    #[error("line {line}: invalid event: {source}")]
    Event { line: usize, source: serde_json::Error },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to encode output: {0}")]
    Encode(serde_json::Error),
    #[error("failed to write output: {0}")]
    Write(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "tracklabel", about = "Annotation session tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON-lines event log against a project snapshot.
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Project snapshot (JSON).
    #[arg(long)]
    state: PathBuf,

    /// Input events, one JSON object per line.
    #[arg(long)]
    events: PathBuf,

    /// Session config (JSON). Falls back to `TRACKLABEL_*` variables.
    #[arg(long, env = "TRACKLABEL_CONFIG")]
    config: Option<PathBuf>,

    /// Write the final snapshot here.
    #[arg(long)]
    out: Option<PathBuf>,
}

/// One recorded input event.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event {
    PointerDown {
        x: f64,
        y: f64,
        #[serde(default)]
        target: Option<LabelId>,
        #[serde(default)]
        handle: usize,
    },
    PointerUp {
        x: f64,
        y: f64,
        #[serde(default)]
        target: Option<LabelId>,
        #[serde(default)]
        handle: usize,
    },
    PointerMove {
        x: f64,
        y: f64,
        #[serde(default)]
        bounds: Option<Rect2D>,
        #[serde(default)]
        hovered: Option<LabelId>,
        #[serde(default)]
        handle: usize,
    },
    KeyDown {
        key: Key,
    },
    KeyUp {
        key: Key,
    },
    GoToItem {
        index: ItemIndex,
    },
    FocusLost,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Output<'a> {
    Command { line: usize, command: &'a BusCommand },
    Notice { line: usize, notice: &'a Notice },
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let cli = Cli::parse();
    match cli.command {
        Command::Replay(args) => run_replay(&args),
    }
}

fn run_replay(args: &ReplayArgs) -> Result<(), CliError> {
    let state: State = serde_json::from_str(&read(&args.state)?).map_err(CliError::State)?;
    let config = match &args.config {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::from_env()?,
    };
    info!(items = state.items.len(), tracks = state.tracks.len(), "replay: project loaded");

    let file = File::open(&args.events).map_err(|source| read_error(&args.events, source))?;
    let mut session = Session::new(Store::new(state), config);
    let mut stdout = io::stdout().lock();
    let (mut events, mut commands) = (0usize, 0usize);

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|source| read_error(&args.events, source))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = serde_json::from_str(&line).map_err(|source| CliError::Event { line: line_no, source })?;
        apply(&mut session, event);
        events += 1;

        for command in session.bus_mut().take_history() {
            commands += 1;
            print_line(&mut stdout, &Output::Command { line: line_no, command: &command })?;
        }
        for notice in session.take_notices() {
            print_line(&mut stdout, &Output::Notice { line: line_no, notice: &notice })?;
        }
    }

    session.refresh();
    if let Some(out) = &args.out {
        let json = serde_json::to_string_pretty(&**session.state()).map_err(CliError::Encode)?;
        fs::write(out, json)?;
    }
    info!(events, commands, "replay: done");
    Ok(())
}

fn apply(session: &mut Session<Store>, event: Event) {
    match event {
        Event::PointerDown { x, y, target, handle } => {
            session.on_pointer_down(Point::new(x, y), target, handle);
        }
        Event::PointerUp { x, y, target, handle } => {
            session.on_pointer_up(Point::new(x, y), target, handle);
        }
        Event::PointerMove { x, y, bounds, hovered, handle } => {
            let bounds = bounds.unwrap_or(Rect2D::new(f64::MIN, f64::MIN, f64::MAX, f64::MAX));
            session.on_pointer_move(Point::new(x, y), &bounds, hovered, handle);
        }
        Event::KeyDown { key } => {
            session.on_key_down(&key);
        }
        Event::KeyUp { key } => {
            session.on_key_up(&key);
        }
        Event::FocusLost => session.on_focus_lost(),
        Event::GoToItem { index } => {
            if let Err(e) = session.go_to_item(index) {
                warn!(error = %e, index, "replay: go to item failed");
            }
        }
    }
}

fn print_line(out: &mut impl Write, value: &Output<'_>) -> Result<(), CliError> {
    let json = serde_json::to_string(value).map_err(CliError::Encode)?;
    writeln!(out, "{json}")?;
    Ok(())
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| read_error(path, source))
}

fn read_error(path: &Path, source: io::Error) -> CliError {
    CliError::Read { path: path.display().to_string(), source }
}
