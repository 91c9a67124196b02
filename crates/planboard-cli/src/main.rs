use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use notify::{recommended_watcher, EventKind, RecursiveMode, Watcher};
use planboard_core::config::read_settings;
use planboard_core::layout::{self, CancelToken, PositionMap};
use planboard_core::storage::{self, BoardFile};
use planboard_core::{Board, LayoutAlgorithm};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

/// A sync runs once the stage file has been quiet this long.
const DEBOUNCE: Duration = Duration::from_millis(250);

fn cli() -> Command {
    let board = || Arg::new("board").required(true).help("Board name under the planboard directory");
    let stage_file = || {
        Arg::new("stage-file")
            .required(true)
            .value_parser(clap::value_parser!(PathBuf))
            .help("JSON object keyed by stage id")
    };
    let layout = || {
        Arg::new("layout")
            .long("layout")
            .value_parser(LayoutAlgorithm::NAMES)
            .help("Re-layout the board after syncing")
    };

    Command::new("planboard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Sync staged planning data into canvas boards")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("sync")
                .about("Reconcile a stage file into a board")
                .arg(board())
                .arg(stage_file())
                .arg(layout()),
        )
        .subcommand(
            Command::new("layout")
                .about("Recompute node positions")
                .arg(board())
                .arg(
                    Arg::new("algorithm")
                        .required(true)
                        .value_parser(LayoutAlgorithm::NAMES),
                ),
        )
        .subcommand(
            Command::new("watch")
                .about("Re-sync a board whenever its stage file changes")
                .arg(board())
                .arg(stage_file())
                .arg(layout()),
        )
        .subcommand(Command::new("schema").about("Print the JSON schema of a board file"))
        .subcommand(Command::new("list").about("List boards"))
        .subcommand(Command::new("delete").about("Delete a board").arg(board()))
        .subcommand(
            Command::new("export")
                .about("Print a board as React-Flow nodes and edges")
                .arg(board())
                .arg(
                    Arg::new("compact")
                        .long("compact")
                        .action(ArgAction::SetTrue)
                        .help("Single-line JSON"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("sync", args)) => sync(args),
        Some(("layout", args)) => relayout(args),
        Some(("watch", args)) => watch(args).await,
        Some(("schema", _)) => {
            let schema = schemars::schema_for!(BoardFile);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        Some(("list", _)) => {
            for name in storage::list_boards()? {
                println!("{}", name);
            }
            Ok(())
        }
        Some(("delete", args)) => {
            let name = board_name(args)?;
            storage::delete_board(name).with_context(|| format!("deleting board '{}'", name))
        }
        Some(("export", args)) => {
            let name = board_name(args)?;
            let file = storage::read_board(name).with_context(|| format!("reading board '{}'", name))?;
            let flow = storage::export_flow(&file);
            let json = if args.get_flag("compact") {
                serde_json::to_string(&flow)?
            } else {
                serde_json::to_string_pretty(&flow)?
            };
            println!("{}", json);
            Ok(())
        }
        _ => unreachable!("subcommand_required"),
    }
}

// --- Arguments ---

fn board_name(args: &ArgMatches) -> Result<&str> {
    args.get_one::<String>("board")
        .map(String::as_str)
        .context("missing board name")
}

fn stage_file(args: &ArgMatches) -> Result<&Path> {
    args.get_one::<PathBuf>("stage-file")
        .map(PathBuf::as_path)
        .context("missing stage file")
}

fn algorithm(args: &ArgMatches, id: &str) -> Result<Option<LayoutAlgorithm>> {
    args.get_one::<String>(id)
        .map(|name| name.parse::<LayoutAlgorithm>())
        .transpose()
        .map_err(Into::into)
}

fn load(name: &str) -> Result<Board> {
    let file = storage::read_board_or_default(name).with_context(|| format!("reading board '{}'", name))?;
    Ok(Board::restore(file, read_settings()))
}

fn save(name: &str, board: &Board) -> Result<()> {
    storage::write_board(name, &board.to_file()).with_context(|| format!("writing board '{}'", name))
}

// --- Commands ---

fn sync(args: &ArgMatches) -> Result<()> {
    let name = board_name(args)?;
    let mut board = load(name)?;
    let changed = sync_once(&mut board, stage_file(args)?)?;
    if let Some(algorithm) = algorithm(args, "layout")? {
        board.auto_layout(algorithm);
    }
    save(name, &board)?;
    println!("{}", changed);
    Ok(())
}

/// Reconcile `path` into `board`, returning the change summary.
fn sync_once(board: &mut Board, path: &Path) -> Result<String> {
    let data = storage::read_stage_file(path).with_context(|| format!("reading {}", path.display()))?;
    let change = board.sync(&data);
    tracing::info!(
        added = change.added.len(),
        updated = change.updated.len(),
        removed = change.removed.len(),
        "synced {}",
        path.display()
    );
    Ok(change.summary())
}

fn relayout(args: &ArgMatches) -> Result<()> {
    let name = board_name(args)?;
    let algorithm = algorithm(args, "algorithm")?.context("missing algorithm")?;
    let mut board = load(name)?;
    let moved = board.auto_layout(algorithm);
    save(name, &board)?;
    println!("Moved {} node(s) with {} layout.", moved, algorithm);
    Ok(())
}

async fn watch(args: &ArgMatches) -> Result<()> {
    let name = board_name(args)?.to_string();
    let path = stage_file(args)?.to_path_buf();
    let algorithm = algorithm(args, "layout")?;
    let mut board = load(&name)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    let watched = path.clone();
    let mut watcher = recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        let Ok(event) = res else { return };
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return;
        }
        if event.paths.iter().any(|p| p.file_name() == watched.file_name()) {
            let _ = tx.send(());
        }
    })?;
    // Watch the parent so atomic replaces of the file are still seen.
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    tracing::info!(board = %name, file = %path.display(), "watching");

    let mut running: Option<LayoutTask> = None;

    loop {
        tokio::select! {
            event = rx.recv() => {
                if event.is_none() {
                    break;
                }
                settle(&mut rx, DEBOUNCE).await;

                match sync_once(&mut board, &path) {
                    Ok(summary) => println!("{}", summary),
                    Err(e) => {
                        tracing::warn!("{:#}", e);
                        continue;
                    }
                }
                save(&name, &board)?;

                if let Some(algorithm) = algorithm {
                    let token = board.begin_layout();
                    let nodes = std::sync::Arc::clone(board.nodes());
                    let edges = board.edges().to_vec();
                    let options = board.config().layout.clone();
                    let cancel = token.clone();
                    let handle = tokio::task::spawn_blocking(move || {
                        layout::compute_positions(&nodes, &edges, algorithm, &options, &cancel)
                    });
                    running = Some((token, handle));
                }
            }
            result = finished(&mut running) => {
                let Some((token, _)) = running.take() else { continue };
                let positions = result.context("layout task panicked")?;
                let moved = board.apply_layout(&token, positions);
                if moved > 0 {
                    save(&name, &board)?;
                    tracing::info!(moved, "layout applied");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

/// Swallow a burst of change events, returning once none arrived for
/// `quiet` or the channel closed. Events after that start the next burst.
async fn settle(rx: &mut mpsc::UnboundedReceiver<()>, quiet: Duration) {
    while let Ok(Some(())) = tokio::time::timeout(quiet, rx.recv()).await {}
}

type LayoutTask = (CancelToken, JoinHandle<Option<PositionMap>>);

/// Resolves when the running layout task finishes; pends forever when idle.
async fn finished(running: &mut Option<LayoutTask>) -> Result<Option<PositionMap>, JoinError> {
    match running {
        Some((_, handle)) => handle.await,
        None => std::future::pending().await,
    }
}
