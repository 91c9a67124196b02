//! Board files on disk: `~/.planboard/{name}.board`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::adapter::{FlowDocument, FlowEdge, FlowNode};
use crate::error::{PlanboardError, Result};
use crate::model::{Edge, Node, StageId};

const BOARD_EXT: &str = "board";

/// A persisted board: the graph plus the last stage snapshot each
/// reconciler processed, so the next sync can short-circuit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoardFile {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[schemars(with = "BTreeMap<String, Value>")]
    pub stages: BTreeMap<StageId, Value>,
}

/// Resolve the global planboard directory (`~/.planboard/`), overridable
/// with `PLANBOARD_HOME`.
pub fn planboard_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("PLANBOARD_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".planboard")
}

fn board_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, BOARD_EXT))
}

/// List all board names (without extension), sorted.
pub fn list_boards() -> Result<Vec<String>> {
    list_boards_in(&planboard_dir())
}

pub fn list_boards_in(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name().to_string_lossy().to_string();
            name.strip_suffix(".board")
                .filter(|n| !n.starts_with('.'))
                .map(|n| n.to_string())
        })
        .collect();
    names.sort();
    Ok(names)
}

pub fn read_board(name: &str) -> Result<BoardFile> {
    read_board_in(&planboard_dir(), name)
}

pub fn read_board_in(dir: &Path, name: &str) -> Result<BoardFile> {
    let raw = fs::read_to_string(board_path(dir, name)).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PlanboardError::UnknownBoard(name.to_string()),
        _ => PlanboardError::Io(e),
    })?;
    Ok(serde_json::from_str(&raw)?)
}

/// Read a board, or start an empty one if it does not exist yet.
pub fn read_board_or_default(name: &str) -> Result<BoardFile> {
    read_board_or_default_in(&planboard_dir(), name)
}

pub fn read_board_or_default_in(dir: &Path, name: &str) -> Result<BoardFile> {
    match read_board_in(dir, name) {
        Err(e) if e.is_not_found() => Ok(BoardFile::default()),
        other => other,
    }
}

pub fn write_board(name: &str, board: &BoardFile) -> Result<()> {
    write_board_in(&planboard_dir(), name, board)
}

/// Atomic write (temp file + rename) so a watcher sees a single event
/// instead of truncate + write.
pub fn write_board_in(dir: &Path, name: &str, board: &BoardFile) -> Result<()> {
    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(board)?;
    let tmp = dir.join(format!(".{}.{}.tmp", name, BOARD_EXT));
    fs::write(&tmp, json)?;
    fs::rename(&tmp, board_path(dir, name))?;
    Ok(())
}

pub fn delete_board(name: &str) -> Result<()> {
    delete_board_in(&planboard_dir(), name)
}

/// Deleting a board that does not exist is not an error.
pub fn delete_board_in(dir: &Path, name: &str) -> Result<()> {
    let path = board_path(dir, name);
    if path.exists() {
        fs::remove_file(&path)?;
    }
    Ok(())
}

/// React-Flow shaped view of a stored board.
pub fn export_flow(board: &BoardFile) -> FlowDocument {
    FlowDocument {
        nodes: board.nodes.iter().map(FlowNode::from).collect(),
        edges: board.edges.iter().map(FlowEdge::from).collect(),
    }
}

/// Stage data file: a JSON object keyed by stage id.
pub fn read_stage_file(path: &Path) -> Result<BTreeMap<String, Value>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
