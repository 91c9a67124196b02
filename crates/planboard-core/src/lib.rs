//! Planboard: keeps a node-and-edge canvas in sync with staged planning
//! data, lays it out, and drives direct manipulation on top of it.

pub mod adapter;
pub mod board;
pub mod change;
pub mod config;
pub mod error;
pub mod extract;
pub mod factory;
pub mod interaction;
pub mod layout;
pub mod model;
pub mod placement;
pub mod reconcile;
pub mod storage;
pub mod store;

pub use board::{Board, InputEvent, StageData, WritebackHook};
pub use change::GraphChange;
pub use config::CanvasConfig;
pub use error::{PlanboardError, Result};
pub use layout::{CancelToken, LayoutAlgorithm, LayoutOptions, PositionMap};
pub use model::{Edge, EdgeKind, Node, NodeKind, NodePayload, Owner, Position, Size, StageId};
pub use store::{GraphStore, NodeUpdate, Nodes};
