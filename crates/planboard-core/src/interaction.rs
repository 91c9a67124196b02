//! Pointer and keyboard gestures on the canvas.
//!
//! Raw events go in, at most one gesture is active at a time, and every
//! commit goes through the [`GraphStore`]. Zoom is a property of the
//! [`Viewport`] and never occupies a gesture state.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::model::{EdgeKind, Node, Position, Rect, Size};
use crate::store::{GraphStore, NodeUpdate};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// `last` is the previous pointer position in screen space.
    Panning { last: Position },
    DraggingNode {
        id: String,
        pointer_start: Position,
        node_start: Position,
    },
    ResizingNode {
        id: String,
        pointer_start: Position,
        size_start: Size,
    },
    Connecting { from: String },
}

impl Gesture {
    /// The node the gesture acts on, if any.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Gesture::DraggingNode { id, .. } | Gesture::ResizingNode { id, .. } => Some(id),
            Gesture::Connecting { from } => Some(from),
            Gesture::Idle | Gesture::Panning { .. } => None,
        }
    }
}

/// Screen-to-canvas transform: `canvas = (screen - offset) / zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Viewport {
    pub offset: Position,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Position::new(0.0, 0.0),
            zoom: 1.0,
        }
    }
}

impl Viewport {
    pub fn to_canvas(&self, screen: Position) -> Position {
        Position::new((screen.x - self.offset.x) / self.zoom, (screen.y - self.offset.y) / self.zoom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    fn pans(&self) -> bool {
        self.alt || self.ctrl || self.meta
    }
}

/// A pointer press, in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerEvent {
    pub position: Position,
    pub button: PointerButton,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn primary(x: f64, y: f64) -> Self {
        Self {
            position: Position::new(x, y),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Delete,
    Backspace,
    Space,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitTarget {
    Background,
    Node(String),
    ResizeHandle(String),
}

/// Topmost node under `point` (later nodes are drawn on top). The resize
/// handle is the `handle`-sized square in a node's bottom-right corner.
pub fn hit_test(nodes: &[Arc<Node>], point: Position, handle: f64) -> HitTarget {
    for node in nodes.iter().rev() {
        let rect = node.rect();
        if !rect.contains(point) {
            continue;
        }
        let grip = Rect::new(
            Position::new(rect.right() - handle, rect.bottom() - handle),
            Size::new(handle, handle),
        );
        return if grip.contains(point) {
            HitTarget::ResizeHandle(node.id.clone())
        } else {
            HitTarget::Node(node.id.clone())
        };
    }
    HitTarget::Background
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Zoom factor applied per wheel event.
    pub zoom_step: f64,
    /// Resizing never shrinks a node below this.
    pub min_size: Size,
    /// Resize handle size in screen pixels.
    pub handle_size: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 3.0,
            zoom_step: 1.1,
            min_size: Size::new(120.0, 60.0),
            handle_size: 12.0,
        }
    }
}

/// What a handler did, for the caller to render or persist.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEffect {
    None,
    GestureStarted,
    GestureEnded,
    SelectionChanged(Option<String>),
    Panned { dx: f64, dy: f64 },
    NodeMoved { id: String, position: Position },
    NodeResized { id: String, size: Size },
    ConnectionStarted { from: String },
    EdgeCreated { id: String },
    ConnectionCancelled,
    NodeRemoved { id: String },
    Zoomed { zoom: f64 },
}

#[derive(Debug, Clone, Default)]
pub struct InteractionMachine {
    gesture: Gesture,
    viewport: Viewport,
    selection: Option<String>,
    space_held: bool,
    config: InteractionConfig,
}

impl InteractionMachine {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Viewport {
            offset: viewport.offset,
            zoom: self.clamp_zoom(viewport.zoom),
        };
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == Gesture::Idle
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    // --- Pointer ---

    pub fn pointer_down(&mut self, store: &mut GraphStore, event: PointerEvent) -> InteractionEffect {
        let point = self.viewport.to_canvas(event.position);
        let target = hit_test(store.nodes(), point, self.config.handle_size / self.viewport.zoom);

        if let Gesture::Connecting { .. } = self.gesture {
            return match target {
                HitTarget::Node(id) | HitTarget::ResizeHandle(id) => self.end_connection(store, &id),
                HitTarget::Background => self.cancel_connection(),
            };
        }
        if !self.is_idle() {
            return InteractionEffect::None;
        }

        let pan = event.button == PointerButton::Middle
            || (event.button == PointerButton::Primary && (event.modifiers.pans() || self.space_held));
        if pan {
            self.gesture = Gesture::Panning { last: event.position };
            return InteractionEffect::GestureStarted;
        }
        if event.button != PointerButton::Primary {
            return InteractionEffect::None;
        }

        match target {
            HitTarget::Background => self.set_selection(None),
            HitTarget::ResizeHandle(id) => {
                let Some(size_start) = store.node(&id).map(|n| n.size) else {
                    return InteractionEffect::None;
                };
                self.gesture = Gesture::ResizingNode {
                    id: id.clone(),
                    pointer_start: event.position,
                    size_start,
                };
                self.set_selection(Some(id)).or_started()
            }
            HitTarget::Node(id) => {
                let Some(node_start) = store.node(&id).map(|n| n.position) else {
                    return InteractionEffect::None;
                };
                self.gesture = Gesture::DraggingNode {
                    id: id.clone(),
                    pointer_start: event.position,
                    node_start,
                };
                self.set_selection(Some(id)).or_started()
            }
        }
    }

    /// `position` is the pointer in screen space.
    pub fn pointer_move(&mut self, store: &mut GraphStore, position: Position) -> InteractionEffect {
        let zoom = self.viewport.zoom;
        match &mut self.gesture {
            Gesture::Panning { last } => {
                let (dx, dy) = (position.x - last.x, position.y - last.y);
                *last = position;
                self.viewport.offset = self.viewport.offset.offset(dx, dy);
                InteractionEffect::Panned { dx, dy }
            }
            Gesture::DraggingNode {
                id,
                pointer_start,
                node_start,
            } => {
                let target = Position::new(
                    (node_start.x + (position.x - pointer_start.x) / zoom).max(0.0),
                    (node_start.y + (position.y - pointer_start.y) / zoom).max(0.0),
                );
                let id = id.clone();
                if !store.contains(&id) {
                    self.gesture = Gesture::Idle;
                    return InteractionEffect::GestureEnded;
                }
                if store.update_node(&id, NodeUpdate::position(target)) {
                    InteractionEffect::NodeMoved { id, position: target }
                } else {
                    InteractionEffect::None
                }
            }
            Gesture::ResizingNode {
                id,
                pointer_start,
                size_start,
            } => {
                let min = self.config.min_size;
                let size = Size::new(
                    (size_start.width + (position.x - pointer_start.x) / zoom).max(min.width),
                    (size_start.height + (position.y - pointer_start.y) / zoom).max(min.height),
                );
                let id = id.clone();
                if !store.contains(&id) {
                    self.gesture = Gesture::Idle;
                    return InteractionEffect::GestureEnded;
                }
                if store.update_node(&id, NodeUpdate::size(size)) {
                    InteractionEffect::NodeResized { id, size }
                } else {
                    InteractionEffect::None
                }
            }
            Gesture::Idle | Gesture::Connecting { .. } => InteractionEffect::None,
        }
    }

    /// Ends every gesture. A connection still pending at pointer-up is
    /// cancelled; a node click commits it earlier, in `pointer_down`.
    pub fn pointer_up(&mut self) -> InteractionEffect {
        match self.gesture {
            Gesture::Panning { .. } | Gesture::DraggingNode { .. } | Gesture::ResizingNode { .. } => {
                self.gesture = Gesture::Idle;
                InteractionEffect::GestureEnded
            }
            Gesture::Connecting { .. } => self.cancel_connection(),
            Gesture::Idle => InteractionEffect::None,
        }
    }

    // --- Connections ---

    pub fn start_connection(&mut self, store: &GraphStore, from: &str) -> InteractionEffect {
        if !self.is_idle() || !store.contains(from) {
            return InteractionEffect::None;
        }
        self.gesture = Gesture::Connecting { from: from.to_string() };
        InteractionEffect::ConnectionStarted { from: from.to_string() }
    }

    /// Commit an undirected link from the pending source to `to`. Always
    /// returns to idle; a self connection or an existing edge commits
    /// nothing.
    pub fn end_connection(&mut self, store: &mut GraphStore, to: &str) -> InteractionEffect {
        let from = match &self.gesture {
            Gesture::Connecting { from } => from.clone(),
            _ => return InteractionEffect::None,
        };
        self.gesture = Gesture::Idle;
        if from == to {
            return InteractionEffect::ConnectionCancelled;
        }
        match store.add_edge(&from, to, EdgeKind::Link) {
            Some(id) => InteractionEffect::EdgeCreated { id },
            None => InteractionEffect::ConnectionCancelled,
        }
    }

    pub fn cancel_connection(&mut self) -> InteractionEffect {
        if let Gesture::Connecting { .. } = self.gesture {
            self.gesture = Gesture::Idle;
            InteractionEffect::ConnectionCancelled
        } else {
            InteractionEffect::None
        }
    }

    // --- Keyboard ---

    pub fn key_down(&mut self, store: &mut GraphStore, key: Key) -> InteractionEffect {
        match key {
            Key::Escape => {
                let cancelled = self.cancel_connection();
                let cleared = self.set_selection(None);
                if cancelled != InteractionEffect::None {
                    cancelled
                } else {
                    cleared
                }
            }
            Key::Delete | Key::Backspace => {
                if !self.is_idle() {
                    return InteractionEffect::None;
                }
                let Some(id) = self.selection.take() else {
                    return InteractionEffect::None;
                };
                match store.remove_node(&id) {
                    Some(_) => InteractionEffect::NodeRemoved { id },
                    None => InteractionEffect::SelectionChanged(None),
                }
            }
            Key::Space => {
                self.space_held = true;
                InteractionEffect::None
            }
            Key::Other => InteractionEffect::None,
        }
    }

    pub fn key_up(&mut self, key: Key) -> InteractionEffect {
        if key == Key::Space {
            self.space_held = false;
        }
        InteractionEffect::None
    }

    // --- Zoom ---

    /// Zoom in for negative `delta`, out for positive, by one step per event,
    /// keeping the canvas point under `anchor` (screen space) fixed.
    pub fn wheel(&mut self, delta: f64, anchor: Position) -> InteractionEffect {
        if delta == 0.0 || !delta.is_finite() {
            return InteractionEffect::None;
        }
        let factor = if delta < 0.0 {
            self.config.zoom_step
        } else {
            1.0 / self.config.zoom_step
        };
        let zoom = self.clamp_zoom(self.viewport.zoom * factor);
        if zoom == self.viewport.zoom {
            return InteractionEffect::None;
        }
        let fixed = self.viewport.to_canvas(anchor);
        self.viewport = Viewport {
            offset: Position::new(anchor.x - fixed.x * zoom, anchor.y - fixed.y * zoom),
            zoom,
        };
        InteractionEffect::Zoomed { zoom }
    }

    fn clamp_zoom(&self, zoom: f64) -> f64 {
        if !zoom.is_finite() {
            return self.viewport.zoom;
        }
        zoom.clamp(self.config.min_zoom, self.config.max_zoom)
    }

    // --- Selection ---

    /// Select an existing node, or clear the selection with `None`.
    pub fn select(&mut self, store: &GraphStore, id: Option<&str>) -> InteractionEffect {
        match id {
            Some(id) if !store.contains(id) => InteractionEffect::None,
            other => self.set_selection(other.map(str::to_string)),
        }
    }

    /// Drop references to nodes that no longer exist, e.g. after a
    /// reconciliation pass removed them.
    pub fn sync_with_store(&mut self, store: &GraphStore) {
        if self.selection.as_deref().is_some_and(|id| !store.contains(id)) {
            self.selection = None;
        }
        if self.gesture.node_id().is_some_and(|id| !store.contains(id)) {
            tracing::debug!(gesture = ?self.gesture, "gesture target vanished, back to idle");
            self.gesture = Gesture::Idle;
        }
    }

    fn set_selection(&mut self, selection: Option<String>) -> InteractionEffect {
        if self.selection == selection {
            return InteractionEffect::None;
        }
        self.selection = selection.clone();
        InteractionEffect::SelectionChanged(selection)
    }
}

impl InteractionEffect {
    fn or_started(self) -> Self {
        match self {
            InteractionEffect::None => InteractionEffect::GestureStarted,
            other => other,
        }
    }
}
