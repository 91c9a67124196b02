//! Pure constructors turning one domain item into one positioned node.

use std::sync::Arc;

use crate::model::{
    AuthPayload, Cardinality, FeaturePayload, Node, NodeKind, NodePayload, NotePayload,
    PalettePayload, PersonaPayload, Position, Provenance, RolePayload, ScreenPayload, Size,
    TablePayload, TextPayload, TypographyPayload,
};
use crate::placement::{self, PlacementConfig};

/// How a desired node is identified across reconciliation passes.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Singleton,
    Sourced { source_id: String, index: usize },
}

/// A node a stage wants to exist, before it is matched or placed.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub payload: NodePayload,
    pub identity: Identity,
}

impl Entity {
    pub fn singleton(payload: NodePayload) -> Self {
        Self {
            payload,
            identity: Identity::Singleton,
        }
    }

    pub fn sourced(payload: NodePayload, source_id: impl Into<String>, index: usize) -> Self {
        Self {
            payload,
            identity: Identity::Sourced {
                source_id: source_id.into(),
                index,
            },
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.payload.kind()
    }

    pub fn source_id(&self) -> Option<&str> {
        match &self.identity {
            Identity::Singleton => None,
            Identity::Sourced { source_id, .. } => Some(source_id),
        }
    }

    pub fn node_id(&self) -> String {
        match &self.identity {
            Identity::Singleton => self
                .kind()
                .singleton_id()
                .unwrap_or_else(|| self.kind().slug().to_string()),
            Identity::Sourced { source_id, .. } => collection_node_id(self.kind(), source_id),
        }
    }
}

/// Node id for a collection item, e.g. `persona:p1`.
pub fn collection_node_id(kind: NodeKind, source_id: &str) -> String {
    format!("{}:{}", kind.slug(), source_id)
}

/// Preferred top-left corner for a kind; each stage owns a canvas region.
pub fn anchor_for(kind: NodeKind) -> Position {
    match kind {
        NodeKind::AppName => Position::new(0.0, 0.0),
        NodeKind::Tagline => Position::new(0.0, 140.0),
        NodeKind::ProblemStatement => Position::new(0.0, 280.0),
        NodeKind::TargetAudience => Position::new(0.0, 420.0),
        NodeKind::Persona => Position::new(360.0, 0.0),
        NodeKind::Feature => Position::new(0.0, 900.0),
        NodeKind::Screen => Position::new(1600.0, 0.0),
        NodeKind::DataTable => Position::new(1600.0, 1000.0),
        NodeKind::AuthStrategy => Position::new(3000.0, 0.0),
        NodeKind::Role => Position::new(3000.0, 260.0),
        NodeKind::ColorPalette => Position::new(3000.0, 900.0),
        NodeKind::Typography => Position::new(3000.0, 1100.0),
        NodeKind::Note => Position::new(0.0, -400.0),
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeFactory {
    placement: PlacementConfig,
}

impl NodeFactory {
    pub fn new(placement: PlacementConfig) -> Self {
        Self { placement }
    }

    pub fn placement(&self) -> &PlacementConfig {
        &self.placement
    }

    /// Dispatch to the constructor for the entity's kind.
    pub fn create(&self, entity: &Entity, existing: &[Arc<Node>]) -> Node {
        let (source_id, index) = match &entity.identity {
            Identity::Singleton => ("", 0),
            Identity::Sourced { source_id, index } => (source_id.as_str(), *index),
        };
        match entity.payload.clone() {
            NodePayload::AppName(p) => self.app_name(p, existing),
            NodePayload::Tagline(p) => self.tagline(p, existing),
            NodePayload::ProblemStatement(p) => self.problem_statement(p, existing),
            NodePayload::TargetAudience(p) => self.target_audience(p, existing),
            NodePayload::AuthStrategy(p) => self.auth_strategy(p, existing),
            NodePayload::ColorPalette(p) => self.color_palette(p, existing),
            NodePayload::Typography(p) => self.typography(p, existing),
            NodePayload::Persona(p) => self.persona(p, source_id, index, existing),
            NodePayload::Feature(p) => self.feature(p, source_id, index, existing),
            NodePayload::Screen(p) => self.screen(p, source_id, index, existing),
            NodePayload::DataTable(p) => self.data_table(p, source_id, index, existing),
            NodePayload::Role(p) => self.role(p, source_id, index, existing),
            NodePayload::Note(p) => self.note(p, None, existing),
        }
    }

    pub fn app_name(&self, payload: TextPayload, existing: &[Arc<Node>]) -> Node {
        self.singleton(NodePayload::AppName(payload), existing)
    }

    pub fn tagline(&self, payload: TextPayload, existing: &[Arc<Node>]) -> Node {
        self.singleton(NodePayload::Tagline(payload), existing)
    }

    pub fn problem_statement(&self, payload: TextPayload, existing: &[Arc<Node>]) -> Node {
        self.singleton(NodePayload::ProblemStatement(payload), existing)
    }

    pub fn target_audience(&self, payload: TextPayload, existing: &[Arc<Node>]) -> Node {
        self.singleton(NodePayload::TargetAudience(payload), existing)
    }

    pub fn auth_strategy(&self, payload: AuthPayload, existing: &[Arc<Node>]) -> Node {
        self.singleton(NodePayload::AuthStrategy(payload), existing)
    }

    pub fn color_palette(&self, payload: PalettePayload, existing: &[Arc<Node>]) -> Node {
        self.singleton(NodePayload::ColorPalette(payload), existing)
    }

    pub fn typography(&self, payload: TypographyPayload, existing: &[Arc<Node>]) -> Node {
        self.singleton(NodePayload::Typography(payload), existing)
    }

    pub fn persona(
        &self,
        payload: PersonaPayload,
        source_id: &str,
        index: usize,
        existing: &[Arc<Node>],
    ) -> Node {
        self.collection(NodePayload::Persona(payload), source_id, index, existing)
    }

    pub fn feature(
        &self,
        payload: FeaturePayload,
        source_id: &str,
        index: usize,
        existing: &[Arc<Node>],
    ) -> Node {
        self.collection(NodePayload::Feature(payload), source_id, index, existing)
    }

    pub fn screen(
        &self,
        payload: ScreenPayload,
        source_id: &str,
        index: usize,
        existing: &[Arc<Node>],
    ) -> Node {
        self.collection(NodePayload::Screen(payload), source_id, index, existing)
    }

    /// Tables grow with their column count.
    pub fn data_table(
        &self,
        payload: TablePayload,
        source_id: &str,
        index: usize,
        existing: &[Arc<Node>],
    ) -> Node {
        let base = NodeKind::DataTable.default_size();
        let size = Size::new(
            base.width,
            base.height.max(72.0 + 28.0 * payload.columns.len() as f64),
        );
        self.build(
            NodePayload::DataTable(payload),
            collection_node_id(NodeKind::DataTable, source_id),
            Some(source_id.to_string()),
            index,
            size,
            existing,
        )
    }

    pub fn role(
        &self,
        payload: RolePayload,
        source_id: &str,
        index: usize,
        existing: &[Arc<Node>],
    ) -> Node {
        self.collection(NodePayload::Role(payload), source_id, index, existing)
    }

    /// User-created note. An explicit position is honoured as-is; without
    /// one the note is smart-placed near the notes region.
    pub fn note(&self, payload: NotePayload, at: Option<Position>, existing: &[Arc<Node>]) -> Node {
        let kind = NodeKind::Note;
        let size = kind.default_size();
        let position = at.unwrap_or_else(|| {
            placement::resolve(existing, size, kind, anchor_for(kind), &self.placement)
        });
        Node {
            id: format!("{}:{}", kind.slug(), uuid::Uuid::new_v4()),
            payload: NodePayload::Note(payload),
            position,
            size,
            provenance: Provenance::user(),
            adjacency: Default::default(),
        }
    }

    fn singleton(&self, payload: NodePayload, existing: &[Arc<Node>]) -> Node {
        let kind = payload.kind();
        debug_assert_eq!(kind.cardinality(), Cardinality::Singleton);
        let id = kind
            .singleton_id()
            .unwrap_or_else(|| kind.slug().to_string());
        self.build(payload, id, None, 0, kind.default_size(), existing)
    }

    fn collection(
        &self,
        payload: NodePayload,
        source_id: &str,
        index: usize,
        existing: &[Arc<Node>],
    ) -> Node {
        let kind = payload.kind();
        self.build(
            payload,
            collection_node_id(kind, source_id),
            Some(source_id.to_string()),
            index,
            kind.default_size(),
            existing,
        )
    }

    fn build(
        &self,
        payload: NodePayload,
        id: String,
        source_id: Option<String>,
        index: usize,
        size: Size,
        existing: &[Arc<Node>],
    ) -> Node {
        let kind = payload.kind();
        let anchor = self.indexed_anchor(kind, index, size);
        let position = placement::resolve(existing, size, kind, anchor, &self.placement);
        let provenance = match kind.stage() {
            Some(stage) => Provenance::generated(stage, source_id),
            None => Provenance::user(),
        };
        Node {
            id,
            payload,
            position,
            size,
            provenance,
            adjacency: Default::default(),
        }
    }

    /// Collection items start from their own grid cell so a fresh pass lays
    /// items out in input order.
    fn indexed_anchor(&self, kind: NodeKind, index: usize, size: Size) -> Position {
        let base = anchor_for(kind);
        if kind.cardinality() != Cardinality::Collection {
            return base;
        }
        let columns = self.placement.grid_columns.max(1);
        base.offset(
            (index % columns) as f64 * (size.width + self.placement.gap),
            (index / columns) as f64 * (size.height + self.placement.gap),
        )
    }
}
