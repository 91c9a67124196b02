use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::PlanboardError;

// --- Geometry ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance(self, other: Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned bounding box in canvas space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(position: Position, size: Size) -> Self {
        Self {
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Strict overlap: rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains(&self, point: Position) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }
}

// --- Stages and ownership ---

/// Upstream planning stages, declared in processing order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum StageId {
    Ideation,
    Features,
    Screens,
    Schema,
    Auth,
    Design,
}

impl StageId {
    pub const ALL: [StageId; 6] = [
        StageId::Ideation,
        StageId::Features,
        StageId::Screens,
        StageId::Schema,
        StageId::Auth,
        StageId::Design,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Ideation => "ideation",
            StageId::Features => "features",
            StageId::Screens => "screens",
            StageId::Schema => "schema",
            StageId::Auth => "auth",
            StageId::Design => "design",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = PlanboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageId::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| PlanboardError::UnknownStage(s.to_string()))
    }
}

/// Who may rewrite a node or edge. Serialized as the stage id or `"user"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Owner {
    Stage(StageId),
    #[default]
    User,
}

impl Owner {
    pub fn stage(&self) -> Option<StageId> {
        match self {
            Owner::Stage(stage) => Some(*stage),
            Owner::User => None,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Stage(stage) => f.write_str(stage.as_str()),
            Owner::User => f.write_str("user"),
        }
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        owner.to_string()
    }
}

impl TryFrom<String> for Owner {
    type Error = PlanboardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "user" {
            Ok(Owner::User)
        } else {
            value.parse().map(Owner::Stage)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    #[schemars(with = "String")]
    pub owner: Owner,
    /// Stable identity of the originating domain item (collection kinds only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default)]
    pub generated: bool,
}

impl Provenance {
    pub fn generated(stage: StageId, source_id: Option<String>) -> Self {
        Self {
            owner: Owner::Stage(stage),
            source_id,
            generated: true,
        }
    }

    pub fn user() -> Self {
        Self {
            owner: Owner::User,
            source_id: None,
            generated: false,
        }
    }
}

// --- Node kinds ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one per graph, fixed id.
    Singleton,
    /// One per item of a domain collection, id derived from the item.
    Collection,
    /// Created directly by the user.
    Freeform,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    AppName,
    Tagline,
    ProblemStatement,
    TargetAudience,
    Persona,
    Feature,
    Screen,
    DataTable,
    AuthStrategy,
    Role,
    ColorPalette,
    Typography,
    Note,
}

impl NodeKind {
    pub fn slug(&self) -> &'static str {
        match self {
            NodeKind::AppName => "app-name",
            NodeKind::Tagline => "tagline",
            NodeKind::ProblemStatement => "problem-statement",
            NodeKind::TargetAudience => "target-audience",
            NodeKind::Persona => "persona",
            NodeKind::Feature => "feature",
            NodeKind::Screen => "screen",
            NodeKind::DataTable => "table",
            NodeKind::AuthStrategy => "auth-strategy",
            NodeKind::Role => "role",
            NodeKind::ColorPalette => "color-palette",
            NodeKind::Typography => "typography",
            NodeKind::Note => "note",
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            NodeKind::AppName
            | NodeKind::Tagline
            | NodeKind::ProblemStatement
            | NodeKind::TargetAudience
            | NodeKind::AuthStrategy
            | NodeKind::ColorPalette
            | NodeKind::Typography => Cardinality::Singleton,
            NodeKind::Persona
            | NodeKind::Feature
            | NodeKind::Screen
            | NodeKind::DataTable
            | NodeKind::Role => Cardinality::Collection,
            NodeKind::Note => Cardinality::Freeform,
        }
    }

    /// The stage whose reconciler builds nodes of this kind.
    pub fn stage(&self) -> Option<StageId> {
        match self {
            NodeKind::AppName
            | NodeKind::Tagline
            | NodeKind::ProblemStatement
            | NodeKind::TargetAudience
            | NodeKind::Persona => Some(StageId::Ideation),
            NodeKind::Feature => Some(StageId::Features),
            NodeKind::Screen => Some(StageId::Screens),
            NodeKind::DataTable => Some(StageId::Schema),
            NodeKind::AuthStrategy | NodeKind::Role => Some(StageId::Auth),
            NodeKind::ColorPalette | NodeKind::Typography => Some(StageId::Design),
            NodeKind::Note => None,
        }
    }

    /// Column used by the kind-ranked hierarchical layout.
    pub fn rank(&self) -> u32 {
        match self {
            NodeKind::AppName
            | NodeKind::Tagline
            | NodeKind::ProblemStatement
            | NodeKind::TargetAudience => 0,
            NodeKind::Persona => 1,
            NodeKind::Feature => 2,
            NodeKind::Screen => 3,
            NodeKind::DataTable => 4,
            NodeKind::AuthStrategy | NodeKind::Role => 5,
            NodeKind::ColorPalette | NodeKind::Typography => 6,
            NodeKind::Note => 7,
        }
    }

    pub fn default_size(&self) -> Size {
        match self {
            NodeKind::AppName
            | NodeKind::Tagline
            | NodeKind::ProblemStatement
            | NodeKind::TargetAudience => Size::new(280.0, 100.0),
            NodeKind::Persona => Size::new(240.0, 180.0),
            NodeKind::Feature => Size::new(260.0, 160.0),
            NodeKind::Screen => Size::new(240.0, 320.0),
            NodeKind::DataTable => Size::new(260.0, 220.0),
            NodeKind::AuthStrategy => Size::new(280.0, 180.0),
            NodeKind::Role => Size::new(220.0, 140.0),
            NodeKind::ColorPalette => Size::new(280.0, 160.0),
            NodeKind::Typography => Size::new(280.0, 140.0),
            NodeKind::Note => Size::new(220.0, 160.0),
        }
    }

    /// Fixed id for singleton kinds, e.g. `ideation:app-name`.
    pub fn singleton_id(&self) -> Option<String> {
        match (self.cardinality(), self.stage()) {
            (Cardinality::Singleton, Some(stage)) => Some(format!("{}:{}", stage, self.slug())),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

// --- Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
pub struct TextPayload {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonaPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goals: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pain_points: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Must,
    #[default]
    Should,
    Could,
    Wont,
}

impl Priority {
    /// Accepts MoSCoW words and the common high/medium/low scale.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace(['\'', '-', ' '], "").as_str() {
            "must" | "musthave" | "high" | "critical" | "p0" => Some(Priority::Must),
            "should" | "shouldhave" | "medium" | "p1" => Some(Priority::Should),
            "could" | "couldhave" | "low" | "nice" | "nicetohave" | "p2" => Some(Priority::Could),
            "wont" | "wonthave" | "later" | "p3" => Some(Priority::Wont),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeaturePayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScreenPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default)]
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnPayload {
    pub name: String,
    #[serde(rename = "type", default = "default_column_type")]
    pub data_type: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// `table` or `table.column` this column points at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

pub(crate) fn default_column_type() -> String {
    "text".to_string()
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TablePayload {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<String>,
    #[serde(default)]
    pub mfa: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RolePayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PalettePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl PalettePayload {
    pub fn is_empty(&self) -> bool {
        self.primary.is_none()
            && self.secondary.is_none()
            && self.accent.is_none()
            && self.background.is_none()
            && self.text.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypographyPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_size: Option<f64>,
}

impl TypographyPayload {
    pub fn is_empty(&self) -> bool {
        self.heading_font.is_none() && self.body_font.is_none() && self.base_size.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
pub struct NotePayload {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// Kind-specific node data. The variant is the node's kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum NodePayload {
    AppName(TextPayload),
    Tagline(TextPayload),
    ProblemStatement(TextPayload),
    TargetAudience(TextPayload),
    Persona(PersonaPayload),
    Feature(FeaturePayload),
    Screen(ScreenPayload),
    DataTable(TablePayload),
    AuthStrategy(AuthPayload),
    Role(RolePayload),
    ColorPalette(PalettePayload),
    Typography(TypographyPayload),
    Note(NotePayload),
}

impl NodePayload {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodePayload::AppName(_) => NodeKind::AppName,
            NodePayload::Tagline(_) => NodeKind::Tagline,
            NodePayload::ProblemStatement(_) => NodeKind::ProblemStatement,
            NodePayload::TargetAudience(_) => NodeKind::TargetAudience,
            NodePayload::Persona(_) => NodeKind::Persona,
            NodePayload::Feature(_) => NodeKind::Feature,
            NodePayload::Screen(_) => NodeKind::Screen,
            NodePayload::DataTable(_) => NodeKind::DataTable,
            NodePayload::AuthStrategy(_) => NodeKind::AuthStrategy,
            NodePayload::Role(_) => NodeKind::Role,
            NodePayload::ColorPalette(_) => NodeKind::ColorPalette,
            NodePayload::Typography(_) => NodeKind::Typography,
            NodePayload::Note(_) => NodeKind::Note,
        }
    }

    /// Short display label, used by change summaries and exports.
    pub fn label(&self) -> &str {
        match self {
            NodePayload::AppName(t)
            | NodePayload::Tagline(t)
            | NodePayload::ProblemStatement(t)
            | NodePayload::TargetAudience(t) => &t.text,
            NodePayload::Persona(p) => &p.name,
            NodePayload::Feature(f) => &f.name,
            NodePayload::Screen(s) => &s.name,
            NodePayload::DataTable(t) => &t.name,
            NodePayload::AuthStrategy(a) => a.strategy.as_deref().unwrap_or("Authentication"),
            NodePayload::Role(r) => &r.name,
            NodePayload::ColorPalette(_) => "Color palette",
            NodePayload::Typography(_) => "Typography",
            NodePayload::Note(n) => &n.title,
        }
    }

    /// Payload body as a JSON object, keyed the way stage records are.
    pub fn data_value(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("data").map(serde_json::Value::take))
            .unwrap_or(serde_json::Value::Null)
    }
}

// --- Nodes and edges ---

/// A positioned, typed unit on the canvas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub payload: NodePayload,
    #[serde(default)]
    pub position: Position,
    pub size: Size,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub adjacency: BTreeSet<String>,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.payload.kind()
    }

    pub fn owner(&self) -> Owner {
        self.provenance.owner
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.position, self.size)
    }

    pub fn center(&self) -> Position {
        self.position
            .offset(self.size.width / 2.0, self.size.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
    Reference,
    Dependency,
    Flow,
    /// Undirected association, the default for user-drawn connections.
    #[default]
    Link,
}

impl EdgeKind {
    pub fn is_directed(&self) -> bool {
        !matches!(self, EdgeKind::Link)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub kind: EdgeKind,
    #[serde(default)]
    #[schemars(with = "String")]
    pub owner: Owner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: EdgeKind, owner: Owner) -> Self {
        let from = from.into();
        let to = to.into();
        Self {
            id: make_edge_id(&from, &to),
            from,
            to,
            kind,
            owner,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.from == node_id || self.to == node_id
    }

    /// Whether a `kind` edge from `from` to `to` would duplicate this one.
    /// Undirected edges on either side compare the unordered pair.
    pub fn duplicates(&self, from: &str, to: &str, kind: EdgeKind) -> bool {
        let same_direction = self.from == from && self.to == to;
        let reversed = self.from == to && self.to == from;
        if self.kind.is_directed() && kind.is_directed() {
            same_direction
        } else {
            same_direction || reversed
        }
    }
}

/// Generate an edge ID from source and target node IDs.
pub fn make_edge_id(from: &str, to: &str) -> String {
    format!("edge-{}-{}", from, to)
}
