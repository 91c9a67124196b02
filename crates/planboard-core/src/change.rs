use serde::{Deserialize, Serialize};

/// Node ids touched by one reconciliation pass (or several, merged).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphChange {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

impl GraphChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    pub fn merge(&mut self, other: GraphChange) {
        self.added.extend(other.added);
        self.updated.extend(other.updated);
        self.removed.extend(other.removed);
    }

    /// Human-readable report, one section per non-empty category.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No changes.".to_string();
        }
        let mut sections: Vec<String> = Vec::new();
        for (title, ids) in [
            ("Nodes added", &self.added),
            ("Nodes updated", &self.updated),
            ("Nodes removed", &self.removed),
        ] {
            if ids.is_empty() {
                continue;
            }
            let mut lines = vec![format!("{} ({}):", title, ids.len())];
            lines.extend(ids.iter().map(|id| format!("  - {}", id)));
            sections.push(lines.join("\n"));
        }
        sections.join("\n\n")
    }
}
