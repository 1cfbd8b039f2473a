use super::Entity;
use std::collections::HashMap;

/// Lookups for every related kind a screen renders, keyed by kind.
pub type Lookups = HashMap<&'static str, Lookup>;

/// id -> display label for one related collection. Rows keep only the id of
/// the record they point at; the label is resolved here when rendering.
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    labels: HashMap<String, String>,
}

impl Lookup {
    pub fn from_items<E: Entity>(items: &[E]) -> Self {
        Self {
            labels: items
                .iter()
                .map(|e| (e.id().to_string(), e.label()))
                .collect(),
        }
    }

    pub fn label(&self, id: &str) -> Option<&str> {
        self.labels.get(id).map(|s| s.as_str())
    }
}
