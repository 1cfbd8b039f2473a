use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rows per page. Fixed for every collection.
pub const PAGE_SIZE: usize = 10;

/// Number of pages needed to hold `total` rows.
pub fn pages_for(total: u64) -> u32 {
    total.div_ceil(PAGE_SIZE as u64) as u32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<E> {
    pub items: Vec<E>,
    pub page: u32,
    pub pages: u32,
    pub total: u64,
}

impl<E> Page<E> {
    pub fn info(&self) -> PageInfo {
        PageInfo {
            page: self.page,
            pages: self.pages,
            total: self.total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u32,
    pub pages: u32,
    pub total: u64,
}

impl PageInfo {
    pub fn is_last(&self) -> bool {
        self.pages == 0 || self.page >= self.pages
    }
}

/// Search request: `search` is matched as a case-insensitive substring, either
/// against `field` alone or against every searchable column. `filters` are
/// equality matches keyed by wire field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default, flatten)]
    pub filters: BTreeMap<String, serde_json::Value>,
}

fn first_page() -> u32 {
    1
}

impl SearchQuery {
    pub fn at_page(&self, page: u32) -> SearchQuery {
        SearchQuery {
            page,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_round_up() {
        assert_eq!(pages_for(0), 0);
        assert_eq!(pages_for(1), 1);
        assert_eq!(pages_for(10), 1);
        assert_eq!(pages_for(11), 2);
        assert_eq!(pages_for(20), 2);
    }

    #[test]
    fn search_query_collects_extra_keys_as_filters() {
        let raw = serde_json::json!({
            "search": "eng",
            "field": "name",
            "facultyId": "f-1"
        });
        let q: SearchQuery = serde_json::from_value(raw).expect("parse query");
        assert_eq!(q.page, 1);
        assert_eq!(q.field.as_deref(), Some("name"));
        assert_eq!(
            q.filters.get("facultyId").and_then(|v| v.as_str()),
            Some("f-1")
        );
    }
}
