use super::error::RequestFailure;
use super::page::{Page, SearchQuery};

/// The remote side of a collection. Implementations own transport and
/// timeouts; callers only see a payload or a `RequestFailure`.
pub trait CollectionService {
    type Item;
    type Draft;

    fn list_page(&self, page: u32) -> Result<Page<Self::Item>, RequestFailure>;

    fn list_all(&self) -> Result<Vec<Self::Item>, RequestFailure>;

    fn create(&self, draft: &Self::Draft) -> Result<Self::Item, RequestFailure>;

    fn update(&self, id: &str, draft: &Self::Draft) -> Result<Self::Item, RequestFailure>;

    /// Returns `false` when none of the ids existed.
    fn delete(&self, ids: &[String]) -> Result<bool, RequestFailure>;

    fn search(&self, query: &SearchQuery) -> Result<Page<Self::Item>, RequestFailure>;
}
