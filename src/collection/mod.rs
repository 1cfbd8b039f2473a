//! Remote-backed paginated collections: the service contract, the SQLite
//! implementation of it, and the per-screen controller that keeps a loaded
//! page consistent with the service.

pub mod controller;
pub mod error;
pub mod lookup;
pub mod page;
pub mod service;
pub mod sqlite;

pub use controller::{Applied, Command, PaginatedCollectionController, Phase};
pub use error::{ControllerError, FieldErrors, RequestFailure};
pub use lookup::{Lookup, Lookups};
pub use page::{Page, PageInfo, SearchQuery, PAGE_SIZE};
pub use service::CollectionService;
pub use sqlite::SqliteCollection;

/// A record with a stable unique id. Nothing else about it is interpreted by
/// the collection layer.
pub trait Entity: Clone {
    fn id(&self) -> &str;

    /// Human-readable name used when another record refers to this one.
    fn label(&self) -> String {
        self.id().to_string()
    }
}
