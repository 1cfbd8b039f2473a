//! The admin-managed record types and how each maps onto the workspace
//! database.

mod class;
mod course;
mod faculty;
mod major;
mod stats;
mod student;
mod user;

pub use class::{ClassDraft, ClassGroup};
pub use course::{Course, CourseDraft};
pub use faculty::{Faculty, FacultyDraft};
pub use major::{Major, MajorDraft};
pub use stats::{ClassStats, FacultyStats};
pub use student::{Student, StudentDraft};
pub use user::{Role, User, UserDraft};

use crate::collection::{Entity, FieldErrors, Lookup, RequestFailure, SqliteCollection};
use crate::collection::CollectionService;
use crate::export::Column;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Every kind served over IPC, in menu order.
pub const KINDS: &[&str] = &[
    Faculty::KIND,
    Major::KIND,
    Course::KIND,
    ClassGroup::KIND,
    Student::KIND,
    User::KIND,
    FacultyStats::KIND,
    ClassStats::KIND,
];

/// A table (or view) backing one collection.
///
/// Column lists and mappings are compile-time constants; nothing from a
/// request is ever spliced into SQL text.
pub trait Table: Entity + Serialize + Debug + Sized + 'static {
    type Draft: DeserializeOwned + Clone + Debug + 'static;

    /// Wire name of the collection; also the IPC method prefix.
    const KIND: &'static str;
    const TABLE: &'static str;
    /// Columns in the order `from_row` reads them.
    const SELECT: &'static str;
    const ORDER_BY: &'static str;
    /// Searchable wire fields and their columns.
    const SEARCH: &'static [(&'static str, &'static str)];
    /// Wire fields accepted as equality filters and their columns.
    const FILTERS: &'static [(&'static str, &'static str)] = &[];
    /// Reference fields and the kind each one points at.
    const REFS: &'static [(&'static str, &'static str)] = &[];
    const READ_ONLY: bool = false;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn columns() -> Vec<Column<Self>>;

    fn ref_id(&self, _field: &str) -> Option<&str> {
        None
    }

    /// `id` is `None` on create.
    fn validate(
        _conn: &Connection,
        _id: Option<&str>,
        _draft: &Self::Draft,
    ) -> Result<(), FieldErrors> {
        Ok(())
    }

    fn insert(
        _conn: &Connection,
        _id: &str,
        _draft: &Self::Draft,
        _now: &str,
    ) -> Result<(), RequestFailure> {
        Err(RequestFailure::read_only(Self::KIND))
    }

    fn update(
        _conn: &Connection,
        _id: &str,
        _draft: &Self::Draft,
        _now: &str,
    ) -> Result<(), RequestFailure> {
        Err(RequestFailure::read_only(Self::KIND))
    }
}

/// Current time as stored in `created_at`/`updated_at`.
pub fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub(crate) fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_ref().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

pub(crate) fn check_ref(
    conn: &Connection,
    errors: &mut FieldErrors,
    field: &str,
    table: &str,
    id: &str,
) {
    if id.trim().is_empty() {
        errors.add(field, "must not be empty");
        return;
    }
    let sql = format!("SELECT 1 FROM {table} WHERE id = ?");
    match conn
        .query_row(&sql, [id], |r| r.get::<_, i64>(0))
        .optional()
    {
        Ok(Some(_)) => {}
        Ok(None) => errors.add(field, "does not exist"),
        Err(e) => errors.add(field, format!("could not be checked: {e}")),
    }
}

pub(crate) fn check_unique(
    conn: &Connection,
    errors: &mut FieldErrors,
    field: &str,
    table: &str,
    column: &str,
    value: &str,
    id: Option<&str>,
) {
    if value.trim().is_empty() {
        return;
    }
    let sql = format!("SELECT id FROM {table} WHERE {column} = ?");
    match conn
        .query_row(&sql, [value.trim()], |r| r.get::<_, String>(0))
        .optional()
    {
        Ok(Some(existing)) if Some(existing.as_str()) != id => {
            errors.add(field, "is already in use")
        }
        Ok(_) => {}
        Err(e) => errors.add(field, format!("could not be checked: {e}")),
    }
}

fn lookup_for<T: Table>(conn: &Connection) -> Result<Lookup, RequestFailure> {
    let all = SqliteCollection::<T>::new(conn).list_all()?;
    Ok(Lookup::from_items(&all))
}

/// Loads the label map for a referenced kind.
pub fn load_lookup(conn: &Connection, kind: &str) -> Result<Lookup, RequestFailure> {
    match kind {
        Faculty::KIND => lookup_for::<Faculty>(conn),
        Major::KIND => lookup_for::<Major>(conn),
        Course::KIND => lookup_for::<Course>(conn),
        ClassGroup::KIND => lookup_for::<ClassGroup>(conn),
        Student::KIND => lookup_for::<Student>(conn),
        User::KIND => lookup_for::<User>(conn),
        other => Err(RequestFailure::rejected(
            "bad_params",
            format!("{other} cannot be referenced"),
        )),
    }
}

/// Label of the record `field` points at, if it is still known.
pub(crate) fn ref_label<'a, T: Table>(
    row: &T,
    field: &str,
    lookups: &'a crate::collection::Lookups,
) -> Option<&'a str> {
    let kind = T::REFS.iter().find(|(f, _)| *f == field).map(|(_, k)| *k)?;
    let id = row.ref_id(field)?;
    lookups.get(kind)?.label(id)
}


#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;
    use crate::collection::Lookups;

    #[test]
    fn kinds_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for k in KINDS {
            assert!(seen.insert(*k), "duplicate kind {k}");
        }
    }

    #[test]
    fn lookup_resolves_reference_labels() {
        let conn = fixtures::conn();
        let f = fixtures::faculty(&conn, "SCI", "Science");
        let m = fixtures::major(&conn, &f.id, "BIO");

        let mut lookups = Lookups::new();
        lookups.insert(Faculty::KIND, load_lookup(&conn, Faculty::KIND).expect("lookup"));
        assert_eq!(ref_label(&m, "facultyId", &lookups), Some("Science"));
        assert_eq!(ref_label(&m, "code", &lookups), None);
        assert!(load_lookup(&conn, "stats.faculties").is_err());
    }
}
