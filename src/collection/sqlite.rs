use super::error::RequestFailure;
use super::page::{pages_for, Page, SearchQuery, PAGE_SIZE};
use super::service::CollectionService;
use crate::db;
use crate::entities::{now, Table};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::marker::PhantomData;
use uuid::Uuid;

/// The collection service for one table of the workspace database.
pub struct SqliteCollection<'c, T> {
    conn: &'c Connection,
    _table: PhantomData<fn() -> T>,
}

impl<'c, T: Table> SqliteCollection<'c, T> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            _table: PhantomData,
        }
    }

    fn find(&self, id: &str) -> Result<Option<T>, RequestFailure> {
        let sql = format!("SELECT {} FROM {} WHERE id = ?", T::SELECT, T::TABLE);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(T::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Fetches one page under `where_sql`. Pages past the end are clamped to
    /// the last page.
    fn fetch(&self, page: u32, where_sql: &str, params: Vec<Value>) -> Result<Page<T>, RequestFailure> {
        if page == 0 {
            return Err(RequestFailure::rejected("bad_params", "page must be >= 1"));
        }
        let count_sql = format!("SELECT COUNT(*) FROM {} {}", T::TABLE, where_sql);
        let total: i64 = self
            .conn
            .query_row(&count_sql, params_from_iter(params.iter()), |r| r.get(0))?;
        let total = total.max(0) as u64;
        let pages = pages_for(total);
        let page = if pages > 0 { page.min(pages) } else { 1 };
        let offset = (page as i64 - 1) * PAGE_SIZE as i64;

        let sql = format!(
            "SELECT {} FROM {} {} ORDER BY {} LIMIT ? OFFSET ?",
            T::SELECT,
            T::TABLE,
            where_sql,
            T::ORDER_BY
        );
        let mut bind = params;
        bind.push(Value::Integer(PAGE_SIZE as i64));
        bind.push(Value::Integer(offset));
        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(bind.iter()), |row| T::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            page,
            pages,
            total,
        })
    }

    fn ensure_writable(&self) -> Result<(), RequestFailure> {
        if T::READ_ONLY {
            Err(RequestFailure::read_only(T::KIND))
        } else {
            Ok(())
        }
    }
}

/// Builds the WHERE clause for a search. Field and filter names are checked
/// against the table's whitelists; values are always bound. Text is compared
/// after Unicode lowercasing on both sides.
fn search_clause<T: Table>(query: &SearchQuery) -> Result<(String, Vec<Value>), RequestFailure> {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    let needle = query.search.trim();
    if !needle.is_empty() {
        let columns: Vec<&str> = match query.field.as_deref().filter(|f| !f.is_empty()) {
            Some(field) => {
                let Some((_, col)) = T::SEARCH.iter().find(|(f, _)| *f == field) else {
                    return Err(RequestFailure::rejected(
                        "bad_params",
                        format!("{field} is not searchable on {}", T::KIND),
                    ));
                };
                vec![*col]
            }
            None => T::SEARCH.iter().map(|(_, c)| *c).collect(),
        };
        let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
        let ors: Vec<String> = columns
            .iter()
            .map(|c| format!("{}({c}) LIKE ? ESCAPE '\\'", db::FOLD_CASE_FN))
            .collect();
        for _ in &columns {
            params.push(Value::Text(pattern.clone()));
        }
        clauses.push(format!("({})", ors.join(" OR ")));
    }

    for (key, value) in &query.filters {
        let Some((_, col)) = T::FILTERS.iter().find(|(f, _)| f == key) else {
            return Err(RequestFailure::rejected(
                "bad_params",
                format!("{key} is not a filter on {}", T::KIND),
            ));
        };
        let bound = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Bool(b) => Value::Integer(if *b { 1 } else { 0 }),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Real(n.as_f64().unwrap_or_default()),
            },
            _ => {
                return Err(RequestFailure::rejected(
                    "bad_params",
                    format!("filter {key} must be a scalar"),
                ))
            }
        };
        clauses.push(format!("{col} = ?"));
        params.push(bound);
    }

    if clauses.is_empty() {
        Ok((String::new(), params))
    } else {
        Ok((format!("WHERE {}", clauses.join(" AND ")), params))
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl<T: Table> CollectionService for SqliteCollection<'_, T> {
    type Item = T;
    type Draft = T::Draft;

    fn list_page(&self, page: u32) -> Result<Page<T>, RequestFailure> {
        self.fetch(page, "", Vec::new())
    }

    fn list_all(&self) -> Result<Vec<T>, RequestFailure> {
        let sql = format!("SELECT {} FROM {} ORDER BY {}", T::SELECT, T::TABLE, T::ORDER_BY);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| T::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn create(&self, draft: &T::Draft) -> Result<T, RequestFailure> {
        self.ensure_writable()?;
        T::validate(self.conn, None, draft)?;
        let id = Uuid::new_v4().to_string();
        T::insert(self.conn, &id, draft, &now())?;
        debug!("{} created {id}", T::KIND);
        self.find(&id)?
            .ok_or_else(|| RequestFailure::not_found(T::KIND, &id))
    }

    fn update(&self, id: &str, draft: &T::Draft) -> Result<T, RequestFailure> {
        self.ensure_writable()?;
        if self.find(id)?.is_none() {
            return Err(RequestFailure::not_found(T::KIND, id));
        }
        T::validate(self.conn, Some(id), draft)?;
        T::update(self.conn, id, draft, &now())?;
        debug!("{} updated {id}", T::KIND);
        self.find(id)?
            .ok_or_else(|| RequestFailure::not_found(T::KIND, id))
    }

    fn delete(&self, ids: &[String]) -> Result<bool, RequestFailure> {
        self.ensure_writable()?;
        if ids.is_empty() {
            return Ok(false);
        }
        let tx = self.conn.unchecked_transaction()?;
        let sql = format!("DELETE FROM {} WHERE id = ?", T::TABLE);
        let mut deleted = 0usize;
        for id in ids {
            match tx.execute(&sql, [id]) {
                Ok(n) => deleted += n,
                Err(e) => {
                    let _ = tx.rollback();
                    if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
                        return Err(RequestFailure::rejected(
                            "in_use",
                            format!("{} {id} is still referenced by other records", T::KIND),
                        ));
                    }
                    return Err(e.into());
                }
            }
        }
        tx.commit()?;
        debug!("{} deleted {deleted} of {}", T::KIND, ids.len());
        Ok(deleted > 0)
    }

    fn search(&self, query: &SearchQuery) -> Result<Page<T>, RequestFailure> {
        let (where_sql, params) = search_clause::<T>(query)?;
        self.fetch(query.page, &where_sql, params)
    }
}
