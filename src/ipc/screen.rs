use crate::collection::{
    Command, ControllerError, Lookups, PaginatedCollectionController, RequestFailure, SearchQuery,
    SqliteCollection,
};
use crate::db;
use crate::entities::{
    load_lookup, ref_label, ClassGroup, ClassStats, Course, Faculty, FacultyStats, Major, Student,
    Table, User,
};
use crate::export::{encode_xlsx, visible_columns};
use log::warn;
use rusqlite::Connection;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    #[error(transparent)]
    Request(#[from] RequestFailure),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error("{0}")]
    BadPayload(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    Add,
    Remove,
    Toggle,
    Page,
    Clear,
}

impl SelectMode {
    pub fn parse(s: &str) -> Option<SelectMode> {
        match s {
            "add" => Some(SelectMode::Add),
            "remove" => Some(SelectMode::Remove),
            "toggle" => Some(SelectMode::Toggle),
            "page" => Some(SelectMode::Page),
            "clear" => Some(SelectMode::Clear),
            _ => None,
        }
    }
}

pub struct ExportFile {
    pub bytes: Vec<u8>,
    pub rows: usize,
}

/// One open admin table, type-erased so screens of every kind can live in
/// one map.
pub trait Screen {
    fn kind(&self) -> &'static str;
    fn load_page(&mut self, conn: &Connection, page: u32) -> Result<(), ScreenError>;
    fn create(&mut self, conn: &Connection, payload: serde_json::Value) -> Result<(), ScreenError>;
    fn update(
        &mut self,
        conn: &Connection,
        index: usize,
        payload: serde_json::Value,
    ) -> Result<(), ScreenError>;
    fn delete_one(&mut self, conn: &Connection, id: &str) -> Result<(), ScreenError>;
    /// `None` deletes the current selection.
    fn delete_many(&mut self, conn: &Connection, ids: Option<Vec<String>>) -> Result<(), ScreenError>;
    fn search(&mut self, conn: &Connection, query: SearchQuery) -> Result<(), ScreenError>;
    fn clear_search(&mut self, conn: &Connection) -> Result<(), ScreenError>;
    fn select(&mut self, ids: &[String], mode: SelectMode) -> Result<(), ScreenError>;
    fn set_columns(&mut self, conn: &Connection, columns: Vec<String>) -> Result<(), ScreenError>;
    fn export(&mut self, conn: &Connection) -> Result<ExportFile, ScreenError>;
    fn snapshot(&self) -> serde_json::Value;
}

fn columns_key(kind: &str) -> String {
    format!("columns.{kind}")
}

pub struct EntityScreen<T: Table> {
    id: String,
    controller: PaginatedCollectionController<T, T::Draft>,
    lookups: Lookups,
    columns: Option<Vec<String>>,
}

impl<T: Table> EntityScreen<T> {
    /// Opens the screen on page 1.
    pub fn open(conn: &Connection, id: String) -> Result<Self, ScreenError> {
        let columns = db::settings_get_json(conn, &columns_key(T::KIND))?
            .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok());
        let mut screen = Self {
            id,
            controller: PaginatedCollectionController::new(),
            lookups: Lookups::new(),
            columns,
        };
        let cmd = screen.controller.reload();
        screen.run(conn, cmd)?;
        Ok(screen)
    }

    fn run(
        &mut self,
        conn: &Connection,
        cmd: Command<T::Draft>,
    ) -> Result<Option<Vec<T>>, ScreenError> {
        let service = SqliteCollection::<T>::new(conn);
        let out = self.controller.run(&service, cmd);
        // Labels can change under any mutation, successful or not. A failed
        // refresh keeps the previous labels.
        if let Err(e) = self.refresh_lookups(conn) {
            warn!("{} lookups not refreshed: {e}", T::KIND);
        }
        Ok(out?)
    }

    fn refresh_lookups(&mut self, conn: &Connection) -> Result<(), RequestFailure> {
        for (_, kind) in T::REFS {
            self.lookups.insert(*kind, load_lookup(conn, kind)?);
        }
        Ok(())
    }

    fn draft(payload: serde_json::Value) -> Result<T::Draft, ScreenError> {
        serde_json::from_value(payload).map_err(|e| ScreenError::BadPayload(e.to_string()))
    }

    fn row_json(&self, row: &T) -> serde_json::Value {
        let mut v = serde_json::to_value(row).unwrap_or_else(|_| json!({ "id": row.id() }));
        if !T::REFS.is_empty() {
            let mut labels = serde_json::Map::new();
            for (field, _) in T::REFS {
                labels.insert(field.to_string(), json!(ref_label(row, field, &self.lookups)));
            }
            v["refLabels"] = serde_json::Value::Object(labels);
        }
        v
    }
}

impl<T: Table> Screen for EntityScreen<T> {
    fn kind(&self) -> &'static str {
        T::KIND
    }

    fn load_page(&mut self, conn: &Connection, page: u32) -> Result<(), ScreenError> {
        let cmd = self.controller.load_page(page)?;
        self.run(conn, cmd)?;
        Ok(())
    }

    fn create(&mut self, conn: &Connection, payload: serde_json::Value) -> Result<(), ScreenError> {
        let cmd = self.controller.create(Self::draft(payload)?);
        self.run(conn, cmd)?;
        Ok(())
    }

    fn update(
        &mut self,
        conn: &Connection,
        index: usize,
        payload: serde_json::Value,
    ) -> Result<(), ScreenError> {
        let cmd = self.controller.update(index, Self::draft(payload)?)?;
        self.run(conn, cmd)?;
        Ok(())
    }

    fn delete_one(&mut self, conn: &Connection, id: &str) -> Result<(), ScreenError> {
        let cmd = self.controller.delete_one(id)?;
        self.run(conn, cmd)?;
        Ok(())
    }

    fn delete_many(&mut self, conn: &Connection, ids: Option<Vec<String>>) -> Result<(), ScreenError> {
        let cmd = match ids {
            Some(ids) => self.controller.delete_many(ids)?,
            None => self.controller.delete_selected()?,
        };
        self.run(conn, cmd)?;
        Ok(())
    }

    fn search(&mut self, conn: &Connection, query: SearchQuery) -> Result<(), ScreenError> {
        let cmd = self.controller.search(query);
        self.run(conn, cmd)?;
        Ok(())
    }

    fn clear_search(&mut self, conn: &Connection) -> Result<(), ScreenError> {
        let cmd = self.controller.clear_search();
        self.run(conn, cmd)?;
        Ok(())
    }

    fn select(&mut self, ids: &[String], mode: SelectMode) -> Result<(), ScreenError> {
        match mode {
            SelectMode::Add => {
                for id in ids {
                    self.controller.select(id)?;
                }
            }
            SelectMode::Remove => {
                for id in ids {
                    self.controller.deselect(id);
                }
            }
            SelectMode::Toggle => {
                for id in ids {
                    self.controller.toggle(id)?;
                }
            }
            SelectMode::Page => self.controller.select_page(),
            SelectMode::Clear => self.controller.clear_selection(),
        }
        Ok(())
    }

    fn set_columns(&mut self, conn: &Connection, columns: Vec<String>) -> Result<(), ScreenError> {
        let known: Vec<&str> = T::columns().iter().map(|c| c.key).collect();
        if let Some(bad) = columns.iter().find(|c| !known.contains(&c.as_str())) {
            return Err(ScreenError::BadPayload(format!(
                "unknown column {bad} for {}",
                T::KIND
            )));
        }
        let columns = if columns.is_empty() { None } else { Some(columns) };
        db::settings_set_json(conn, &columns_key(T::KIND), &json!(columns))?;
        self.columns = columns;
        Ok(())
    }

    fn export(&mut self, conn: &Connection) -> Result<ExportFile, ScreenError> {
        let cmd = self.controller.export_all();
        let rows = self.run(conn, cmd)?.unwrap_or_default();
        let columns = visible_columns(T::columns(), self.columns.as_deref());
        let bytes = encode_xlsx(T::KIND, &columns, &rows, &self.lookups)?;
        Ok(ExportFile {
            bytes,
            rows: rows.len(),
        })
    }

    fn snapshot(&self) -> serde_json::Value {
        let items: Vec<serde_json::Value> = self
            .controller
            .items()
            .iter()
            .map(|row| self.row_json(row))
            .collect();
        let last_error = self.controller.last_error().map(|f| {
            json!({
                "code": f.code(),
                "message": f.to_string(),
                "details": f.details(),
            })
        });
        json!({
            "screenId": self.id,
            "kind": T::KIND,
            "currentPage": self.controller.current_page(),
            "pageInfo": self.controller.page_info(),
            "isLoading": self.controller.is_loading(),
            "phase": self.controller.phase(),
            "items": items,
            "selection": self.controller.selection(),
            "search": self.controller.search_query(),
            "columns": self.columns,
            "lastError": last_error,
        })
    }
}

/// Opens a screen for `kind`; `None` if the kind is unknown.
pub fn open_screen(
    conn: &Connection,
    kind: &str,
    id: String,
) -> Option<Result<Box<dyn Screen>, ScreenError>> {
    fn boxed<T: Table>(conn: &Connection, id: String) -> Result<Box<dyn Screen>, ScreenError> {
        Ok(Box::new(EntityScreen::<T>::open(conn, id)?))
    }
    Some(match kind {
        Faculty::KIND => boxed::<Faculty>(conn, id),
        Major::KIND => boxed::<Major>(conn, id),
        Course::KIND => boxed::<Course>(conn, id),
        ClassGroup::KIND => boxed::<ClassGroup>(conn, id),
        Student::KIND => boxed::<Student>(conn, id),
        User::KIND => boxed::<User>(conn, id),
        FacultyStats::KIND => boxed::<FacultyStats>(conn, id),
        ClassStats::KIND => boxed::<ClassStats>(conn, id),
        _ => return None,
    })
}
