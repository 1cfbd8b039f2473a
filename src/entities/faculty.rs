use super::{check_unique, Table};
use crate::collection::{Entity, FieldErrors, RequestFailure};
use crate::export::{Cell, Column};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Faculty {
    pub id: String,
    pub code: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyDraft {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
}

impl Entity for Faculty {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

impl Table for Faculty {
    type Draft = FacultyDraft;

    const KIND: &'static str = "faculties";
    const TABLE: &'static str = "faculties";
    const SELECT: &'static str = "id, code, name, created_at, updated_at";
    const ORDER_BY: &'static str = "rowid";
    const SEARCH: &'static [(&'static str, &'static str)] = &[("code", "code"), ("name", "name")];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Faculty {
            id: row.get(0)?,
            code: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("code", "Code", |f, _| Cell::from(f.code.as_str())),
            Column::new("name", "Faculty", |f, _| Cell::from(f.name.as_str())),
            Column::new("createdAt", "Created", |f, _| {
                Cell::from(f.created_at.as_str())
            }),
        ]
    }

    fn validate(conn: &Connection, id: Option<&str>, draft: &FacultyDraft) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("code", &draft.code);
        errors.require("name", &draft.name);
        check_unique(conn, &mut errors, "code", "faculties", "code", &draft.code, id);
        errors.into_result()
    }

    fn insert(conn: &Connection, id: &str, draft: &FacultyDraft, now: &str) -> Result<(), RequestFailure> {
        conn.execute(
            "INSERT INTO faculties(id, code, name, created_at, updated_at) VALUES(?, ?, ?, ?, ?)",
            (id, draft.code.trim(), draft.name.trim(), now, now),
        )?;
        Ok(())
    }

    fn update(conn: &Connection, id: &str, draft: &FacultyDraft, now: &str) -> Result<(), RequestFailure> {
        conn.execute(
            "UPDATE faculties SET code = ?, name = ?, updated_at = ? WHERE id = ?",
            (draft.code.trim(), draft.name.trim(), now, id),
        )?;
        Ok(())
    }
}
