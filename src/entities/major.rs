use super::{check_ref, check_unique, ref_label, Table};
use crate::collection::{Entity, FieldErrors, RequestFailure};
use crate::export::{Cell, Column};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Major {
    pub id: String,
    pub faculty_id: String,
    pub code: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MajorDraft {
    #[serde(default)]
    pub faculty_id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
}

impl Entity for Major {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

impl Table for Major {
    type Draft = MajorDraft;

    const KIND: &'static str = "majors";
    const TABLE: &'static str = "majors";
    const SELECT: &'static str = "id, faculty_id, code, name, created_at, updated_at";
    const ORDER_BY: &'static str = "rowid";
    const SEARCH: &'static [(&'static str, &'static str)] = &[("code", "code"), ("name", "name")];
    const FILTERS: &'static [(&'static str, &'static str)] = &[("facultyId", "faculty_id")];
    const REFS: &'static [(&'static str, &'static str)] = &[("facultyId", "faculties")];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Major {
            id: row.get(0)?,
            faculty_id: row.get(1)?,
            code: row.get(2)?,
            name: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn ref_id(&self, field: &str) -> Option<&str> {
        match field {
            "facultyId" => Some(&self.faculty_id),
            _ => None,
        }
    }

    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("code", "Code", |m, _| Cell::from(m.code.as_str())),
            Column::new("name", "Major", |m, _| Cell::from(m.name.as_str())),
            Column::new("facultyId", "Faculty", |m, l| {
                Cell::from(ref_label(m, "facultyId", l))
            }),
        ]
    }

    fn validate(conn: &Connection, id: Option<&str>, draft: &MajorDraft) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("code", &draft.code);
        errors.require("name", &draft.name);
        check_ref(conn, &mut errors, "facultyId", "faculties", &draft.faculty_id);
        check_unique(conn, &mut errors, "code", "majors", "code", &draft.code, id);
        errors.into_result()
    }

    fn insert(conn: &Connection, id: &str, draft: &MajorDraft, now: &str) -> Result<(), RequestFailure> {
        conn.execute(
            "INSERT INTO majors(id, faculty_id, code, name, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?)",
            (id, &draft.faculty_id, draft.code.trim(), draft.name.trim(), now, now),
        )?;
        Ok(())
    }

    fn update(conn: &Connection, id: &str, draft: &MajorDraft, now: &str) -> Result<(), RequestFailure> {
        conn.execute(
            "UPDATE majors SET faculty_id = ?, code = ?, name = ?, updated_at = ? WHERE id = ?",
            (&draft.faculty_id, draft.code.trim(), draft.name.trim(), now, id),
        )?;
        Ok(())
    }
}
