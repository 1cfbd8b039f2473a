use super::{check_ref, check_unique, ref_label, Table};
use crate::collection::{Entity, FieldErrors, RequestFailure};
use crate::export::{Cell, Column};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub faculty_id: String,
    pub code: String,
    pub name: String,
    pub credits: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDraft {
    #[serde(default)]
    pub faculty_id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub credits: i64,
}

impl Entity for Course {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        format!("{} {}", self.code, self.name)
    }
}

impl Table for Course {
    type Draft = CourseDraft;

    const KIND: &'static str = "courses";
    const TABLE: &'static str = "courses";
    const SELECT: &'static str = "id, faculty_id, code, name, credits, created_at, updated_at";
    const ORDER_BY: &'static str = "rowid";
    const SEARCH: &'static [(&'static str, &'static str)] = &[("code", "code"), ("name", "name")];
    const FILTERS: &'static [(&'static str, &'static str)] =
        &[("facultyId", "faculty_id"), ("credits", "credits")];
    const REFS: &'static [(&'static str, &'static str)] = &[("facultyId", "faculties")];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Course {
            id: row.get(0)?,
            faculty_id: row.get(1)?,
            code: row.get(2)?,
            name: row.get(3)?,
            credits: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
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
            Column::new("code", "Code", |c, _| Cell::from(c.code.as_str())),
            Column::new("name", "Course", |c, _| Cell::from(c.name.as_str())),
            Column::new("credits", "Credits", |c, _| Cell::Number(c.credits as f64)),
            Column::new("facultyId", "Faculty", |c, l| {
                Cell::from(ref_label(c, "facultyId", l))
            }),
        ]
    }

    fn validate(conn: &Connection, id: Option<&str>, draft: &CourseDraft) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("code", &draft.code);
        errors.require("name", &draft.name);
        if draft.credits <= 0 {
            errors.add("credits", "must be positive");
        }
        check_ref(conn, &mut errors, "facultyId", "faculties", &draft.faculty_id);
        check_unique(conn, &mut errors, "code", "courses", "code", &draft.code, id);
        errors.into_result()
    }

    fn insert(conn: &Connection, id: &str, draft: &CourseDraft, now: &str) -> Result<(), RequestFailure> {
        conn.execute(
            "INSERT INTO courses(id, faculty_id, code, name, credits, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                id,
                &draft.faculty_id,
                draft.code.trim(),
                draft.name.trim(),
                draft.credits,
                now,
                now,
            ),
        )?;
        Ok(())
    }

    fn update(conn: &Connection, id: &str, draft: &CourseDraft, now: &str) -> Result<(), RequestFailure> {
        conn.execute(
            "UPDATE courses
             SET faculty_id = ?, code = ?, name = ?, credits = ?, updated_at = ?
             WHERE id = ?",
            (
                &draft.faculty_id,
                draft.code.trim(),
                draft.name.trim(),
                draft.credits,
                now,
                id,
            ),
        )?;
        Ok(())
    }
}
