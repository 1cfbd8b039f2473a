use super::{check_ref, check_unique, ref_label, Table};
use crate::collection::{Entity, FieldErrors, RequestFailure};
use crate::export::{Cell, Column};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

/// A cohort of students enrolled in one major.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub id: String,
    pub major_id: String,
    pub code: String,
    pub name: String,
    pub intake_year: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDraft {
    #[serde(default)]
    pub major_id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub intake_year: i64,
}

impl Entity for ClassGroup {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        self.code.clone()
    }
}

impl Table for ClassGroup {
    type Draft = ClassDraft;

    const KIND: &'static str = "classes";
    const TABLE: &'static str = "classes";
    const SELECT: &'static str = "id, major_id, code, name, intake_year, created_at, updated_at";
    const ORDER_BY: &'static str = "rowid";
    const SEARCH: &'static [(&'static str, &'static str)] = &[("code", "code"), ("name", "name")];
    const FILTERS: &'static [(&'static str, &'static str)] =
        &[("majorId", "major_id"), ("intakeYear", "intake_year")];
    const REFS: &'static [(&'static str, &'static str)] = &[("majorId", "majors")];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ClassGroup {
            id: row.get(0)?,
            major_id: row.get(1)?,
            code: row.get(2)?,
            name: row.get(3)?,
            intake_year: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn ref_id(&self, field: &str) -> Option<&str> {
        match field {
            "majorId" => Some(&self.major_id),
            _ => None,
        }
    }

    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("code", "Code", |c, _| Cell::from(c.code.as_str())),
            Column::new("name", "Class", |c, _| Cell::from(c.name.as_str())),
            Column::new("intakeYear", "Intake", |c, _| Cell::Number(c.intake_year as f64)),
            Column::new("majorId", "Major", |c, l| Cell::from(ref_label(c, "majorId", l))),
        ]
    }

    fn validate(conn: &Connection, id: Option<&str>, draft: &ClassDraft) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("code", &draft.code);
        errors.require("name", &draft.name);
        if !(1000..=9999).contains(&draft.intake_year) {
            errors.add("intakeYear", "must be a four-digit year");
        }
        check_ref(conn, &mut errors, "majorId", "majors", &draft.major_id);
        check_unique(conn, &mut errors, "code", "classes", "code", &draft.code, id);
        errors.into_result()
    }

    fn insert(conn: &Connection, id: &str, draft: &ClassDraft, now: &str) -> Result<(), RequestFailure> {
        conn.execute(
            "INSERT INTO classes(id, major_id, code, name, intake_year, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                id,
                &draft.major_id,
                draft.code.trim(),
                draft.name.trim(),
                draft.intake_year,
                now,
                now,
            ),
        )?;
        Ok(())
    }

    fn update(conn: &Connection, id: &str, draft: &ClassDraft, now: &str) -> Result<(), RequestFailure> {
        conn.execute(
            "UPDATE classes
             SET major_id = ?, code = ?, name = ?, intake_year = ?, updated_at = ?
             WHERE id = ?",
            (
                &draft.major_id,
                draft.code.trim(),
                draft.name.trim(),
                draft.intake_year,
                now,
                id,
            ),
        )?;
        Ok(())
    }
}
