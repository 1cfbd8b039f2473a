use super::{check_ref, check_unique, non_empty, ref_label, Table};
use crate::collection::{Entity, FieldErrors, RequestFailure};
use crate::export::{Cell, Column};
use chrono::NaiveDate;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub class_id: String,
    pub student_no: String,
    pub last_name: String,
    pub first_name: String,
    pub display_name: String,
    pub birth_date: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDraft {
    #[serde(default)]
    pub class_id: String,
    #[serde(default)]
    pub student_no: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Entity for Student {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        self.display_name.clone()
    }
}

impl Table for Student {
    type Draft = StudentDraft;

    const KIND: &'static str = "students";
    const TABLE: &'static str = "students";
    const SELECT: &'static str = "id, class_id, student_no, last_name, first_name, birth_date, email, active, created_at, updated_at";
    const ORDER_BY: &'static str = "rowid";
    const SEARCH: &'static [(&'static str, &'static str)] = &[
        ("studentNo", "student_no"),
        ("lastName", "last_name"),
        ("firstName", "first_name"),
        ("email", "email"),
    ];
    const FILTERS: &'static [(&'static str, &'static str)] =
        &[("classId", "class_id"), ("active", "active")];
    const REFS: &'static [(&'static str, &'static str)] = &[("classId", "classes")];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let last_name: String = row.get(3)?;
        let first_name: String = row.get(4)?;
        let active: i64 = row.get(7)?;
        Ok(Student {
            id: row.get(0)?,
            class_id: row.get(1)?,
            student_no: row.get(2)?,
            display_name: format!("{}, {}", last_name, first_name),
            last_name,
            first_name,
            birth_date: row.get(5)?,
            email: row.get(6)?,
            active: active != 0,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn ref_id(&self, field: &str) -> Option<&str> {
        match field {
            "classId" => Some(&self.class_id),
            _ => None,
        }
    }

    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("studentNo", "Student No", |s, _| Cell::from(s.student_no.as_str())),
            Column::new("lastName", "Last Name", |s, _| Cell::from(s.last_name.as_str())),
            Column::new("firstName", "First Name", |s, _| Cell::from(s.first_name.as_str())),
            Column::new("birthDate", "Birth Date", |s, _| Cell::from(s.birth_date.as_deref())),
            Column::new("email", "Email", |s, _| Cell::from(s.email.as_deref())),
            Column::new("classId", "Class", |s, l| Cell::from(ref_label(s, "classId", l))),
            Column::new("active", "Active", |s, _| Cell::Bool(s.active)),
        ]
    }

    fn validate(conn: &Connection, id: Option<&str>, draft: &StudentDraft) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("studentNo", &draft.student_no);
        errors.require("lastName", &draft.last_name);
        errors.require("firstName", &draft.first_name);
        if let Some(d) = non_empty(&draft.birth_date) {
            if NaiveDate::parse_from_str(&d, "%Y-%m-%d").is_err() {
                errors.add("birthDate", "must be a date (YYYY-MM-DD)");
            }
        }
        if let Some(e) = non_empty(&draft.email) {
            if !e.contains('@') {
                errors.add("email", "must be an email address");
            }
        }
        check_ref(conn, &mut errors, "classId", "classes", &draft.class_id);
        check_unique(
            conn,
            &mut errors,
            "studentNo",
            "students",
            "student_no",
            &draft.student_no,
            id,
        );
        errors.into_result()
    }

    fn insert(conn: &Connection, id: &str, draft: &StudentDraft, now: &str) -> Result<(), RequestFailure> {
        conn.execute(
            "INSERT INTO students(
               id,
               class_id,
               student_no,
               last_name,
               first_name,
               birth_date,
               email,
               active,
               created_at,
               updated_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                id,
                &draft.class_id,
                draft.student_no.trim(),
                draft.last_name.trim(),
                draft.first_name.trim(),
                non_empty(&draft.birth_date),
                non_empty(&draft.email),
                if draft.active { 1 } else { 0 },
                now,
                now,
            ),
        )?;
        Ok(())
    }

    fn update(conn: &Connection, id: &str, draft: &StudentDraft, now: &str) -> Result<(), RequestFailure> {
        conn.execute(
            "UPDATE students
             SET class_id = ?,
                 student_no = ?,
                 last_name = ?,
                 first_name = ?,
                 birth_date = ?,
                 email = ?,
                 active = ?,
                 updated_at = ?
             WHERE id = ?",
            (
                &draft.class_id,
                draft.student_no.trim(),
                draft.last_name.trim(),
                draft.first_name.trim(),
                non_empty(&draft.birth_date),
                non_empty(&draft.email),
                if draft.active { 1 } else { 0 },
                now,
                id,
            ),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::collection::{CollectionService, SqliteCollection};

    fn draft(class_id: &str) -> StudentDraft {
        StudentDraft {
            class_id: class_id.into(),
            student_no: "S-1".into(),
            last_name: "Doe".into(),
            first_name: "Jane".into(),
            birth_date: Some("2007-02-30".into()),
            email: Some("jane.example.com".into()),
            active: true,
        }
    }

    #[test]
    fn rejects_bad_dates_emails_and_unknown_class() {
        let conn = fixtures::conn();
        let err = Student::validate(&conn, None, &draft("missing")).unwrap_err();
        assert!(err.get("birthDate").is_some());
        assert!(err.get("email").is_some());
        assert_eq!(err.get("classId"), Some(&["does not exist".to_string()][..]));
    }

    #[test]
    fn stores_trimmed_optionals_and_builds_display_name() {
        let conn = fixtures::conn();
        let f = fixtures::faculty(&conn, "ENG", "Engineering");
        let m = fixtures::major(&conn, &f.id, "CS");
        let c = fixtures::class(&conn, &m.id, "CS-24A");

        let mut d = draft(&c.id);
        d.birth_date = Some(" ".into());
        d.email = Some("jane@example.com".into());
        let s = SqliteCollection::<Student>::new(&conn)
            .create(&d)
            .expect("create student");
        assert_eq!(s.display_name, "Doe, Jane");
        assert_eq!(s.birth_date, None);
        assert_eq!(s.email.as_deref(), Some("jane@example.com"));
        assert!(s.active);
    }
}
