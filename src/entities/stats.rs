use super::{ref_label, Table};
use crate::collection::Entity;
use crate::export::{Cell, Column};
use rusqlite::Row;
use serde::de::IgnoredAny;
use serde::Serialize;

/// Per-faculty totals, read from the `faculty_stats` view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyStats {
    pub id: String,
    pub code: String,
    pub name: String,
    pub major_count: i64,
    pub course_count: i64,
    pub class_count: i64,
    pub student_count: i64,
}

impl Entity for FacultyStats {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

impl Table for FacultyStats {
    type Draft = IgnoredAny;

    const KIND: &'static str = "stats.faculties";
    const TABLE: &'static str = "faculty_stats";
    const SELECT: &'static str = "id, code, name, major_count, course_count, class_count, student_count";
    const ORDER_BY: &'static str = "code, id";
    const SEARCH: &'static [(&'static str, &'static str)] = &[("code", "code"), ("name", "name")];
    const READ_ONLY: bool = true;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(FacultyStats {
            id: row.get(0)?,
            code: row.get(1)?,
            name: row.get(2)?,
            major_count: row.get(3)?,
            course_count: row.get(4)?,
            class_count: row.get(5)?,
            student_count: row.get(6)?,
        })
    }

    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("code", "Code", |s, _| Cell::from(s.code.as_str())),
            Column::new("name", "Faculty", |s, _| Cell::from(s.name.as_str())),
            Column::new("majorCount", "Majors", |s, _| Cell::Number(s.major_count as f64)),
            Column::new("courseCount", "Courses", |s, _| Cell::Number(s.course_count as f64)),
            Column::new("classCount", "Classes", |s, _| Cell::Number(s.class_count as f64)),
            Column::new("studentCount", "Students", |s, _| Cell::Number(s.student_count as f64)),
        ]
    }
}

/// Head counts per class, read from the `class_stats` view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub id: String,
    pub major_id: String,
    pub code: String,
    pub name: String,
    pub student_count: i64,
    pub active_student_count: i64,
}

impl Entity for ClassStats {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        self.code.clone()
    }
}

impl Table for ClassStats {
    type Draft = IgnoredAny;

    const KIND: &'static str = "stats.classes";
    const TABLE: &'static str = "class_stats";
    const SELECT: &'static str = "id, major_id, code, name, student_count, active_student_count";
    const ORDER_BY: &'static str = "code, id";
    const SEARCH: &'static [(&'static str, &'static str)] = &[("code", "code"), ("name", "name")];
    const FILTERS: &'static [(&'static str, &'static str)] = &[("majorId", "major_id")];
    const REFS: &'static [(&'static str, &'static str)] = &[("majorId", "majors")];
    const READ_ONLY: bool = true;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ClassStats {
            id: row.get(0)?,
            major_id: row.get(1)?,
            code: row.get(2)?,
            name: row.get(3)?,
            student_count: row.get(4)?,
            active_student_count: row.get(5)?,
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
            Column::new("code", "Code", |s, _| Cell::from(s.code.as_str())),
            Column::new("name", "Class", |s, _| Cell::from(s.name.as_str())),
            Column::new("majorId", "Major", |s, l| Cell::from(ref_label(s, "majorId", l))),
            Column::new("studentCount", "Students", |s, _| Cell::Number(s.student_count as f64)),
            Column::new("activeStudentCount", "Active", |s, _| {
                Cell::Number(s.active_student_count as f64)
            }),
        ]
    }
}
