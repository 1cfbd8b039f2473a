use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "registrar.sqlite3";

/// SQL name of the Unicode-aware lowercase function. SQLite's own `lower()`
/// and `LIKE` only fold ASCII.
pub const FOLD_CASE_FN: &str = "fold_case";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Registers the scalar functions search relies on. Needed once per
/// connection.
pub fn register_functions(conn: &Connection) -> anyhow::Result<()> {
    conn.create_scalar_function(
        FOLD_CASE_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )?;
    Ok(())
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    register_functions(conn)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS faculties(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS majors(
            id TEXT PRIMARY KEY,
            faculty_id TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(faculty_id) REFERENCES faculties(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_majors_faculty ON majors(faculty_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            faculty_id TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            credits INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(faculty_id) REFERENCES faculties(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_faculty ON courses(faculty_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            major_id TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            intake_year INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(major_id) REFERENCES majors(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_major ON classes(major_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            student_no TEXT NOT NULL UNIQUE,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            birth_date TEXT,
            email TEXT,
            active INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL,
            active INTEGER NOT NULL,
            password_salt TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    // Statistics screens read these views; correlated subqueries keep joins
    // from double-counting.
    conn.execute(
        "CREATE VIEW IF NOT EXISTS faculty_stats AS
         SELECT
           f.id,
           f.code,
           f.name,
           (SELECT COUNT(*) FROM majors m WHERE m.faculty_id = f.id) AS major_count,
           (SELECT COUNT(*) FROM courses c WHERE c.faculty_id = f.id) AS course_count,
           (SELECT COUNT(*)
              FROM classes k
              JOIN majors m ON m.id = k.major_id
             WHERE m.faculty_id = f.id) AS class_count,
           (SELECT COUNT(*)
              FROM students s
              JOIN classes k ON k.id = s.class_id
              JOIN majors m ON m.id = k.major_id
             WHERE m.faculty_id = f.id) AS student_count
         FROM faculties f",
        [],
    )?;
    conn.execute(
        "CREATE VIEW IF NOT EXISTS class_stats AS
         SELECT
           k.id,
           k.major_id,
           k.code,
           k.name,
           (SELECT COUNT(*) FROM students s WHERE s.class_id = k.id) AS student_count,
           (SELECT COUNT(*) FROM students s WHERE s.class_id = k.id AND s.active = 1)
             AS active_student_count
         FROM classes k",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("first init");
        init_schema(&conn).expect("second init");
    }

    #[test]
    fn settings_round_trip_and_overwrite() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("init");
        assert!(settings_get_json(&conn, "columns.users")
            .expect("get")
            .is_none());
        settings_set_json(&conn, "columns.users", &json!(["username"])).expect("set");
        settings_set_json(&conn, "columns.users", &json!(["username", "role"])).expect("set");
        assert_eq!(
            settings_get_json(&conn, "columns.users").expect("get"),
            Some(json!(["username", "role"]))
        );
    }

    #[test]
    fn fold_case_lowers_beyond_ascii() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("init");
        let folded: String = conn
            .query_row("SELECT fold_case('ĐẠI Học ÄÖ')", [], |r| r.get(0))
            .expect("fold_case");
        assert_eq!(folded, "đại học äö");
        let null: Option<String> = conn
            .query_row("SELECT fold_case(NULL)", [], |r| r.get(0))
            .expect("fold_case null");
        assert!(null.is_none());
    }
}
