use super::{check_unique, non_empty, Table};
use crate::collection::{Entity, FieldErrors, RequestFailure};
use crate::export::{Cell, Column};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Teacher,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Teacher => "teacher",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "staff" => Some(Role::Staff),
            "teacher" => Some(Role::Teacher),
            _ => None,
        }
    }
}

/// A dashboard account. Password material never leaves the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Required on create; `None` on update keeps the current password.
    #[serde(default)]
    pub password: Option<String>,
}

fn default_role() -> Role {
    Role::Staff
}

fn default_active() -> bool {
    true
}

impl std::fmt::Debug for UserDraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDraft")
            .field("username", &self.username)
            .field("display_name", &self.display_name)
            .field("role", &self.role)
            .field("active", &self.active)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn new_credentials(password: &str) -> (String, String) {
    let salt = Uuid::new_v4().simple().to_string();
    let hash = hash_password(&salt, password);
    (salt, hash)
}

/// Checks `password` against the stored digest for `username`.
#[cfg(test)]
fn verify_password(conn: &Connection, username: &str, password: &str) -> rusqlite::Result<bool> {
    let mut stmt =
        conn.prepare("SELECT password_salt, password_hash FROM users WHERE username = ? AND active = 1")?;
    let mut rows = stmt.query([username])?;
    let Some(row) = rows.next()? else {
        return Ok(false);
    };
    let salt: String = row.get(0)?;
    let hash: String = row.get(1)?;
    Ok(hash_password(&salt, password) == hash)
}

impl Entity for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        self.display_name.clone()
    }
}

impl Table for User {
    type Draft = UserDraft;

    const KIND: &'static str = "users";
    const TABLE: &'static str = "users";
    const SELECT: &'static str = "id, username, display_name, role, active, created_at, updated_at";
    const ORDER_BY: &'static str = "rowid";
    const SEARCH: &'static [(&'static str, &'static str)] =
        &[("username", "username"), ("displayName", "display_name")];
    const FILTERS: &'static [(&'static str, &'static str)] = &[("role", "role"), ("active", "active")];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let role: String = row.get(3)?;
        let role = Role::parse(&role).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, format!("unknown role {role}").into())
        })?;
        let active: i64 = row.get(4)?;
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            display_name: row.get(2)?,
            role,
            active: active != 0,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("username", "Username", |u, _| Cell::from(u.username.as_str())),
            Column::new("displayName", "Name", |u, _| Cell::from(u.display_name.as_str())),
            Column::new("role", "Role", |u, _| Cell::from(u.role.as_str())),
            Column::new("active", "Active", |u, _| Cell::Bool(u.active)),
        ]
    }

    fn validate(conn: &Connection, id: Option<&str>, draft: &UserDraft) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("username", &draft.username);
        errors.require("displayName", &draft.display_name);
        if draft.username.trim().contains(char::is_whitespace) {
            errors.add("username", "must not contain spaces");
        }
        match (id, non_empty(&draft.password)) {
            (None, None) => errors.add("password", "must not be empty"),
            (_, Some(p)) if p.chars().count() < MIN_PASSWORD_LEN => {
                errors.add("password", format!("must be at least {MIN_PASSWORD_LEN} characters"))
            }
            _ => {}
        }
        check_unique(conn, &mut errors, "username", "users", "username", &draft.username, id);
        errors.into_result()
    }

    fn insert(conn: &Connection, id: &str, draft: &UserDraft, now: &str) -> Result<(), RequestFailure> {
        let password = non_empty(&draft.password).unwrap_or_default();
        let (salt, hash) = new_credentials(&password);
        conn.execute(
            "INSERT INTO users(
               id,
               username,
               display_name,
               role,
               active,
               password_salt,
               password_hash,
               created_at,
               updated_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                id,
                draft.username.trim(),
                draft.display_name.trim(),
                draft.role.as_str(),
                if draft.active { 1 } else { 0 },
                &salt,
                &hash,
                now,
                now,
            ),
        )?;
        Ok(())
    }

    fn update(conn: &Connection, id: &str, draft: &UserDraft, now: &str) -> Result<(), RequestFailure> {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE users
             SET username = ?, display_name = ?, role = ?, active = ?, updated_at = ?
             WHERE id = ?",
            (
                draft.username.trim(),
                draft.display_name.trim(),
                draft.role.as_str(),
                if draft.active { 1 } else { 0 },
                now,
                id,
            ),
        )?;
        if let Some(password) = non_empty(&draft.password) {
            let (salt, hash) = new_credentials(&password);
            tx.execute(
                "UPDATE users SET password_salt = ?, password_hash = ? WHERE id = ?",
                (&salt, &hash, id),
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
