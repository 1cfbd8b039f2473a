//! The collection service on the wire: `<kind>.list|all|create|update|delete|search`
//! for every kind in [`crate::entities::KINDS`].

use crate::collection::{CollectionService, RequestFailure, SearchQuery, SqliteCollection};
use crate::entities::{
    ClassGroup, ClassStats, Course, Faculty, FacultyStats, Major, Student, Table, User,
};
use crate::ipc::error::{err, failure, no_workspace, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn bad_params(req: &Request, message: impl Into<String>) -> serde_json::Value {
    err(&req.id, "bad_params", message, None)
}

fn reply<R: serde::Serialize>(req: &Request, result: Result<R, RequestFailure>) -> serde_json::Value {
    match result {
        Ok(v) => match serde_json::to_value(v) {
            Ok(v) => ok(&req.id, v),
            Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
        },
        Err(f) => failure(&req.id, &f),
    }
}

fn ids_param(req: &Request) -> Option<Vec<String>> {
    req.params
        .get("ids")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn handle<T: Table>(conn: &Connection, op: &str, req: &Request) -> Option<serde_json::Value> {
    let service = SqliteCollection::<T>::new(conn);
    let resp = match op {
        "list" => {
            let page = match req.params.get("page") {
                None | Some(serde_json::Value::Null) => 1,
                Some(v) => match v.as_u64().and_then(|n| u32::try_from(n).ok()) {
                    Some(n) => n,
                    None => return Some(bad_params(req, "page must be a positive integer")),
                },
            };
            reply(req, service.list_page(page))
        }
        "all" => reply(req, service.list_all().map(|items| json!({ "items": items }))),
        "create" => match serde_json::from_value::<T::Draft>(req.params.clone()) {
            Ok(draft) => reply(req, service.create(&draft)),
            Err(e) => bad_params(req, e.to_string()),
        },
        "update" => {
            let Some(id) = req.params.get("id").and_then(|v| v.as_str()) else {
                return Some(bad_params(req, "missing params.id"));
            };
            match serde_json::from_value::<T::Draft>(req.params.clone()) {
                Ok(draft) => reply(req, service.update(id, &draft)),
                Err(e) => bad_params(req, e.to_string()),
            }
        }
        "delete" => {
            let Some(ids) = ids_param(req) else {
                return Some(bad_params(req, "missing params.ids"));
            };
            reply(req, service.delete(&ids).map(|deleted| json!({ "ok": deleted })))
        }
        "search" => match serde_json::from_value::<SearchQuery>(req.params.clone()) {
            Ok(query) => reply(req, service.search(&query)),
            Err(e) => bad_params(req, e.to_string()),
        },
        _ => return None,
    };
    Some(resp)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (kind, op) = req.method.rsplit_once('.')?;
    if !crate::entities::KINDS.contains(&kind) {
        return None;
    }
    let Some(conn) = state.db.as_ref() else {
        return Some(no_workspace(&req.id));
    };
    match kind {
        Faculty::KIND => handle::<Faculty>(conn, op, req),
        Major::KIND => handle::<Major>(conn, op, req),
        Course::KIND => handle::<Course>(conn, op, req),
        ClassGroup::KIND => handle::<ClassGroup>(conn, op, req),
        Student::KIND => handle::<Student>(conn, op, req),
        User::KIND => handle::<User>(conn, op, req),
        FacultyStats::KIND => handle::<FacultyStats>(conn, op, req),
        ClassStats::KIND => handle::<ClassStats>(conn, op, req),
        _ => None,
    }
}
