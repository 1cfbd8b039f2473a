use crate::collection::SearchQuery;
use crate::ipc::error::{err, failure, no_workspace, ok};
use crate::ipc::screen::{open_screen, Screen, ScreenError, SelectMode};
use crate::ipc::types::{AppState, Request};
use anyhow::Context;
use log::info;
use serde_json::json;
use std::collections::BTreeMap;

fn screen_error(req: &Request, e: ScreenError) -> serde_json::Value {
    match e {
        ScreenError::Request(f) => failure(&req.id, &f),
        ScreenError::Controller(e) => err(&req.id, "bad_params", e.to_string(), None),
        ScreenError::BadPayload(m) => err(&req.id, "bad_params", m, None),
        ScreenError::Internal(e) => err(&req.id, "internal", format!("{e:#}"), None),
    }
}

fn str_param<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

fn strings_param(req: &Request, key: &str) -> Option<Result<Vec<String>, String>> {
    let v = req.params.get(key).filter(|v| !v.is_null())?;
    Some(serde_json::from_value(v.clone()).map_err(|e| format!("params.{key}: {e}")))
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let Some(kind) = str_param(req, "kind") else {
        return err(&req.id, "bad_params", "missing params.kind", None);
    };
    state.next_screen += 1;
    let screen_id = format!("screen-{}", state.next_screen);
    let screen = match open_screen(conn, kind, screen_id.clone()) {
        None => return err(&req.id, "bad_params", format!("unknown kind: {kind}"), None),
        Some(Err(e)) => return screen_error(req, e),
        Some(Ok(s)) => s,
    };
    info!("opened {screen_id} ({kind})");
    let snapshot = screen.snapshot();
    state.screens.insert(screen_id, screen);
    ok(&req.id, snapshot)
}

fn handle_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(screen_id) = str_param(req, "screenId") else {
        return err(&req.id, "bad_params", "missing params.screenId", None);
    };
    match state.screens.remove(screen_id) {
        Some(_) => ok(&req.id, json!({ "closed": screen_id })),
        None => err(&req.id, "not_found", format!("no screen {screen_id}"), None),
    }
}

fn page_param(req: &Request) -> Result<u32, String> {
    match req.params.get("page") {
        None | Some(serde_json::Value::Null) => Err("missing params.page".into()),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| format!("page must be a positive integer, got {v}")),
    }
}

fn search_query(req: &Request) -> Result<SearchQuery, String> {
    let filters: BTreeMap<String, serde_json::Value> = match req.params.get("filters") {
        None | Some(serde_json::Value::Null) => BTreeMap::new(),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| format!("params.filters: {e}"))?,
    };
    Ok(SearchQuery {
        search: str_param(req, "search").unwrap_or_default().to_string(),
        field: str_param(req, "field").map(str::to_string),
        page: 1,
        filters,
    })
}

/// Runs one operation on an open screen and replies with its snapshot.
fn with_screen(state: &mut AppState, req: &Request, op: &str) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let Some(screen_id) = str_param(req, "screenId") else {
        return err(&req.id, "bad_params", "missing params.screenId", None);
    };
    let Some(screen) = state.screens.get_mut(screen_id) else {
        return err(&req.id, "not_found", format!("no screen {screen_id}"), None);
    };

    let result: Result<Option<serde_json::Value>, ScreenError> = match op {
        "state" => Ok(None),
        "loadPage" => match page_param(req) {
            Ok(page) => screen.load_page(conn, page).map(|_| None),
            Err(m) => Err(ScreenError::BadPayload(m)),
        },
        "create" => screen
            .create(conn, req.params.get("payload").cloned().unwrap_or(json!({})))
            .map(|_| None),
        "update" => match req.params.get("index").and_then(|v| v.as_u64()) {
            Some(index) => screen
                .update(
                    conn,
                    index as usize,
                    req.params.get("payload").cloned().unwrap_or(json!({})),
                )
                .map(|_| None),
            None => Err(ScreenError::BadPayload("missing params.index".into())),
        },
        "deleteOne" => match str_param(req, "id") {
            Some(id) => screen.delete_one(conn, id).map(|_| None),
            None => Err(ScreenError::BadPayload("missing params.id".into())),
        },
        "deleteMany" => match strings_param(req, "ids").transpose() {
            Ok(ids) => screen.delete_many(conn, ids).map(|_| None),
            Err(m) => Err(ScreenError::BadPayload(m)),
        },
        "search" => match search_query(req) {
            Ok(q) => screen.search(conn, q).map(|_| None),
            Err(m) => Err(ScreenError::BadPayload(m)),
        },
        "clearSearch" => screen.clear_search(conn).map(|_| None),
        "select" => select(screen.as_mut(), req).map(|_| None),
        "columns.set" => match strings_param(req, "columns") {
            Some(Ok(columns)) => screen.set_columns(conn, columns).map(|_| None),
            Some(Err(m)) => Err(ScreenError::BadPayload(m)),
            None => Err(ScreenError::BadPayload("missing params.columns".into())),
        },
        "export" => {
            let out = str_param(req, "outPath")
                .map(|out| state.config.export_path(state.workspace.as_deref(), out));
            export(out, screen.as_mut(), conn)
        }
        _ => {
            return err(
                &req.id,
                "not_implemented",
                format!("unknown method: {}", req.method),
                None,
            )
        }
    };

    match result {
        Ok(extra) => {
            let mut snapshot = screen.snapshot();
            if let Some(extra) = extra {
                snapshot["export"] = extra;
            }
            ok(&req.id, snapshot)
        }
        Err(e) => screen_error(req, e),
    }
}

fn select(screen: &mut dyn Screen, req: &Request) -> Result<(), ScreenError> {
    let mode = str_param(req, "mode").unwrap_or("add");
    let Some(mode) = SelectMode::parse(mode) else {
        return Err(ScreenError::BadPayload(format!("unknown select mode: {mode}")));
    };
    let ids = match strings_param(req, "ids") {
        Some(Ok(ids)) => ids,
        Some(Err(m)) => return Err(ScreenError::BadPayload(m)),
        None => Vec::new(),
    };
    screen.select(&ids, mode)
}

fn export(
    out: Option<std::path::PathBuf>,
    screen: &mut dyn Screen,
    conn: &rusqlite::Connection,
) -> Result<Option<serde_json::Value>, ScreenError> {
    let Some(out) = out else {
        return Err(ScreenError::BadPayload("missing params.outPath".into()));
    };
    let file = screen.export(conn)?;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.to_string_lossy()))?;
    }
    std::fs::write(&out, &file.bytes)
        .with_context(|| format!("failed to write {}", out.to_string_lossy()))?;
    info!("exported {} {} rows to {}", screen.kind(), file.rows, out.to_string_lossy());
    Ok(Some(json!({
        "path": out.to_string_lossy(),
        "rows": file.rows,
        "bytes": file.bytes.len(),
    })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op = req.method.strip_prefix("screen.")?;
    Some(match op {
        "open" => handle_open(state, req),
        "close" => handle_close(state, req),
        _ => with_screen(state, req, op),
    })
}
