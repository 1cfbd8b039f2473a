use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use log::{debug, warn};

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    debug!("{} {}", req.id, req.method);
    let resp = route(state, &req);
    if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        warn!(
            "{} {} failed: {}",
            req.id,
            req.method,
            resp.get("error").map(|e| e.to_string()).unwrap_or_default()
        );
    }
    resp
}

fn route(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::screens::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::collections::try_handle(state, req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
