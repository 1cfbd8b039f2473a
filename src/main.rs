mod collection;
mod config;
mod db;
mod entities;
mod export;
mod ipc;

use log::{error, info};
use std::io::{self, BufRead, Write};

fn main() {
    let config = config::Config::from_env();
    // stdout carries the protocol; logs go to stderr.
    env_logger::Builder::new()
        .parse_filters(&config.log_filter)
        .target(env_logger::Target::Stderr)
        .init();

    let mut state = ipc::AppState::new(config);
    if let Some(path) = state.config.workspace.clone() {
        match db::open_db(&path) {
            Ok(conn) => ipc::select_workspace(&mut state, path, conn),
            Err(e) => error!("could not open {}: {e:#}", path.to_string_lossy()),
        }
    }
    info!("registrard {} ready", env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to reply to.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("stdin closed, exiting");
}
