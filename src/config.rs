use std::path::{Path, PathBuf};

pub const WORKSPACE_ENV: &str = "REGISTRARD_WORKSPACE";
pub const EXPORT_DIR_ENV: &str = "REGISTRARD_EXPORT_DIR";
pub const LOG_ENV: &str = "REGISTRARD_LOG";

const DEFAULT_LOG_FILTER: &str = "info";
const EXPORTS_SUBDIR: &str = "exports";

/// Startup settings. Everything is optional; the UI shell normally selects the
/// workspace over IPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            export_dir: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        Self {
            workspace: non_empty(WORKSPACE_ENV).map(PathBuf::from),
            export_dir: non_empty(EXPORT_DIR_ENV).map(PathBuf::from),
            log_filter: non_empty(LOG_ENV).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }

    /// Absolute `out` paths are used as given. Relative ones land in the
    /// configured export directory, else `<workspace>/exports`, else the
    /// current directory.
    pub fn export_path(&self, workspace: Option<&Path>, out: &str) -> PathBuf {
        let out = Path::new(out);
        if out.is_absolute() {
            return out.to_path_buf();
        }
        match (&self.export_dir, workspace) {
            (Some(dir), _) => dir.join(out),
            (None, Some(ws)) => ws.join(EXPORTS_SUBDIR).join(out),
            (None, None) => out.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset_or_blank() {
        let cfg = from_map(&[(WORKSPACE_ENV, "  ")]);
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn reads_all_keys() {
        let cfg = from_map(&[
            (WORKSPACE_ENV, "/srv/school"),
            (EXPORT_DIR_ENV, "/tmp/out"),
            (LOG_ENV, "registrard=debug"),
        ]);
        assert_eq!(cfg.workspace, Some(PathBuf::from("/srv/school")));
        assert_eq!(cfg.export_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(cfg.log_filter, "registrard=debug");
    }

    #[test]
    fn export_path_resolution_order() {
        let ws = PathBuf::from("/srv/school");
        let cfg = Config::default();
        assert_eq!(
            cfg.export_path(Some(&ws), "students.xlsx"),
            ws.join("exports").join("students.xlsx")
        );
        assert_eq!(
            cfg.export_path(Some(&ws), "/abs/students.xlsx"),
            PathBuf::from("/abs/students.xlsx")
        );
        let cfg = from_map(&[(EXPORT_DIR_ENV, "/tmp/out")]);
        assert_eq!(
            cfg.export_path(Some(&ws), "students.xlsx"),
            PathBuf::from("/tmp/out/students.xlsx")
        );
    }
}
