use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::BridgeConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "wabridge.toml",
    "wabridge.yaml",
    "wabridge.yml",
    "wabridge.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<BridgeConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./wabridge.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/wabridge/wabridge.{toml,yaml,yml,json}` (user-global)
///
/// Returns `BridgeConfig::default()` if no config file is found or the one
/// found does not parse.
pub fn discover_and_load() -> BridgeConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return BridgeConfig::default();
    };
    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            BridgeConfig::default()
        },
    }
}

fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// Returns the user-global config directory, `~/.config/wabridge/`.
pub fn config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(".config").join("wabridge"))
}

/// Apply process environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut BridgeConfig) {
    apply_overrides_from(config, |name| std::env::var(name).ok());
}

fn apply_overrides_from(config: &mut BridgeConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(raw) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
        match raw.trim().parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(e) => warn!(value = %raw, error = %e, "ignoring invalid PORT"),
        }
    }
    if let Some(token) = lookup("WABRIDGE_TOKEN").filter(|v| !v.is_empty()) {
        config.server.api_token = Some(token);
    }
    if let Some(dir) = lookup("WABRIDGE_UPLOADS_DIR").filter(|v| !v.is_empty()) {
        config.uploads.dir = PathBuf::from(dir);
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<BridgeConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_partial_toml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wabridge.toml");
        std::fs::write(&path, "[server]\nport = 8088\n\n[uploads]\ndelete_after_send = true\n")
            .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 8088);
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert!(cfg.uploads.delete_after_send);
        assert_eq!(cfg.uploads.dir, PathBuf::from("uploads"));
        assert_eq!(cfg.whatsapp.qr_ttl_secs, 60);
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("wabridge.yaml");
        std::fs::write(&yaml, "whatsapp:\n  print_qr: false\n").unwrap();
        assert!(!load_config(&yaml).unwrap().whatsapp.print_qr);

        let json = dir.path().join("wabridge.json");
        std::fs::write(&json, r#"{"uploads": {"dir": "/srv/media"}}"#).unwrap();
        assert_eq!(
            load_config(&json).unwrap().uploads.dir,
            PathBuf::from("/srv/media")
        );
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wabridge.ini");
        std::fs::write(&path, "port=1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn env_overrides_port_token_and_uploads() {
        let mut cfg = BridgeConfig::default();
        apply_overrides_from(&mut cfg, |name| match name {
            "PORT" => Some("4100".into()),
            "WABRIDGE_TOKEN" => Some("s3cret".into()),
            "WABRIDGE_UPLOADS_DIR" => Some("/tmp/up".into()),
            _ => None,
        });
        assert_eq!(cfg.server.port, 4100);
        assert_eq!(cfg.server.api_token.as_deref(), Some("s3cret"));
        assert_eq!(cfg.uploads.dir, PathBuf::from("/tmp/up"));
    }

    #[test]
    fn invalid_port_keeps_default() {
        let mut cfg = BridgeConfig::default();
        apply_overrides_from(&mut cfg, |name| (name == "PORT").then(|| "http".into()));
        assert_eq!(cfg.server.port, crate::schema::DEFAULT_PORT);
    }
}
