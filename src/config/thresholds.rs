// src/config/thresholds.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::decision::Thresholds;

pub const ENV_PATH: &str = "ALERT_THRESHOLDS_PATH";

/// Load thresholds from a TOML or JSON file. Missing keys keep their defaults.
pub fn load_thresholds_from(path: &Path) -> Result<Thresholds> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading thresholds from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let parsed = parse_thresholds(&content, &ext)
        .with_context(|| format!("parsing thresholds in {}", path.display()))?;
    Ok(parsed.sanitized())
}

/// `$ALERT_THRESHOLDS_PATH` if set, otherwise built-in defaults.
pub fn load_thresholds(get: impl Fn(&str) -> Option<String>) -> Result<Thresholds> {
    match get(ENV_PATH).filter(|p| !p.trim().is_empty()) {
        Some(p) => {
            let pb = PathBuf::from(p.trim());
            if !pb.exists() {
                return Err(anyhow!("{ENV_PATH} points to non-existent path"));
            }
            load_thresholds_from(&pb)
        }
        None => Ok(Thresholds::default()),
    }
}

fn parse_thresholds(s: &str, hint_ext: &str) -> Result<Thresholds> {
    if hint_ext == "json" {
        return Ok(serde_json::from_str(s)?);
    }
    match toml::from_str::<Thresholds>(s) {
        Ok(t) => Ok(t),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!("unsupported thresholds format: {toml_err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let t = parse_thresholds("notify_low = 70\ncall_high = 350\n", "toml").unwrap();
        assert_eq!(t.notify_low, 70);
        assert_eq!(t.call_high, 350);
        assert_eq!(t.notify_falling_low, 100);
        assert_eq!(t.call_high_every_minutes, 15);
    }

    #[test]
    fn json_and_unknown_extension() {
        let t = parse_thresholds(r#"{"call_low": 60}"#, "json").unwrap();
        assert_eq!(t.call_low, 60);
        let t = parse_thresholds(r#"{"call_low": 61}"#, "").unwrap();
        assert_eq!(t.call_low, 61);
        assert!(parse_thresholds("[[[", "toml").is_err());
    }

    #[test]
    fn file_loading_sanitizes() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("thresholds.toml");
        fs::write(&p, "call_high_every_minutes = 0\n").unwrap();
        assert_eq!(load_thresholds_from(&p).unwrap().call_high_every_minutes, 15);
    }

    #[test]
    fn env_lookup() {
        assert_eq!(load_thresholds(|_| None).unwrap(), Thresholds::default());
        let err = load_thresholds(|_| Some("/definitely/not/here.toml".into())).unwrap_err();
        assert!(err.to_string().contains(ENV_PATH));
    }
}
