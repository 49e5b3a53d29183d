#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use veritas_core::CheckConfig;

pub const MANIFEST_NAME: &str = "veritas.toml";

#[derive(Debug, Error, Diagnostic)]
#[error("manifest error: {message}")]
#[diagnostic(code(veritas::manifest))]
pub struct ManifestError {
    pub message: String,
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedManifest {
    pub manifest_path: Option<PathBuf>,
    pub check: CheckConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    check: Option<CheckConfig>,
}

/// Nearest `veritas.toml` at or above `start` (a file or a directory).
pub fn find_manifest(start: &Path) -> Option<PathBuf> {
    let mut cur = if start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start.to_path_buf()
    };

    loop {
        let candidate = cur.join(MANIFEST_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        match cur.parent() {
            Some(parent) => cur = parent.to_path_buf(),
            None => return None,
        }
    }
}

pub fn load_resolved_manifest(start: &Path) -> Result<ResolvedManifest, ManifestError> {
    let Some(manifest_path) = find_manifest(start) else {
        return Ok(ResolvedManifest::default());
    };
    debug!(path = %manifest_path.display(), "loading manifest");

    let raw = fs::read_to_string(&manifest_path).map_err(|e| ManifestError {
        message: format!("failed to read {}: {e}", manifest_path.display()),
    })?;
    let parsed: Manifest = toml::from_str(&raw).map_err(|e| ManifestError {
        message: format!("failed to parse {}: {e}", manifest_path.display()),
    })?;

    Ok(ResolvedManifest {
        manifest_path: Some(manifest_path),
        check: parsed.check.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("veritas-manifest-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("src/nested")).expect("create scratch dir");
        dir
    }

    #[test]
    fn check_section_is_found_from_a_nested_file() {
        let root = scratch("nested");
        fs::write(
            root.join(MANIFEST_NAME),
            "[check]\nownership = false\nmax_errors = 5\n",
        )
        .expect("write manifest");
        let input = root.join("src/nested/main.json");
        fs::write(&input, "{}").expect("write input");

        let resolved = load_resolved_manifest(&input).expect("manifest");
        assert_eq!(resolved.manifest_path, Some(root.join(MANIFEST_NAME)));
        assert!(!resolved.check.ownership);
        assert!(resolved.check.effects);
        assert_eq!(resolved.check.max_errors, 5);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_check_section_means_defaults() {
        let root = scratch("empty");
        fs::write(root.join(MANIFEST_NAME), "").expect("write manifest");

        let resolved = load_resolved_manifest(&root).expect("manifest");
        assert_eq!(resolved.check, CheckConfig::default());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn unknown_check_keys_are_rejected() {
        let root = scratch("unknown");
        fs::write(root.join(MANIFEST_NAME), "[check]\nborrows = true\n").expect("write manifest");

        let err = load_resolved_manifest(&root).expect_err("unknown key");
        assert!(err.message.contains("failed to parse"), "{}", err.message);
        let _ = fs::remove_dir_all(&root);
    }
}
