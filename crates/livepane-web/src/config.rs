use livepane_core::{CompileOptions, DEFAULT_MAX_SOURCE_CHARS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "livepane.json";
pub const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

const DEFAULT_TITLE: &str = "livepane preview";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {} as PreviewConfig: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("library `{0}` has an empty src")]
    EmptySource(String),
    #[error("no required library provides the `{0}` global")]
    MissingRequired(&'static str),
}

/// One script the sandbox loads before running page code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySpec {
    pub name: String,
    pub src: String,
    /// Global the script defines, e.g. `React`.
    pub global: String,
    /// A required library that fails to load puts the preview in fallback.
    /// An optional one is replaced by its shim without any error.
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
    /// Import specifiers this library satisfies.
    #[serde(default)]
    pub modules: Vec<String>,
}

impl LibrarySpec {
    fn new(name: &str, src: &str, global: &str, required: bool, modules: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            src: src.to_string(),
            global: global.to_string(),
            required,
            integrity: None,
            modules: modules.iter().map(|m| m.to_string()).collect(),
        }
    }
}

pub fn default_libraries() -> Vec<LibrarySpec> {
    vec![
        LibrarySpec::new(
            "react",
            "https://unpkg.com/react@18/umd/react.production.min.js",
            "React",
            true,
            &["react"],
        ),
        LibrarySpec::new(
            "react-dom",
            "https://unpkg.com/react-dom@18/umd/react-dom.production.min.js",
            "ReactDOM",
            true,
            &["react-dom", "react-dom/client"],
        ),
        LibrarySpec::new(
            "babel",
            "https://unpkg.com/@babel/standalone@7/babel.min.js",
            "Babel",
            true,
            &[],
        ),
        LibrarySpec::new(
            "framer-motion",
            "https://unpkg.com/framer-motion@10/dist/framer-motion.js",
            "Motion",
            false,
            &["framer-motion", "motion/react"],
        ),
        LibrarySpec::new(
            "lucide-react",
            "https://unpkg.com/lucide-react@0.263.1/dist/umd/lucide-react.js",
            "LucideReact",
            false,
            &["lucide-react"],
        ),
    ]
}

fn default_max_source_chars() -> usize {
    DEFAULT_MAX_SOURCE_CHARS
}

fn default_dependency_timeout_ms() -> u64 {
    8000
}

fn default_screenshot_library() -> String {
    "https://unpkg.com/html2canvas@1.4.1/dist/html2canvas.min.js".to_string()
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewConfig {
    #[serde(default = "default_max_source_chars")]
    pub max_source_chars: usize,
    /// Budget for all required libraries; the fallback renders when it runs
    /// out even if no load error fired.
    #[serde(default = "default_dependency_timeout_ms")]
    pub dependency_timeout_ms: u64,
    #[serde(default = "default_libraries")]
    pub libraries: Vec<LibrarySpec>,
    /// Loaded on the first capture request only.
    #[serde(default = "default_screenshot_library")]
    pub screenshot_library: String,
    #[serde(default = "default_true")]
    pub tailwind: bool,
    #[serde(default)]
    pub minify_runtime: bool,
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            max_source_chars: default_max_source_chars(),
            dependency_timeout_ms: default_dependency_timeout_ms(),
            libraries: default_libraries(),
            screenshot_library: default_screenshot_library(),
            tailwind: true,
            minify_runtime: false,
            title: default_title(),
        }
    }
}

impl PreviewConfig {
    /// Reads `livepane.json` from `dir`. A missing file yields the defaults.
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str::<PreviewConfig>(&content)
            .map_err(|source| ConfigError::Parse { path, source })?
            .sanitized()
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<PreviewConfig>(content)
            .map_err(|source| ConfigError::Parse {
                path: PathBuf::from(CONFIG_FILE),
                source,
            })?
            .sanitized()
    }

    /// Zero and empty values fall back to defaults; the manifest must still
    /// provide the runtime, renderer and transform globals.
    pub fn sanitized(mut self) -> Result<Self, ConfigError> {
        if self.max_source_chars == 0 {
            self.max_source_chars = default_max_source_chars();
        }
        if self.dependency_timeout_ms == 0 {
            self.dependency_timeout_ms = default_dependency_timeout_ms();
        }
        if self.libraries.is_empty() {
            self.libraries = default_libraries();
        }
        if self.screenshot_library.trim().is_empty() {
            self.screenshot_library = default_screenshot_library();
        }
        if self.title.trim().is_empty() {
            self.title = default_title();
        }
        if let Some(lib) = self.libraries.iter().find(|l| l.src.trim().is_empty()) {
            return Err(ConfigError::EmptySource(lib.name.clone()));
        }
        for global in ["React", "ReactDOM", "Babel"] {
            if !self.libraries.iter().any(|l| l.required && l.global == global) {
                return Err(ConfigError::MissingRequired(global));
            }
        }
        Ok(self)
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            max_source_chars: self.max_source_chars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let cfg = PreviewConfig::from_json("{}").expect("valid config");
        assert_eq!(cfg, PreviewConfig::default());
        assert_eq!(cfg.max_source_chars, 50_000);
        assert_eq!(cfg.dependency_timeout_ms, 8000);
        let required: Vec<&str> = cfg
            .libraries
            .iter()
            .filter(|l| l.required)
            .map(|l| l.global.as_str())
            .collect();
        assert_eq!(required, vec!["React", "ReactDOM", "Babel"]);
    }

    #[test]
    fn test_zero_values_fall_back() {
        let raw = r#"{"maxSourceChars": 0, "dependencyTimeoutMs": 0, "title": ""}"#;
        let cfg = PreviewConfig::from_json(raw).expect("valid config");
        assert_eq!(cfg.max_source_chars, 50_000);
        assert_eq!(cfg.dependency_timeout_ms, 8000);
        assert_eq!(cfg.title, "livepane preview");
    }

    #[test]
    fn test_custom_manifest_must_keep_runtime() {
        let raw = r#"{"libraries": [
            {"name": "react", "src": "/r.js", "global": "React", "required": true},
            {"name": "dom", "src": "/d.js", "global": "ReactDOM", "required": true}
        ]}"#;
        let err = PreviewConfig::from_json(raw).expect_err("babel missing");
        assert!(matches!(err, ConfigError::MissingRequired("Babel")));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = std::env::temp_dir().join(format!("livepane-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let cfg = PreviewConfig::load_from_dir(&dir).expect("defaults");
        assert_eq!(cfg, PreviewConfig::default());
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = std::env::temp_dir().join(format!("livepane-config-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        std::fs::write(dir.join(CONFIG_FILE), "{not json").expect("write config");
        let err = PreviewConfig::load_from_dir(&dir).expect_err("parse error");
        assert!(err.to_string().contains("livepane.json"), "{err}");
    }
}
