//! Translator configuration
//!
//! Two process-wide feature flags gate code generation: `async` (accepts
//! `Future<T>` / `await` and lowers them onto pthreads) and `arc`
//! (reference-counted heap containers). Both default off. External drivers
//! either build options programmatically or load them from the
//! `[translate]` table of a `moxy.toml`.

use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TranslateOptions {
    /// Accept `Future<T>` return types and `await` expressions
    #[serde(rename = "async")]
    pub async_enabled: bool,
    /// Emit reference-counted, heap-allocated container templates
    #[serde(rename = "arc")]
    pub arc_enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    translate: TranslateOptions,
}

impl TranslateOptions {
    pub fn new() -> Self {
        TranslateOptions::default()
    }

    /// Enable async lowering (builder pattern)
    pub fn with_async(mut self) -> Self {
        self.async_enabled = true;
        self
    }

    /// Enable ARC container emission (builder pattern)
    pub fn with_arc(mut self) -> Self {
        self.arc_enabled = true;
        self
    }

    /// Parse options from the `[translate]` table of a moxy.toml document.
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        let manifest: Manifest =
            toml::from_str(toml_str).map_err(|e| format!("failed to parse moxy.toml: {}", e))?;
        Ok(manifest.translate)
    }

    /// Load options from a moxy.toml on disk.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_off() {
        let opts = TranslateOptions::new();
        assert!(!opts.async_enabled);
        assert!(!opts.arc_enabled);
    }

    #[test]
    fn test_builder() {
        let opts = TranslateOptions::new().with_async().with_arc();
        assert!(opts.async_enabled);
        assert!(opts.arc_enabled);
    }

    #[test]
    fn test_from_toml() {
        let opts = TranslateOptions::from_toml("[translate]\nasync = true\n").unwrap();
        assert!(opts.async_enabled);
        assert!(!opts.arc_enabled);
    }

    #[test]
    fn test_from_toml_empty() {
        let opts = TranslateOptions::from_toml("").unwrap();
        assert_eq!(opts, TranslateOptions::default());
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(TranslateOptions::from_toml("[translate\nasync").is_err());
    }
}
