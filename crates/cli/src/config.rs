//! Configuration file loading.
//!
//! ```toml
//! grammars = ["grammars/js.tmLanguage.json"]
//!
//! [registry]
//! max-line-length = 20000
//!
//! [injections]
//! "source.js" = ["source.todo"]
//!
//! [[theme]]
//! scope = "comment"
//! foreground = 2
//! font-style = ["italic"]
//! ```
//!
//! Relative grammar paths are resolved against the configuration file's
//! directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use loom_textmate::RegistryOptions;
use serde::Deserialize;

use crate::theme::ThemeRule;

/// Contents of a `loom.toml` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
	/// Grammar files to load.
	pub grammars: Vec<PathBuf>,
	pub registry: RegistryOptions,
	/// Target scope name to injector scope names.
	pub injections: BTreeMap<String, Vec<String>>,
	/// Theme rules used for encoded output.
	pub theme: Vec<ThemeRule>,
}

impl Config {
	/// Reads and parses a configuration file.
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
		let mut config: Config = toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
		if let Some(dir) = path.parent() {
			config.resolve_paths(dir);
		}
		Ok(config)
	}

	fn resolve_paths(&mut self, dir: &Path) {
		for grammar in &mut self.grammars {
			if grammar.is_relative() {
				*grammar = dir.join(&*grammar);
			}
		}
	}
}
