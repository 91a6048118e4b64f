//! Sync configuration
//!
//! TOML document naming each source's library root, the conflict policy,
//! and optionally the translation rules. Without `[[rules]]` the built-in
//! ID3 ⇄ Swinsian table is used.
//!
//! ```toml
//! halt_on_conflict = true
//!
//! [sources.id3]
//! root = "/music"
//!
//! [sources.swinsian]
//! root = "/music"
//!
//! [[rules]]
//! kind = "map_tag"
//! from = "id3"
//! to = "swinsian"
//! from_tag = "genre"
//! to_tag = "playlist"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::snapshot::SourceKind;
use crate::translate::{Rule, RuleTable};

/// One library source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Library root; also the watched root for incoming track additions
    pub root: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Refuse to advance any source when a sync cycle has conflicts
    #[serde(default)]
    pub halt_on_conflict: bool,
    #[serde(default)]
    pub sources: BTreeMap<SourceKind, SourceConfig>,
    /// Translation rules; empty means [`RuleTable::builtin`]
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl SyncConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn with_source(mut self, source: SourceKind, root: impl Into<PathBuf>) -> Self {
        self.sources.insert(source, SourceConfig { root: root.into() });
        self
    }

    /// Explicit rules must only name configured sources
    pub fn validate(&self) -> Result<()> {
        for rule in &self.rules {
            for source in [rule.from(), rule.to()] {
                if !self.sources.contains_key(source) {
                    return Err(Error::Config(format!(
                        "rule references unconfigured source '{source}'"
                    )));
                }
            }
        }
        self.rule_table().validate()
    }

    /// Rule table with every source's root as its watched root
    pub fn rule_table(&self) -> RuleTable {
        let mut table = if self.rules.is_empty() {
            RuleTable::builtin()
        } else {
            self.rules
                .iter()
                .cloned()
                .fold(RuleTable::new(), RuleTable::with_rule)
        };
        for (source, cfg) in &self.sources {
            table = table.with_watched_root(source.clone(), cfg.root.clone());
        }
        table
    }
}
