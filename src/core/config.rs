//! Configuration for the memory optimizer

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::areas::{MemoryArea, MemoryAreas};
use super::capability::Capabilities;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Process scheduling priority while the optimizer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Low,
    Normal,
    High,
}

/// Process names the working-set trim must skip.
///
/// Entries are compared case-insensitively, ignoring whitespace and a
/// trailing ".exe".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionList {
    names: BTreeSet<String>,
}

impl ExclusionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(name: &str) -> String {
        let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        let lower = compact.to_lowercase();
        match lower.strip_suffix(".exe") {
            Some(stem) => stem.to_string(),
            None => lower,
        }
    }

    /// Returns false when the name normalizes to nothing or is already present.
    pub fn insert(&mut self, name: &str) -> bool {
        let normalized = Self::normalize(name);
        if normalized.is_empty() {
            return false;
        }
        self.names.insert(normalized)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(&Self::normalize(name))
    }

    pub fn contains(&self, process_name: &str) -> bool {
        !self.names.is_empty() && self.names.contains(&Self::normalize(process_name))
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExclusionList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = ExclusionList::new();
        for name in iter {
            list.insert(name.as_ref());
        }
        list
    }
}

impl Serialize for ExclusionList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names.iter())
    }
}

impl<'de> Deserialize<'de> for ExclusionList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        Ok(names.iter().collect())
    }
}

/// Main optimizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Memory areas selected for optimization
    pub memory_areas: Vec<MemoryArea>,

    /// Processes to never trim
    pub process_exclusion_list: ExclusionList,

    /// Optimize every N hours (0 = never)
    pub auto_optimization_interval_hours: u32,

    /// Optimize when free physical memory drops below this percentage (0 = never)
    pub auto_optimization_memory_usage: u32,

    /// Memory snapshot polling interval (seconds)
    pub update_interval_secs: u64,

    /// Process priority while running
    pub run_on_priority: Priority,

    /// Log a reclaimed-memory summary after each run
    pub show_optimization_notifications: bool,

    /// Include virtual memory in the summary
    pub show_virtual_memory: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            memory_areas: vec![
                MemoryArea::ProcessesWorkingSet,
                MemoryArea::SystemWorkingSet,
                MemoryArea::ModifiedPageList,
                MemoryArea::StandbyList,
                MemoryArea::CombinedPageList,
            ],
            process_exclusion_list: ExclusionList::new(),
            auto_optimization_interval_hours: 0,
            auto_optimization_memory_usage: 0,
            update_interval_secs: 30,
            run_on_priority: Priority::Low,
            show_optimization_notifications: true,
            show_virtual_memory: true,
        }
    }
}

impl OptimizerConfig {
    /// Default location: `<config dir>/memopt/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("memopt")
            .join("config.toml")
    }

    /// Load config from TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.normalized())
    }

    /// Load config, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn areas(&self) -> MemoryAreas {
        self.memory_areas.iter().copied().collect()
    }

    pub fn set_areas(&mut self, areas: MemoryAreas) {
        self.memory_areas = areas.normalized().iter().collect();
    }

    /// Flip one area the way a settings toggle does.
    pub fn toggle_area(&mut self, area: MemoryArea) {
        let mut areas = self.areas();
        areas.toggle(area);
        self.set_areas(areas);
    }

    /// Selection intersected with what this OS supports.
    pub fn effective_areas(&self, capabilities: &Capabilities) -> MemoryAreas {
        capabilities.filter(self.areas().normalized())
    }

    fn normalized(mut self) -> Self {
        let areas = self.areas();
        self.set_areas(areas);
        self
    }
}
