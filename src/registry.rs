use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::domain::StoryRecord;
use crate::error::TrackerError;
use crate::fs_util::{parent_dir, replace_file, sibling_temp_file};

/// Tracked stories keyed by id, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    stories: IndexMap<String, StoryRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&StoryRecord> {
        self.stories.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.stories.contains_key(id)
    }

    /// Replaces an existing entry in place, or appends a new one.
    pub fn insert(&mut self, record: StoryRecord) -> Option<StoryRecord> {
        self.stories.insert(record.id.clone(), record)
    }

    pub fn remove(&mut self, id: &str) -> Option<StoryRecord> {
        self.stories.shift_remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StoryRecord)> {
        self.stories.iter().map(|(id, record)| (id.as_str(), record))
    }

    pub fn ids(&self) -> Vec<String> {
        self.stories.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: Utf8PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads the whole registry, creating an empty file first when none
    /// exists yet.
    pub fn load(&self) -> Result<Registry, TrackerError> {
        if !self.path.as_std_path().exists() {
            tracing::info!(path = %self.path, "creating empty registry");
            let registry = Registry::new();
            self.save(&registry)?;
            return Ok(registry);
        }
        let content = fs::read_to_string(self.path.as_std_path())
            .map_err(|err| TrackerError::Storage(format!("read {}: {err}", self.path)))?;
        let registry: Registry = serde_json::from_str(&content)
            .map_err(|err| TrackerError::Storage(format!("parse {}: {err}", self.path)))?;
        if let Some((key, record)) = registry
            .stories
            .iter()
            .find(|(key, record)| **key != record.id)
        {
            return Err(TrackerError::Storage(format!(
                "{}: entry \"{key}\" holds story \"{}\"",
                self.path, record.id
            )));
        }
        Ok(registry)
    }

    /// Rewrites the whole file through a sibling temp file.
    pub fn save(&self, registry: &Registry) -> Result<(), TrackerError> {
        let parent = parent_dir(&self.path);
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| TrackerError::Storage(format!("create {parent}: {err}")))?;

        let content = serde_json::to_vec_pretty(registry)
            .map_err(|err| TrackerError::Storage(err.to_string()))?;
        let mut temp = sibling_temp_file(&self.path, ".track-data")?;
        temp.write_all(&content)
            .map_err(|err| TrackerError::Storage(err.to_string()))?;
        replace_file(temp, &self.path)?;
        tracing::debug!(path = %self.path, stories = registry.len(), "registry saved");
        Ok(())
    }
}
