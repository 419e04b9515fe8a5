use std::thread;
use std::time::Duration;

use indexmap::IndexSet;

use crate::config::Settings;
use crate::domain::{CompletionStatus, StoryId, StoryRecord, has_update};
use crate::download::Downloader;
use crate::error::TrackerError;
use crate::fimfiction::StorySource;
use crate::registry::{Registry, RegistryStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Info,
    Success,
    Warning,
    Error,
    /// Transient status, redrawn in place.
    Progress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub kind: EventKind,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(EventKind::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(EventKind::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(EventKind::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error, message)
    }

    pub fn progress(message: impl Into<String>) -> Self {
        Self::new(EventKind::Progress, message)
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub trait Prompter {
    fn confirm(&self, message: &str) -> Result<bool, TrackerError>;
}

/// How yes/no questions get answered during a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmPolicy {
    Prompt,
    AssumeYes,
    AssumeNo,
}

impl ConfirmPolicy {
    pub fn from_flags(assume_yes: bool, assume_no: bool) -> Result<Self, TrackerError> {
        match (assume_yes, assume_no) {
            (true, true) => Err(TrackerError::ConflictingFlags(
                "--assume-yes and --assume-no cannot be used together".to_string(),
            )),
            (true, false) => Ok(ConfirmPolicy::AssumeYes),
            (false, true) => Ok(ConfirmPolicy::AssumeNo),
            (false, false) => Ok(ConfirmPolicy::Prompt),
        }
    }

    pub fn decide(self, prompter: &dyn Prompter, message: &str) -> Result<bool, TrackerError> {
        match self {
            ConfirmPolicy::AssumeYes => Ok(true),
            ConfirmPolicy::AssumeNo => Ok(false),
            ConfirmPolicy::Prompt => prompter.confirm(message),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrackOptions {
    pub skip_download: bool,
    pub overwrite: bool,
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub force: bool,
    pub confirm: ConfirmPolicy,
    pub ids: Vec<StoryId>,
}

impl DownloadOptions {
    /// Validates the flag combination before anything touches the network.
    pub fn from_flags(
        force: bool,
        assume_yes: bool,
        assume_no: bool,
        ids: &[String],
    ) -> Result<Self, TrackerError> {
        let confirm = ConfirmPolicy::from_flags(assume_yes, assume_no)?;
        if force && confirm != ConfirmPolicy::Prompt {
            return Err(TrackerError::ConflictingFlags(
                "--force cannot be combined with --assume-yes or --assume-no".to_string(),
            ));
        }
        // Repeats collapse onto the first mention.
        let ids = ids
            .iter()
            .map(|id| id.parse::<StoryId>())
            .collect::<Result<IndexSet<_>, _>>()?
            .into_iter()
            .collect();
        Ok(Self { force, confirm, ids })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackResult {
    pub added: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UntrackResult {
    pub removed: Vec<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListResult {
    pub stories: Vec<StoryRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub checked: usize,
    pub downloaded: Vec<String>,
    pub up_to_date: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

enum EntryOutcome {
    UpToDate,
    Downloaded,
    Failed(TrackerError),
}

pub struct App<S: StorySource, D: Downloader> {
    store: RegistryStore,
    source: S,
    downloader: D,
    delay: Duration,
}

impl<S: StorySource, D: Downloader> App<S, D> {
    pub fn new(settings: &Settings, source: S, downloader: D) -> Self {
        Self {
            store: RegistryStore::new(settings.tracker_file.clone()),
            source,
            downloader,
            delay: settings.download_delay,
        }
    }

    /// Adds stories to the registry and downloads them.
    pub fn track(
        &self,
        inputs: &[String],
        options: &TrackOptions,
        sink: &dyn ProgressSink,
        prompter: &dyn Prompter,
    ) -> Result<TrackResult, TrackerError> {
        let mut registry = self.store.load()?;
        let mut result = TrackResult::default();
        let overwrite = if options.overwrite {
            ConfirmPolicy::AssumeYes
        } else {
            ConfirmPolicy::Prompt
        };
        let mut needs_pause = false;

        for input in inputs {
            let id = match input.parse::<StoryId>() {
                Ok(id) => id,
                Err(err) => {
                    sink.event(ProgressEvent::error(err.to_string()));
                    result.failed.push(input.clone());
                    continue;
                }
            };

            if let Some(existing) = registry.get(id.as_str()) {
                let question = format!(
                    "You already have the story \"{}\" ({id}) on the tracked list. Do you want to overwrite it?",
                    existing.title
                );
                if !overwrite.decide(prompter, &question)? {
                    sink.event(ProgressEvent::info("Skipping story."));
                    result.skipped.push(id.to_string());
                    continue;
                }
            }

            if needs_pause {
                self.pause();
            }
            needs_pause = true;

            let record = match self.fetch_story(&id, sink, true) {
                Ok(record) => record,
                Err(err) => {
                    sink.event(ProgressEvent::error(format!("Story {id}: {err}")));
                    result.failed.push(id.to_string());
                    continue;
                }
            };
            registry.insert(record.clone());
            self.store.save(&registry)?;
            sink.event(ProgressEvent::success(format!(
                "\"{}\" ({id}) has been added to the tracked list.",
                record.title
            )));
            result.added.push(id.to_string());

            if !options.skip_download {
                if let Err(err) = self.downloader.download(&record, sink) {
                    sink.event(ProgressEvent::error(format!(
                        "Failed to download \"{}\" ({id}): {err}",
                        record.title
                    )));
                }
            }
        }

        Ok(result)
    }

    pub fn untrack(
        &self,
        inputs: &[String],
        sink: &dyn ProgressSink,
    ) -> Result<UntrackResult, TrackerError> {
        let mut registry = self.store.load()?;
        let mut result = UntrackResult::default();

        for input in inputs {
            let key = input
                .parse::<StoryId>()
                .map(|id| id.to_string())
                .unwrap_or_else(|_| input.trim().to_string());
            match registry.remove(&key) {
                Some(record) => {
                    self.store.save(&registry)?;
                    sink.event(ProgressEvent::success(format!(
                        "Successfully removed \"{}\" ({key}) from the tracked list.",
                        record.title
                    )));
                    result.removed.push(key);
                }
                None => {
                    sink.event(ProgressEvent::error(
                        TrackerError::NotTracked(key.clone()).to_string(),
                    ));
                    result.missing.push(key);
                }
            }
        }

        Ok(result)
    }

    pub fn list(&self) -> Result<ListResult, TrackerError> {
        let registry = self.store.load()?;
        Ok(ListResult {
            stories: registry.iter().map(|(_, record)| record.clone()).collect(),
        })
    }

    /// Checks the selected stories for updates and downloads the ones that
    /// changed. Per-story failures are reported and the batch moves on.
    pub fn download(
        &self,
        options: &DownloadOptions,
        sink: &dyn ProgressSink,
        prompter: &dyn Prompter,
    ) -> Result<BatchSummary, TrackerError> {
        let mut registry = self.store.load()?;
        let mut summary = BatchSummary::default();

        if registry.is_empty() {
            sink.event(ProgressEvent::error("There are no tracked stories."));
            return Ok(summary);
        }

        let selected = if options.ids.is_empty() {
            registry.ids()
        } else {
            let mut selected = Vec::new();
            for id in &options.ids {
                if registry.contains(id.as_str()) {
                    selected.push(id.to_string());
                } else {
                    sink.event(ProgressEvent::error(
                        TrackerError::NotTracked(id.to_string()).to_string(),
                    ));
                    summary.failed.push(id.to_string());
                }
            }
            selected
        };

        let mut needs_pause = false;
        for id in selected {
            let Some(stored) = registry.get(&id).cloned() else {
                continue;
            };

            if !options.force && stored.completion_status != CompletionStatus::Incomplete {
                let question = format!(
                    "\"{}\" ({id}) has been marked as \"{}\" by the author. Do you want to still check for an update on it?",
                    stored.title, stored.completion_status
                );
                if !options.confirm.decide(prompter, &question)? {
                    sink.event(ProgressEvent::info("Skipping story."));
                    summary.skipped.push(id);
                    continue;
                }
            }

            if needs_pause {
                self.pause();
            }
            needs_pause = true;
            summary.checked += 1;

            match self.process_entry(&mut registry, &stored, options.force, sink)? {
                EntryOutcome::UpToDate => summary.up_to_date.push(id),
                EntryOutcome::Downloaded => summary.downloaded.push(id),
                EntryOutcome::Failed(err) => {
                    tracing::warn!(story = %id, network = err.is_request(), error = %err, "story check failed");
                    sink.event(ProgressEvent::error(format!(
                        "\"{}\" ({id}): {err}",
                        stored.title
                    )));
                    summary.failed.push(id);
                }
            }
        }

        tracing::info!(
            checked = summary.checked,
            downloaded = summary.downloaded.len(),
            failed = summary.failed.len(),
            "download batch finished"
        );
        Ok(summary)
    }

    /// Fetch, compare, download, persist. Only registry writes escape as
    /// errors; everything else becomes `EntryOutcome::Failed`.
    fn process_entry(
        &self,
        registry: &mut Registry,
        stored: &StoryRecord,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<EntryOutcome, TrackerError> {
        let id = match stored.id.parse::<StoryId>() {
            Ok(id) => id,
            Err(err) => return Ok(EntryOutcome::Failed(err)),
        };
        if !force {
            sink.event(ProgressEvent::info(format!(
                "Checking if \"{}\" ({id}) had an update...",
                stored.title
            )));
        }

        let fresh = match self.fetch_story(&id, sink, force) {
            Ok(fresh) => fresh,
            Err(err) => return Ok(EntryOutcome::Failed(err)),
        };

        let updated = has_update(&fresh, stored);
        tracing::debug!(story = %id, updated, force, "compared story metadata");
        if !updated {
            sink.event(ProgressEvent::warning("Story didn't have an update."));
            if !force {
                self.persist(registry, fresh)?;
                return Ok(EntryOutcome::UpToDate);
            }
            sink.event(ProgressEvent::warning("Force downloading story."));
        }

        match self.downloader.download(&fresh, sink) {
            Ok(()) => {
                self.persist(registry, fresh)?;
                Ok(EntryOutcome::Downloaded)
            }
            Err(err) => {
                self.persist(registry, stored.refreshed_from(&fresh))?;
                Ok(EntryOutcome::Failed(err))
            }
        }
    }

    fn fetch_story(
        &self,
        id: &StoryId,
        sink: &dyn ProgressSink,
        echo: bool,
    ) -> Result<StoryRecord, TrackerError> {
        if echo {
            sink.event(ProgressEvent::info(format!(
                "Extracting data from the story of ID {id}..."
            )));
        }
        let record = self.source.fetch(id)?;
        if echo {
            sink.event(ProgressEvent::info(format!("Got data for \"{}\".", record.title)));
        }
        Ok(record)
    }

    /// Saves only when the record differs from what is stored.
    fn persist(&self, registry: &mut Registry, record: StoryRecord) -> Result<(), TrackerError> {
        if registry.get(&record.id) == Some(&record) {
            return Ok(());
        }
        registry.insert(record);
        self.store.save(registry)
    }

    fn pause(&self) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}
