use std::fs;
use std::io::{Read, Write};
use std::process::{Command, Stdio};

use camino::Utf8PathBuf;
use reqwest::blocking::Client;

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::Settings;
use crate::domain::{DownloadFormat, FIMFIC_BASE_URL, StoryRecord, sanitize_filename};
use crate::error::TrackerError;
use crate::fimfiction::{build_http_client, handle_status};
use crate::fs_util::{replace_file, sibling_temp_file};
use crate::template::CommandTemplate;

const CHUNK_SIZE: usize = 8192;

pub trait Downloader {
    fn download(&self, record: &StoryRecord, sink: &dyn ProgressSink) -> Result<(), TrackerError>;
}

/// Streams the story file from Fimfiction into the download directory.
#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
    base_url: String,
    download_dir: Utf8PathBuf,
    format: DownloadFormat,
}

impl HttpDownloader {
    pub fn new(download_dir: Utf8PathBuf, format: DownloadFormat) -> Result<Self, TrackerError> {
        Self::with_base_url(FIMFIC_BASE_URL, download_dir, format)
    }

    pub fn with_base_url(
        base_url: &str,
        download_dir: Utf8PathBuf,
        format: DownloadFormat,
    ) -> Result<Self, TrackerError> {
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            download_dir,
            format,
        })
    }

    pub fn download_url(&self, record: &StoryRecord) -> String {
        record.download_url.clone().unwrap_or_else(|| {
            format!(
                "{}/story/download/{}/{}",
                self.base_url,
                record.id,
                self.format.extension()
            )
        })
    }

    pub fn target_path(&self, record: &StoryRecord) -> Utf8PathBuf {
        self.download_dir.join(sanitize_filename(&format!(
            "{}.{}",
            record.title,
            self.format.extension()
        )))
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, record: &StoryRecord, sink: &dyn ProgressSink) -> Result<(), TrackerError> {
        let url = self.download_url(record);
        let target = self.target_path(record);
        let filename = target.file_name().unwrap_or(target.as_str()).to_string();
        tracing::debug!(%url, path = %target, "downloading story");

        fs::create_dir_all(self.download_dir.as_std_path())
            .map_err(|err| TrackerError::Storage(format!("create {}: {err}", self.download_dir)))?;

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| TrackerError::Request(err.to_string()))?;
        let mut response = handle_status(response)?;

        let mut temp = sibling_temp_file(&target, ".fimfic-download")?;
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut downloaded: u64 = 0;
        loop {
            let read = response
                .read(&mut buffer)
                .map_err(|err| TrackerError::Request(err.to_string()))?;
            if read == 0 {
                break;
            }
            temp.write_all(&buffer[..read])
                .map_err(|err| TrackerError::Storage(err.to_string()))?;
            downloaded += read as u64;
            sink.event(ProgressEvent::progress(format!(
                "Downloading \"{filename}\" [{}]",
                human_size(downloaded)
            )));
        }

        replace_file(temp, &target)?;
        sink.event(ProgressEvent::success(format!("Saved as \"{filename}\"")));
        Ok(())
    }
}

/// Runs the user's own download command with the story's fields substituted.
#[derive(Debug, Clone)]
pub struct CommandDownloader {
    template: CommandTemplate,
    quiet: bool,
    working_dir: Utf8PathBuf,
}

impl CommandDownloader {
    pub fn new(template: CommandTemplate, quiet: bool, working_dir: Utf8PathBuf) -> Self {
        Self {
            template,
            quiet,
            working_dir,
        }
    }
}

impl Downloader for CommandDownloader {
    fn download(&self, record: &StoryRecord, sink: &dyn ProgressSink) -> Result<(), TrackerError> {
        let args = self.template.render(record);
        let Some((program, rest)) = args.split_first() else {
            return Err(TrackerError::InvalidTemplate("empty command".to_string()));
        };
        fs::create_dir_all(self.working_dir.as_std_path())
            .map_err(|err| TrackerError::Storage(format!("create {}: {err}", self.working_dir)))?;

        tracing::debug!(program = %program, args = ?rest, "running download command");
        sink.event(ProgressEvent::info(format!(
            "Running \"{program}\" for \"{}\"...",
            record.title
        )));

        let mut cmd = Command::new(program);
        cmd.args(rest).current_dir(self.working_dir.as_std_path());
        if self.quiet {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        let status = cmd
            .status()
            .map_err(|err| TrackerError::Command(format!("failed to start {program}: {err}")))?;
        if !status.success() {
            return Err(TrackerError::Command(format!("{program} exited with {status}")));
        }
        sink.event(ProgressEvent::success(format!(
            "Downloaded \"{}\" with \"{program}\"",
            record.title
        )));
        Ok(())
    }
}

/// The downloader selected by the settings.
pub enum ConfiguredDownloader {
    Http(HttpDownloader),
    Command(CommandDownloader),
}

impl ConfiguredDownloader {
    pub fn from_settings(settings: &Settings) -> Result<Self, TrackerError> {
        match &settings.download_alt {
            Some(template) => Ok(ConfiguredDownloader::Command(CommandDownloader::new(
                template.clone(),
                settings.download_alt_quiet,
                settings.download_dir.clone(),
            ))),
            None => Ok(ConfiguredDownloader::Http(HttpDownloader::new(
                settings.download_dir.clone(),
                settings.download_format,
            )?)),
        }
    }
}

impl Downloader for ConfiguredDownloader {
    fn download(&self, record: &StoryRecord, sink: &dyn ProgressSink) -> Result<(), TrackerError> {
        match self {
            ConfiguredDownloader::Http(downloader) => downloader.download(record, sink),
            ConfiguredDownloader::Command(downloader) => downloader.download(record, sink),
        }
    }
}

/// Human readable size, switching units past 900 of the current one.
pub fn human_size(bytes: u64) -> String {
    const SUFFIXES: [&str; 5] = ["b", "Kb", "Mb", "Gb", "Tb"];
    let mut size = bytes as f64;
    let mut index = 0;
    while size > 900.0 && index < SUFFIXES.len() - 1 {
        size /= 1024.0;
        index += 1;
    }
    format!("{size:.2} {}", SUFFIXES[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CompletionStatus;

    fn record() -> StoryRecord {
        StoryRecord {
            id: "42".to_string(),
            title: "Foo: Bar?".to_string(),
            author: "Baz".to_string(),
            url: "https://www.fimfiction.net/story/42".to_string(),
            chapter_count: 3,
            words: None,
            last_update_timestamp: 100,
            completion_status: CompletionStatus::Incomplete,
            download_url: None,
        }
    }

    #[test]
    fn sizes() {
        assert_eq!(human_size(0), "0.00 b");
        assert_eq!(human_size(900), "900.00 b");
        assert_eq!(human_size(2048), "2.00 Kb");
        assert_eq!(human_size(5 * 1024 * 1024), "5.00 Mb");
    }

    #[test]
    fn target_path_is_sanitized() {
        let downloader =
            HttpDownloader::new(Utf8PathBuf::from("/tmp/books"), DownloadFormat::Epub).unwrap();
        assert_eq!(
            downloader.target_path(&record()),
            Utf8PathBuf::from("/tmp/books/Foo_ Bar_.epub")
        );
        assert_eq!(
            downloader.download_url(&record()),
            "https://www.fimfiction.net/story/download/42/epub"
        );
    }

    #[test]
    fn resolved_link_wins() {
        let downloader =
            HttpDownloader::new(Utf8PathBuf::from("/tmp/books"), DownloadFormat::Txt).unwrap();
        let mut record = record();
        record.download_url = Some("https://cdn.example/42.txt".to_string());
        assert_eq!(downloader.download_url(&record), "https://cdn.example/42.txt");
    }
}
