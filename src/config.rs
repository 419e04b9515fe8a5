use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::DownloadFormat;
use crate::error::TrackerError;
use crate::template::CommandTemplate;

pub const APP_DIR_ENV: &str = "FIMFIC_TRACKER_DIR";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorName {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Api,
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorScheme {
    pub info: ColorName,
    pub success: ColorName,
    pub error: ColorName,
    pub confirm: ColorName,
    pub highlight_text: ColorName,
    pub highlight_number: ColorName,
    pub highlight_other: ColorName,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            info: ColorName::BrightCyan,
            success: ColorName::BrightGreen,
            error: ColorName::BrightRed,
            confirm: ColorName::BrightWhite,
            highlight_text: ColorName::BrightGreen,
            highlight_number: ColorName::BrightBlue,
            highlight_other: ColorName::BrightWhite,
        }
    }
}

/// One configuration file. Every key is optional so a layer only overrides
/// what it mentions.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    #[serde(default)]
    pub download_dir: Option<String>,
    #[serde(default)]
    pub tracker_file: Option<String>,
    #[serde(default)]
    pub download_format: Option<DownloadFormat>,
    #[serde(default)]
    pub download_delay: Option<f64>,
    #[serde(default)]
    pub download_alt: Option<Vec<String>>,
    #[serde(default)]
    pub download_alt_quiet: Option<bool>,
    #[serde(default)]
    pub data_source: Option<DataSource>,
    #[serde(default)]
    pub info_fg_color: Option<ColorName>,
    #[serde(default)]
    pub success_fg_color: Option<ColorName>,
    #[serde(default)]
    pub error_fg_color: Option<ColorName>,
    #[serde(default)]
    pub confirm_fg_color: Option<ColorName>,
    #[serde(default)]
    pub highlight_text_color: Option<ColorName>,
    #[serde(default)]
    pub highlight_number_color: Option<ColorName>,
    #[serde(default)]
    pub highlight_other_color: Option<ColorName>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub download_dir: Utf8PathBuf,
    pub tracker_file: Utf8PathBuf,
    pub download_format: DownloadFormat,
    pub download_delay: Duration,
    pub download_alt: Option<CommandTemplate>,
    pub download_alt_quiet: bool,
    pub data_source: DataSource,
    pub colors: ColorScheme,
}

impl Settings {
    pub fn defaults(app_dir: &Utf8Path) -> Self {
        Self {
            download_dir: app_dir.join("downloads"),
            tracker_file: app_dir.join("track-data.json"),
            download_format: DownloadFormat::Html,
            download_delay: Duration::from_secs(1),
            download_alt: None,
            download_alt_quiet: false,
            data_source: DataSource::Api,
            colors: ColorScheme::default(),
        }
    }

    /// Overwrites every field `layer` sets. `origin` is only used in errors
    /// and to resolve relative paths.
    pub fn apply(&mut self, layer: SettingsFile, origin: &Utf8Path) -> Result<(), TrackerError> {
        let base = origin.parent().unwrap_or(Utf8Path::new("."));

        if let Some(dir) = layer.download_dir {
            self.download_dir = resolve_path(&dir, base)?;
        }
        if let Some(file) = layer.tracker_file {
            self.tracker_file = resolve_path(&file, base)?;
        }
        if let Some(format) = layer.download_format {
            self.download_format = format;
        }
        if let Some(delay) = layer.download_delay {
            self.download_delay =
                Duration::try_from_secs_f64(delay).map_err(|err| TrackerError::InvalidSetting {
                    key: "download_delay".to_string(),
                    path: origin.as_std_path().to_path_buf(),
                    message: format!("expected a non-negative number of seconds, got {delay}: {err}"),
                })?;
        }
        if let Some(args) = layer.download_alt {
            let template =
                CommandTemplate::parse(&args).map_err(|err| TrackerError::InvalidSetting {
                    key: "download_alt".to_string(),
                    path: origin.as_std_path().to_path_buf(),
                    message: err.to_string(),
                })?;
            self.download_alt = Some(template);
        }
        if let Some(quiet) = layer.download_alt_quiet {
            self.download_alt_quiet = quiet;
        }
        if let Some(source) = layer.data_source {
            self.data_source = source;
        }

        let colors = &mut self.colors;
        for (value, slot) in [
            (layer.info_fg_color, &mut colors.info),
            (layer.success_fg_color, &mut colors.success),
            (layer.error_fg_color, &mut colors.error),
            (layer.confirm_fg_color, &mut colors.confirm),
            (layer.highlight_text_color, &mut colors.highlight_text),
            (layer.highlight_number_color, &mut colors.highlight_number),
            (layer.highlight_other_color, &mut colors.highlight_other),
        ] {
            if let Some(value) = value {
                *slot = value;
            }
        }
        Ok(())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolves settings from the default locations plus an optional
    /// explicit file, which must exist.
    pub fn resolve(override_path: Option<&str>) -> Result<Settings, TrackerError> {
        let app_dir = Self::app_dir()?;
        let layers = Self::default_layers(&app_dir);
        Self::resolve_layers(&app_dir, &layers, override_path.map(|path| Utf8Path::new(path)))
    }

    pub fn resolve_layers(
        app_dir: &Utf8Path,
        layers: &[Utf8PathBuf],
        override_path: Option<&Utf8Path>,
    ) -> Result<Settings, TrackerError> {
        let mut settings = Settings::defaults(app_dir);

        for path in layers {
            if !path.as_std_path().is_file() {
                tracing::debug!(path = %path, "config layer not present");
                continue;
            }
            let layer = Self::read_layer(path)?;
            settings.apply(layer, path)?;
        }

        if let Some(path) = override_path {
            if !path.as_std_path().is_file() {
                return Err(TrackerError::ConfigRead(path.as_std_path().to_path_buf()));
            }
            let layer = Self::read_layer(path)?;
            settings.apply(layer, path)?;
        }

        Ok(settings)
    }

    pub fn read_layer(path: &Utf8Path) -> Result<SettingsFile, TrackerError> {
        tracing::debug!(path = %path, "reading config layer");
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| TrackerError::ConfigRead(path.as_std_path().to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| TrackerError::ConfigParse {
            path: path.as_std_path().to_path_buf(),
            message: err.to_string(),
        })
    }

    /// `$FIMFIC_TRACKER_DIR` or `~/.fimfic-tracker`.
    pub fn app_dir() -> Result<Utf8PathBuf, TrackerError> {
        if let Ok(dir) = std::env::var(APP_DIR_ENV) {
            if !dir.trim().is_empty() {
                return Ok(Utf8PathBuf::from(dir.trim()));
            }
        }
        BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".fimfic-tracker")).ok()
            })
            .ok_or_else(|| {
                TrackerError::Storage("unable to resolve the application directory".to_string())
            })
    }

    /// System file, user config dir file, application dir file; lowest
    /// priority first.
    pub fn default_layers(app_dir: &Utf8Path) -> Vec<Utf8PathBuf> {
        let mut layers = vec![Utf8PathBuf::from("/etc/fimfic-tracker").join(SETTINGS_FILE_NAME)];
        if let Some(config_dir) = BaseDirs::new()
            .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.config_dir().to_path_buf()).ok())
        {
            layers.push(config_dir.join("fimfic-tracker").join(SETTINGS_FILE_NAME));
        }
        layers.push(app_dir.join(SETTINGS_FILE_NAME));
        layers
    }
}

fn resolve_path(value: &str, base: &Utf8Path) -> Result<Utf8PathBuf, TrackerError> {
    let expanded = match value.strip_prefix("~/") {
        Some(rest) => {
            let home = BaseDirs::new()
                .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.home_dir().to_path_buf()).ok())
                .ok_or_else(|| {
                    TrackerError::Storage("unable to resolve the home directory".to_string())
                })?;
            home.join(rest)
        }
        None => Utf8PathBuf::from(value),
    };
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base.join(expanded))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    #[test]
    fn defaults_without_files() {
        let (_temp, root) = temp_root();
        let settings = ConfigLoader::resolve_layers(&root, &[root.join("missing.json")], None)
            .unwrap();
        assert_eq!(settings.download_dir, root.join("downloads"));
        assert_eq!(settings.tracker_file, root.join("track-data.json"));
        assert_eq!(settings.download_format, DownloadFormat::Html);
        assert_eq!(settings.download_delay, Duration::from_secs(1));
        assert!(settings.download_alt.is_none());
        assert_eq!(settings.colors, ColorScheme::default());
    }

    #[test]
    fn relative_paths_follow_the_file() {
        let (_temp, root) = temp_root();
        let path = root.join("settings.json");
        fs::write(&path, r#"{"download_dir": "books"}"#).unwrap();
        let settings = ConfigLoader::resolve_layers(&root, &[path], None).unwrap();
        assert_eq!(settings.download_dir, root.join("books"));
    }

    #[test]
    fn negative_delay_is_rejected() {
        let (_temp, root) = temp_root();
        let path = root.join("settings.json");
        fs::write(&path, r#"{"download_delay": -2}"#).unwrap();
        let err = ConfigLoader::resolve_layers(&root, &[path], None).unwrap_err();
        assert_matches!(err, TrackerError::InvalidSetting { key, .. } if key == "download_delay");
    }

    #[test]
    fn oversized_delay_is_rejected() {
        let (_temp, root) = temp_root();
        let path = root.join("settings.json");
        fs::write(&path, r#"{"download_delay": 1e300}"#).unwrap();
        let err = ConfigLoader::resolve_layers(&root, &[path], None).unwrap_err();
        assert_matches!(err, TrackerError::InvalidSetting { key, .. } if key == "download_delay");
    }
}
