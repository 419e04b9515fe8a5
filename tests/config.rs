use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use fimfic_tracker::config::{ColorName, ConfigLoader, DataSource};
use fimfic_tracker::domain::DownloadFormat;
use fimfic_tracker::error::TrackerError;

fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

#[test]
fn later_layers_override_earlier_ones() {
    let (_temp, root) = temp_root();
    let system = root.join("system.json");
    let user = root.join("user.json");
    fs::write(
        &system,
        r#"{"download_format": "txt", "download_delay": 5, "error_fg_color": "red"}"#,
    )
    .unwrap();
    fs::write(&user, r#"{"download_format": "epub", "data_source": "html"}"#).unwrap();

    let settings = ConfigLoader::resolve_layers(&root, &[system, user], None).unwrap();

    assert_eq!(settings.download_format, DownloadFormat::Epub);
    assert_eq!(settings.download_delay, Duration::from_secs(5));
    assert_eq!(settings.data_source, DataSource::Html);
    assert_eq!(settings.colors.error, ColorName::Red);
    assert_eq!(settings.colors.info, ColorName::BrightCyan);
}

#[test]
fn explicit_file_wins_over_defaults() {
    let (_temp, root) = temp_root();
    let app_layer = root.join("settings.json");
    let explicit = root.join("explicit.json");
    fs::write(&app_layer, r#"{"download_delay": 2.5}"#).unwrap();
    fs::write(&explicit, r#"{"download_delay": 0, "tracker_file": "/data/track.json"}"#).unwrap();

    let settings =
        ConfigLoader::resolve_layers(&root, &[app_layer], Some(explicit.as_path())).unwrap();

    assert_eq!(settings.download_delay, Duration::ZERO);
    assert_eq!(settings.tracker_file, Utf8PathBuf::from("/data/track.json"));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let (_temp, root) = temp_root();
    let missing = root.join("nope.json");

    let err = ConfigLoader::resolve_layers(&root, &[], Some(missing.as_path())).unwrap_err();

    assert_matches!(err, TrackerError::ConfigRead(path) if path == missing.as_std_path());
}

#[test]
fn invalid_enum_value_names_the_file() {
    let (_temp, root) = temp_root();
    let path = root.join("settings.json");
    fs::write(&path, r#"{"download_format": "pdf"}"#).unwrap();

    let err = ConfigLoader::resolve_layers(&root, &[path.clone()], None).unwrap_err();

    assert!(err.is_validation());
    assert_matches!(err, TrackerError::ConfigParse { path: err_path, message }
        if err_path == path.as_std_path() && message.contains("pdf"));
}

#[test]
fn unknown_keys_are_rejected() {
    let (_temp, root) = temp_root();
    let path = root.join("settings.json");
    fs::write(&path, r#"{"download_dirr": "/tmp"}"#).unwrap();

    let err = ConfigLoader::resolve_layers(&root, &[path], None).unwrap_err();

    assert_matches!(err, TrackerError::ConfigParse { message, .. } if message.contains("download_dirr"));
}

#[test]
fn download_command_is_checked_at_load() {
    let (_temp, root) = temp_root();
    let good = root.join("good.json");
    let bad = root.join("bad.json");
    fs::write(
        &good,
        r#"{"download_alt": ["fanfic-dl", "--out", "${safe_title}", "$id"], "download_alt_quiet": true}"#,
    )
    .unwrap();
    fs::write(&bad, r#"{"download_alt": ["fanfic-dl", "$chapters"]}"#).unwrap();

    let settings = ConfigLoader::resolve_layers(&root, &[good], None).unwrap();
    assert!(settings.download_alt.is_some());
    assert!(settings.download_alt_quiet);

    let err = ConfigLoader::resolve_layers(&root, &[bad], None).unwrap_err();
    assert_matches!(err, TrackerError::InvalidSetting { key, message, .. }
        if key == "download_alt" && message.contains("$chapter_amt"));
}
