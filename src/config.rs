//! `newsfeed.toml` settings.
//!
//! Every key is optional. Relative paths resolve against the directory that
//! holds the settings file; command-line flags are applied on top by the
//! binary.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::build::FeedMetadata;
use crate::pipeline::matrix::{expand_build_matrix, normalize_channel, normalize_platform, Target};
use crate::pipeline::paths::{SourceLayout, BLOCKLIST_FILE, RELEASES_FILE};

pub const DEFAULT_CONFIG_FILE: &str = "newsfeed.toml";
pub const DEFAULT_TITLE: &str = "I2P News";
pub const DEFAULT_SUBTITLE: &str = "News feed, and router updates";
pub const DEFAULT_SITE_URL: &str = "http://i2p-projekt.i2p";
pub const DEFAULT_MAIN_FEED_URL: &str =
    "http://tc73n4kivdroccekirco7rhgxdg5f3cjvbaapabupeyzrqwv5guq.b32.i2p/news.atom.xml";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_BUILD_DIR: &str = "build";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsToml {
    title: Option<String>,
    subtitle: Option<String>,
    site_url: Option<String>,
    main_feed_url: Option<String>,
    backup_feed_url: Option<String>,
    urn_id: Option<String>,
    language: Option<String>,
    data_dir: Option<String>,
    build_dir: Option<String>,
    release_json: Option<String>,
    blocklist: Option<String>,
    translations_dir: Option<String>,
    platform: Option<String>,
    channel: Option<String>,
    signer_id: Option<String>,
    signing_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub title: String,
    pub subtitle: String,
    pub site_url: String,
    pub main_feed_url: String,
    pub backup_feed_url: Option<String>,
    pub urn_id: Option<String>,
    pub language: Option<String>,
    pub data_dir: PathBuf,
    pub build_dir: PathBuf,
    /// `None` means `<data_dir>/releases.json`.
    pub release_json: Option<PathBuf>,
    /// `None` means `<data_dir>/blocklist.xml`.
    pub blocklist: Option<PathBuf>,
    pub translations_dir: Option<PathBuf>,
    pub platform: String,
    pub channel: String,
    pub signer_id: Option<String>,
    pub signing_key: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            subtitle: DEFAULT_SUBTITLE.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            main_feed_url: DEFAULT_MAIN_FEED_URL.to_string(),
            backup_feed_url: None,
            urn_id: None,
            language: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            build_dir: PathBuf::from(DEFAULT_BUILD_DIR),
            release_json: None,
            blocklist: None,
            translations_dir: None,
            platform: String::new(),
            channel: String::new(),
            signer_id: None,
            signing_key: None,
        }
    }
}

pub fn resolve_config_path(base_dir: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    }
}

/// Load settings from `path`, or from `newsfeed.toml` in the working
/// directory when no path is given and that file exists. An explicit path
/// that does not exist is an error.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.is_file() {
                return Ok(Settings::default());
            }
            default
        }
    };

    let text = fs::read_to_string(&config_path)
        .with_context(|| format!("reading settings '{}'", config_path.display()))?;
    let base_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    parse_settings(&text, base_dir, &config_path)
}

pub fn parse_settings(text: &str, base_dir: &Path, config_path: &Path) -> Result<Settings> {
    let parsed: SettingsToml = toml::from_str(text)
        .with_context(|| format!("parsing settings '{}'", config_path.display()))?;

    let defaults = Settings::default();
    let path = |value: Option<String>| value.map(|raw| resolve_config_path(base_dir, &raw));
    let text_or = |value: Option<String>, default: String| value.unwrap_or(default);

    let settings = Settings {
        title: text_or(parsed.title, defaults.title),
        subtitle: text_or(parsed.subtitle, defaults.subtitle),
        site_url: text_or(parsed.site_url, defaults.site_url),
        main_feed_url: text_or(parsed.main_feed_url, defaults.main_feed_url),
        backup_feed_url: parsed.backup_feed_url.filter(|url| !url.is_empty()),
        urn_id: parsed.urn_id.filter(|id| !id.is_empty()),
        language: parsed.language.filter(|lang| !lang.is_empty()),
        data_dir: path(parsed.data_dir).unwrap_or_else(|| base_dir.join(DEFAULT_DATA_DIR)),
        build_dir: path(parsed.build_dir).unwrap_or_else(|| base_dir.join(DEFAULT_BUILD_DIR)),
        release_json: path(parsed.release_json),
        blocklist: path(parsed.blocklist),
        translations_dir: path(parsed.translations_dir),
        platform: parsed.platform.unwrap_or_default(),
        channel: parsed.channel.unwrap_or_default(),
        signer_id: parsed.signer_id,
        signing_key: path(parsed.signing_key),
    };

    settings
        .targets()
        .with_context(|| format!("invalid settings '{}'", config_path.display()))?;
    Ok(settings)
}

impl Settings {
    pub fn release_json_path(&self) -> PathBuf {
        self.release_json
            .clone()
            .unwrap_or_else(|| self.data_dir.join(RELEASES_FILE))
    }

    pub fn blocklist_path(&self) -> PathBuf {
        self.blocklist
            .clone()
            .unwrap_or_else(|| self.data_dir.join(BLOCKLIST_FILE))
    }

    pub fn source_layout(&self) -> SourceLayout {
        SourceLayout {
            data_dir: self.data_dir.clone(),
            release_json: self.release_json_path(),
            blocklist: Some(self.blocklist_path()),
            translations_dir: self.translations_dir.clone(),
        }
    }

    pub fn feed_metadata(&self) -> FeedMetadata {
        FeedMetadata {
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            site_url: self.site_url.clone(),
            main_feed_url: self.main_feed_url.clone(),
            backup_feed_url: self.backup_feed_url.clone(),
            urn_id: self.urn_id.clone(),
            language: self.language.clone(),
        }
    }

    /// Build targets selected by `platform` and `channel`.
    pub fn targets(&self) -> Result<Vec<Target>> {
        let platform = normalize_platform(&self.platform).context("key 'platform'")?;
        let channel = normalize_channel(&self.channel).context("key 'channel'")?;
        Ok(expand_build_matrix(platform, channel))
    }

    /// Signer id and key path, both required for signing.
    pub fn signing_inputs(&self) -> Result<(&str, &Path)> {
        let signer_id = self.signer_id.as_deref().map(str::trim).unwrap_or_default();
        if signer_id.is_empty() {
            bail!("key 'signer_id' must be set (settings file or --signerid) to sign feeds");
        }
        if signer_id.len() > 255 {
            bail!("key 'signer_id' is {} bytes; SU3 allows at most 255", signer_id.len());
        }
        let Some(key) = self.signing_key.as_deref() else {
            bail!("key 'signing_key' must be set (settings file or --signingkey) to sign feeds");
        };
        Ok((signer_id, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(text: &str) -> Result<Settings> {
        parse_settings(text, Path::new("/srv/news"), Path::new("/srv/news/newsfeed.toml"))
    }

    #[test]
    fn empty_file_yields_defaults_under_base_dir() {
        let settings = parse("").unwrap();
        assert_eq!(settings.title, DEFAULT_TITLE);
        assert_eq!(settings.main_feed_url, DEFAULT_MAIN_FEED_URL);
        assert_eq!(settings.data_dir, PathBuf::from("/srv/news/data"));
        assert_eq!(settings.build_dir, PathBuf::from("/srv/news/build"));
        assert_eq!(
            settings.release_json_path(),
            PathBuf::from("/srv/news/data/releases.json")
        );
        assert_eq!(
            settings.blocklist_path(),
            PathBuf::from("/srv/news/data/blocklist.xml")
        );
        assert_eq!(settings.targets().unwrap().len(), 1 + 5 * 4);
    }

    #[test]
    fn relative_paths_resolve_against_file_and_absolute_stay() {
        let settings = parse(
            r#"
data_dir = "feeds"
release_json = "/etc/i2p/releases.json"
translations_dir = "../i18n"
"#,
        )
        .unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/srv/news/feeds"));
        assert_eq!(
            settings.release_json_path(),
            PathBuf::from("/etc/i2p/releases.json")
        );
        assert_eq!(
            settings.translations_dir,
            Some(PathBuf::from("/srv/news/../i18n"))
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse("feed_title = \"x\"").unwrap_err();
        assert!(format!("{err:#}").contains("feed_title"));
    }

    #[test]
    fn invalid_platform_names_the_key() {
        let err = parse("platform = \"beos\"").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("platform"), "{msg}");
        assert!(msg.contains("beos"), "{msg}");
    }

    #[test]
    fn platform_aliases_select_targets() {
        let settings = parse("platform = \"windows\"\nchannel = \"beta\"").unwrap();
        assert_eq!(settings.targets().unwrap(), vec![Target::new("win", "beta")]);
    }

    #[test]
    fn empty_optional_strings_are_unset() {
        let settings = parse("backup_feed_url = \"\"\nurn_id = \"\"\nlanguage = \"\"").unwrap();
        assert_eq!(settings.backup_feed_url, None);
        assert_eq!(settings.urn_id, None);
        assert_eq!(settings.language, None);
    }

    #[test]
    fn signing_inputs_are_required() {
        let mut settings = Settings::default();
        assert!(settings.signing_inputs().is_err());
        settings.signer_id = Some("news@mail.i2p".into());
        assert!(settings.signing_inputs().is_err());
        settings.signing_key = Some(PathBuf::from("key.pem"));
        let (id, key) = settings.signing_inputs().unwrap();
        assert_eq!(id, "news@mail.i2p");
        assert_eq!(key, Path::new("key.pem"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_settings(Some(&tmp.path().join("nope.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("nope.toml"));
    }

    #[test]
    fn loads_from_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("newsfeed.toml");
        fs::write(&path, "title = \"Test\"\nbuild_dir = \"out\"\n").unwrap();
        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.title, "Test");
        assert_eq!(settings.build_dir, tmp.path().join("out"));
    }
}
