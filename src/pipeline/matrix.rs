use anyhow::{bail, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Named platforms. The empty string is the default (Linux) tree.
pub const PLATFORMS: &[&str] = &["", "mac", "mac-arm64", "win", "android", "ios"];

/// Release channels, only meaningful for named platforms.
pub const CHANNELS: &[&str] = &["stable", "beta", "rc", "alpha"];

/// One (platform, channel) cell of the build matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub platform: String,
    pub channel: String,
}

impl Target {
    pub fn new(platform: &str, channel: &str) -> Self {
        Self {
            platform: platform.to_string(),
            channel: channel.to_string(),
        }
    }

    pub fn default_tree() -> Self {
        Self::new("", "")
    }

    pub fn is_default_tree(&self) -> bool {
        self.platform.is_empty()
    }

    /// Sub-path of both the data root and the build directory for this target.
    pub fn relative_dir(&self) -> PathBuf {
        if self.is_default_tree() {
            PathBuf::new()
        } else {
            Path::new(&self.platform).join(&self.channel)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default_tree() {
            f.write_str("default")
        } else {
            write!(f, "{}/{}", self.platform, self.channel)
        }
    }
}

/// `root` for the default tree, `root/<platform>/<channel>` otherwise.
pub fn platform_data_dir(root: &Path, platform: &str, channel: &str) -> PathBuf {
    if platform.is_empty() {
        root.to_path_buf()
    } else {
        root.join(platform).join(channel)
    }
}

/// Expand optional platform/channel selections into the targets to build.
pub fn expand_build_matrix(platform: &str, channel: &str) -> Vec<Target> {
    let named = || PLATFORMS.iter().filter(|p| !p.is_empty());
    match (platform.is_empty(), channel.is_empty()) {
        (false, false) => vec![Target::new(platform, channel)],
        (false, true) => CHANNELS.iter().map(|c| Target::new(platform, c)).collect(),
        (true, false) => std::iter::once(Target::new("", channel))
            .chain(named().map(|p| Target::new(p, channel)))
            .collect(),
        (true, true) => std::iter::once(Target::default_tree())
            .chain(named().flat_map(|p| CHANNELS.iter().map(move |c| Target::new(p, c))))
            .collect(),
    }
}

/// Normalize a user-supplied platform name. `linux` and `default` name the
/// default tree.
pub fn normalize_platform(value: &str) -> Result<&'static str> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "linux" | "default" => Ok(""),
        "mac" | "macos" | "osx" => Ok("mac"),
        "mac-arm64" | "mac_arm64" | "macos-arm64" => Ok("mac-arm64"),
        "win" | "windows" => Ok("win"),
        "android" => Ok("android"),
        "ios" => Ok("ios"),
        other => bail!(
            "unsupported platform '{}'; expected one of: {}",
            other,
            PLATFORMS
                .iter()
                .filter(|p| !p.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

pub fn normalize_channel(value: &str) -> Result<&'static str> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(""),
        "stable" => Ok("stable"),
        "beta" => Ok("beta"),
        "rc" => Ok("rc"),
        "alpha" => Ok("alpha"),
        other => bail!(
            "unsupported channel '{}'; expected one of: {}",
            other,
            CHANNELS.join(", ")
        ),
    }
}
