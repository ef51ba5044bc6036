//! Supported platform releases and their baseline constants.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A supported Ubuntu LTS release.
///
/// Resolved once at startup; phases read the constants they need from it
/// instead of re-dispatching on a release string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Release {
    /// Ubuntu 20.04 LTS
    Focal,
    /// Ubuntu 22.04 LTS
    Jammy,
    /// Ubuntu 24.04 LTS
    Noble,
}

impl Release {
    /// Every release the engine carries constants for.
    pub const ALL: [Release; 3] = [Release::Focal, Release::Jammy, Release::Noble];

    /// `VERSION_ID` as found in os-release.
    pub fn version_id(&self) -> &'static str {
        match self {
            Self::Focal => "20.04",
            Self::Jammy => "22.04",
            Self::Noble => "24.04",
        }
    }

    /// Release codename.
    pub fn codename(&self) -> &'static str {
        match self {
            Self::Focal => "focal",
            Self::Jammy => "jammy",
            Self::Noble => "noble",
        }
    }

    /// File name of the static baseline manifest for this release.
    pub fn manifest_file(&self) -> String {
        format!("ubuntu-{}.manifest", self.version_id())
    }

    /// Default python3 minor version shipped by the release.
    pub fn python_version(&self) -> &'static str {
        match self {
            Self::Focal => "3.8",
            Self::Jammy => "3.10",
            Self::Noble => "3.12",
        }
    }

    /// Directory pip uses for system-wide installs outside dpkg's control.
    pub fn pip_site_dir(&self) -> String {
        format!("/usr/local/lib/python{}/dist-packages", self.python_version())
    }

    /// Language package manager entries that belong to the runtime itself
    /// and must survive even when nothing else from that manager does.
    pub fn runtime_components(&self) -> &'static [&'static str] {
        match self {
            Self::Focal => &[
                "pip",
                "setuptools",
                "wheel",
                "npm",
                "corepack",
                "bundler",
                "rake",
                "minitest",
                "power_assert",
                "test-unit",
                "xmlrpc",
            ],
            Self::Jammy | Self::Noble => &[
                "pip",
                "setuptools",
                "wheel",
                "npm",
                "corepack",
                "bundler",
                "rake",
                "minitest",
                "power_assert",
                "test-unit",
                "rexml",
                "net-telnet",
                "xmlrpc",
            ],
        }
    }

    /// Files in `/etc/apt/sources.list.d` present on a fresh install.
    pub fn default_apt_sources(&self) -> &'static [&'static str] {
        match self {
            Self::Focal | Self::Jammy => &[],
            Self::Noble => &["ubuntu.sources"],
        }
    }

    /// Keyrings in `/etc/apt/trusted.gpg.d` present on a fresh install.
    pub fn default_apt_keyrings(&self) -> &'static [&'static str] {
        &[
            "ubuntu-keyring-2012-cdimage.gpg",
            "ubuntu-keyring-2018-archive.gpg",
        ]
    }

    /// Entries in `/etc/cron.d` present on a fresh install.
    pub fn default_cron_entries(&self) -> &'static [&'static str] {
        match self {
            Self::Focal => &[".placeholder", "e2scrub_all", "popularity-contest"],
            Self::Jammy | Self::Noble => &[".placeholder", "e2scrub_all"],
        }
    }

    /// Parse a release from a `VERSION_ID` value.
    pub fn from_version_id(version: &str) -> Result<Self> {
        let version = version.trim().trim_matches('"');
        Self::ALL
            .into_iter()
            .find(|r| r.version_id() == version)
            .ok_or_else(|| Error::UnsupportedRelease(format!("ubuntu {version}")))
    }

    /// Detect the release from the contents of `/etc/os-release`.
    pub fn from_os_release(content: &str) -> Result<Self> {
        let mut id = None;
        let mut version_id = None;

        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');
            match key.trim() {
                "ID" => id = Some(value.to_string()),
                "VERSION_ID" => version_id = Some(value.to_string()),
                _ => {}
            }
        }

        let id = id.ok_or_else(|| Error::ReleaseUndetectable("os-release has no ID".into()))?;
        if id != "ubuntu" {
            return Err(Error::UnsupportedRelease(id));
        }

        let version_id = version_id
            .ok_or_else(|| Error::ReleaseUndetectable("os-release has no VERSION_ID".into()))?;
        Self::from_version_id(&version_id)
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ubuntu {} ({})", self.version_id(), self.codename())
    }
}
