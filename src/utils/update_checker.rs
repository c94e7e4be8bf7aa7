//! Update checker for `stitchtoon-gui`
//!
//! Asks PyPI for the newest published release and falls back to GitHub
//! releases. Checks are rate limited against the timestamp persisted in the
//! settings, and every failure is swallowed: a missing update notice is never
//! worth an error dialog.

use crate::error::{Result, StitchtoonError, StringError};
use crate::worker::WorkerEvent;
use semver::Version;
use serde_json::Value;
use std::sync::mpsc::SyncSender;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Package name on PyPI and GitHub
pub const PACKAGE_NAME: &str = "stitchtoon-gui";

/// GitHub organization owning the repository
pub const REPO_ORG: &str = "BishrGhalil";

/// Default minimum time between checks (one day)
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 24 * 60 * 60;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a release version can be looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// PyPI JSON API, newest key of `releases`
    PyPi,
    /// GitHub REST API, `tag_name` of the latest release
    GitHub,
}

impl UpdateSource {
    /// Sources in lookup order
    pub const ALL: [Self; 2] = [Self::PyPi, Self::GitHub];

    /// Short name for logs
    pub fn name(self) -> &'static str {
        match self {
            Self::PyPi => "pypi.org",
            Self::GitHub => "github",
        }
    }

    /// API endpoint, `None` when the source needs an org that is not set
    pub fn url(self, package: &str, org: &str) -> Option<String> {
        match self {
            Self::PyPi => Some(format!("https://pypi.org/pypi/{package}/json")),
            Self::GitHub if org.is_empty() => None,
            Self::GitHub => Some(format!(
                "https://api.github.com/repos/{org}/{package}/releases/latest"
            )),
        }
    }

    /// Extra request headers
    pub fn headers(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::PyPi => &[],
            Self::GitHub => &[
                ("X-GitHub-Api-Version", "2022-11-28"),
                ("Accept", "application/vnd.github+json"),
            ],
        }
    }

    /// Latest version in a response body
    pub fn parse(self, body: &Value) -> Option<Version> {
        match self {
            Self::PyPi => body
                .get("releases")?
                .as_object()?
                .keys()
                .map(|v| parse_version(v))
                .max(),
            Self::GitHub => body.get("tag_name")?.as_str().map(parse_version),
        }
    }
}

/// Lenient version parsing
///
/// Accepts an optional `v`/`V` prefix and two or three numeric components;
/// anything after the last number is ignored (`1.2.3rc1` → 1.2.3). Text that
/// does not look like a version yields 0.0.0.
pub fn parse_version(text: &str) -> Version {
    let text = text.trim();
    let text = text
        .strip_prefix('v')
        .or_else(|| text.strip_prefix('V'))
        .unwrap_or(text);

    let mut numbers = Vec::with_capacity(3);
    for part in text.split('.').take(3) {
        let digits_len = part.bytes().take_while(u8::is_ascii_digit).count();
        let Ok(number) = part[..digits_len].parse::<u64>() else {
            break;
        };
        numbers.push(number);
        if digits_len != part.len() {
            break;
        }
    }

    match numbers[..] {
        [major, minor] => Version::new(major, minor, 0),
        [major, minor, patch] => Version::new(major, minor, patch),
        _ => Version::new(0, 0, 0),
    }
}

/// Result of an update check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheckResult {
    /// Current version of the application
    pub current_version: Version,
    /// Latest published version
    pub latest_version: Version,
    /// Source that answered
    pub source: UpdateSource,
    /// Whether an update is available
    pub update_available: bool,
    /// URL to the releases page
    pub releases_url: String,
}

/// Update checker for `stitchtoon-gui`
#[derive(Debug, Clone)]
pub struct UpdateChecker {
    package: String,
    org: String,
    current_version: Version,
    min_check_interval_secs: u64,
}

impl Default for UpdateChecker {
    fn default() -> Self {
        Self::new(
            PACKAGE_NAME,
            REPO_ORG,
            parse_version(env!("CARGO_PKG_VERSION")),
            DEFAULT_CHECK_INTERVAL_SECS,
        )
    }
}

impl UpdateChecker {
    /// Create a new update checker
    ///
    /// # Arguments
    ///
    /// * `package` - Package name on PyPI and GitHub
    /// * `org` - GitHub owner; empty disables the GitHub source
    /// * `current_version` - Current application version
    /// * `min_check_interval_secs` - Minimum time between checks in seconds
    pub fn new(
        package: impl Into<String>,
        org: impl Into<String>,
        current_version: Version,
        min_check_interval_secs: u64,
    ) -> Self {
        Self {
            package: package.into(),
            org: org.into(),
            current_version,
            min_check_interval_secs,
        }
    }

    /// Version the result is compared against
    pub fn current_version(&self) -> &Version {
        &self.current_version
    }

    /// Releases page shown to the user
    pub fn releases_url(&self) -> String {
        format!("https://github.com/{}/{}/releases", self.org, self.package)
    }

    /// Check if enough time has passed since the last check
    ///
    /// `last_check_time` is a unix timestamp, 0 when never checked.
    pub fn should_check(&self, last_check_time: u64) -> bool {
        if last_check_time == 0 {
            return true;
        }
        let elapsed = Self::current_timestamp().saturating_sub(last_check_time);
        elapsed >= self.min_check_interval_secs
    }

    /// Get the current Unix timestamp in seconds
    pub fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    /// Compare a known latest version with the current one
    pub fn evaluate(&self, source: UpdateSource, latest_version: Version) -> UpdateCheckResult {
        let update_available = latest_version > self.current_version;
        if update_available {
            info!(
                "Update available: {} -> {} ({})",
                self.current_version,
                latest_version,
                source.name()
            );
        } else {
            info!("Application is up to date");
        }

        UpdateCheckResult {
            current_version: self.current_version.clone(),
            latest_version,
            source,
            update_available,
            releases_url: self.releases_url(),
        }
    }

    /// Query the sources in order until one answers
    pub fn check_for_updates(&self) -> Result<UpdateCheckResult> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("{}/{}", self.package, self.current_version))
            .build()
            .map_err(|e| StitchtoonError::UpdateCheckError(Box::new(e)))?;

        for source in UpdateSource::ALL {
            let Some(url) = source.url(&self.package, &self.org) else {
                continue;
            };
            match self.fetch(&client, source, &url) {
                Ok(version) => return Ok(self.evaluate(source, version)),
                Err(e) => debug!("{} did not answer: {}", source.name(), e),
            }
        }

        Err(StitchtoonError::UpdateCheckError(StringError::new(
            "no release source answered",
        )))
    }

    fn fetch(
        &self,
        client: &reqwest::blocking::Client,
        source: UpdateSource,
        url: &str,
    ) -> Result<Version> {
        debug!("Fetching latest release from: {}", url);

        let mut request = client.get(url);
        for (name, value) in source.headers() {
            request = request.header(*name, *value);
        }
        let response = request
            .send()
            .map_err(|e| StitchtoonError::UpdateCheckError(Box::new(e)))?;

        if !response.status().is_success() {
            return Err(StitchtoonError::UpdateCheckError(StringError::new(
                format!("{} returned status {}", source.name(), response.status()),
            )));
        }

        let body: Value = response
            .json()
            .map_err(|e| StitchtoonError::UpdateCheckError(Box::new(e)))?;
        source.parse(&body).ok_or_else(|| {
            StitchtoonError::UpdateCheckError(StringError::new(format!(
                "{} response has no version",
                source.name()
            )))
        })
    }
}

/// Run an update check on a background thread
///
/// Sends [`WorkerEvent::UpdateAvailable`] only when a newer release exists.
/// Failures are logged and otherwise ignored.
pub fn spawn_update_check(
    checker: UpdateChecker,
    events: SyncSender<WorkerEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || match checker.check_for_updates() {
        Ok(result) if result.update_available => {
            let _ = events.send(WorkerEvent::UpdateAvailable {
                version: result.latest_version,
                url: result.releases_url,
            });
        }
        Ok(_) => {}
        Err(e) => warn!("Update check failed: {}", e),
    })
}
