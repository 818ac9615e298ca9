use std::sync::Arc;

use log::error;
use thiserror::Error;

use crate::decide::{Decision, Indeterminate, decide};
use crate::feed::{FeedClient, FeedError, RateLimitStatus, Release};
use crate::host::HostEnvironment;
use crate::install::{InstallError, Installer};
use crate::version::Version;

/// Why an `install`/`update` call could not apply a release. Internal to the
/// orchestrator: callers get a boolean plus logging, never a panic or an
/// escaped error.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("not configured for installs: {0}")]
    Configuration(&'static str),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("no release is available to install")]
    NoRelease,
    #[error(transparent)]
    Install(#[from] InstallError),
}

/// Host-facing coordinator for the whole self-update flow.
///
/// Stateless between calls: every operation starts from idle, runs to a
/// terminal success or failure, and retains nothing but the artifact on disk.
/// Callers must serialize operations against one install location; there is
/// no cancellation once an install has begun.
///
/// A host environment is optional so a check-only updater can exist (for
/// example probing a feed the host does not manage); `install` and `update`
/// require one and fail with a logged configuration error without it.
pub struct Updater {
    owner: String,
    repo: String,
    client: reqwest::Client,
    api_base: Option<String>,
    host: Option<Arc<dyn HostEnvironment>>,
}

impl Updater {
    pub fn new(client: reqwest::Client, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            client,
            api_base: None,
            host: None,
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: Arc<dyn HostEnvironment>) -> Self {
        self.host = Some(host);
        self
    }

    /// Point the updater at a different feed host (tests, mirrors).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Check whether a newer release is published, without installing.
    ///
    /// Logs a user-visible notice with the release page URL when one is,
    /// a routine notice when not. Never panics and never installs.
    pub async fn check_for_update(&self, current_version: Option<&str>) -> bool {
        self.notice("Checking for updates...");

        match self.decision_for(current_version).await {
            Decision::UpdateAvailable(release) => {
                self.notice(&format!("A new version is available: {}", release.html_url));
                true
            }
            Decision::NoUpdate => {
                self.notice("No updates are available");
                false
            }
            Decision::Indeterminate(reason) => {
                self.report_error(&format!("Update check failed: {reason}"));
                false
            }
        }
    }

    /// Unconditionally install the latest published release, independent of
    /// any current-version concept (first-time setup). Returns whether the
    /// install succeeded; failures are logged, never thrown.
    pub async fn install(&self) -> bool {
        self.notice("Installing latest release...");

        match self.install_latest().await {
            Ok(release) => {
                self.notice(&format!("Installed release {}", release.tag_name));
                true
            }
            Err(err) => {
                self.report_failure(&err);
                false
            }
        }
    }

    /// Run the update decision and, when an update is available, install it
    /// and signal the host to restart. Returns whether an update was applied.
    ///
    /// Passing `Some("0.0.0")` forces the latest release to be applied.
    pub async fn update(&self, current_version: Option<&str>) -> bool {
        self.notice("Checking for updates...");

        let release = match self.decision_for(current_version).await {
            Decision::UpdateAvailable(release) => release,
            Decision::NoUpdate => {
                self.notice("No updates are available");
                return false;
            }
            Decision::Indeterminate(reason) => {
                self.report_error(&format!("Update check failed: {reason}"));
                return false;
            }
        };

        self.notice(&format!("Updating to release {}...", release.tag_name));
        match self.apply(&release).await {
            Ok(host) => {
                self.notice(&format!("Installed release {}; restarting", release.tag_name));
                host.restart(true);
                true
            }
            Err(err) => {
                self.report_failure(&err);
                false
            }
        }
    }

    /// Pass-through diagnostic; informational only.
    ///
    /// # Errors
    /// Returns a [`FeedError`] when the rate-limit endpoint is unreachable or
    /// its response cannot be parsed.
    pub async fn rate_limit(&self) -> Result<RateLimitStatus, FeedError> {
        self.feed().rate_limit().await
    }

    fn feed(&self) -> FeedClient {
        let feed = FeedClient::new(self.client.clone(), self.owner.clone(), self.repo.clone());
        match &self.api_base {
            Some(base) => feed.with_base_url(base.clone()),
            None => feed,
        }
    }

    /// Resolve the effective current version, then decide. The resolution
    /// happens before any network call so a missing version source
    /// short-circuits.
    async fn decision_for(&self, explicit: Option<&str>) -> Decision {
        let raw = match (explicit, &self.host) {
            (Some(version), _) => {
                self.debug(&format!("Current version provided: {version}"));
                version.to_string()
            }
            (None, Some(host)) => {
                let version = host.current_version();
                self.debug(&format!("Current version detected: {version}"));
                version
            }
            (None, None) => return Decision::Indeterminate(Indeterminate::NoVersionSource),
        };

        let current = match raw.parse::<Version>() {
            Ok(current) => current,
            Err(err) => {
                return Decision::Indeterminate(Indeterminate::MalformedVersion(err.to_string()));
            }
        };

        decide(&self.feed(), &current).await
    }

    async fn install_latest(&self) -> Result<Release, UpdateError> {
        if self.host.is_none() {
            return Err(UpdateError::Configuration(
                "a host environment is required to install",
            ));
        }

        let release = self
            .feed()
            .latest_release()
            .await?
            .ok_or(UpdateError::NoRelease)?;
        self.apply(&release).await?;
        Ok(release)
    }

    async fn apply(&self, release: &Release) -> Result<&Arc<dyn HostEnvironment>, UpdateError> {
        let host = self.host.as_ref().ok_or(UpdateError::Configuration(
            "a host environment is required to install",
        ))?;

        let installer = Installer::new(
            self.client.clone(),
            host.temp_directory(),
            host.install_path(),
        );
        let manifest = installer
            .install(release, Some(&host.plugin_id()))
            .await?;
        self.debug(&format!("Installed artifact: {}", manifest.identifier));
        Ok(host)
    }

    fn report_failure(&self, err: &UpdateError) {
        if let UpdateError::Install(InstallError::PartialInstall { .. }) = err {
            // The installed artifact may be missing or inconsistent; this is
            // the one failure that needs operator attention and is never
            // auto-retried.
            error!("{err}");
            self.report_error(&format!("UPDATE FAILED, ARTIFACT MAY BE INCONSISTENT: {err}"));
        } else {
            self.report_error(&format!("Update failed: {err}"));
        }
    }

    fn notice(&self, message: &str) {
        match &self.host {
            Some(host) => host.log(message),
            None => log::info!("{message}"),
        }
    }

    fn debug(&self, message: &str) {
        match &self.host {
            Some(host) => host.debug_log(message),
            None => log::debug!("{message}"),
        }
    }

    fn report_error(&self, message: &str) {
        match &self.host {
            Some(host) => host.error_log(message),
            None => log::error!("{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Updater;
    use crate::decide::{Decision, Indeterminate};

    #[tokio::test]
    async fn missing_version_source_short_circuits_before_any_network_call() {
        // The unroutable base URL would fail loudly if the decision reached
        // the network; NoVersionSource must be produced before that.
        let updater = Updater::new(reqwest::Client::new(), "acme", "widget")
            .with_api_base("http://127.0.0.1:1");

        let decision = updater.decision_for(None).await;
        assert!(matches!(
            decision,
            Decision::Indeterminate(Indeterminate::NoVersionSource)
        ));

        assert!(!updater.check_for_update(None).await);
        assert!(!updater.update(None).await);
    }

    #[tokio::test]
    async fn install_without_host_fails_as_configuration_error() {
        // The unroutable base URL proves the configuration check fires
        // before the feed is consulted.
        let updater = Updater::new(reqwest::Client::new(), "acme", "widget")
            .with_api_base("http://127.0.0.1:1");
        assert!(!updater.install().await);
    }

    #[tokio::test]
    async fn malformed_current_version_is_indeterminate() {
        let updater = Updater::new(reqwest::Client::new(), "acme", "widget")
            .with_api_base("http://127.0.0.1:1");

        let decision = updater.decision_for(Some("not-a-version")).await;
        assert!(matches!(
            decision,
            Decision::Indeterminate(Indeterminate::MalformedVersion(_))
        ));
    }
}
