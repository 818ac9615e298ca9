use std::fmt;

use log::debug;

use crate::feed::{FeedClient, Release};
use crate::version::Version;

/// Outcome of one update check.
#[derive(Debug, Clone)]
pub enum Decision {
    /// A strictly newer full release exists. Carries the release metadata;
    /// the URL to show users is its `html_url`, not the archive URL.
    UpdateAvailable(Release),
    /// The feed's latest release is not newer than the current version.
    NoUpdate,
    /// No determination could be made. Never an error: feed and parse
    /// failures are downgraded to this so a scheduled check can simply try
    /// again later.
    Indeterminate(Indeterminate),
}

/// Why an update check reached no determination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indeterminate {
    /// Neither an explicit current version nor a host to report one. Detected
    /// before any network call is made.
    NoVersionSource,
    /// The feed has no eligible (full, published) release.
    NoRelease,
    /// The feed call failed (transport, 4xx, or unexpected status).
    FeedUnavailable(String),
    /// The current version or the release tag did not parse.
    MalformedVersion(String),
}

impl fmt::Display for Indeterminate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoVersionSource => {
                write!(f, "must provide either an explicit version or a host environment")
            }
            Self::NoRelease => write!(f, "no release is available"),
            Self::FeedUnavailable(reason) => write!(f, "release feed unavailable: {reason}"),
            Self::MalformedVersion(reason) => write!(f, "malformed version: {reason}"),
        }
    }
}

/// Compare the feed's latest release against `current`.
///
/// Infallible by design: every failure mode resolves to
/// [`Decision::Indeterminate`].
pub async fn decide(feed: &FeedClient, current: &Version) -> Decision {
    let release = match feed.latest_release().await {
        Ok(Some(release)) => release,
        Ok(None) => return Decision::Indeterminate(Indeterminate::NoRelease),
        Err(err) => {
            return Decision::Indeterminate(Indeterminate::FeedUnavailable(err.to_string()));
        }
    };

    let latest = match release.tag_name.parse::<Version>() {
        Ok(latest) => latest,
        Err(err) => {
            return Decision::Indeterminate(Indeterminate::MalformedVersion(err.to_string()));
        }
    };
    debug!("Latest release is: {latest}");

    if latest > *current {
        Decision::UpdateAvailable(release)
    } else {
        Decision::NoUpdate
    }
}
