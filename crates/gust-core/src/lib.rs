//! Self-update core for a host-managed plugin.
//!
//! The host runtime owns the plugin lifecycle; this crate owns the one hard
//! part of it: discovering a newer published release, fetching and verifying
//! the release archive, and atomically swapping it into the live install
//! location. Everything the host provides (logging, paths, restart) is
//! consumed through the [`HostEnvironment`] capability trait:
//! - Release feed access and rate-limit diagnostics.
//! - Dotted-numeric version ordering.
//! - The update decision (available / none / indeterminate).
//! - Archive download, verification, and the install swap.
//! - The orchestrator the host actually calls.

pub mod decide;
pub mod feed;
pub mod host;
pub mod install;
pub mod updater;
pub mod version;

/// Update decision model.
pub use decide::{Decision, Indeterminate, decide};
/// Release feed client, payload types, and feed error taxonomy.
pub use feed::{FeedClient, FeedError, RateLimitStatus, Release};
/// Capability interface the host runtime implements for the core.
pub use host::HostEnvironment;
/// Archive installer and install error taxonomy.
pub use install::{ArtifactManifest, InstallError, Installer, MANIFEST_PATH};
/// Host-facing orchestrator.
pub use updater::{UpdateError, Updater};
/// Dotted-numeric version type.
pub use version::{MalformedVersionError, Version};
