use std::ffi::OsString;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use log::{debug, error, warn};
use serde::Deserialize;
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::feed::{Release, USER_AGENT};

/// Fixed location of the identifying manifest inside the archive's root
/// folder.
pub const MANIFEST_PATH: &str = "Contents/manifest.json";

/// Identifying metadata read out of the archive before any filesystem
/// mutation happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactManifest {
    pub identifier: String,
    pub version: Option<String>,
}

#[derive(Deserialize)]
struct RawManifest {
    identifier: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to download release archive: {0}")]
    Download(#[source] reqwest::Error),
    #[error("archive download failed with HTTP {status}")]
    DownloadStatus { status: reqwest::StatusCode },
    #[error("downloaded archive is corrupt: {reason}")]
    CorruptArchive { reason: String },
    #[error("archive is missing its manifest at {path}")]
    MissingManifest { path: String },
    #[error("archive manifest does not identify an artifact: {reason}")]
    UnidentifiableArtifact { reason: String },
    #[error("archive contains artifact {found:?} but {expected:?} was expected")]
    ArtifactMismatch { expected: String, found: String },
    #[error("extraction destination already exists: {}", .0.display())]
    DestinationConflict(PathBuf),
    #[error("extraction finished but {} does not exist", .0.display())]
    ExtractionFailed(PathBuf),
    #[error("install swap failed after retiring the previous artifact (restored: {restored}): {source}")]
    PartialInstall {
        restored: bool,
        #[source]
        source: io::Error,
    },
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },
}

impl InstallError {
    fn io(context: &'static str, source: io::Error) -> Self {
        Self::Io { context, source }
    }

    fn corrupt(reason: impl ToString) -> Self {
        Self::CorruptArchive {
            reason: reason.to_string(),
        }
    }
}

/// Downloads a release archive, verifies it, and performs the install swap.
///
/// Every step is a hard gate: a failure anywhere aborts the operation and
/// leaves the previously installed artifact untouched. The scratch extraction
/// directory is removed on every exit path so a failed attempt never blocks a
/// retry.
pub struct Installer {
    client: reqwest::Client,
    workspace: PathBuf,
    install_path: PathBuf,
}

impl Installer {
    pub fn new(client: reqwest::Client, workspace: PathBuf, install_path: PathBuf) -> Self {
        Self {
            client,
            workspace,
            install_path,
        }
    }

    /// Download `release`'s archive and install it.
    ///
    /// # Errors
    /// Returns an [`InstallError`] for the step that failed; see
    /// [`Installer::install_archive`] for the verification gates.
    pub async fn install(
        &self,
        release: &Release,
        expected_id: Option<&str>,
    ) -> Result<ArtifactManifest, InstallError> {
        let bytes = self.download(&release.zipball_url).await?;
        self.install_archive(bytes, expected_id)
    }

    /// Verify and install an already-downloaded archive.
    ///
    /// # Errors
    /// - [`InstallError::CorruptArchive`] when the archive or any entry's CRC
    ///   fails verification.
    /// - [`InstallError::MissingManifest`] / [`InstallError::UnidentifiableArtifact`]
    ///   when the manifest is absent or names no identifier.
    /// - [`InstallError::ArtifactMismatch`] when `expected_id` does not match.
    /// - [`InstallError::DestinationConflict`] when the staging path already
    ///   exists (never overwritten).
    /// - [`InstallError::PartialInstall`] when the swap retired the previous
    ///   artifact but could not move the new one into place.
    pub fn install_archive(
        &self,
        bytes: Vec<u8>,
        expected_id: Option<&str>,
    ) -> Result<ArtifactManifest, InstallError> {
        std::fs::create_dir_all(&self.workspace)
            .map_err(|e| InstallError::io("failed to create scratch workspace", e))?;

        let mut archive = DownloadedArchive::open(bytes)?;
        archive.verify_integrity()?;

        let root = archive.root_entry()?;
        let manifest = archive.read_manifest(&root)?;
        debug!("Archive contains artifact: {}", manifest.identifier);

        if let Some(expected) = expected_id
            && manifest.identifier != expected
        {
            return Err(InstallError::ArtifactMismatch {
                expected: expected.to_string(),
                found: manifest.identifier,
            });
        }

        let staged = self.workspace.join(&root);
        if staged.exists() {
            return Err(InstallError::DestinationConflict(staged));
        }

        // Removes the staging directory on any exit from here on; after a
        // successful swap it has been moved away and the drop is a no-op.
        let _scratch = ScratchDir(staged.clone());

        archive.extract_into(&self.workspace, &root)?;
        if !staged.is_dir() {
            return Err(InstallError::ExtractionFailed(staged));
        }

        self.swap(&staged)?;
        Ok(manifest)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, InstallError> {
        debug!("Downloading archive from {url}");

        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(InstallError::Download)?;

        let status = response.status();
        if !status.is_success() {
            return Err(InstallError::DownloadStatus { status });
        }

        let bytes = response.bytes().await.map_err(InstallError::Download)?;
        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }

    /// Retire the live artifact, then move the staged one into its place.
    ///
    /// The retired copy is kept as a sibling (`<name>.retired`) and replaced
    /// on the next swap; a move-in failure after a successful retire attempts
    /// to restore it and surfaces [`InstallError::PartialInstall`] either way.
    fn swap(&self, staged: &Path) -> Result<(), InstallError> {
        let retired = retired_path(&self.install_path);
        if retired.exists() {
            std::fs::remove_dir_all(&retired)
                .map_err(|e| InstallError::io("failed to remove stale retired artifact", e))?;
        }

        let had_previous = self.install_path.exists();
        if had_previous {
            debug!(
                "Retiring {} to {}",
                self.install_path.display(),
                retired.display()
            );
            std::fs::rename(&self.install_path, &retired)
                .map_err(|e| InstallError::io("failed to retire installed artifact", e))?;
        } else if let Some(parent) = self.install_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| InstallError::io("failed to create install parent directory", e))?;
        }

        if let Err(source) = move_dir(staged, &self.install_path) {
            if had_previous {
                let restored = std::fs::rename(&retired, &self.install_path).is_ok();
                error!(
                    "Install swap failed after retiring {} (restored: {restored}): {source}",
                    self.install_path.display()
                );
                return Err(InstallError::PartialInstall { restored, source });
            }
            return Err(InstallError::io(
                "failed to move new artifact into place",
                source,
            ));
        }

        debug!("Installed artifact at {}", self.install_path.display());
        Ok(())
    }
}

/// In-memory release archive paired with its verification state. Owned by
/// the install that created it and discarded when that install returns.
struct DownloadedArchive {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl DownloadedArchive {
    fn open(bytes: Vec<u8>) -> Result<Self, InstallError> {
        let archive = ZipArchive::new(Cursor::new(bytes)).map_err(InstallError::corrupt)?;
        Ok(Self { archive })
    }

    /// Full CRC pass over every entry in the archive's index.
    fn verify_integrity(&mut self) -> Result<(), InstallError> {
        for index in 0..self.archive.len() {
            let mut entry = self.archive.by_index(index).map_err(InstallError::corrupt)?;
            let name = entry.name().to_string();
            io::copy(&mut entry, &mut io::sink()).map_err(|e| InstallError::CorruptArchive {
                reason: format!("{name}: {e}"),
            })?;
        }
        debug!("Archive integrity verified");
        Ok(())
    }

    /// Name of the common root folder, by convention the first namelist
    /// entry every other entry is nested under.
    fn root_entry(&mut self) -> Result<String, InstallError> {
        if self.archive.is_empty() {
            return Err(InstallError::corrupt("archive has no entries"));
        }

        let first = self.archive.by_index(0).map_err(InstallError::corrupt)?;
        let name = first.name();
        let root = name.split('/').next().unwrap_or_default();
        if root.is_empty() {
            return Err(InstallError::CorruptArchive {
                reason: format!("first entry {name:?} has no root folder"),
            });
        }
        Ok(root.to_string())
    }

    fn read_manifest(&mut self, root: &str) -> Result<ArtifactManifest, InstallError> {
        let path = format!("{root}/{MANIFEST_PATH}");
        let mut entry = match self.archive.by_name(&path) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Err(InstallError::MissingManifest { path }),
            Err(e) => return Err(InstallError::corrupt(e)),
        };

        let mut raw = String::new();
        entry
            .read_to_string(&mut raw)
            .map_err(|e| InstallError::CorruptArchive {
                reason: format!("{path}: {e}"),
            })?;

        let manifest: RawManifest =
            serde_json::from_str(&raw).map_err(|e| InstallError::UnidentifiableArtifact {
                reason: e.to_string(),
            })?;

        let identifier = manifest
            .identifier
            .ok_or_else(|| InstallError::UnidentifiableArtifact {
                reason: format!("no identifier key in {path}"),
            })?;

        Ok(ArtifactManifest {
            identifier,
            version: manifest.version,
        })
    }

    /// Extract only entries nested under `root`; anything else would survive
    /// the scratch cleanup, which removes `{dest}/{root}` alone.
    fn extract_into(&mut self, dest: &Path, root: &str) -> Result<(), InstallError> {
        for index in 0..self.archive.len() {
            let mut entry = self.archive.by_index(index).map_err(InstallError::corrupt)?;
            let Some(name) = entry.enclosed_name() else {
                warn!("Skipping archive entry with unsafe path: {}", entry.name());
                continue;
            };
            if !name.starts_with(root) {
                warn!(
                    "Skipping archive entry outside the root folder: {}",
                    entry.name()
                );
                continue;
            }
            let out_path = dest.join(name);

            if entry.is_dir() {
                std::fs::create_dir_all(&out_path)
                    .map_err(|e| InstallError::io("failed to create extracted directory", e))?;
            } else {
                if let Some(parent) = out_path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        InstallError::io("failed to create extraction parent directory", e)
                    })?;
                }
                let mut out = std::fs::File::create(&out_path)
                    .map_err(|e| InstallError::io("failed to create extracted file", e))?;
                io::copy(&mut entry, &mut out)
                    .map_err(|e| InstallError::io("failed to extract archive entry", e))?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    if let Some(mode) = entry.unix_mode() {
                        let _ = std::fs::set_permissions(
                            &out_path,
                            std::fs::Permissions::from_mode(mode),
                        );
                    }
                }
            }
        }

        debug!("Extraction complete to {}", dest.display());
        Ok(())
    }
}

struct ScratchDir(PathBuf);

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.0.exists()
            && let Err(err) = std::fs::remove_dir_all(&self.0)
        {
            warn!(
                "Failed to clean up scratch directory {}: {err}",
                self.0.display()
            );
        }
    }
}

fn retired_path(install_path: &Path) -> PathBuf {
    let mut name = install_path
        .file_name()
        .map_or_else(|| OsString::from("artifact"), ToOwned::to_owned);
    name.push(".retired");
    install_path.with_file_name(name)
}

/// Rename with a copy-and-remove fallback for cross-filesystem moves.
fn move_dir(src: &Path, dest: &Path) -> io::Result<()> {
    if std::fs::rename(src, dest).is_ok() {
        return Ok(());
    }

    copy_dir_recursive(src, dest)?;
    std::fs::remove_dir_all(src)
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dest)?;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dest_path)?;
        } else {
            std::fs::copy(&src_path, &dest_path)?;
        }
    }
    Ok(())
}
