use std::path::PathBuf;

/// Narrow capability interface the host runtime provides to the update core.
///
/// The core never extends or reaches into any host type; every collaborator
/// it needs (identity, paths, logging, restart) comes through this trait, so
/// tests can substitute a mock host and the host process can wire in its real
/// lifecycle object.
pub trait HostEnvironment: Send + Sync {
    /// Version string of the currently installed artifact, as the host
    /// declares it (for example `"1.0.0"` or `"v1.0.0"`).
    fn current_version(&self) -> String;

    /// Unique identifier of the managed artifact. Installs refuse archives
    /// whose manifest declares a different identifier.
    fn plugin_id(&self) -> String;

    /// Live install location of the artifact (the directory that gets
    /// swapped during an update).
    fn install_path(&self) -> PathBuf;

    /// Scratch workspace for downloads and extraction. Must be on a path the
    /// host allows the core to create and remove directories under.
    fn temp_directory(&self) -> PathBuf;

    /// Ask the host to restart the running artifact after a successful swap.
    fn restart(&self, wait_until_done: bool);

    /// User-visible notice (routine update activity).
    fn log(&self, message: &str);

    /// Diagnostic detail, shown only when the host's debug preference is on.
    fn debug_log(&self, message: &str);

    /// User-visible error (failed checks, failed installs).
    fn error_log(&self, message: &str);
}
