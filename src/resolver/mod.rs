//! Build configuration resolver.
//!
//! `resolve` turns a platform identifier into an immutable `BuildConfig`,
//! locating each third-party library via its environment variable or an
//! ordered list of conventional install locations. Nothing is resolved at
//! load time and nothing is cached process-wide: every call reads the host
//! afresh through the `Host` seam, which lets tests inject a fake
//! environment without touching the real one.

mod platform;
mod probe;

pub use platform::*;
pub use probe::*;

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::models::{BuildConfig, Precision, ResolveError};

/// Read-only view of the environment and filesystem.
pub trait Host {
    /// Value of an environment variable, if set and valid unicode.
    fn var(&self, name: &str) -> Option<String>;

    /// Whether a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Whether a path exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;
}

/// The real process environment and filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl Host for SystemHost {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// Precision requested through `USE_DOUBLE`.
pub fn precision_from_env(host: &dyn Host) -> Precision {
    Precision::from_flag(host.var(Precision::ENV_VAR).as_deref())
}

/// Resolve the build configuration for `platform`.
///
/// Dependencies are resolved in the platform's declared order; the first
/// required dependency that cannot be located aborts resolution.
pub fn resolve(
    platform: Platform,
    precision: Precision,
    host: &dyn Host,
) -> Result<BuildConfig, ResolveError> {
    let profile = platform.profile();
    let mut libraries = BTreeMap::new();

    for dep in &profile.dependencies {
        match dep.locate(host) {
            Some(home) => {
                libraries.insert(dep.library, dep.library.layout(&home));
            }
            None if dep.requirement == Requirement::Optional => {
                debug!(library = %dep.library, "Optional dependency not found");
            }
            None => {
                return Err(ResolveError::DependencyNotFound {
                    library: dep.library,
                    env_var: dep.env_var,
                    hint: dep.hint,
                });
            }
        }
    }

    info!(
        platform = %platform,
        precision = %precision,
        libraries = libraries.len(),
        "Resolved build configuration"
    );

    Ok(BuildConfig {
        platform: platform.id().to_string(),
        precision,
        toolchain: profile.toolchain,
        libraries,
    })
}

/// Resolve by platform id string.
pub fn resolve_id(
    platform: &str,
    precision: Precision,
    host: &dyn Host,
) -> Result<BuildConfig, ResolveError> {
    resolve(platform.parse()?, precision, host)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Library;
    use std::collections::{HashMap, HashSet};
    use std::path::PathBuf;

    /// In-memory host for resolver tests.
    #[derive(Debug, Default)]
    pub(crate) struct FakeHost {
        vars: HashMap<String, String>,
        dirs: HashSet<PathBuf>,
        files: HashSet<PathBuf>,
    }

    impl FakeHost {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn env(mut self, name: &str, value: &str) -> Self {
            self.vars.insert(name.to_string(), value.to_string());
            self
        }

        pub(crate) fn dir(mut self, path: &str) -> Self {
            self.dirs.insert(PathBuf::from(path));
            self
        }

        pub(crate) fn file(mut self, path: &str) -> Self {
            self.files.insert(PathBuf::from(path));
            self
        }

        fn is_ancestor_of_entry(&self, path: &Path) -> bool {
            self.dirs
                .iter()
                .chain(self.files.iter())
                .any(|p| p != path && p.starts_with(path))
        }
    }

    impl Host for FakeHost {
        fn var(&self, name: &str) -> Option<String> {
            self.vars.get(name).cloned()
        }

        fn exists(&self, path: &Path) -> bool {
            self.files.contains(path) || self.is_dir(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            self.dirs.contains(path) || self.is_ancestor_of_entry(path)
        }
    }

    fn linux_host() -> FakeHost {
        FakeHost::new()
            .env("HOME", "/home/u")
            .dir("/home/u/Charm/charm")
            .file("/usr/include/hdf5.h")
    }

    #[test]
    fn linux_gnu_resolves_with_defaults() {
        let config = resolve(Platform::LinuxGnu, Precision::Single, &linux_host()).unwrap();

        assert_eq!(config.platform, "linux_gnu");
        assert_eq!(config.library(Library::Charm).unwrap().home, PathBuf::from("/home/u/Charm/charm"));
        assert_eq!(config.library(Library::Hdf5).unwrap().home, PathBuf::from("/usr"));
        assert_eq!(
            config.library(Library::Png).unwrap().home,
            PathBuf::from("/lib/x86_64-linux-gnu")
        );
        assert!(!config.has(Library::Grackle));
        assert_eq!(config.toolchain.flags_prec(config.precision), "-fdefault-real-4 -fdefault-double-8");
    }

    #[test]
    fn hdf5_home_env_is_used() {
        let host = linux_host().env("HDF5_HOME", "/usr");
        let config = resolve(Platform::LinuxGnu, Precision::Double, &host).unwrap();
        assert_eq!(config.library(Library::Hdf5).unwrap().home, PathBuf::from("/usr"));
        assert_eq!(config.library(Library::Hdf5).unwrap().include, PathBuf::from("/usr/include"));
    }

    #[test]
    fn missing_hdf5_is_fatal() {
        let host = FakeHost::new().env("HOME", "/home/u").dir("/home/u/charm");
        let err = resolve(Platform::LinuxGnu, Precision::Single, &host).unwrap_err();

        assert_eq!(err.library(), Some(Library::Hdf5));
        let msg = err.to_string();
        assert!(msg.starts_with("HDF5 was not found."));
        assert!(msg.contains("HDF5_HOME"));
    }

    #[test]
    fn missing_charm_fails_before_hdf5() {
        let err = resolve(Platform::LinuxGnu, Precision::Single, &FakeHost::new()).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::DependencyNotFound {
                library: Library::Charm,
                env_var: "CHARM_HOME",
                ..
            }
        ));
    }

    #[test]
    fn resolution_is_deterministic() {
        let host = FakeHost::new();
        let a = resolve(Platform::LinuxGnu, Precision::Single, &host).unwrap_err();
        let b = resolve(Platform::LinuxGnu, Precision::Single, &host).unwrap_err();
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn grackle_match_is_not_assigned_to_charm() {
        let host = linux_host().dir("/home/u/local/grackle/src/clib");
        let config = resolve(Platform::LinuxGnu, Precision::Single, &host).unwrap();

        assert_eq!(
            config.library(Library::Grackle).unwrap().home,
            PathBuf::from("/home/u/local/grackle/src/clib")
        );
        assert_eq!(config.library(Library::Charm).unwrap().home, PathBuf::from("/home/u/Charm/charm"));
    }

    #[test]
    fn gordon_requires_mpi_home() {
        let host = FakeHost::new()
            .env("HOME", "/home/u")
            .env("HDF5HOME", "/opt/hdf5");
        let err = resolve(Platform::GordonGnu, Precision::Single, &host).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::DependencyNotFound {
                library: Library::Mpi,
                env_var: "MPIHOME",
                ..
            }
        ));
    }

    #[test]
    fn gordon_resolves_with_env() {
        let host = FakeHost::new()
            .env("HOME", "/home/u")
            .env("HDF5HOME", "/opt/hdf5")
            .env("MPIHOME", "/opt/mvapich2")
            .dir("/home/u/Charm/charm")
            .dir("/home/u/public/Grackle/src/clib");
        let config = resolve(Platform::GordonGnu, Precision::Double, &host).unwrap();

        assert_eq!(config.library(Library::Mpi).unwrap().lib, PathBuf::from("/opt/mvapich2/lib"));
        assert_eq!(config.library(Library::Papi).unwrap().include, PathBuf::from("/home/u/include"));
        assert_eq!(config.library(Library::Png).unwrap().home, PathBuf::from("/usr/lib64"));
        assert!(config.has(Library::Grackle));
        assert_eq!(config.toolchain.libpath_fortran, "");
    }

    #[test]
    fn resolve_id_rejects_unknown_platform() {
        let err = resolve_id("bluegene", Precision::Single, &linux_host()).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownPlatform(_)));
    }

    #[test]
    fn precision_read_from_use_double() {
        assert_eq!(precision_from_env(&FakeHost::new().env("USE_DOUBLE", "True")), Precision::Double);
        assert_eq!(precision_from_env(&FakeHost::new()), Precision::Single);
    }
}
