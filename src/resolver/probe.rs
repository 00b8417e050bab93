//! Ordered candidate-path probing.
//!
//! Discovery order for a dependency:
//!
//! 1. Its environment variable, used verbatim when set
//! 2. Candidate locations in declaration order, first match wins
//! 3. Not found (fatal for required dependencies)
//!
//! Candidates are evaluated lazily: probing stops at the first match and
//! home-relative candidates are skipped entirely when `HOME` is unset.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::Host;
use crate::models::Library;

/// Where a candidate path is rooted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    /// Relative to `$HOME`; an empty string means `$HOME` itself
    Home(&'static str),
    /// Absolute path
    Absolute(&'static str),
}

/// What must exist for a candidate to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// The candidate is an existing directory
    Dir,
    /// A file relative to the candidate exists
    File(&'static str),
    /// Always matches (conventional default, not checked)
    Fallback,
}

/// One candidate install location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub base: Base,
    pub marker: Marker,
}

impl Candidate {
    pub const fn home_dir(rel: &'static str) -> Self {
        Self {
            base: Base::Home(rel),
            marker: Marker::Dir,
        }
    }

    pub const fn dir(path: &'static str) -> Self {
        Self {
            base: Base::Absolute(path),
            marker: Marker::Dir,
        }
    }

    pub const fn with_file(path: &'static str, file: &'static str) -> Self {
        Self {
            base: Base::Absolute(path),
            marker: Marker::File(file),
        }
    }

    pub const fn fallback(path: &'static str) -> Self {
        Self {
            base: Base::Absolute(path),
            marker: Marker::Fallback,
        }
    }

    /// Concrete path for this candidate, or `None` if it needs `$HOME` and
    /// there is none.
    fn path(&self, home: Option<&Path>) -> Option<PathBuf> {
        match self.base {
            Base::Home("") => home.map(Path::to_path_buf),
            Base::Home(rel) => home.map(|h| h.join(rel)),
            Base::Absolute(p) => Some(PathBuf::from(p)),
        }
    }

    fn matches(&self, path: &Path, host: &dyn Host) -> bool {
        match self.marker {
            Marker::Dir => host.is_dir(path),
            Marker::File(file) => host.exists(&path.join(file)),
            Marker::Fallback => true,
        }
    }
}

/// Whether a missing dependency aborts configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
}

/// How to find one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    pub library: Library,
    /// Environment variable that overrides discovery
    pub env_var: &'static str,
    pub requirement: Requirement,
    /// Ordered candidates; empty means environment-only
    pub candidates: Vec<Candidate>,
    /// Appended to the not-found message
    pub hint: &'static str,
}

impl DependencySpec {
    pub fn required(library: Library, env_var: &'static str) -> Self {
        Self {
            library,
            env_var,
            requirement: Requirement::Required,
            candidates: Vec::new(),
            hint: "",
        }
    }

    pub fn optional(library: Library, env_var: &'static str) -> Self {
        Self {
            requirement: Requirement::Optional,
            ..Self::required(library, env_var)
        }
    }

    pub fn candidates(mut self, candidates: impl IntoIterator<Item = Candidate>) -> Self {
        self.candidates.extend(candidates);
        self
    }

    pub fn hint(mut self, hint: &'static str) -> Self {
        self.hint = hint;
        self
    }

    /// Locate the dependency's home directory.
    pub fn locate(&self, host: &dyn Host) -> Option<PathBuf> {
        if let Some(value) = host.var(self.env_var).filter(|v| !v.is_empty()) {
            let path = PathBuf::from(value);
            if !host.exists(&path) {
                warn!(
                    library = %self.library,
                    env_var = self.env_var,
                    path = %path.display(),
                    "Override path does not exist; using it anyway"
                );
            }
            debug!(library = %self.library, env_var = self.env_var, "Using environment override");
            return Some(path);
        }

        let home = host.var("HOME").filter(|h| !h.is_empty()).map(PathBuf::from);

        let found = self.candidates.iter().find_map(|candidate| {
            let path = candidate.path(home.as_deref())?;
            candidate.matches(&path, host).then_some(path)
        });

        match &found {
            Some(path) => debug!(library = %self.library, path = %path.display(), "Found by probing"),
            None => debug!(library = %self.library, "No candidate matched"),
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::tests::FakeHost;

    fn charm_spec() -> DependencySpec {
        DependencySpec::required(Library::Charm, "CHARM_HOME").candidates([
            Candidate::home_dir("Charm/charm"),
            Candidate::home_dir("charm"),
            Candidate::dir("/opt/charm"),
        ])
    }

    #[test]
    fn env_override_is_used_verbatim() {
        let host = FakeHost::new()
            .env("CHARM_HOME", "/custom/charm")
            .env("HOME", "/home/u")
            .dir("/home/u/charm");
        assert_eq!(charm_spec().locate(&host), Some(PathBuf::from("/custom/charm")));
    }

    #[test]
    fn empty_env_value_falls_through_to_probing() {
        let host = FakeHost::new().env("CHARM_HOME", "").dir("/opt/charm");
        assert_eq!(charm_spec().locate(&host), Some(PathBuf::from("/opt/charm")));
    }

    #[test]
    fn first_existing_candidate_wins() {
        let host = FakeHost::new()
            .env("HOME", "/home/u")
            .dir("/home/u/charm")
            .dir("/opt/charm");
        assert_eq!(charm_spec().locate(&host), Some(PathBuf::from("/home/u/charm")));
    }

    #[test]
    fn home_candidates_skipped_without_home() {
        let host = FakeHost::new().dir("/home/u/Charm/charm");
        assert_eq!(charm_spec().locate(&host), None);
    }

    #[test]
    fn file_marker_checks_relative_file() {
        let spec = DependencySpec::required(Library::Hdf5, "HDF5_HOME")
            .candidates([Candidate::with_file("/usr", "include/hdf5.h")]);

        let host = FakeHost::new().dir("/usr");
        assert_eq!(spec.locate(&host), None);

        let host = FakeHost::new().file("/usr/include/hdf5.h");
        assert_eq!(spec.locate(&host), Some(PathBuf::from("/usr")));
    }

    #[test]
    fn fallback_matches_unconditionally() {
        let spec = DependencySpec::required(Library::Png, "LIBPNG_HOME")
            .candidates([Candidate::fallback("/lib/x86_64-linux-gnu")]);
        assert_eq!(
            spec.locate(&FakeHost::new()),
            Some(PathBuf::from("/lib/x86_64-linux-gnu"))
        );
    }

    #[test]
    fn home_itself_as_candidate() {
        let spec = DependencySpec::optional(Library::Papi, "PAPI_HOME")
            .candidates([Candidate::home_dir("")]);
        let host = FakeHost::new().env("HOME", "/home/u").dir("/home/u");
        assert_eq!(spec.locate(&host), Some(PathBuf::from("/home/u")));
    }
}
