//! Build configuration models.
//!
//! A `BuildConfig` is produced once by `resolver::resolve` and never mutated
//! afterwards; the external build system consumes it as a flat settings map.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Third-party libraries the build links against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Library {
    /// Charm++ parallel runtime
    Charm,
    /// HDF5 output library
    Hdf5,
    /// libpng image output
    Png,
    /// Grackle chemistry and cooling
    Grackle,
    /// MPI (cluster platforms)
    Mpi,
    /// PAPI hardware counters
    Papi,
}

impl Library {
    /// Short identifier used in settings keys and config files.
    pub fn key(self) -> &'static str {
        match self {
            Self::Charm => "charm",
            Self::Hdf5 => "hdf5",
            Self::Png => "png",
            Self::Grackle => "grackle",
            Self::Mpi => "mpi",
            Self::Papi => "papi",
        }
    }

    /// Derive include and lib directories from a resolved home path.
    pub fn layout(self, home: &Path) -> LibraryPaths {
        let (include, lib) = match self {
            Self::Charm | Self::Hdf5 | Self::Mpi | Self::Papi => {
                (home.join("include"), home.join("lib"))
            }
            // libpng is located by its lib directory
            Self::Png => (
                home.parent().unwrap_or(home).join("include"),
                home.to_path_buf(),
            ),
            // src/clib holds headers and the built library side by side
            Self::Grackle => (home.to_path_buf(), home.to_path_buf()),
        };
        LibraryPaths {
            home: home.to_path_buf(),
            include,
            lib,
        }
    }
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Charm => "Charm++",
            Self::Hdf5 => "HDF5",
            Self::Png => "libpng",
            Self::Grackle => "Grackle",
            Self::Mpi => "MPI",
            Self::Papi => "PAPI",
        };
        f.write_str(name)
    }
}

impl FromStr for Library {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "charm" | "charm++" => Ok(Self::Charm),
            "hdf5" => Ok(Self::Hdf5),
            "png" | "libpng" => Ok(Self::Png),
            "grackle" => Ok(Self::Grackle),
            "mpi" => Ok(Self::Mpi),
            "papi" => Ok(Self::Papi),
            other => Err(format!("unknown library '{other}'")),
        }
    }
}

/// Floating-point precision of the build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Single,
    Double,
}

impl Precision {
    /// Environment variable selecting a double-precision build.
    pub const ENV_VAR: &'static str = "USE_DOUBLE";

    /// Interpret the value of `USE_DOUBLE` ("true", case-insensitive, means double).
    pub fn from_flag(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("true") => Self::Double,
            _ => Self::Single,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::Double => f.write_str("double"),
        }
    }
}

/// Resolved locations for one library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryPaths {
    pub home: PathBuf,
    pub include: PathBuf,
    pub lib: PathBuf,
}

/// A single build setting value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setting {
    Str(String),
    List(Vec<String>),
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

/// Compiler toolchain for a platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    pub cc: String,
    pub f90: String,
    pub flags_arch: String,
    pub flags_link: String,
    pub flags_prec_single: String,
    pub flags_prec_double: String,
    pub libpath_fortran: String,
    pub libs_fortran: Vec<String>,
}

impl Toolchain {
    /// Precision flags for the requested precision.
    pub fn flags_prec(&self, precision: Precision) -> &str {
        match precision {
            Precision::Single => &self.flags_prec_single,
            Precision::Double => &self.flags_prec_double,
        }
    }
}

/// Complete, immutable configuration for one build invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Platform identifier the configuration was resolved for
    pub platform: String,

    /// Selected floating-point precision
    pub precision: Precision,

    /// Compiler toolchain
    pub toolchain: Toolchain,

    /// Resolved libraries (optional libraries that were not found are absent)
    pub libraries: BTreeMap<Library, LibraryPaths>,
}

impl BuildConfig {
    /// Resolved paths for a library, if it was found.
    pub fn library(&self, library: Library) -> Option<&LibraryPaths> {
        self.libraries.get(&library)
    }

    /// Whether a library is available to the build.
    pub fn has(&self, library: Library) -> bool {
        self.libraries.contains_key(&library)
    }

    /// Flatten into the key/value settings consumed by the build system.
    pub fn settings(&self) -> BTreeMap<String, Setting> {
        let tc = &self.toolchain;
        let mut out = BTreeMap::new();
        let mut put = |k: &str, v: Setting| {
            out.insert(k.to_string(), v);
        };

        put("cc", Setting::Str(tc.cc.clone()));
        put("f90", Setting::Str(tc.f90.clone()));
        put("flags_arch", Setting::Str(tc.flags_arch.clone()));
        put("flags_link", Setting::Str(tc.flags_link.clone()));
        put("flags_prec", Setting::Str(tc.flags_prec(self.precision).to_string()));
        put("libpath_fortran", Setting::Str(tc.libpath_fortran.clone()));
        put("libs_fortran", Setting::List(tc.libs_fortran.clone()));
        put("prec", Setting::Str(self.precision.to_string()));

        for (library, paths) in &self.libraries {
            let key = library.key();
            put(&format!("{key}_path"), Setting::Str(paths.home.display().to_string()));
            put(&format!("{key}_inc"), Setting::Str(paths.include.display().to_string()));
            put(&format!("{key}_lib"), Setting::Str(paths.lib.display().to_string()));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toolchain() -> Toolchain {
        Toolchain {
            cc: "gcc".into(),
            f90: "gfortran".into(),
            flags_arch: "-Wall -O3 -g".into(),
            flags_link: "-rdynamic".into(),
            flags_prec_single: "-fdefault-real-4 -fdefault-double-8".into(),
            flags_prec_double: "-fdefault-real-8 -fdefault-double-8".into(),
            libpath_fortran: ".".into(),
            libs_fortran: vec!["gfortran".into()],
        }
    }

    #[test]
    fn precision_from_flag() {
        assert_eq!(Precision::from_flag(Some("TRUE")), Precision::Double);
        assert_eq!(Precision::from_flag(Some("true ")), Precision::Double);
        assert_eq!(Precision::from_flag(Some("false")), Precision::Single);
        assert_eq!(Precision::from_flag(Some("1")), Precision::Single);
        assert_eq!(Precision::from_flag(None), Precision::Single);
    }

    #[test]
    fn hdf5_layout_uses_include_and_lib() {
        let paths = Library::Hdf5.layout(Path::new("/usr"));
        assert_eq!(paths.include, PathBuf::from("/usr/include"));
        assert_eq!(paths.lib, PathBuf::from("/usr/lib"));
    }

    #[test]
    fn png_home_is_lib_dir() {
        let paths = Library::Png.layout(Path::new("/usr/lib64"));
        assert_eq!(paths.lib, PathBuf::from("/usr/lib64"));
        assert_eq!(paths.include, PathBuf::from("/usr/include"));
    }

    #[test]
    fn settings_select_precision_flags() {
        let mut libraries = BTreeMap::new();
        libraries.insert(Library::Hdf5, Library::Hdf5.layout(Path::new("/usr")));
        let config = BuildConfig {
            platform: "linux_gnu".into(),
            precision: Precision::Double,
            toolchain: toolchain(),
            libraries,
        };

        let settings = config.settings();
        assert_eq!(
            settings["flags_prec"],
            Setting::Str("-fdefault-real-8 -fdefault-double-8".into())
        );
        assert_eq!(settings["hdf5_path"], Setting::Str("/usr".into()));
        assert_eq!(settings["hdf5_inc"], Setting::Str("/usr/include".into()));
        assert_eq!(settings["libs_fortran"], Setting::List(vec!["gfortran".into()]));
        assert!(!settings.contains_key("grackle_path"));
    }

    #[test]
    fn library_parses_aliases() {
        assert_eq!("Charm++".parse::<Library>(), Ok(Library::Charm));
        assert_eq!("grackle".parse::<Library>(), Ok(Library::Grackle));
        assert!("fftw".parse::<Library>().is_err());
    }
}
