//! Supported build platforms.
//!
//! Each platform is a toolchain plus an ordered list of dependencies to
//! locate. Adding a platform means adding a variant and its profile here.

use std::fmt;
use std::str::FromStr;

use super::probe::{Candidate, DependencySpec};
use crate::models::{Library, ResolveError, Toolchain};

const FLAGS_PREC_SINGLE: &str = "-fdefault-real-4 -fdefault-double-8";
const FLAGS_PREC_DOUBLE: &str = "-fdefault-real-8 -fdefault-double-8";

/// Target platform identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Generic Linux workstation with the GNU toolchain
    LinuxGnu,
    /// SDSC Gordon cluster with the GNU toolchain
    GordonGnu,
}

/// Toolchain and dependencies for a platform.
#[derive(Debug, Clone)]
pub struct PlatformProfile {
    pub toolchain: Toolchain,
    pub dependencies: Vec<DependencySpec>,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::LinuxGnu, Platform::GordonGnu];

    pub fn id(self) -> &'static str {
        match self {
            Self::LinuxGnu => "linux_gnu",
            Self::GordonGnu => "gordon_gnu",
        }
    }

    /// Comma-separated list of known ids, for error messages.
    pub fn known_ids() -> String {
        Self::ALL.iter().map(|p| p.id()).collect::<Vec<_>>().join(", ")
    }

    pub fn profile(self) -> PlatformProfile {
        match self {
            Self::LinuxGnu => linux_gnu(),
            Self::GordonGnu => gordon_gnu(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Platform {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.id() == s)
            .ok_or_else(|| ResolveError::UnknownPlatform(s.to_string()))
    }
}

fn gnu_toolchain(flags_arch: &str, libpath_fortran: &str) -> Toolchain {
    Toolchain {
        cc: "gcc".to_string(),
        f90: "gfortran".to_string(),
        flags_arch: flags_arch.to_string(),
        flags_link: "-rdynamic".to_string(),
        flags_prec_single: FLAGS_PREC_SINGLE.to_string(),
        flags_prec_double: FLAGS_PREC_DOUBLE.to_string(),
        libpath_fortran: libpath_fortran.to_string(),
        libs_fortran: vec!["gfortran".to_string()],
    }
}

fn linux_gnu() -> PlatformProfile {
    let charm = DependencySpec::required(Library::Charm, "CHARM_HOME").candidates([
        Candidate::home_dir("Charm/charm"),
        Candidate::home_dir("charm"),
        Candidate::home_dir("local/charm"),
        Candidate::home_dir("src/charm"),
        Candidate::home_dir("source/charm"),
        Candidate::dir("/usr/local/charm"),
        Candidate::dir("/opt/charm"),
    ]);

    let hdf5 = DependencySpec::required(Library::Hdf5, "HDF5_HOME")
        .candidates([Candidate::with_file("/usr", "include/hdf5.h")])
        .hint(" such that $HDF5_HOME/include/hdf5.h exists");

    let png = DependencySpec::required(Library::Png, "LIBPNG_HOME")
        .candidates([Candidate::fallback("/lib/x86_64-linux-gnu")]);

    let grackle = DependencySpec::optional(Library::Grackle, "GRACKLE_HOME").candidates([
        Candidate::home_dir("Grackle/src/clib"),
        Candidate::home_dir("grackle/src/clib"),
        Candidate::home_dir("local/grackle/src/clib"),
        Candidate::home_dir("src/grackle/src/clib"),
        Candidate::home_dir("source/grackle/src/clib"),
        Candidate::home_dir("Software/Grackle/src/clib"),
        Candidate::dir("/usr/local/grackle/src/clib"),
        Candidate::dir("/opt/grackle/src/clib"),
    ]);

    PlatformProfile {
        toolchain: gnu_toolchain("-Wall -O3 -g", "."),
        dependencies: vec![charm, hdf5, png, grackle],
    }
}

fn gordon_gnu() -> PlatformProfile {
    let hdf5 = DependencySpec::required(Library::Hdf5, "HDF5HOME");
    let mpi = DependencySpec::required(Library::Mpi, "MPIHOME");
    let charm = DependencySpec::required(Library::Charm, "CHARM_HOME")
        .candidates([Candidate::home_dir("Charm/charm")]);
    let papi = DependencySpec::optional(Library::Papi, "PAPI_HOME")
        .candidates([Candidate::home_dir("")]);
    let png = DependencySpec::required(Library::Png, "LIBPNG_HOME")
        .candidates([Candidate::fallback("/usr/lib64")]);
    let grackle = DependencySpec::optional(Library::Grackle, "GRACKLE_HOME")
        .candidates([Candidate::home_dir("public/Grackle/src/clib")]);

    PlatformProfile {
        toolchain: gnu_toolchain("-O3 -Wall -g", ""),
        dependencies: vec![hdf5, mpi, charm, papi, png, grackle],
    }
}
