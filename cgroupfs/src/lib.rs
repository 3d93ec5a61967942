#![allow(unknown_lints)]
#![deny(rustdoc::broken_intra_doc_links, rustdoc::invalid_html_tags)]
//! This crate provides a uniform interface to the linux control group (cgroup) filesystems,
//! covering both the legacy per-controller v1 hierarchies and the v2 unified hierarchy.
//!
//! Callers ask for limits and usage in terms of a controller (`cpu`, `memory`, `cpuacct`),
//! and never need to know which cgroup version is mounted, which interface file holds the
//! value, or how that version spells "unbounded".
//!
//! # Overview
//!
//! * A [`CgroupCore`] is one cgroup directory.  It knows its version, reads and writes raw
//!   interface files, moves processes, and creates child cgroups (including the v2
//!   controller delegation dance).
//! * A cgroup is usually found by resolving the membership of a process, see
//!   [`get_cgroup_for_process`] and [`get_current_process_cgroup`].
//! * The controller factories ([`get_cpu_controller`], [`get_memory_controller`]) pick the
//!   v1 or v2 implementation of a controller trait ([`CpuController`], [`MemoryController`])
//!   from the version of the core they are given.
//!
//! Every operation is a synchronous read or write of the underlying files.  Nothing is cached,
//! so limits changed by other processes are always observed.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cgroupfs::{get_cpu_controller, get_current_process_cgroup, ControllerType};
//!
//! let cgroup = get_current_process_cgroup(ControllerType::Cpu).unwrap();
//! let cpu = get_cpu_controller(Arc::new(cgroup));
//! println!("limited to {} cores", cpu.get_cpu_limit_cores().unwrap());
//! ```
//!
//! # Cargo features
//!
//! The following cargo features are available:
//!
//! * `serde1` -- Optional.  Derives `Serialize` and `Deserialize` for the data types.
//! * `backtrace` -- Optional.  This feature lets you get a stack trace whenever an `InternalError` is raised.

pub use cgroupfs_core::*;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use rustix::fd::AsFd;

macro_rules! wrap_io_error {
    ($path:expr, $expr:expr) => {
        match $expr {
            Ok(v) => Ok(v),
            Err(e) => {
                let kind = e.kind();
                Err(::std::io::Error::new(
                    kind,
                    crate::IoErrorWrapper {
                        path: $path.to_owned(),
                        inner: e.into(),
                    },
                ))
            }
        }
    };
}

pub(crate) fn read_file<P: AsRef<Path>>(path: P) -> CgroupResult<String> {
    let mut f = FileWrapper::open(path)?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    Ok(buf)
}

/// Replaces the content of a file, the way `echo value > file` does.
///
/// Interface files reject invalid values at `write` time, so the error of the write itself is
/// what callers see.
pub(crate) fn write_file<P: AsRef<Path>, T: AsRef<[u8]>>(path: P, buf: T) -> CgroupResult<()> {
    let path = path.as_ref();
    let mut f = wrap_io_error!(
        path,
        OpenOptions::new().write(true).create(true).truncate(true).open(path)
    )?;
    wrap_io_error!(path, f.write_all(buf.as_ref()))?;
    Ok(())
}

/// Appends to a file, the way `echo value >> file` does.
pub(crate) fn append_file<P: AsRef<Path>, T: AsRef<[u8]>>(path: P, buf: T) -> CgroupResult<()> {
    let path = path.as_ref();
    let mut f = wrap_io_error!(path, OpenOptions::new().append(true).create(true).open(path))?;
    wrap_io_error!(path, f.write_all(buf.as_ref()))?;
    Ok(())
}

mod cgroup;
pub use crate::cgroup::*;

pub mod process;
pub use crate::process::{get_cgroup_for_process, get_current_process_cgroup};

mod controller;
pub use crate::controller::*;

mod cpu;
pub use crate::cpu::*;

mod memory;
pub use crate::memory::*;

mod cpuacct;
pub use crate::cpuacct::*;

/// A wrapper around a `File` that remembers the name of the path
struct FileWrapper {
    inner: File,
    path: PathBuf,
}

impl FileWrapper {
    fn open<P: AsRef<Path>>(path: P) -> Result<FileWrapper, io::Error> {
        let p = path.as_ref();
        let f = wrap_io_error!(p, File::open(p))?;
        Ok(FileWrapper {
            inner: f,
            path: p.to_owned(),
        })
    }

    fn open_at<P, Q, Fd: AsFd>(root: P, dirfd: Fd, path: Q) -> Result<FileWrapper, io::Error>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        use rustix::fs::{Mode, OFlags};

        let p = root.as_ref().join(path.as_ref());
        let fd = wrap_io_error!(
            p,
            rustix::fs::openat(dirfd, path.as_ref(), OFlags::RDONLY | OFlags::CLOEXEC, Mode::empty())
        )?;
        Ok(FileWrapper {
            inner: File::from(fd),
            path: p,
        })
    }
}

impl Read for FileWrapper {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        wrap_io_error!(self.path, self.inner.read(buf))
    }
    fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        wrap_io_error!(self.path, self.inner.read_to_end(buf))
    }
    fn read_to_string(&mut self, buf: &mut String) -> io::Result<usize> {
        wrap_io_error!(self.path, self.inner.read_to_string(buf))
    }
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        wrap_io_error!(self.path, self.inner.read_exact(buf))
    }
}

/// A system-wide file that can be parsed into a type.
pub trait Current: FromRead {
    const PATH: &'static str;

    /// Reads and parses the file at [`Current::PATH`].
    fn current() -> CgroupResult<Self> {
        Self::from_read(FileWrapper::open(Self::PATH)?)
    }
}

impl Current for CgroupMounts {
    const PATH: &'static str = "/proc/self/mountinfo";
}

impl Current for CgroupSubsystems {
    const PATH: &'static str = "/proc/cgroups";
}

/// The cgroup hierarchies mounted in the mount namespace of the calling process.
///
/// This is the global mount table that process cgroup memberships are resolved against.
pub fn cgroup_mounts() -> CgroupResult<CgroupMounts> {
    CgroupMounts::current()
}

/// Information about the cgroup controllers that are compiled into the kernel
///
/// (since Linux 2.6.24)
pub fn subsystems() -> CgroupResult<CgroupSubsystems> {
    CgroupSubsystems::current()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_io_errors() {
        fn inner<P: AsRef<Path>>(p: P) -> Result<(), CgroupError> {
            let mut file = FileWrapper::open(p)?;

            let mut buf = [0; 128];
            file.read_exact(&mut buf[0..128])?;

            Ok(())
        }

        let err = inner("/this_should_not_exist").unwrap_err();
        println!("{}", err);

        match err {
            CgroupError::NotFound(Some(p)) => {
                assert_eq!(p, Path::new("/this_should_not_exist"));
            }
            x => panic!("Unexpected return value: {:?}", x),
        }

        let dir = tempfile::tempdir().unwrap();
        let short = dir.path().join("cpu.max");
        std::fs::write(&short, "max 100000").unwrap();
        match inner(&short) {
            Err(CgroupError::Incomplete(Some(p))) => {
                assert_eq!(p, short);
            }
            x => panic!("Unexpected return value: {:?}", x),
        }
    }

    #[test]
    fn test_write_file_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let procs = dir.path().join("cgroup.procs");
        std::fs::write(&procs, "1 2 3").unwrap();

        write_file(&procs, "4").unwrap();
        assert_eq!(read_file(&procs).unwrap(), "4");

        append_file(&procs, " 5").unwrap();
        assert_eq!(read_file(&procs).unwrap(), "4 5");

        let missing_dir = dir.path().join("gone").join("cpu.max");
        assert!(matches!(
            write_file(&missing_dir, "max 100000"),
            Err(CgroupError::NotFound(Some(_)))
        ));
    }

    #[test]
    fn test_cgroup_mounts() {
        // the test host may not mount any cgroup hierarchy (e.g. some build sandboxes)
        let mounts = cgroup_mounts().unwrap();
        for mount in &mounts.0 {
            println!("{:?}", mount);
        }
    }

    #[test]
    fn test_subsystems() {
        match subsystems() {
            Ok(subsystems) => println!("{:?}", subsystems),
            // /proc/cgroups is optional on recent kernels
            Err(CgroupError::NotFound(_)) => {}
            Err(e) => panic!("{:?}", e),
        }
    }
}
