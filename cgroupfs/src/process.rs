//! Cgroup membership of processes.
//!
//! A process belongs to exactly one cgroup in every mounted hierarchy.  Finding the directory
//! of that cgroup takes two files: `/proc/<pid>/cgroup` names the cgroup relative to the root
//! of each hierarchy, and the mount table says where each hierarchy (and which part of it) is
//! mounted.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cgroupfs::process::Process;
//! use cgroupfs::ControllerType;
//!
//! let me = Process::myself().unwrap();
//! for line in me.cgroups().unwrap() {
//!     println!("{}: {:?} {}", line.hierarchy, line.controllers, line.pathname);
//! }
//!
//! let memory = cgroupfs::get_cgroup_for_process(ControllerType::Memory, &me).unwrap();
//! println!("memory cgroup: {}", memory.full_path().display());
//! ```

use std::path::PathBuf;

use rustix::fd::{AsFd, BorrowedFd, OwnedFd};
use rustix::fs::{Mode, OFlags};

use crate::{
    cgroup_mounts, CgroupCore, CgroupError, CgroupMount, CgroupResult, CgroupVersion, ControllerType, FileWrapper,
    FromRead, ProcessCgroups,
};

/// A process, represented by an open handle on its `/proc/<pid>` directory.
///
/// Holding the directory open means that the files read later belong to the same process,
/// even if the pid is reused after it exits.
#[derive(Debug)]
pub struct Process {
    fd: OwnedFd,
    pub pid: i32,
    root: PathBuf,
}

/// Methods for constructing a new `Process` object.
impl Process {
    /// Returns a `Process` based on a specified PID.
    ///
    /// This can fail if the process doesn't exist, or if you don't have permission to access it.
    pub fn new(pid: i32) -> CgroupResult<Process> {
        let root = PathBuf::from("/proc").join(pid.to_string());
        Self::new_with_root(root)
    }

    /// Returns a `Process` based on a specified `/proc/<pid>` path.
    pub fn new_with_root(root: PathBuf) -> CgroupResult<Process> {
        let flags = OFlags::PATH | OFlags::DIRECTORY | OFlags::CLOEXEC;
        let fd = wrap_io_error!(root, rustix::fs::openat(rustix::fs::CWD, &root, flags, Mode::empty()))?;

        let pidres = root
            .as_path()
            .components()
            .last()
            .and_then(|c| match c {
                std::path::Component::Normal(s) => Some(s),
                _ => None,
            })
            .and_then(|s| s.to_string_lossy().parse::<i32>().ok())
            .or_else(|| {
                rustix::fs::readlinkat(rustix::fs::CWD, &root, Vec::new())
                    .ok()
                    .and_then(|s| s.to_string_lossy().parse::<i32>().ok())
            });
        let pid = match pidres {
            Some(pid) => pid,
            None => return Err(CgroupError::NotFound(Some(root))),
        };

        Ok(Process { fd, pid, root })
    }

    /// Returns a `Process` for the currently running process.
    ///
    /// This is done by using the `/proc/self` symlink
    pub fn myself() -> CgroupResult<Process> {
        let root = PathBuf::from("/proc/self");
        Self::new_with_root(root)
    }
}

impl Process {
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Parse a file relative to the process proc structure.
    pub fn read<T: FromRead>(&self, path: &str) -> CgroupResult<T> {
        FromRead::from_read(FileWrapper::open_at(&self.root, &self.fd, path)?)
    }

    /// Describes the control groups to which this process belongs, from `/proc/<pid>/cgroup`.
    ///
    /// (since Linux 2.6.24)
    pub fn cgroups(&self) -> CgroupResult<ProcessCgroups> {
        self.read("cgroup")
    }
}

impl AsFd for Process {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// Builds the core of the cgroup a process belongs to in the hierarchy of `mount`.
///
/// `cgroups` is the parsed `/proc/<pid>/cgroup` of the process.  A v1 hierarchy is matched by
/// the controller list of its line, while the `0::<path>` line serves every controller of the
/// unified hierarchy.
pub fn resolve_cgroup(
    controller: ControllerType,
    cgroups: &ProcessCgroups,
    mount: &CgroupMount,
) -> CgroupResult<CgroupCore> {
    let line = match mount.version {
        CgroupVersion::V1 => cgroups.find_v1(controller),
        CgroupVersion::V2 => cgroups.find_unified(),
    };
    let line = line.ok_or(CgroupError::ControllerNotFound(controller))?;
    let full_path = mount.cgroup_path(&line.pathname);

    Ok(match mount.version {
        CgroupVersion::V1 => CgroupCore::v1(full_path),
        CgroupVersion::V2 => CgroupCore::v2(full_path, mount.mount_point.clone()),
    })
}

/// Finds the cgroup of `process` that governs `controller`.
///
/// # Errors
///
/// [`CgroupError::ControllerNotFound`] if no mounted hierarchy serves the controller, or the
/// process has no membership in it.
pub fn get_cgroup_for_process(controller: ControllerType, process: &Process) -> CgroupResult<CgroupCore> {
    let cgroups = process.cgroups()?;
    let mounts = cgroup_mounts()?;
    let mount = mounts
        .find(controller)
        .ok_or(CgroupError::ControllerNotFound(controller))?;

    let cgroup = resolve_cgroup(controller, &cgroups, mount)?;
    log::debug!(
        "Process {} is in {} cgroup {} ({})",
        process.pid,
        controller,
        cgroup.full_path().display(),
        cgroup.version()
    );
    Ok(cgroup)
}

/// Finds the cgroup of the calling process that governs `controller`.
pub fn get_current_process_cgroup(controller: ControllerType) -> CgroupResult<CgroupCore> {
    get_cgroup_for_process(controller, &Process::myself()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Controllers;
    use std::io::Cursor;
    use std::path::Path;

    fn mount(version: CgroupVersion, controllers: Controllers) -> CgroupMount {
        CgroupMount {
            root: "/".to_owned(),
            mount_point: PathBuf::from("/root_path"),
            version,
            controllers,
        }
    }

    #[test]
    fn test_resolve_v1() {
        let cgroups = ProcessCgroups::from_read(Cursor::new(&b"1:cpu:/dummy\n"[..])).unwrap();
        let cpu_mount = mount(CgroupVersion::V1, Controllers::CPU);
        let cgroup = resolve_cgroup(ControllerType::Cpu, &cgroups, &cpu_mount).unwrap();
        assert_eq!(cgroup, CgroupCore::v1("/root_path/dummy"));
    }

    #[test]
    fn test_resolve_v2() {
        let cgroups = ProcessCgroups::from_read(Cursor::new(&b"0::/dummy\n"[..])).unwrap();
        let unified = mount(CgroupVersion::V2, Controllers::empty());
        for controller in &[ControllerType::Cpu, ControllerType::Memory, ControllerType::Pids] {
            let cgroup = resolve_cgroup(*controller, &cgroups, &unified).unwrap();
            assert_eq!(cgroup.full_path(), Path::new("/root_path/dummy"));
            assert_eq!(cgroup.root_path(), Some(Path::new("/root_path")));
        }
    }

    #[test]
    fn test_resolve_not_found() {
        let cgroups = ProcessCgroups::from_read(Cursor::new(&b""[..])).unwrap();
        let err = resolve_cgroup(
            ControllerType::Cpu,
            &cgroups,
            &mount(CgroupVersion::V2, Controllers::empty()),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "'cpu' not found");

        // a v1 line for another controller does not count
        let cgroups = ProcessCgroups::from_read(Cursor::new(&b"4:memory:/dummy\n"[..])).unwrap();
        let err = resolve_cgroup(
            ControllerType::Cpu,
            &cgroups,
            &mount(CgroupVersion::V1, Controllers::CPU),
        )
        .unwrap_err();
        assert!(matches!(err, CgroupError::ControllerNotFound(ControllerType::Cpu)));
    }

    #[test]
    fn test_myself() {
        let me = Process::myself().unwrap();
        assert_eq!(me.pid(), std::process::id() as i32);

        let cgroups = me.cgroups().unwrap();
        for line in &cgroups {
            println!("{:?}", line);
        }

        let same = Process::new(me.pid).unwrap();
        assert_eq!(same.cgroups().unwrap(), cgroups);
    }

    #[test]
    fn test_no_such_process() {
        match Process::new(i32::MAX) {
            Err(CgroupError::NotFound(Some(p))) => assert_eq!(p, Path::new("/proc/2147483647")),
            x => panic!("Unexpected return value: {:?}", x),
        }
    }

    #[test]
    fn test_current_process_cgroup() {
        // the test host may not have any cgroup hierarchy mounted
        for controller in &[ControllerType::Cpu, ControllerType::Memory, ControllerType::CpuAcct] {
            match get_current_process_cgroup(*controller) {
                Ok(cgroup) => {
                    println!("{}: {:?}", controller, cgroup);
                    assert!(cgroup.full_path().is_absolute());
                }
                Err(CgroupError::ControllerNotFound(c)) => assert_eq!(c, *controller),
                Err(e) => panic!("{:?}", e),
            }
        }
    }
}
