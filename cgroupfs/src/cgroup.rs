use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::{
    append_file, format_limit, parse_limit, read_file, write_file, CgroupError, CgroupResult, CgroupVersion,
    ControllerType, Controllers,
};

/// The interface file listing the member processes of a cgroup.
pub const CGROUP_PROCS_FILE: &str = "cgroup.procs";
/// The v2 interface file listing the controllers available to a cgroup.
pub const CGROUP_CONTROLLERS_FILE: &str = "cgroup.controllers";
/// The v2 interface file listing the controllers delegated to the children of a cgroup.
pub const CGROUP_SUBTREE_CONTROL_FILE: &str = "cgroup.subtree_control";

/// A single cgroup directory.
///
/// The variant records which version of the interface the directory speaks.  Cores are cheap
/// values holding nothing but paths: every method is a fresh read or write of the files below
/// [`full_path`](CgroupCore::full_path).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum CgroupCore {
    /// A cgroup in one of the v1 per-controller hierarchies.
    V1 { full_path: PathBuf },
    /// A cgroup in the v2 unified hierarchy.
    V2 {
        full_path: PathBuf,
        /// Where the unified hierarchy is mounted.
        ///
        /// Delegation checks walk upward from `full_path` and stop here.
        root_path: PathBuf,
    },
}

impl CgroupCore {
    pub fn v1<P: Into<PathBuf>>(full_path: P) -> CgroupCore {
        CgroupCore::V1 {
            full_path: full_path.into(),
        }
    }

    pub fn v2<P: Into<PathBuf>, R: Into<PathBuf>>(full_path: P, root_path: R) -> CgroupCore {
        CgroupCore::V2 {
            full_path: full_path.into(),
            root_path: root_path.into(),
        }
    }

    /// The absolute path of this cgroup's directory.
    pub fn full_path(&self) -> &Path {
        match self {
            CgroupCore::V1 { full_path } | CgroupCore::V2 { full_path, .. } => full_path,
        }
    }

    pub fn version(&self) -> CgroupVersion {
        match self {
            CgroupCore::V1 { .. } => CgroupVersion::V1,
            CgroupCore::V2 { .. } => CgroupVersion::V2,
        }
    }

    pub fn is_v1(&self) -> bool {
        self.version().is_v1()
    }

    /// The mount point of the unified hierarchy (v2 only).
    pub fn root_path(&self) -> Option<&Path> {
        match self {
            CgroupCore::V1 { .. } => None,
            CgroupCore::V2 { root_path, .. } => Some(root_path),
        }
    }

    /// The processes that are members of this cgroup, from `cgroup.procs`.
    pub fn get_pids_in_cgroup(&self) -> CgroupResult<HashSet<i32>> {
        let procs = self.read_from_interface_file(CGROUP_PROCS_FILE)?;
        let mut pids = HashSet::new();
        for pid in procs.split_whitespace() {
            pids.insert(pid.parse::<i32>()?);
        }
        Ok(pids)
    }

    /// Moves a process into this cgroup.
    ///
    /// The kernel removes the process from its previous cgroup in the same hierarchy.
    pub fn assign_process_to_cgroup(&self, pid: i32) -> CgroupResult<()> {
        log::debug!("Moving process {} to {}", pid, self.full_path().display());
        self.write_to_interface_file(CGROUP_PROCS_FILE, &pid.to_string())
    }

    /// Reads an interface file of this cgroup, e.g. `cpu.max`.
    pub fn read_from_interface_file(&self, name: &str) -> CgroupResult<String> {
        let path = self.full_path().join(name);
        log::trace!("Reading {}", path.display());
        read_file(path)
    }

    /// Replaces the content of an interface file of this cgroup.
    pub fn write_to_interface_file(&self, name: &str, value: &str) -> CgroupResult<()> {
        let path = self.full_path().join(name);
        log::trace!("Writing {:?} to {}", value, path.display());
        write_file(path, value)
    }

    /// Parses a limit read from an interface file of this cgroup's version.
    ///
    /// Unbounded limits become `-1` in both versions.
    pub fn convert_inner_value_to_outer(&self, raw: &str) -> CgroupResult<i64> {
        parse_limit(self.version(), raw)
    }

    /// Formats a limit for an interface file of this cgroup's version.
    pub fn convert_outer_value_to_inner(&self, value: i64) -> String {
        format_limit(self.version(), value)
    }

    /// Returns the child cgroup `name`, creating it if needed.
    ///
    /// This is not a pure lookup.  Besides creating the child directory, on v2 it enables
    /// `controller` in the `cgroup.subtree_control` of the nearest cgroup (from this one up to
    /// the hierarchy root) that has the controller available.  Without that the child would
    /// not get the controller's interface files.  The child is always created directly below
    /// this cgroup.
    ///
    /// If this cgroup is itself named `name`, it is returned as is and nothing is touched.
    ///
    /// # Errors
    ///
    /// [`CgroupError::ControllerNotDelegable`] if no cgroup up to and including the v2 root
    /// lists the controller in `cgroup.controllers`, or if this cgroup is not below the root.
    /// Directories outside the root are never read or written.
    pub fn get_or_create_subcgroup(&self, controller: ControllerType, name: &str) -> CgroupResult<CgroupCore> {
        if self.full_path().file_name().map_or(false, |n| n == name) {
            return Ok(self.clone());
        }

        match self {
            CgroupCore::V1 { full_path } => {
                let child = full_path.join(name);
                create_dir(&child)?;
                Ok(CgroupCore::v1(child))
            }
            CgroupCore::V2 { full_path, root_path } => {
                enable_delegation(controller, full_path, root_path)?;
                let child = full_path.join(name);
                create_dir(&child)?;
                Ok(CgroupCore::v2(child, root_path.clone()))
            }
        }
    }
}

/// Enables a controller for the children of the nearest cgroup in `[current, root]` that has
/// it available.
fn enable_delegation(controller: ControllerType, current: &Path, root: &Path) -> CgroupResult<()> {
    let mut level = Some(current);

    while let Some(dir) = level {
        if !dir.starts_with(root) {
            break;
        }
        let available = read_controllers(&dir.join(CGROUP_CONTROLLERS_FILE))?;
        if available.has(controller) {
            let subtree_control = dir.join(CGROUP_SUBTREE_CONTROL_FILE);
            if !read_controllers(&subtree_control)?.has(controller) {
                log::debug!("Delegating '{}' to children of {}", controller, dir.display());
                append_file(&subtree_control, format!("+{}", controller))?;
            }
            return Ok(());
        }

        if dir == root {
            break;
        }
        level = dir.parent();
    }

    Err(CgroupError::ControllerNotDelegable {
        controller,
        root: root.to_owned(),
    })
}

/// Reads a space separated controller list.  A missing file lists nothing.
fn read_controllers(path: &Path) -> CgroupResult<Controllers> {
    match read_file(path) {
        Ok(list) => Ok(Controllers::from_list(&list)),
        Err(CgroupError::NotFound(_)) => Ok(Controllers::empty()),
        Err(e) => Err(e),
    }
}

fn create_dir(path: &Path) -> CgroupResult<()> {
    match std::fs::create_dir(path) {
        Ok(()) => {
            log::debug!("Created cgroup {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(CgroupError::from(e).with_path(path)),
    }
}
