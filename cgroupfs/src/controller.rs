use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    cgroup_mounts, get_current_process_cgroup, CgroupCore, CgroupError, CgroupMounts, CgroupResult, CgroupVersion,
    ControllerType,
};

/// Where a controller finds the cgroup it is bound to.
#[derive(Debug, Clone)]
pub enum CgroupSource {
    /// The cgroup of the calling process in the hierarchy serving the controller.
    CurrentProcess,
    /// A cgroup directory.
    ///
    /// Absolute paths must lie inside a mounted hierarchy that serves the controller.  Relative
    /// paths are taken relative to the mount point of the hierarchy serving the controller.
    Path(PathBuf),
    /// An already resolved cgroup.
    Core(Arc<CgroupCore>),
}

impl From<PathBuf> for CgroupSource {
    fn from(path: PathBuf) -> Self {
        CgroupSource::Path(path)
    }
}

impl From<CgroupCore> for CgroupSource {
    fn from(core: CgroupCore) -> Self {
        CgroupSource::Core(Arc::new(core))
    }
}

impl From<Arc<CgroupCore>> for CgroupSource {
    fn from(core: Arc<CgroupCore>) -> Self {
        CgroupSource::Core(core)
    }
}

impl From<Option<Arc<CgroupCore>>> for CgroupSource {
    fn from(core: Option<Arc<CgroupCore>>) -> Self {
        match core {
            Some(core) => CgroupSource::Core(core),
            None => CgroupSource::CurrentProcess,
        }
    }
}

/// A controller type bound to one cgroup.
///
/// The core is shared: several controllers (and threads) may hold the same one.
#[derive(Debug, Clone)]
pub struct BaseController {
    controller: ControllerType,
    cgroup: Arc<CgroupCore>,
}

impl BaseController {
    pub fn new(controller: ControllerType, cgroup: Arc<CgroupCore>) -> BaseController {
        BaseController { controller, cgroup }
    }

    /// Binds `controller` to the cgroup described by `source`.
    pub fn from_source<S: Into<CgroupSource>>(controller: ControllerType, source: S) -> CgroupResult<BaseController> {
        let cgroup = Self::get_cgroup_core(controller, source)?;
        Ok(BaseController::new(controller, cgroup))
    }

    /// Resolves a [`CgroupSource`] to the core it names.
    pub fn get_cgroup_core<S: Into<CgroupSource>>(
        controller: ControllerType,
        source: S,
    ) -> CgroupResult<Arc<CgroupCore>> {
        match source.into() {
            CgroupSource::Core(core) => Ok(core),
            CgroupSource::CurrentProcess => Ok(Arc::new(get_current_process_cgroup(controller)?)),
            CgroupSource::Path(path) => Ok(Arc::new(core_for_path(controller, &cgroup_mounts()?, path)?)),
        }
    }

    pub fn controller(&self) -> ControllerType {
        self.controller
    }

    pub fn cgroup(&self) -> &Arc<CgroupCore> {
        &self.cgroup
    }
}

/// Operations shared by every controller.
///
/// Implementors only provide access to their [`BaseController`]; file I/O goes through the
/// bound [`CgroupCore`].
pub trait Controller {
    fn base(&self) -> &BaseController;

    fn controller(&self) -> ControllerType {
        self.base().controller()
    }

    /// The cgroup this controller is bound to.
    fn cgroup(&self) -> &CgroupCore {
        self.base().cgroup()
    }

    fn read_from_interface_file(&self, name: &str) -> CgroupResult<String> {
        self.cgroup().read_from_interface_file(name)
    }

    fn write_to_interface_file(&self, name: &str, value: &str) -> CgroupResult<()> {
        self.cgroup().write_to_interface_file(name, value)
    }
}

impl Controller for BaseController {
    fn base(&self) -> &BaseController {
        self
    }
}

/// Builds the core for a cgroup directory given by path.
fn core_for_path(controller: ControllerType, mounts: &CgroupMounts, path: PathBuf) -> CgroupResult<CgroupCore> {
    let mount = if path.is_absolute() {
        let mount = mounts.containing(&path).ok_or_else(|| {
            CgroupError::Other(format!("{} is not inside a cgroup hierarchy", path.display()))
        })?;
        if mount.version.is_v1() && !mount.controllers.has(controller) {
            return Err(CgroupError::ControllerNotFound(controller));
        }
        mount
    } else {
        mounts
            .find(controller)
            .ok_or(CgroupError::ControllerNotFound(controller))?
    };

    let full_path = mount.mount_point.join(path);
    Ok(match mount.version {
        CgroupVersion::V1 => CgroupCore::v1(full_path),
        CgroupVersion::V2 => CgroupCore::v2(full_path, mount.mount_point.clone()),
    })
}

/// Checks that a controller implementation for `expected` is bound to a matching core.
///
/// Binding a v1 implementation to a v2 core (or the reverse) is a bug in the caller.
pub(crate) fn assert_version(cgroup: &CgroupCore, expected: CgroupVersion) {
    assert_eq!(
        cgroup.version(),
        expected,
        "a cgroup {} controller cannot be bound to {}",
        expected,
        cgroup.full_path().display()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_source() {
        let core = Arc::new(CgroupCore::v1("/sys/fs/cgroup/cpu,cpuacct/user.slice"));
        let base = BaseController::from_source(ControllerType::Cpu, core.clone()).unwrap();
        assert!(Arc::ptr_eq(base.cgroup(), &core));
        assert_eq!(Controller::controller(&base), ControllerType::Cpu);

        let base = BaseController::from_source(ControllerType::Cpu, Some(core.clone())).unwrap();
        assert!(Arc::ptr_eq(base.cgroup(), &core));
    }

    #[test]
    fn test_read_write_through_core() {
        let dir = tempfile::tempdir().unwrap();
        let core = Arc::new(CgroupCore::v2(dir.path(), dir.path()));
        let base = BaseController::new(ControllerType::Memory, core);

        base.write_to_interface_file("memory.high", "max").unwrap();
        assert_eq!(base.read_from_interface_file("memory.high").unwrap(), "max");
        assert_eq!(std::fs::read_to_string(dir.path().join("memory.high")).unwrap(), "max");
    }

    const HYBRID: &str = "\
31 25 0:27 / /sys/fs/cgroup/cpu,cpuacct rw,nosuid,nodev,noexec,relatime shared:15 - cgroup cgroup rw,cpu,cpuacct
33 25 0:29 / /sys/fs/cgroup/memory rw,nosuid,nodev,noexec,relatime shared:17 - cgroup cgroup rw,memory
26 25 0:22 / /sys/fs/cgroup/unified rw,nosuid,nodev,noexec,relatime shared:10 - cgroup2 cgroup2 rw,nsdelegate
";

    fn hybrid_mounts() -> CgroupMounts {
        use crate::FromRead;
        CgroupMounts::from_read(std::io::Cursor::new(HYBRID.as_bytes())).unwrap()
    }

    #[test]
    fn test_core_for_path() {
        let mounts = hybrid_mounts();

        let core = core_for_path(ControllerType::Cpu, &mounts, PathBuf::from("user.slice")).unwrap();
        assert_eq!(core, CgroupCore::v1("/sys/fs/cgroup/cpu,cpuacct/user.slice"));

        let core = core_for_path(ControllerType::Memory, &mounts, PathBuf::from("/sys/fs/cgroup/memory/job")).unwrap();
        assert_eq!(core, CgroupCore::v1("/sys/fs/cgroup/memory/job"));

        let core = core_for_path(ControllerType::Pids, &mounts, PathBuf::from("/sys/fs/cgroup/unified/job")).unwrap();
        assert_eq!(core, CgroupCore::v2("/sys/fs/cgroup/unified/job", "/sys/fs/cgroup/unified"));
    }

    #[test]
    fn test_core_for_path_outside_hierarchy() {
        let mounts = hybrid_mounts();

        let err = core_for_path(ControllerType::Cpu, &mounts, PathBuf::from("/tmp/fake")).unwrap_err();
        assert!(matches!(err, CgroupError::Other(_)));

        // the memory hierarchy has no cpu interface files
        let err = core_for_path(ControllerType::Cpu, &mounts, PathBuf::from("/sys/fs/cgroup/memory/job")).unwrap_err();
        assert!(matches!(err, CgroupError::ControllerNotFound(ControllerType::Cpu)));
    }

    #[test]
    fn test_path_source() {
        // the test host may not have any cgroup hierarchy mounted
        match BaseController::get_cgroup_core(ControllerType::Memory, PathBuf::from("some/child")) {
            Ok(core) => {
                assert!(core.full_path().is_absolute());
                assert!(core.full_path().ends_with("some/child"));
            }
            Err(CgroupError::ControllerNotFound(ControllerType::Memory)) => {}
            Err(e) => panic!("{:?}", e),
        }
    }

    #[test]
    #[should_panic]
    fn test_version_mismatch() {
        assert_version(&CgroupCore::v1("/sys/fs/cgroup/cpu"), CgroupVersion::V2);
    }
}
