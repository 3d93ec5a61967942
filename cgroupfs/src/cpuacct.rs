use std::sync::Arc;

use crate::{BaseController, CgroupCore, CgroupError, CgroupResult, CgroupSource, Controller, ControllerType};

const CPUACCT_USAGE_FILE: &str = "cpuacct.usage";

/// The v1 `cpuacct` controller: CPU time accounting.
#[derive(Debug, Clone)]
pub struct CpuAcctController {
    base: BaseController,
}

impl CpuAcctController {
    pub fn new(cgroup: Arc<CgroupCore>) -> CpuAcctController {
        CpuAcctController {
            base: BaseController::new(ControllerType::CpuAcct, cgroup),
        }
    }

    /// Binds the controller to the cgroup described by `source`.
    pub fn from_source<S: Into<CgroupSource>>(source: S) -> CgroupResult<CpuAcctController> {
        let base = BaseController::from_source(ControllerType::CpuAcct, source)?;
        Ok(CpuAcctController { base })
    }

    /// Total CPU time consumed by the tasks of this cgroup (and its descendants), in
    /// nanoseconds.
    ///
    /// # Errors
    ///
    /// [`CgroupError::InterfaceNotSupported`] on v2, where `cpuacct` is replaced by the
    /// `usage_usec` entry of `cpu.stat`.
    pub fn get_cpu_time_ns(&self) -> CgroupResult<u64> {
        let cgroup = self.cgroup();
        if !cgroup.is_v1() {
            return Err(CgroupError::InterfaceNotSupported {
                interface: CPUACCT_USAGE_FILE,
                version: cgroup.version(),
            });
        }
        Ok(self.read_from_interface_file(CPUACCT_USAGE_FILE)?.trim().parse()?)
    }
}

impl Controller for CpuAcctController {
    fn base(&self) -> &BaseController {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpuacct_controller() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CPUACCT_USAGE_FILE), "128").unwrap();

        let cpuacct = CpuAcctController::new(Arc::new(CgroupCore::v1(dir.path())));
        assert_eq!(cpuacct.controller(), ControllerType::CpuAcct);
        assert_eq!(cpuacct.get_cpu_time_ns().unwrap(), 128);

        std::fs::write(dir.path().join(CPUACCT_USAGE_FILE), "18446744073709551615\n").unwrap();
        assert_eq!(cpuacct.get_cpu_time_ns().unwrap(), u64::MAX);
    }

    #[test]
    fn test_cpuacct_v2() {
        let dir = tempfile::tempdir().unwrap();
        let cpuacct = CpuAcctController::from_source(CgroupCore::v2(dir.path(), dir.path())).unwrap();
        let err = cpuacct.get_cpu_time_ns().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Interface file cpuacct.usage is not supported in cGroup v2"
        );
    }
}
