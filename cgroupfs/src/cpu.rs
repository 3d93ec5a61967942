use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use crate::controller::assert_version;
use crate::{
    BaseController, CgroupCore, CgroupError, CgroupResult, CgroupSource, CgroupVersion, Controller, ControllerType,
    CpuLimitParams, CpuStat, FromRead,
};

const CPU_STAT_FILE: &str = "cpu.stat";
const CPU_PERIOD_FILE: &str = "cpu.cfs_period_us";
const CPU_QUOTA_FILE: &str = "cpu.cfs_quota_us";
const CPU_MAX_FILE: &str = "cpu.max";

/// The `cpu` controller: CPU bandwidth limits.
///
/// Quotas are in microseconds per period, with `-1` for "unbounded" in both cgroup versions.
pub trait CpuController: Controller + Send + Sync {
    fn get_cpu_limit_period(&self) -> CgroupResult<u64>;

    fn get_cpu_limit_quota(&self) -> CgroupResult<i64>;

    fn get_cpu_limit_params(&self) -> CgroupResult<CpuLimitParams>;

    fn set_cpu_limit_quota(&self, quota: i64) -> CgroupResult<()>;

    /// Limits the cgroup to `cores` CPUs, keeping the current period.
    ///
    /// The quota is truncated to whole microseconds.
    fn set_cpu_limit_cores(&self, cores: f64) -> CgroupResult<()> {
        let period = self.get_cpu_limit_period()?;
        self.set_cpu_limit_quota(CpuLimitParams::quota_for_cores(period, cores))
    }

    /// The limit in cores, or `-1.0` if the cgroup is unbounded.
    fn get_cpu_limit_cores(&self) -> CgroupResult<f64> {
        Ok(self.get_cpu_limit_params()?.cores())
    }

    /// Removes the limit.
    fn reset_cpu_limit(&self) -> CgroupResult<()> {
        self.set_cpu_limit_quota(crate::UNBOUNDED)
    }

    /// The key/value pairs of `cpu.stat`.
    fn get_stat(&self) -> CgroupResult<HashMap<String, u64>> {
        let stat = self.read_from_interface_file(CPU_STAT_FILE)?;
        Ok(CpuStat::from_read(Cursor::new(stat))?.0)
    }
}

/// `cpu` on a v1 hierarchy (`cpu.cfs_period_us`, `cpu.cfs_quota_us`).
#[derive(Debug, Clone)]
pub struct CpuControllerV1 {
    base: BaseController,
}

impl CpuControllerV1 {
    /// # Panics
    ///
    /// If `cgroup` is not a v1 cgroup.
    pub fn new(cgroup: Arc<CgroupCore>) -> CpuControllerV1 {
        assert_version(&cgroup, CgroupVersion::V1);
        CpuControllerV1 {
            base: BaseController::new(ControllerType::Cpu, cgroup),
        }
    }
}

impl Controller for CpuControllerV1 {
    fn base(&self) -> &BaseController {
        &self.base
    }
}

impl CpuController for CpuControllerV1 {
    fn get_cpu_limit_period(&self) -> CgroupResult<u64> {
        CpuLimitParams::parse_period(&self.read_from_interface_file(CPU_PERIOD_FILE)?)
    }

    fn get_cpu_limit_quota(&self) -> CgroupResult<i64> {
        let quota = self.read_from_interface_file(CPU_QUOTA_FILE)?;
        self.cgroup().convert_inner_value_to_outer(&quota)
    }

    fn get_cpu_limit_params(&self) -> CgroupResult<CpuLimitParams> {
        Ok(CpuLimitParams {
            period: self.get_cpu_limit_period()?,
            quota: self.get_cpu_limit_quota()?,
        })
    }

    fn set_cpu_limit_quota(&self, quota: i64) -> CgroupResult<()> {
        log::debug!("Setting cpu quota of {} to {}", self.cgroup().full_path().display(), quota);
        let quota = self.cgroup().convert_outer_value_to_inner(quota);
        self.write_to_interface_file(CPU_QUOTA_FILE, &quota)
    }
}

/// `cpu` on the v2 hierarchy (`cpu.max`).
#[derive(Debug, Clone)]
pub struct CpuControllerV2 {
    base: BaseController,
}

impl CpuControllerV2 {
    /// # Panics
    ///
    /// If `cgroup` is not a v2 cgroup.
    pub fn new(cgroup: Arc<CgroupCore>) -> CpuControllerV2 {
        assert_version(&cgroup, CgroupVersion::V2);
        CpuControllerV2 {
            base: BaseController::new(ControllerType::Cpu, cgroup),
        }
    }
}

impl Controller for CpuControllerV2 {
    fn base(&self) -> &BaseController {
        &self.base
    }
}

impl CpuController for CpuControllerV2 {
    fn get_cpu_limit_period(&self) -> CgroupResult<u64> {
        Ok(self.get_cpu_limit_params()?.period)
    }

    fn get_cpu_limit_quota(&self) -> CgroupResult<i64> {
        Ok(self.get_cpu_limit_params()?.quota)
    }

    fn get_cpu_limit_params(&self) -> CgroupResult<CpuLimitParams> {
        let max = self.read_from_interface_file(CPU_MAX_FILE)?;
        let mut s = max.split_whitespace();
        match (s.next(), s.next()) {
            (Some(quota), Some(period)) => Ok(CpuLimitParams {
                period: CpuLimitParams::parse_period(period)?,
                quota: self.cgroup().convert_inner_value_to_outer(quota)?,
            }),
            _ => Err(CgroupError::Other(format!("Malformed cpu.max: {:?}", max))),
        }
    }

    fn set_cpu_limit_quota(&self, quota: i64) -> CgroupResult<()> {
        let period = self.get_cpu_limit_period()?;
        log::debug!("Setting cpu quota of {} to {}", self.cgroup().full_path().display(), quota);
        let quota = self.cgroup().convert_outer_value_to_inner(quota);
        self.write_to_interface_file(CPU_MAX_FILE, &format!("{} {}", quota, period))
    }
}

/// The `cpu` controller implementation for the version of `cgroup`.
pub fn get_cpu_controller(cgroup: Arc<CgroupCore>) -> Box<dyn CpuController> {
    if cgroup.is_v1() {
        Box::new(CpuControllerV1::new(cgroup))
    } else {
        Box::new(CpuControllerV2::new(cgroup))
    }
}

/// The `cpu` controller of the child cgroup `name` of `parent`, which is created (and on v2
/// given the `cpu` controller) if needed.
///
/// Pass [`CgroupSource::CurrentProcess`] to derive from the cgroup of the calling process.
pub fn get_sub_cpu_controller<S: Into<CgroupSource>>(name: &str, parent: S) -> CgroupResult<Box<dyn CpuController>> {
    let parent = BaseController::get_cgroup_core(ControllerType::Cpu, parent)?;
    let child = parent.get_or_create_subcgroup(ControllerType::Cpu, name)?;
    Ok(get_cpu_controller(Arc::new(child)))
}
