use std::sync::Arc;

use crate::controller::assert_version;
use crate::{
    BaseController, CgroupCore, CgroupError, CgroupResult, CgroupSource, CgroupVersion, Controller, ControllerType,
    UNBOUNDED,
};

const V1_LIMIT_FILE: &str = "memory.limit_in_bytes";
const V1_MEMSW_LIMIT_FILE: &str = "memory.memsw.limit_in_bytes";
const V1_USAGE_FILE: &str = "memory.usage_in_bytes";
const V1_MAX_USAGE_FILE: &str = "memory.max_usage_in_bytes";

const V2_LIMIT_FILE: &str = "memory.max";
const V2_SWAP_LIMIT_FILE: &str = "memory.swap.max";
const V2_USAGE_FILE: &str = "memory.current";

/// The `memory` controller: memory limits and usage, in bytes.
///
/// A limit of `-1` means unbounded in both cgroup versions.
pub trait MemoryController: Controller + Send + Sync {
    fn get_memory_limit(&self) -> CgroupResult<i64>;

    /// Sets the memory limit.
    ///
    /// Swap is limited along with memory: on v1 the memory+swap limit is set to the same value,
    /// so the cgroup cannot swap; on v2 the swap limit is set to zero.  A v2 cgroup without
    /// swap accounting has no `memory.swap.max`, and only the memory limit is written.
    fn set_limit_in_bytes(&self, limit: i64) -> CgroupResult<()>;

    /// Current memory usage.
    fn get_usage_in_bytes(&self) -> CgroupResult<u64>;

    /// Peak memory usage.
    ///
    /// # Errors
    ///
    /// [`CgroupError::InterfaceNotSupported`] on v2, which has no such file.
    fn get_max_usage_in_bytes(&self) -> CgroupResult<u64>;

    /// Removes the memory and swap limits.
    fn reset_memory_limit(&self) -> CgroupResult<()>;
}

/// `memory` on a v1 hierarchy.
#[derive(Debug, Clone)]
pub struct MemoryControllerV1 {
    base: BaseController,
}

impl MemoryControllerV1 {
    /// # Panics
    ///
    /// If `cgroup` is not a v1 cgroup.
    pub fn new(cgroup: Arc<CgroupCore>) -> MemoryControllerV1 {
        assert_version(&cgroup, CgroupVersion::V1);
        MemoryControllerV1 {
            base: BaseController::new(ControllerType::Memory, cgroup),
        }
    }

    fn read_bytes(&self, name: &str) -> CgroupResult<u64> {
        Ok(self.read_from_interface_file(name)?.trim().parse()?)
    }
}

impl Controller for MemoryControllerV1 {
    fn base(&self) -> &BaseController {
        &self.base
    }
}

impl MemoryController for MemoryControllerV1 {
    fn get_memory_limit(&self) -> CgroupResult<i64> {
        let limit = self.read_from_interface_file(V1_LIMIT_FILE)?;
        self.cgroup().convert_inner_value_to_outer(&limit)
    }

    fn set_limit_in_bytes(&self, limit: i64) -> CgroupResult<()> {
        log::debug!("Setting memory limit of {} to {}", self.cgroup().full_path().display(), limit);
        let current = self.get_memory_limit()?;
        let value = self.cgroup().convert_outer_value_to_inner(limit);

        // the kernel rejects a memory limit above the memory+swap limit
        let raising = limit == UNBOUNDED || (current != UNBOUNDED && limit > current);
        if raising {
            self.write_to_interface_file(V1_MEMSW_LIMIT_FILE, &value)?;
            self.write_to_interface_file(V1_LIMIT_FILE, &value)
        } else {
            self.write_to_interface_file(V1_LIMIT_FILE, &value)?;
            self.write_to_interface_file(V1_MEMSW_LIMIT_FILE, &value)
        }
    }

    fn get_usage_in_bytes(&self) -> CgroupResult<u64> {
        self.read_bytes(V1_USAGE_FILE)
    }

    fn get_max_usage_in_bytes(&self) -> CgroupResult<u64> {
        self.read_bytes(V1_MAX_USAGE_FILE)
    }

    fn reset_memory_limit(&self) -> CgroupResult<()> {
        self.set_limit_in_bytes(UNBOUNDED)
    }
}

/// `memory` on the v2 hierarchy.
#[derive(Debug, Clone)]
pub struct MemoryControllerV2 {
    base: BaseController,
}

impl MemoryControllerV2 {
    /// # Panics
    ///
    /// If `cgroup` is not a v2 cgroup.
    pub fn new(cgroup: Arc<CgroupCore>) -> MemoryControllerV2 {
        assert_version(&cgroup, CgroupVersion::V2);
        MemoryControllerV2 {
            base: BaseController::new(ControllerType::Memory, cgroup),
        }
    }

    /// `memory.swap.max` only exists when the kernel accounts swap (`CONFIG_MEMCG_SWAP`, and
    /// not booted with `swapaccount=0`).  Without it there is no swap limit to set.
    fn write_swap_limit(&self, value: &str) -> CgroupResult<()> {
        let swap_limit = self.cgroup().full_path().join(V2_SWAP_LIMIT_FILE);
        if !swap_limit.exists() {
            log::debug!("No swap accounting in {}", self.cgroup().full_path().display());
            return Ok(());
        }
        self.write_to_interface_file(V2_SWAP_LIMIT_FILE, value)
    }
}

impl Controller for MemoryControllerV2 {
    fn base(&self) -> &BaseController {
        &self.base
    }
}

impl MemoryController for MemoryControllerV2 {
    fn get_memory_limit(&self) -> CgroupResult<i64> {
        let limit = self.read_from_interface_file(V2_LIMIT_FILE)?;
        self.cgroup().convert_inner_value_to_outer(&limit)
    }

    fn set_limit_in_bytes(&self, limit: i64) -> CgroupResult<()> {
        log::debug!("Setting memory limit of {} to {}", self.cgroup().full_path().display(), limit);
        let value = self.cgroup().convert_outer_value_to_inner(limit);
        self.write_to_interface_file(V2_LIMIT_FILE, &value)?;
        self.write_swap_limit("0")
    }

    fn get_usage_in_bytes(&self) -> CgroupResult<u64> {
        Ok(self.read_from_interface_file(V2_USAGE_FILE)?.trim().parse()?)
    }

    fn get_max_usage_in_bytes(&self) -> CgroupResult<u64> {
        Err(CgroupError::InterfaceNotSupported {
            interface: "max_usage_in_bytes",
            version: CgroupVersion::V2,
        })
    }

    fn reset_memory_limit(&self) -> CgroupResult<()> {
        log::debug!("Removing memory limits of {}", self.cgroup().full_path().display());
        let unbounded = self.cgroup().convert_outer_value_to_inner(UNBOUNDED);
        self.write_to_interface_file(V2_LIMIT_FILE, &unbounded)?;
        self.write_swap_limit(&unbounded)
    }
}

/// The `memory` controller implementation for the version of `cgroup`.
pub fn get_memory_controller(cgroup: Arc<CgroupCore>) -> Box<dyn MemoryController> {
    if cgroup.is_v1() {
        Box::new(MemoryControllerV1::new(cgroup))
    } else {
        Box::new(MemoryControllerV2::new(cgroup))
    }
}

/// The `memory` controller of the child cgroup `name` of `parent`, which is created (and on v2
/// given the `memory` controller) if needed.
pub fn get_sub_memory_controller<S: Into<CgroupSource>>(
    name: &str,
    parent: S,
) -> CgroupResult<Box<dyn MemoryController>> {
    let parent = BaseController::get_cgroup_core(ControllerType::Memory, parent)?;
    let child = parent.get_or_create_subcgroup(ControllerType::Memory, name)?;
    Ok(get_memory_controller(Arc::new(child)))
}
