use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::CgroupError;

/// A cgroup controller (also known as a subsystem).
///
/// Only `cpu`, `cpuacct` and `memory` have controller types in the `cgroupfs` crate, but every
/// controller the kernel knows about can be named, so that membership lines and delegation
/// files parse without loss.
///
/// New variants to this enum may be added at any time (even without a major or minor semver bump).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub enum ControllerType {
    Cpu,
    CpuAcct,
    CpuSet,
    Memory,
    Io,
    BlkIo,
    Pids,
    Devices,
    Freezer,
    HugeTlb,
    NetCls,
    NetPrio,
    PerfEvent,
    Rdma,
    Misc,
}

impl ControllerType {
    /// The name the kernel uses for this controller in interface file prefixes, mount options,
    /// and `cgroup.controllers`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerType::Cpu => "cpu",
            ControllerType::CpuAcct => "cpuacct",
            ControllerType::CpuSet => "cpuset",
            ControllerType::Memory => "memory",
            ControllerType::Io => "io",
            ControllerType::BlkIo => "blkio",
            ControllerType::Pids => "pids",
            ControllerType::Devices => "devices",
            ControllerType::Freezer => "freezer",
            ControllerType::HugeTlb => "hugetlb",
            ControllerType::NetCls => "net_cls",
            ControllerType::NetPrio => "net_prio",
            ControllerType::PerfEvent => "perf_event",
            ControllerType::Rdma => "rdma",
            ControllerType::Misc => "misc",
        }
    }
}

impl FromStr for ControllerType {
    type Err = CgroupError;

    fn from_str(value: &str) -> Result<ControllerType, Self::Err> {
        match value {
            "cpu" => Ok(ControllerType::Cpu),
            "cpuacct" => Ok(ControllerType::CpuAcct),
            "cpuset" => Ok(ControllerType::CpuSet),
            "memory" => Ok(ControllerType::Memory),
            "io" => Ok(ControllerType::Io),
            "blkio" => Ok(ControllerType::BlkIo),
            "pids" => Ok(ControllerType::Pids),
            "devices" => Ok(ControllerType::Devices),
            "freezer" => Ok(ControllerType::Freezer),
            "hugetlb" => Ok(ControllerType::HugeTlb),
            "net_cls" => Ok(ControllerType::NetCls),
            "net_prio" => Ok(ControllerType::NetPrio),
            "perf_event" => Ok(ControllerType::PerfEvent),
            "rdma" => Ok(ControllerType::Rdma),
            "misc" => Ok(ControllerType::Misc),
            _ => Err(CgroupError::Other(format!("{} is not a known cgroup controller", value))),
        }
    }
}

impl fmt::Display for ControllerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// A set of cgroup controllers.
    ///
    /// This is how `cgroup.controllers` and `cgroup.subtree_control` (v2), and the super options of
    /// a v1 `cgroup` mount, are represented.
    #[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Controllers: u32 {
        const CPU = 1 << 0;
        const CPUACCT = 1 << 1;
        const CPUSET = 1 << 2;
        const MEMORY = 1 << 3;
        const IO = 1 << 4;
        const BLKIO = 1 << 5;
        const PIDS = 1 << 6;
        const DEVICES = 1 << 7;
        const FREEZER = 1 << 8;
        const HUGETLB = 1 << 9;
        const NET_CLS = 1 << 10;
        const NET_PRIO = 1 << 11;
        const PERF_EVENT = 1 << 12;
        const RDMA = 1 << 13;
        const MISC = 1 << 14;
    }
}

impl From<ControllerType> for Controllers {
    fn from(controller: ControllerType) -> Self {
        match controller {
            ControllerType::Cpu => Controllers::CPU,
            ControllerType::CpuAcct => Controllers::CPUACCT,
            ControllerType::CpuSet => Controllers::CPUSET,
            ControllerType::Memory => Controllers::MEMORY,
            ControllerType::Io => Controllers::IO,
            ControllerType::BlkIo => Controllers::BLKIO,
            ControllerType::Pids => Controllers::PIDS,
            ControllerType::Devices => Controllers::DEVICES,
            ControllerType::Freezer => Controllers::FREEZER,
            ControllerType::HugeTlb => Controllers::HUGETLB,
            ControllerType::NetCls => Controllers::NET_CLS,
            ControllerType::NetPrio => Controllers::NET_PRIO,
            ControllerType::PerfEvent => Controllers::PERF_EVENT,
            ControllerType::Rdma => Controllers::RDMA,
            ControllerType::Misc => Controllers::MISC,
        }
    }
}

impl Controllers {
    /// Parses a list of controller names separated by whitespace or commas.
    ///
    /// Names that are not controllers (mount options such as `rw`, named hierarchies such as
    /// `name=systemd`) are skipped.  A leading `+` is accepted, since that is how controllers
    /// are written to `cgroup.subtree_control`; `-name` entries are skipped.
    pub fn from_list(list: &str) -> Controllers {
        list.split(|c: char| c == ',' || c.is_whitespace())
            .map(|name| name.trim_start_matches('+'))
            .filter_map(|name| ControllerType::from_str(name).ok())
            .fold(Controllers::empty(), |set, controller| set | controller.into())
    }

    /// Does this set include the given controller?
    pub fn has(&self, controller: ControllerType) -> bool {
        self.contains(controller.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_names() {
        for name in &["cpu", "cpuacct", "memory", "net_cls", "perf_event", "misc"] {
            let controller = ControllerType::from_str(name).unwrap();
            assert_eq!(&controller.to_string(), name);
        }
        assert!(ControllerType::from_str("name=systemd").is_err());
    }

    #[test]
    fn test_controllers_from_list() {
        let v2 = Controllers::from_list("cpuset cpu io memory hugetlb pids rdma misc\n");
        assert!(v2.has(ControllerType::Cpu));
        assert!(v2.has(ControllerType::Memory));
        assert!(!v2.has(ControllerType::CpuAcct));

        let v1_opts = Controllers::from_list("rw,nosuid,nodev,noexec,relatime,cpu,cpuacct");
        assert_eq!(v1_opts, Controllers::CPU | Controllers::CPUACCT);

        let subtree = Controllers::from_list("+cpu");
        assert_eq!(subtree, Controllers::CPU);

        let removed = Controllers::from_list("-memory");
        assert!(removed.is_empty());

        assert!(Controllers::from_list("").is_empty());
    }
}
