use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// The cgroup interface version of a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum CgroupVersion {
    /// Legacy per-controller hierarchies (filesystem type `cgroup`)
    V1,
    /// The unified hierarchy (filesystem type `cgroup2`)
    V2,
}

impl CgroupVersion {
    /// Maps a filesystem type, as found in `/proc/<pid>/mountinfo`, to a cgroup version.
    pub fn from_fs_type(fs_type: &str) -> Option<CgroupVersion> {
        match fs_type {
            "cgroup" => Some(CgroupVersion::V1),
            "cgroup2" => Some(CgroupVersion::V2),
            _ => None,
        }
    }

    pub fn is_v1(&self) -> bool {
        *self == CgroupVersion::V1
    }
}

impl fmt::Display for CgroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CgroupVersion::V1 => write!(f, "v1"),
            CgroupVersion::V2 => write!(f, "v2"),
        }
    }
}
