use crate::{CgroupResult, ControllerType, FromBufRead};
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};
use std::io::BufRead;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
/// Container group controller information, from `/proc/cgroups`.
pub struct CgroupSubsystem {
    /// The name of the controller.
    pub name: String,
    /// The unique ID of the cgroup hierarchy on which this controller is mounted.
    ///
    /// If multiple cgroups v1 controllers are bound to the same hierarchy, then each will show
    /// the same hierarchy ID in this field.  The value in this field will be 0 if:
    ///
    /// * the controller is not mounted on a cgroups v1 hierarchy;
    /// * the controller is bound to the cgroups v2 single unified hierarchy; or
    /// * the controller is disabled (see below).
    pub hierarchy: u32,
    /// The number of control groups in this hierarchy using this controller.
    pub num_cgroups: u32,
    /// This field contains the value `true` if this controller is enabled, or `false` if it has been disabled
    pub enabled: bool,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
/// Container group controller information, from `/proc/cgroups`.
pub struct CgroupSubsystems(pub Vec<CgroupSubsystem>);

impl FromBufRead for CgroupSubsystems {
    fn from_buf_read<R: BufRead>(r: R) -> CgroupResult<Self> {
        let mut vec = Vec::new();

        for line in r.lines() {
            let line = line?;
            if line.starts_with('#') {
                continue;
            }

            let mut s = line.split_whitespace();
            let name = expect!(s.next(), "name").to_owned();
            let hierarchy = from_str!(u32, expect!(s.next(), "hierarchy"));
            let num_cgroups = from_str!(u32, expect!(s.next(), "num_cgroups"));
            let enabled = expect!(s.next(), "enabled") == "1";

            vec.push(CgroupSubsystem {
                name,
                hierarchy,
                num_cgroups,
                enabled,
            });
        }

        Ok(CgroupSubsystems(vec))
    }
}

impl CgroupSubsystems {
    /// Is the controller compiled into the kernel and enabled?
    pub fn is_enabled(&self, controller: ControllerType) -> bool {
        self.0
            .iter()
            .any(|subsys| subsys.enabled && subsys.name == controller.as_str())
    }
}

/// Information about a process cgroup
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct ProcessCgroup {
    /// For cgroups version 1 hierarchies, this field contains a unique hierarchy ID number
    /// that can be matched to a hierarchy ID in /proc/cgroups.  For the cgroups version 2
    /// hierarchy, this field contains the value 0.
    pub hierarchy: u32,
    /// For cgroups version 1 hierarchies, this field contains a comma-separated list of the
    /// controllers bound to the hierarchy.
    ///
    /// For the cgroups version 2 hierarchy, this field is empty.
    pub controllers: Vec<String>,

    /// This field contains the pathname of the control group in the hierarchy to which the process
    /// belongs.
    ///
    /// This pathname is relative to the mount point of the hierarchy.
    pub pathname: String,
}

impl ProcessCgroup {
    /// Is this the membership line of the cgroup v2 unified hierarchy (`0::<path>`)?
    pub fn is_unified(&self) -> bool {
        self.hierarchy == 0 && self.controllers.is_empty()
    }

    /// Is the controller bound to this (v1) hierarchy?
    pub fn controls(&self, controller: ControllerType) -> bool {
        self.controllers.iter().any(|name| name == controller.as_str())
    }
}

/// The cgroups to which a process belongs, from `/proc/<pid>/cgroup`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct ProcessCgroups(pub Vec<ProcessCgroup>);

impl FromBufRead for ProcessCgroups {
    fn from_buf_read<R: BufRead>(reader: R) -> CgroupResult<Self> {
        let mut vec = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            let mut s = line.splitn(3, ':');
            let hierarchy = from_str!(u32, expect!(s.next(), "hierarchy"));
            let controllers = expect!(s.next(), "controllers")
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_owned())
                .collect();
            let pathname = expect!(s.next(), "path").to_owned();

            vec.push(ProcessCgroup {
                hierarchy,
                controllers,
                pathname,
            });
        }

        Ok(ProcessCgroups(vec))
    }
}

impl ProcessCgroups {
    /// The v1 membership line whose hierarchy the controller is bound to.
    pub fn find_v1(&self, controller: ControllerType) -> Option<&ProcessCgroup> {
        self.0.iter().find(|cgroup| cgroup.controls(controller))
    }

    /// The membership line of the v2 unified hierarchy.
    pub fn find_unified(&self) -> Option<&ProcessCgroup> {
        self.0.iter().find(|cgroup| cgroup.is_unified())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProcessCgroup> {
        self.0.iter()
    }
}

impl IntoIterator for ProcessCgroups {
    type IntoIter = std::vec::IntoIter<ProcessCgroup>;
    type Item = ProcessCgroup;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ProcessCgroups {
    type IntoIter = std::slice::Iter<'a, ProcessCgroup>;
    type Item = &'a ProcessCgroup;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FromRead;

    #[test]
    fn test_process_cgroups_hybrid() {
        let data = r#"12:cpu,cpuacct:/user.slice
11:memory:/user.slice/user-1000.slice/session-2.scope
1:name=systemd:/user.slice/user-1000.slice/session-2.scope
0::/user.slice/user-1000.slice/session-2.scope
"#;
        let r = std::io::Cursor::new(data.as_bytes());
        let cgroups = ProcessCgroups::from_read(r).unwrap();
        assert_eq!(cgroups.0.len(), 4);

        let cpu = cgroups.find_v1(ControllerType::Cpu).unwrap();
        assert_eq!(cpu.hierarchy, 12);
        assert_eq!(cpu.pathname, "/user.slice");
        assert!(cgroups.find_v1(ControllerType::CpuAcct).is_some());
        assert!(cgroups.find_v1(ControllerType::Pids).is_none());

        let unified = cgroups.find_unified().unwrap();
        assert_eq!(unified.pathname, "/user.slice/user-1000.slice/session-2.scope");

        let named = cgroups.iter().find(|c| c.hierarchy == 1).unwrap();
        assert_eq!(named.controllers, vec!["name=systemd".to_owned()]);
        assert!(!named.is_unified());
    }

    #[test]
    fn test_process_cgroups_unified() {
        let r = std::io::Cursor::new(&b"0::/\n"[..]);
        let cgroups = ProcessCgroups::from_read(r).unwrap();
        let unified = cgroups.find_unified().unwrap();
        assert_eq!(unified.pathname, "/");
        assert!(cgroups.find_v1(ControllerType::Memory).is_none());
    }

    #[test]
    fn test_process_cgroups_malformed() {
        let r = std::io::Cursor::new(&b"x:cpu:/"[..]);
        assert!(ProcessCgroups::from_read(r).is_err());
    }

    #[test]
    fn test_cgroup_subsystems() {
        let data = r#"#subsys_name	hierarchy	num_cgroups	enabled
cpuset	0	121	1
cpu	0	121	1
cpuacct	0	121	1
memory	0	121	0
"#;
        let r = std::io::Cursor::new(data.as_bytes());
        let subsystems = CgroupSubsystems::from_read(r).unwrap();
        assert_eq!(subsystems.0.len(), 4);
        assert_eq!(subsystems.0[1].name, "cpu");
        assert_eq!(subsystems.0[1].num_cgroups, 121);
        assert!(subsystems.is_enabled(ControllerType::Cpu));
        assert!(!subsystems.is_enabled(ControllerType::Memory));
        assert!(!subsystems.is_enabled(ControllerType::Pids));
    }

    #[cfg(feature = "serde1")]
    #[test]
    fn test_process_cgroups_serde() {
        let r = std::io::Cursor::new(&b"4:memory:/docker/abc\n"[..]);
        let cgroups = ProcessCgroups::from_read(r).unwrap();
        let json = serde_json::to_string(&cgroups).unwrap();
        let back: ProcessCgroups = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cgroups);
    }
}
