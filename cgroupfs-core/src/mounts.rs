use std::io::BufRead;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::{CgroupResult, CgroupVersion, ControllerType, Controllers, FromBufRead};

/// A mounted cgroup hierarchy, from a line of `/proc/<pid>/mountinfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct CgroupMount {
    /// The pathname of the directory in the hierarchy that forms the root of this mount.
    ///
    /// This is `/` unless a sub-tree of the hierarchy was mounted (or bind mounted into a
    /// container without a cgroup namespace).
    pub root: String,
    /// Where the hierarchy is mounted, relative to the process's root directory.
    pub mount_point: PathBuf,
    /// `cgroup` mounts are v1, `cgroup2` mounts are v2.
    pub version: CgroupVersion,
    /// The controllers bound to a v1 hierarchy, from the super options.
    ///
    /// Always empty for v2, where controllers are listed in `cgroup.controllers` instead.
    pub controllers: Controllers,
}

impl CgroupMount {
    /// Maps a membership path from `/proc/<pid>/cgroup` to a directory under this mount.
    pub fn cgroup_path(&self, pathname: &str) -> PathBuf {
        let root = self.root.trim_end_matches('/');
        let relative = match pathname.strip_prefix(root) {
            Some(rest) if !root.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
            _ => pathname,
        };
        let relative = relative.trim_start_matches('/');
        if relative.is_empty() {
            self.mount_point.clone()
        } else {
            self.mount_point.join(relative)
        }
    }
}

/// The cgroup hierarchies mounted in a mount namespace.
///
/// Mounts of every other filesystem type are skipped while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct CgroupMounts(pub Vec<CgroupMount>);

impl FromBufRead for CgroupMounts {
    fn from_buf_read<R: BufRead>(r: R) -> CgroupResult<Self> {
        let mut vec = Vec::new();

        for line in r.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            // the optional fields are terminated by a single hyphen
            let mut halves = line.splitn(2, " - ");
            let mut mount = expect!(halves.next(), "mount fields").split(' ');
            let mut fs = expect!(halves.next(), "filesystem fields").split(' ');

            let fs_type = expect!(fs.next(), "fs_type");
            let version = match CgroupVersion::from_fs_type(fs_type) {
                Some(version) => version,
                None => continue,
            };
            let _source = expect!(fs.next(), "mount_source");
            let super_options = fs.next().unwrap_or("");

            let root = unmangle_octal(expect!(mount.nth(3), "root"));
            let mount_point = PathBuf::from(unmangle_octal(expect!(mount.next(), "mount_point")));

            let controllers = match version {
                CgroupVersion::V1 => Controllers::from_list(super_options),
                CgroupVersion::V2 => Controllers::empty(),
            };

            vec.push(CgroupMount {
                root,
                mount_point,
                version,
                controllers,
            });
        }

        Ok(CgroupMounts(vec))
    }
}

impl CgroupMounts {
    /// Finds the hierarchy that serves a controller.
    ///
    /// A v1 hierarchy with the controller bound to it takes precedence.  Otherwise the v2
    /// unified hierarchy is returned, since every controller not claimed by a v1 hierarchy is
    /// available there.
    pub fn find(&self, controller: ControllerType) -> Option<&CgroupMount> {
        self.0
            .iter()
            .find(|m| m.version == CgroupVersion::V1 && m.controllers.has(controller))
            .or_else(|| self.unified())
    }

    /// The v2 unified hierarchy, if mounted.
    pub fn unified(&self) -> Option<&CgroupMount> {
        self.0.iter().find(|m| m.version == CgroupVersion::V2)
    }

    /// Finds the mount whose mount point is the longest prefix of `path`.
    pub fn containing<P: AsRef<Path>>(&self, path: P) -> Option<&CgroupMount> {
        let path = path.as_ref();
        self.0
            .iter()
            .filter(|m| path.starts_with(&m.mount_point))
            .max_by_key(|m| m.mount_point.components().count())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CgroupMount> {
        self.0.iter()
    }
}

impl IntoIterator for CgroupMounts {
    type IntoIter = std::vec::IntoIter<CgroupMount>;
    type Item = CgroupMount;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Undo the octal escaping the kernel applies to space, tab, newline and backslash in
/// mountinfo paths.
fn unmangle_octal(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(idx) = rest.find('\\') {
        output.push_str(&rest[..idx]);
        let escape = rest.get(idx + 1..idx + 4);
        match escape.and_then(|oct| u8::from_str_radix(oct, 8).ok()) {
            Some(byte) => {
                output.push(byte as char);
                rest = &rest[idx + 4..];
            }
            None => {
                output.push('\\');
                rest = &rest[idx + 1..];
            }
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FromRead;

    const HYBRID: &str = r#"22 1 259:2 / / rw,relatime shared:1 - ext4 /dev/nvme0n1p2 rw
25 22 0:21 / /sys/fs/cgroup ro,nosuid,nodev,noexec shared:9 - tmpfs tmpfs ro,mode=755
26 25 0:22 / /sys/fs/cgroup/unified rw,nosuid,nodev,noexec,relatime shared:10 - cgroup2 cgroup2 rw,nsdelegate
27 25 0:23 / /sys/fs/cgroup/systemd rw,nosuid,nodev,noexec,relatime shared:11 - cgroup cgroup rw,xattr,name=systemd
31 25 0:27 / /sys/fs/cgroup/cpu,cpuacct rw,nosuid,nodev,noexec,relatime shared:15 - cgroup cgroup rw,cpu,cpuacct
33 25 0:29 / /sys/fs/cgroup/memory rw,nosuid,nodev,noexec,relatime shared:17 - cgroup cgroup rw,memory
"#;

    #[test]
    fn test_hybrid_mounts() {
        let mounts = CgroupMounts::from_read(std::io::Cursor::new(HYBRID.as_bytes())).unwrap();
        assert_eq!(mounts.0.len(), 4);

        let cpu = mounts.find(ControllerType::Cpu).unwrap();
        assert_eq!(cpu.version, CgroupVersion::V1);
        assert_eq!(cpu.mount_point, Path::new("/sys/fs/cgroup/cpu,cpuacct"));
        assert!(cpu.controllers.has(ControllerType::CpuAcct));

        let memory = mounts.find(ControllerType::Memory).unwrap();
        assert_eq!(memory.mount_point, Path::new("/sys/fs/cgroup/memory"));

        // not bound to any v1 hierarchy, so the unified one serves it
        let pids = mounts.find(ControllerType::Pids).unwrap();
        assert_eq!(pids.version, CgroupVersion::V2);
        assert_eq!(pids.mount_point, Path::new("/sys/fs/cgroup/unified"));

        let containing = mounts.containing("/sys/fs/cgroup/memory/docker/abc").unwrap();
        assert_eq!(containing.mount_point, Path::new("/sys/fs/cgroup/memory"));
    }

    #[test]
    fn test_unified_mounts() {
        let data = concat!(
            "30 22 0:26 / /sys/fs/cgroup rw,nosuid,nodev,noexec,relatime shared:4 ",
            "- cgroup2 cgroup2 rw,nsdelegate,memory_recursiveprot\n",
        );
        let mounts = CgroupMounts::from_read(std::io::Cursor::new(data.as_bytes())).unwrap();
        let cpu = mounts.find(ControllerType::Cpu).unwrap();
        assert_eq!(cpu.version, CgroupVersion::V2);
        assert!(cpu.controllers.is_empty());
        assert_eq!(mounts.find(ControllerType::Memory), Some(cpu));

        let none = CgroupMounts::from_read(std::io::Cursor::new(&b""[..])).unwrap();
        assert!(none.find(ControllerType::Cpu).is_none());
    }

    #[test]
    fn test_cgroup_path() {
        let mount = CgroupMount {
            root: "/".to_owned(),
            mount_point: PathBuf::from("/root_path"),
            version: CgroupVersion::V1,
            controllers: Controllers::CPU,
        };
        assert_eq!(mount.cgroup_path("/dummy"), Path::new("/root_path/dummy"));
        assert_eq!(mount.cgroup_path("/"), Path::new("/root_path"));

        let bind = CgroupMount {
            root: "/docker/abc".to_owned(),
            mount_point: PathBuf::from("/sys/fs/cgroup"),
            version: CgroupVersion::V2,
            controllers: Controllers::empty(),
        };
        assert_eq!(bind.cgroup_path("/docker/abc/worker"), Path::new("/sys/fs/cgroup/worker"));
        assert_eq!(bind.cgroup_path("/docker/abc"), Path::new("/sys/fs/cgroup"));
    }

    #[test]
    fn test_unmangle_octal() {
        assert_eq!(unmangle_octal(r"/mnt/my\040cgroup"), "/mnt/my cgroup");
        assert_eq!(unmangle_octal(r"/a\134b"), r"/a\b");
        assert_eq!(unmangle_octal(r"/trailing\"), r"/trailing\");
        assert_eq!(unmangle_octal("/plain"), "/plain");
    }
}
