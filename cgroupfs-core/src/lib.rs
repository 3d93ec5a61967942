#![allow(unknown_lints)]
// The suggested fix with `str::parse` loses the explicit radix
#![allow(clippy::from_str_radix_10)]
//! This crate provides data structures and parsing for the files that make up the linux
//! control group (cgroup) filesystems.
//!
//! Nothing in this crate touches the filesystem.  Every type can be built from any
//! [`Read`](std::io::Read) source via the [`FromRead`] and [`FromBufRead`] traits, which makes
//! it possible to parse data captured on another machine, or to test against literal strings.
//! The `cgroupfs` crate builds on top of this one to read and write the live files under
//! `/proc` and `/sys/fs/cgroup`.
//!
//! # Cgroup versions
//!
//! Linux ships two incompatible cgroup interfaces.  Version 1 mounts each controller (or a
//! small group of controllers) as its own hierarchy, and uses signed integers everywhere, with
//! `-1` meaning "no limit".  Version 2 has a single unified hierarchy, requires controllers to
//! be delegated down the tree, and spells "no limit" as the literal `max`.  The types in this
//! crate normalize both spellings so that `-1` always means unbounded.
//!
//! # Cargo features
//!
//! * `serde1` -- Optional.  Derives `Serialize` and `Deserialize` for all data types.
//! * `backtrace` -- Optional.  Captures a stack trace whenever an `InternalError` is raised.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

#[doc(hidden)]
pub trait IntoResult<T, E> {
    fn into(t: Self) -> Result<T, E>;
}

macro_rules! build_internal_error {
    ($err: expr) => {
        crate::CgroupError::InternalError(crate::InternalError {
            msg: format!("Internal Unwrap Error: {}", $err),
            file: file!(),
            line: line!(),
            #[cfg(feature = "backtrace")]
            backtrace: backtrace::Backtrace::new(),
        })
    };
    ($err: expr, $msg: expr) => {
        crate::CgroupError::InternalError(crate::InternalError {
            msg: format!("Internal Unwrap Error: {}: {}", $msg, $err),
            file: file!(),
            line: line!(),
            #[cfg(feature = "backtrace")]
            backtrace: backtrace::Backtrace::new(),
        })
    };
}

// custom NoneError, since std::option::NoneError is nightly-only
// See https://github.com/rust-lang/rust/issues/42327
#[doc(hidden)]
pub struct NoneError;

impl std::fmt::Display for NoneError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "NoneError")
    }
}

impl<T> IntoResult<T, NoneError> for Option<T> {
    fn into(t: Option<T>) -> Result<T, NoneError> {
        t.ok_or(NoneError)
    }
}

impl<T, E> IntoResult<T, E> for Result<T, E> {
    fn into(t: Result<T, E>) -> Result<T, E> {
        t
    }
}

macro_rules! expect {
    ($e:expr) => {
        match crate::IntoResult::into($e) {
            Ok(v) => v,
            Err(e) => return Err(build_internal_error!(e)),
        }
    };
    ($e:expr, $msg:expr) => {
        match crate::IntoResult::into($e) {
            Ok(v) => v,
            Err(e) => return Err(build_internal_error!(e, $msg)),
        }
    };
}

macro_rules! from_str {
    ($t:tt, $e:expr) => {{
        let e = $e;
        expect!(
            $t::from_str_radix(e, 10),
            format!("Failed to parse {} ({:?}) as a {}", stringify!($e), e, stringify!($t),)
        )
    }};
}

mod controller;
pub use controller::*;

mod version;
pub use version::*;

mod cgroups;
pub use cgroups::*;

mod mounts;
pub use mounts::*;

mod value;
pub use value::*;

mod cpu;
pub use cpu::*;

/// A type that can be parsed from any [`Read`] source.
pub trait FromRead: Sized {
    /// Read the type from a Read.
    fn from_read<R: Read>(r: R) -> CgroupResult<Self>;
}

/// A type that can be parsed from a buffered reader, usually line by line.
///
/// Every `FromBufRead` type is also [`FromRead`].
pub trait FromBufRead: Sized {
    fn from_buf_read<R: BufRead>(r: R) -> CgroupResult<Self>;
}

impl<T: FromBufRead> FromRead for T {
    fn from_read<R: Read>(r: R) -> CgroupResult<Self> {
        Self::from_buf_read(BufReader::new(r))
    }
}

/// An io error that remembers the path that caused it.
///
/// This is attached as the inner error of a [`std::io::Error`] so that the conversion into
/// [`CgroupError`] can recover the path.
#[doc(hidden)]
#[derive(Debug)]
pub struct IoErrorWrapper {
    pub path: PathBuf,
    pub inner: std::io::Error,
}

impl std::error::Error for IoErrorWrapper {}

impl fmt::Display for IoErrorWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IoErrorWrapper({}): {}", self.path.display(), self.inner)
    }
}

/// The result type for cgroup operations.
pub type CgroupResult<T> = Result<T, CgroupError>;

/// The various error conditions of cgroup operations.
///
/// The first group of variants describe problems with the underlying files.  The last three
/// describe cgroup level conditions that callers are expected to match on.
pub enum CgroupError {
    /// A standard permission denied error.
    ///
    /// This will be a common error, since some interface files are only writable by root, and
    /// a delegated hierarchy may belong to another user.
    PermissionDenied(Option<PathBuf>),
    /// This might mean that the process no longer exists, or that a controller's interface
    /// file is missing from this cgroup directory.
    NotFound(Option<PathBuf>),
    /// This might mean that a file was unexpectedly short.
    Incomplete(Option<PathBuf>),
    /// Any other IO error (rare).
    Io(std::io::Error, Option<PathBuf>),
    /// Any other non-IO error, including malformed interface file content.
    Other(String),
    /// This error indicates that some unexpected error occurred.  This is a bug.  The inner
    /// [InternalError] struct will contain some more info.
    ///
    /// If you ever encounter this error, consider it a bug in the cgroupfs crate.
    InternalError(InternalError),
    /// The process has no cgroup membership (or no mounted hierarchy) for the controller.
    ControllerNotFound(ControllerType),
    /// The operation has no interface file in the bound cgroup version.
    InterfaceNotSupported {
        interface: &'static str,
        version: CgroupVersion,
    },
    /// No cgroup between the current one and the hierarchy root supports the controller, so it
    /// cannot be delegated to a new child.
    ControllerNotDelegable { controller: ControllerType, root: PathBuf },
}

impl CgroupError {
    /// Attach a path to this error, if it doesn't already carry one.
    pub fn with_path<P: AsRef<Path>>(self, path: P) -> CgroupError {
        let path = path.as_ref().to_owned();
        match self {
            CgroupError::PermissionDenied(None) => CgroupError::PermissionDenied(Some(path)),
            CgroupError::NotFound(None) => CgroupError::NotFound(Some(path)),
            CgroupError::Incomplete(None) => CgroupError::Incomplete(Some(path)),
            CgroupError::Io(e, None) => CgroupError::Io(e, Some(path)),
            other => other,
        }
    }
}

/// An internal error in the cgroupfs crate
///
/// If you encounter this error, consider it a bug and please report it.
///
/// If you compile with the optional `backtrace` feature, you can gain access to a stack trace
/// of where the error happened.
pub struct InternalError {
    pub msg: String,
    pub file: &'static str,
    pub line: u32,
    #[cfg(feature = "backtrace")]
    pub backtrace: backtrace::Backtrace,
}

impl std::fmt::Debug for InternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bug at {}:{} (please report this cgroupfs bug)\n{}",
            self.file, self.line, self.msg
        )
    }
}

impl std::fmt::Display for InternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bug at {}:{} (please report this cgroupfs bug)\n{}",
            self.file, self.line, self.msg
        )
    }
}

impl std::fmt::Debug for CgroupError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CgroupError::PermissionDenied(p) => f.debug_tuple("PermissionDenied").field(p).finish(),
            CgroupError::NotFound(p) => f.debug_tuple("NotFound").field(p).finish(),
            CgroupError::Incomplete(p) => f.debug_tuple("Incomplete").field(p).finish(),
            CgroupError::Io(e, p) => f.debug_tuple("Io").field(e).field(p).finish(),
            CgroupError::Other(s) => f.debug_tuple("Other").field(s).finish(),
            CgroupError::InternalError(e) => f.debug_tuple("InternalError").field(e).finish(),
            CgroupError::ControllerNotFound(c) => f.debug_tuple("ControllerNotFound").field(c).finish(),
            CgroupError::InterfaceNotSupported { interface, version } => f
                .debug_struct("InterfaceNotSupported")
                .field("interface", interface)
                .field("version", version)
                .finish(),
            CgroupError::ControllerNotDelegable { controller, root } => f
                .debug_struct("ControllerNotDelegable")
                .field("controller", controller)
                .field("root", root)
                .finish(),
        }
    }
}

impl std::fmt::Display for CgroupError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            // Variants with paths:
            CgroupError::PermissionDenied(Some(p)) => write!(f, "Permission Denied: {}", p.display()),
            CgroupError::NotFound(Some(p)) => write!(f, "File not found: {}", p.display()),
            CgroupError::Incomplete(Some(p)) => write!(f, "Data incomplete: {}", p.display()),
            CgroupError::Io(inner, Some(p)) => {
                write!(f, "Unexpected IO error({}): {}", p.display(), inner)
            }
            // Variants without paths:
            CgroupError::PermissionDenied(None) => write!(f, "Permission Denied"),
            CgroupError::NotFound(None) => write!(f, "File not found"),
            CgroupError::Incomplete(None) => write!(f, "Data incomplete"),
            CgroupError::Io(inner, None) => write!(f, "Unexpected IO error: {}", inner),

            CgroupError::Other(s) => write!(f, "Unknown error {}", s),
            CgroupError::InternalError(e) => write!(f, "Internal error: {}", e),

            CgroupError::ControllerNotFound(controller) => write!(f, "'{}' not found", controller),
            CgroupError::InterfaceNotSupported { interface, version } => {
                write!(f, "Interface file {} is not supported in cGroup {}", interface, version)
            }
            CgroupError::ControllerNotDelegable { controller, root } => {
                write!(f, "Controller '{}' is not supported under {}", controller, root.display())
            }
        }
    }
}

impl std::error::Error for CgroupError {}

impl From<std::io::Error> for CgroupError {
    fn from(io: std::io::Error) -> Self {
        use std::io::ErrorKind;
        let kind = io.kind();
        // the only way we'll have a path for the IO error is if this IO error
        // has an inner IoErrorWrapper
        let wrapped = io.get_ref().map_or(false, |inner| inner.is::<IoErrorWrapper>());
        if wrapped {
            match io.into_inner().map(|inner| inner.downcast::<IoErrorWrapper>()) {
                Some(Ok(wrapper)) => {
                    let path = wrapper.path;
                    match kind {
                        ErrorKind::PermissionDenied => CgroupError::PermissionDenied(Some(path)),
                        ErrorKind::NotFound => CgroupError::NotFound(Some(path)),
                        ErrorKind::UnexpectedEof => CgroupError::Incomplete(Some(path)),
                        _other => CgroupError::Io(wrapper.inner, Some(path)),
                    }
                }
                Some(Err(inner)) => CgroupError::Io(io::Error::new(kind, inner), None),
                None => CgroupError::Io(io::Error::from(kind), None),
            }
        } else {
            match kind {
                ErrorKind::PermissionDenied => CgroupError::PermissionDenied(None),
                ErrorKind::NotFound => CgroupError::NotFound(None),
                ErrorKind::UnexpectedEof => CgroupError::Incomplete(None),
                _other => CgroupError::Io(io, None),
            }
        }
    }
}

impl From<std::num::ParseIntError> for CgroupError {
    fn from(val: std::num::ParseIntError) -> Self {
        CgroupError::Other(format!("ParseIntError: {}", val))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cgroup_error_messages() {
        let e = CgroupError::ControllerNotFound(ControllerType::Cpu);
        assert_eq!(e.to_string(), "'cpu' not found");

        let e = CgroupError::InterfaceNotSupported {
            interface: "max_usage_in_bytes",
            version: CgroupVersion::V2,
        };
        assert_eq!(
            e.to_string(),
            "Interface file max_usage_in_bytes is not supported in cGroup v2"
        );

        let e = CgroupError::ControllerNotDelegable {
            controller: ControllerType::Memory,
            root: PathBuf::from("/sys/fs/cgroup"),
        };
        assert_eq!(e.to_string(), "Controller 'memory' is not supported under /sys/fs/cgroup");
    }

    #[test]
    fn test_io_error_conversion() {
        let wrapped = io::Error::new(
            io::ErrorKind::NotFound,
            IoErrorWrapper {
                path: PathBuf::from("/sys/fs/cgroup/cpu.max"),
                inner: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        match CgroupError::from(wrapped) {
            CgroupError::NotFound(Some(p)) => assert_eq!(p, Path::new("/sys/fs/cgroup/cpu.max")),
            x => panic!("Unexpected conversion: {:?}", x),
        }

        let bare = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(CgroupError::from(bare), CgroupError::PermissionDenied(None)));

        let e = CgroupError::from(io::Error::from(io::ErrorKind::NotFound)).with_path("/x");
        assert!(matches!(e, CgroupError::NotFound(Some(_))));
    }

    #[test]
    fn test_parse_errors_are_not_internal() {
        let e: CgroupError = "abc".parse::<i64>().unwrap_err().into();
        assert!(matches!(e, CgroupError::Other(_)));
    }
}
