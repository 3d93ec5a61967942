use crate::{CgroupResult, CgroupVersion};

/// The value of an unbounded limit, in every cgroup version.
pub const UNBOUNDED: i64 = -1;

/// How cgroup v2 spells an unbounded limit.
pub const UNBOUNDED_V2: &str = "max";

/// Parses a limit as written in an interface file into a signed integer.
///
/// v1 files already hold `-1` for unbounded limits.  In v2 the literal `max` is normalized to
/// [`UNBOUNDED`].
pub fn parse_limit(version: CgroupVersion, raw: &str) -> CgroupResult<i64> {
    let raw = raw.trim();
    match version {
        CgroupVersion::V2 if raw == UNBOUNDED_V2 => Ok(UNBOUNDED),
        _ => Ok(raw.parse::<i64>()?),
    }
}

/// Formats a limit the way the interface files of the given version expect it.
///
/// This is the inverse of [`parse_limit`].
pub fn format_limit(version: CgroupVersion, value: i64) -> String {
    match version {
        CgroupVersion::V2 if value == UNBOUNDED => UNBOUNDED_V2.to_owned(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v2_limits() {
        assert_eq!(parse_limit(CgroupVersion::V2, "max").unwrap(), -1);
        assert_eq!(parse_limit(CgroupVersion::V2, "max\n").unwrap(), -1);
        assert_eq!(parse_limit(CgroupVersion::V2, "134217728").unwrap(), 134217728);
        assert_eq!(format_limit(CgroupVersion::V2, -1), "max");
        assert_eq!(format_limit(CgroupVersion::V2, 0), "0");

        for raw in &["max", "0", "50", "9223372036854771712"] {
            let value = parse_limit(CgroupVersion::V2, raw).unwrap();
            assert_eq!(&format_limit(CgroupVersion::V2, value), raw);
        }
    }

    #[test]
    fn test_v1_limits() {
        assert_eq!(parse_limit(CgroupVersion::V1, "-1").unwrap(), -1);
        assert_eq!(format_limit(CgroupVersion::V1, -1), "-1");
        assert!(parse_limit(CgroupVersion::V1, "max").is_err());
        assert!(parse_limit(CgroupVersion::V2, "").is_err());
    }
}
