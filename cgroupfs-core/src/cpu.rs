use std::collections::HashMap;
use std::io::BufRead;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::{CgroupError, CgroupResult, FromBufRead, UNBOUNDED};

/// CPU bandwidth limit of a cgroup.
///
/// In every period of `period` microseconds, the cgroup may run for at most `quota`
/// microseconds (summed over all CPUs).  A quota of `-1` means the cgroup is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct CpuLimitParams {
    /// Length of an enforcement period, in microseconds
    pub period: u64,
    /// Runtime allowed per period, in microseconds, or -1
    pub quota: i64,
}

impl CpuLimitParams {
    pub fn is_unbounded(&self) -> bool {
        self.quota == UNBOUNDED
    }

    /// Parses a period as found in `cpu.cfs_period_us` or the second field of `cpu.max`.
    ///
    /// The kernel never reports a zero period; one is treated as a malformed file.
    pub fn parse_period(s: &str) -> CgroupResult<u64> {
        match s.trim().parse::<u64>()? {
            0 => Err(CgroupError::Other(format!("Invalid cpu period: {:?}", s))),
            period => Ok(period),
        }
    }

    /// The limit expressed in cores: `quota / period`, or `-1.0` when unbounded.
    ///
    /// `period` must be non-zero, which [`CpuLimitParams::parse_period`] guarantees.
    pub fn cores(&self) -> f64 {
        if self.is_unbounded() {
            return -1.0;
        }
        self.quota as f64 / self.period as f64
    }

    /// The quota that limits a cgroup to `cores` CPUs with the given period.
    ///
    /// The result is truncated, never rounded: with a period of 100, `0.505` cores is a quota
    /// of 50.
    pub fn quota_for_cores(period: u64, cores: f64) -> i64 {
        (period as f64 * cores).floor() as i64
    }
}

/// CPU statistics from `cpu.stat`.
///
/// The set of keys differs between cgroup versions and kernel releases (v1 has `nr_periods`,
/// `nr_throttled` and `throttled_time`, v2 adds `usage_usec`, `user_usec` and `system_usec`),
/// so this is a map rather than a struct.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct CpuStat(pub HashMap<String, u64>);

impl FromBufRead for CpuStat {
    fn from_buf_read<R: BufRead>(r: R) -> CgroupResult<Self> {
        let mut map = HashMap::new();

        for line in r.lines() {
            let line = line?;
            let mut s = line.split_whitespace();
            let key = match s.next() {
                Some(key) => key,
                None => continue,
            };
            let value = s
                .next()
                .ok_or_else(|| CgroupError::Other(format!("Malformed cpu.stat line: {:?}", line)))?;
            map.insert(key.to_owned(), value.parse::<u64>()?);
        }

        Ok(CpuStat(map))
    }
}

impl CpuStat {
    pub fn get(&self, key: &str) -> Option<u64> {
        self.0.get(key).copied()
    }
}
