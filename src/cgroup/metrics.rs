//! Line scanners for the per-subsystem accounting files.
//!
//! Each subsystem has its own tokenization rules; all of them open, scan
//! and close the file within one query. Keys prefix-match with a mandatory
//! following space so `rss` never matches an `rss_huge` line.

use std::fs::File;
use std::io::{BufRead, BufReader};

use tracing::debug;

use super::CgroupMount;
use crate::errors::AgentError;

/// Tick metrics read from `cpuacct.stat` and normalized by CPU count.
const TICK_METRICS: [&str; 3] = ["user", "system", "total"];

/// Memory metric: first line of `memory.stat` whose leading token equals
/// the key, value taken from the following token.
pub fn memory_metric(mount: &CgroupMount, unit: &str, key: &str) -> Result<u64, AgentError> {
    let path = format!("{}memory/system.slice/{unit}/memory.stat", mount.root());
    debug!(path, key, "reading memory metric");
    let file = File::open(&path)
        .map_err(|source| AgentError::io("cannot open memory.stat file", source))?;

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| AgentError::io("cannot read memory.stat file", source))?;
        let Some(rest) = matched_rest(&line, key) else {
            continue;
        };
        if let Some(value) = first_u64(rest) {
            return Ok(value);
        }
    }

    Err(AgentError::not_found(
        "cannot find a line with requested metric in memory.stat file",
    ))
}

/// CPU metric, summed across matching lines.
///
/// Keys `user`, `system` and `total` read `cpuacct.stat`; anything else
/// reads `cpu.stat`. For `total` every parseable line contributes its
/// second token regardless of the leading one. The sum of a tick metric is
/// divided by `online_cpus` when that count exceeds one.
pub fn cpu_metric(
    mount: &CgroupMount,
    unit: &str,
    key: &str,
    online_cpus: u64,
) -> Result<u64, AgentError> {
    let tick_metric = TICK_METRICS.contains(&key);
    let (subtree, stat_file) = if tick_metric {
        (mount.cpu_accounting_subtree(), "cpuacct.stat")
    } else {
        (mount.cpu_stat_subtree(), "cpu.stat")
    };

    let path = format!("{}{subtree}{unit}/{stat_file}", mount.root());
    debug!(path, key, "reading cpu metric");
    let file = File::open(&path)
        .map_err(|source| AgentError::io(format!("cannot open {stat_file} file"), source))?;

    let mut sum = 0u64;
    let mut matched = false;
    for line in BufReader::new(file).lines() {
        let line =
            line.map_err(|source| AgentError::io(format!("cannot read {stat_file} file"), source))?;
        if key != "total" && matched_rest(&line, key).is_none() {
            continue;
        }
        let Some(value) = second_token_u64(&line) else {
            continue;
        };
        sum += value;
        matched = true;
    }

    if !matched {
        return Err(AgentError::not_found(
            "cannot find a line with requested metric in cpuacct.stat/cpu.stat file",
        ));
    }

    if tick_metric {
        sum = normalize_ticks(sum, online_cpus);
    }
    Ok(sum)
}

/// Block-I/O metric from a caller-supplied stat file.
///
/// The first line whose leading token equals the key decides the outcome:
/// its value is the second token, or the third for per-device lines such
/// as `8:0 Read 1234`.
pub fn blkio_metric(
    mount: &CgroupMount,
    unit: &str,
    stat_file: &str,
    key: &str,
) -> Result<u64, AgentError> {
    let path = format!("{}blkio/system.slice/{unit}/{stat_file}", mount.root());
    debug!(path, key, "reading blkio metric");
    let file = File::open(&path).map_err(|source| {
        AgentError::io(
            "cannot open stat file, probably CONFIG_DEBUG_BLK_CGROUP is not enabled",
            source,
        )
    })?;

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| AgentError::io("cannot read stat file", source))?;
        let Some(rest) = matched_rest(&line, key) else {
            continue;
        };
        let mut tokens = rest.split_whitespace();
        let second = tokens.next().and_then(|token| token.parse::<u64>().ok());
        if let Some(value) = second {
            return Ok(value);
        }
        // Per-device layout: "<key> <subkey> <value>".
        if let Some(value) = tokens.next().and_then(|token| token.parse::<u64>().ok()) {
            return Ok(value);
        }
        break;
    }

    Err(AgentError::not_found(
        "cannot find a line with requested metric in blkio file",
    ))
}

/// Divides accumulated tick counters by the online CPU count, skipping the
/// pointless division for single-CPU hosts.
fn normalize_ticks(value: u64, online_cpus: u64) -> u64 {
    if online_cpus > 1 {
        value / online_cpus
    } else {
        value
    }
}

/// Remainder of the line after `"<key> "`, or `None` when the leading token
/// differs from the key.
fn matched_rest<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.strip_prefix(key)?.strip_prefix(' ')
}

fn first_u64(rest: &str) -> Option<u64> {
    rest.split_whitespace().next()?.parse().ok()
}

fn second_token_u64(line: &str) -> Option<u64> {
    line.split_whitespace().nth(1)?.parse().ok()
}
