//! Cgroup accounting-file access.
//!
//! The mount layout is resolved exactly once per process, at engine
//! construction. A failed resolution is permanent: every later cgroup
//! query fails fast without re-probing the mount table.

pub mod metrics;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::errors::AgentError;

const JOINED_CPU_SUBTREE: &str = "cpu,cpuacct/system.slice/";
const SPLIT_CPUACCT_SUBTREE: &str = "cpuacct/system.slice/";
const SPLIT_CPU_SUBTREE: &str = "cpu/system.slice/";

/// Resolved cgroup mount layout. Immutable once detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupMount {
    root: String,
    joined_cpu_controllers: bool,
}

impl CgroupMount {
    /// Scans the mount table for the cgroup hierarchy root and determines
    /// the CPU controller layout.
    ///
    /// The winning entry is the first one of filesystem type `cgroup` whose
    /// mount options include `cpuset`; the root is its mount point with the
    /// `cpuset` component removed. The layout probe checks for a joined
    /// `cpu,cpuacct` tree under the root.
    pub fn detect(mounts_path: &Path) -> Result<Self, AgentError> {
        let file = File::open(mounts_path).map_err(|source| {
            AgentError::io(
                format!("cannot open {}", mounts_path.display()),
                source,
            )
        })?;
        Self::detect_from_reader(BufReader::new(file))
    }

    fn detect_from_reader(reader: impl BufRead) -> Result<Self, AgentError> {
        for line in reader.lines() {
            let line = line.map_err(|source| {
                AgentError::io("cannot read mount table".to_string(), source)
            })?;
            let mut fields = line.split_whitespace();
            let _device = fields.next();
            let (Some(mount_point), Some(fs_type), Some(options)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };

            if fs_type != "cgroup" || !options.split(',').any(|option| option == "cpuset") {
                continue;
            }

            let root = mount_point.replace("cpuset", "");
            debug!(root, "detected cgroup mount directory");

            let probe = format!("{root}{}", JOINED_CPU_SUBTREE.trim_end_matches('/'));
            let joined_cpu_controllers = Path::new(&probe).is_dir();
            debug!(
                joined = joined_cpu_controllers,
                "detected cpu controller layout"
            );

            return Ok(Self {
                root,
                joined_cpu_controllers,
            });
        }

        Err(AgentError::unavailable(
            "cannot detect cgroup mount directory",
        ))
    }

    /// Hierarchy root, with trailing separator. Paths are built by plain
    /// concatenation; callers must pass unit names free of path separators.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Subtree holding `cpuacct.stat` for tick metrics.
    pub fn cpu_accounting_subtree(&self) -> &'static str {
        if self.joined_cpu_controllers {
            JOINED_CPU_SUBTREE
        } else {
            SPLIT_CPUACCT_SUBTREE
        }
    }

    /// Subtree holding `cpu.stat` for scheduler metrics.
    pub fn cpu_stat_subtree(&self) -> &'static str {
        if self.joined_cpu_controllers {
            JOINED_CPU_SUBTREE
        } else {
            SPLIT_CPU_SUBTREE
        }
    }
}
