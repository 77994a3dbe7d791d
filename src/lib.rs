//! Systemd metrics extraction over the system bus and the cgroup v1 tree.
//!
//! [`Engine`] holds the process-wide state: a lazily connected bus session
//! and the cgroup mount layout resolved once at construction. Everything
//! else is evaluated per query through [`Engine::query`].

pub mod bus;
pub mod cgroup;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod items;
pub mod logging;
pub mod unit;

use tracing::warn;

use crate::bus::Bus;
use crate::cgroup::CgroupMount;
use crate::config::Config;
use crate::errors::AgentError;

pub struct Engine {
    bus: Bus,
    cgroup: Option<CgroupMount>,
}

impl Engine {
    /// Builds the engine from a config. Cgroup detection happens here and
    /// only here; when it fails, cgroup items stay unavailable for the
    /// lifetime of the process while bus items keep working.
    pub fn new(config: Config) -> Self {
        let cgroup = match CgroupMount::detect(&config.proc_mounts) {
            Ok(mount) => Some(mount),
            Err(err) => {
                warn!(error = %err, "cgroup metrics are unavailable");
                None
            }
        };

        Self {
            bus: Bus::new(config.bus_timeout),
            cgroup,
        }
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    pub(crate) fn cgroup(&self) -> Result<&CgroupMount, AgentError> {
        self.cgroup.as_ref().ok_or_else(|| {
            AgentError::unavailable("cgroup metrics are not available, no cgroup directory")
        })
    }
}
