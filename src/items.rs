//! Item key surface: parameter validation and dispatch to the fetch paths.

use std::fmt;

use tracing::debug;

use crate::bus::{self, value::BusValue};
use crate::cgroup::metrics;
use crate::discovery;
use crate::errors::AgentError;
use crate::unit::{is_service_path, service_startup_code, service_state_code};
use crate::Engine;

/// Version string reported by `systemd.modver`.
pub const MODULE_VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

const SERVICE_INFO_PARAMS: [&str; 6] = [
    "state",
    "displayname",
    "path",
    "user",
    "startup",
    "description",
];

/// Final value of one item query, ready for text output.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValue {
    Text(String),
    Unsigned(u64),
    Double(f64),
}

impl fmt::Display for ItemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemValue::Text(s) => f.write_str(s),
            ItemValue::Unsigned(v) => write!(f, "{v}"),
            ItemValue::Double(v) => write!(f, "{v}"),
        }
    }
}

impl From<BusValue> for ItemValue {
    fn from(value: BusValue) -> Self {
        match value {
            BusValue::Text(s) => ItemValue::Text(s),
            BusValue::TextList(s) => ItemValue::Text(s),
            BusValue::Bool(b) => ItemValue::Unsigned(u64::from(b)),
            BusValue::Unsigned(v) => ItemValue::Unsigned(v),
            BusValue::Double(v) => ItemValue::Double(v),
        }
    }
}

fn param<'a>(params: &[&'a str], index: usize) -> Option<&'a str> {
    params.get(index).copied().filter(|value| !value.is_empty())
}

fn require_params(params: &[&str], min: usize, max: usize) -> Result<(), AgentError> {
    if params.len() < min || params.len() > max {
        return Err(AgentError::parameter("invalid number of parameters"));
    }
    Ok(())
}

impl Engine {
    /// Evaluates one item key against its parameter list.
    pub async fn query(&self, key: &str, params: &[&str]) -> Result<ItemValue, AgentError> {
        debug!(key, ?params, "evaluating item");
        match key {
            "systemd.modver" => {
                require_params(params, 0, 0)?;
                Ok(ItemValue::Text(MODULE_VERSION.to_string()))
            }
            "systemd" => {
                require_params(params, 0, 1)?;
                self.manager_property(param(params, 0)).await
            }
            "systemd.unit" => {
                require_params(params, 1, 3)?;
                self.unit_property(params[0], param(params, 1), param(params, 2))
                    .await
            }
            "systemd.unit.discovery" => {
                require_params(params, 0, 1)?;
                Ok(ItemValue::Text(
                    discovery::unit_discovery(self, param(params, 0)).await?,
                ))
            }
            "systemd.service.info" => {
                require_params(params, 1, 2)?;
                self.service_info(params[0], param(params, 1)).await
            }
            "systemd.service.discovery" => {
                require_params(params, 0, 0)?;
                Ok(ItemValue::Text(discovery::service_discovery(self).await?))
            }
            "systemd.cgroup.cpu" => {
                require_params(params, 2, 2)?;
                let mount = self.cgroup()?;
                let online_cpus = num_cpus::get() as u64;
                metrics::cpu_metric(mount, params[0], params[1], online_cpus)
                    .map(ItemValue::Unsigned)
            }
            "systemd.cgroup.mem" => {
                require_params(params, 2, 2)?;
                metrics::memory_metric(self.cgroup()?, params[0], params[1])
                    .map(ItemValue::Unsigned)
            }
            "systemd.cgroup.dev" => {
                require_params(params, 3, 3)?;
                metrics::blkio_metric(self.cgroup()?, params[0], params[1], params[2])
                    .map(ItemValue::Unsigned)
            }
            other => Err(AgentError::parameter(format!(
                "unsupported item key: {other}"
            ))),
        }
    }

    /// One property of the systemd manager object, `Version` by default.
    async fn manager_property(&self, property: Option<&str>) -> Result<ItemValue, AgentError> {
        let property = property.unwrap_or("Version");
        let payload = self
            .bus()
            .get_property(
                bus::SYSTEMD_SERVICE,
                bus::SYSTEMD_ROOT_PATH,
                bus::MANAGER_INTERFACE,
                property,
            )
            .await?;
        bus::value::decode(&payload).map(ItemValue::from)
    }

    /// One property of one unit, addressed by unqualified interface name.
    ///
    /// Defaults to `Unit.ActiveState`. The interface parameter is the last
    /// segment only, e.g. `Service` for `org.freedesktop.systemd1.Service`.
    async fn unit_property(
        &self,
        unit: &str,
        interface: Option<&str>,
        property: Option<&str>,
    ) -> Result<ItemValue, AgentError> {
        let path = self.resolve_unit(unit).await?;
        let interface = match interface {
            Some(name) => format!("{}.{name}", bus::SYSTEMD_SERVICE),
            None => bus::UNIT_INTERFACE.to_string(),
        };
        let property = property.unwrap_or("ActiveState");

        let payload = self
            .bus()
            .get_property(bus::SYSTEMD_SERVICE, path.as_str(), &interface, property)
            .await?;
        bus::value::decode(&payload).map(ItemValue::from)
    }

    /// Windows-style service facts for one service unit.
    async fn service_info(
        &self,
        service: &str,
        param: Option<&str>,
    ) -> Result<ItemValue, AgentError> {
        let param = param.unwrap_or("state");
        if !SERVICE_INFO_PARAMS.contains(&param) {
            return Err(AgentError::parameter(format!("unsupported param: {param}")));
        }

        let path = self.resolve_unit(service).await?;
        if !is_service_path(path.as_str()) {
            return Err(AgentError::parameter(format!("not a service: {service}")));
        }

        match param {
            "state" => {
                let state = self.unit_property_string(path.as_str(), "ActiveState").await?;
                service_state_code(&state)
                    .map(ItemValue::Unsigned)
                    .ok_or_else(|| {
                        AgentError::not_found(format!("unknown service state: {state}"))
                    })
            }
            "startup" => {
                let state = self
                    .unit_property_string(path.as_str(), "UnitFileState")
                    .await?;
                service_startup_code(&state)
                    .map(ItemValue::Unsigned)
                    .ok_or_else(|| {
                        AgentError::not_found(format!("unknown service startup: {state}"))
                    })
            }
            "path" => self.exec_path(path.as_str()).await.map(ItemValue::Text),
            "displayname" => self.marshalled_unit_property(path.as_str(), "Id").await,
            "description" => {
                self.marshalled_unit_property(path.as_str(), "Description")
                    .await
            }
            "user" => {
                let payload = self
                    .bus()
                    .get_property(
                        bus::SYSTEMD_SERVICE,
                        path.as_str(),
                        bus::SERVICE_INTERFACE,
                        "User",
                    )
                    .await?;
                bus::value::decode(&payload).map(ItemValue::from)
            }
            other => Err(AgentError::parameter(format!("unsupported param: {other}"))),
        }
    }

    async fn unit_property_string(
        &self,
        object_path: &str,
        property: &str,
    ) -> Result<String, AgentError> {
        self.bus()
            .property_string(
                bus::SYSTEMD_SERVICE,
                object_path,
                bus::UNIT_INTERFACE,
                property,
            )
            .await
    }

    async fn marshalled_unit_property(
        &self,
        object_path: &str,
        property: &str,
    ) -> Result<ItemValue, AgentError> {
        let payload = self
            .bus()
            .get_property(
                bus::SYSTEMD_SERVICE,
                object_path,
                bus::UNIT_INTERFACE,
                property,
            )
            .await?;
        bus::value::decode(&payload).map(ItemValue::from)
    }
}
