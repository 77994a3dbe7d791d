//! Shared system-bus session and the generic property fetch path.
//!
//! The connection is process-wide and lazily established on first use. A
//! failed connect leaves the cell empty so the next query re-attempts it;
//! an established connection is reused until process exit.

pub mod value;

use std::time::Duration;

use tokio::sync::OnceCell;
use tokio::time;
use tracing::debug;
use zbus::zvariant::OwnedValue;
use zbus::{Connection, Proxy};

use crate::errors::AgentError;

pub const SYSTEMD_SERVICE: &str = "org.freedesktop.systemd1";
pub const SYSTEMD_ROOT_PATH: &str = "/org/freedesktop/systemd1";
pub const MANAGER_INTERFACE: &str = "org.freedesktop.systemd1.Manager";
pub const UNIT_INTERFACE: &str = "org.freedesktop.systemd1.Unit";
pub const SERVICE_INTERFACE: &str = "org.freedesktop.systemd1.Service";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Remote error name reported by systemd when a unit does not exist.
pub const NO_SUCH_UNIT_ERROR: &str = "org.freedesktop.systemd1.NoSuchUnit";

#[derive(Debug)]
pub struct Bus {
    timeout: Duration,
    connection: OnceCell<Connection>,
}

impl Bus {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            connection: OnceCell::new(),
        }
    }

    async fn connection(&self) -> Result<&Connection, AgentError> {
        self.connection
            .get_or_try_init(|| async {
                let connection = Connection::system().await.map_err(|err| {
                    AgentError::unavailable(format!("failed to connect to system dbus: {err}"))
                })?;
                debug!(
                    unique_name = connection.unique_name().map(|name| name.as_str()),
                    "connected to system bus"
                );
                Ok(connection)
            })
            .await
    }

    pub async fn manager_proxy(&self) -> Result<Proxy<'static>, AgentError> {
        let connection = self.connection().await?;
        Proxy::new(
            connection,
            SYSTEMD_SERVICE,
            SYSTEMD_ROOT_PATH,
            MANAGER_INTERFACE,
        )
        .await
        .map_err(map_call_error)
    }

    /// One request/response exchange, bounded by the configured timeout.
    pub async fn call<B, R>(
        &self,
        proxy: &Proxy<'_>,
        method: &'static str,
        body: &B,
    ) -> Result<R, AgentError>
    where
        B: serde::ser::Serialize + zbus::zvariant::DynamicType,
        R: serde::de::DeserializeOwned + zbus::zvariant::Type,
    {
        match time::timeout(self.timeout, proxy.call(method, body)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(err)) => Err(map_call_error(err)),
            Err(_) => Err(AgentError::bus(
                "org.freedesktop.DBus.Error.Timeout",
                format!("no reply within {} ms", self.timeout.as_millis()),
            )),
        }
    }

    /// Fetches one property of one object, still wrapped as an opaque value.
    ///
    /// All inputs are validated non-empty before any I/O happens.
    pub async fn get_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<OwnedValue, AgentError> {
        for (name, input) in [
            ("service", service),
            ("object path", path),
            ("interface", interface),
            ("property", property),
        ] {
            if input.is_empty() {
                return Err(AgentError::parameter(format!("{name} must not be empty")));
            }
        }

        debug!(service, path, interface, property, "getting property");
        let connection = self.connection().await?;
        let proxy = Proxy::new(connection, service, path, PROPERTIES_INTERFACE)
            .await
            .map_err(map_call_error)?;
        self.call(&proxy, "Get", &(interface, property)).await
    }

    /// Fetches a property that must be a plain string.
    pub async fn property_string(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<String, AgentError> {
        let payload = self.get_property(service, path, interface, property).await?;
        value::string_value(&payload)
    }
}

fn map_call_error(err: zbus::Error) -> AgentError {
    match err {
        zbus::Error::MethodError(name, message, _) => {
            AgentError::bus(name.to_string(), message.unwrap_or_default())
        }
        zbus::Error::Variant(source) => {
            AgentError::protocol(format!("reply has unexpected shape: {source}"))
        }
        other => AgentError::bus("org.freedesktop.DBus.Error.Failed", other.to_string()),
    }
}
