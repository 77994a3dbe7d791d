//! Low-level discovery documents for units and services.
//!
//! The wire keys are consumed by an existing discovery pipeline and must be
//! reproduced byte-for-byte, including the `{#...}` macro braces.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;
use zbus::zvariant::OwnedObjectPath;

use crate::bus;
use crate::errors::AgentError;
use crate::unit::{is_service_path, unit_has_type};
use crate::Engine;

/// Row shape of a `Manager.ListUnits` reply.
type ListUnitRecord = (
    String,
    String,
    String,
    String,
    String,
    String,
    OwnedObjectPath,
    u32,
    String,
    OwnedObjectPath,
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitListing {
    pub name: String,
    pub description: String,
    pub load_state: String,
    pub active_state: String,
    pub sub_state: String,
    pub object_path: String,
}

/// Seam between document formatting and the live bus, so discovery is
/// testable without a running systemd.
#[async_trait]
pub trait UnitSource: Send + Sync {
    async fn list_units(&self) -> Result<Vec<UnitListing>, AgentError>;

    /// One string property of one unit object. Failures and non-string
    /// payloads degrade to `None`; discovery never fails on a single
    /// property.
    async fn property_string(&self, object_path: &str, property: &str) -> Option<String>;
}

#[async_trait]
impl UnitSource for Engine {
    async fn list_units(&self) -> Result<Vec<UnitListing>, AgentError> {
        let proxy = self.bus().manager_proxy().await?;
        let rows: Vec<ListUnitRecord> = self.bus().call(&proxy, "ListUnits", &()).await?;
        Ok(rows
            .into_iter()
            .map(
                |(
                    name,
                    description,
                    load_state,
                    active_state,
                    sub_state,
                    _following,
                    object_path,
                    _job_id,
                    _job_type,
                    _job_path,
                )| UnitListing {
                    name,
                    description,
                    load_state,
                    active_state,
                    sub_state,
                    object_path: object_path.to_string(),
                },
            )
            .collect())
    }

    async fn property_string(&self, object_path: &str, property: &str) -> Option<String> {
        match self
            .bus()
            .property_string(
                bus::SYSTEMD_SERVICE,
                object_path,
                bus::UNIT_INTERFACE,
                property,
            )
            .await
        {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(object_path, property, error = %err, "skipping discovery property");
                None
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct UnitRecord {
    #[serde(rename = "{#UNIT.NAME}")]
    name: String,
    #[serde(rename = "{#UNIT.DESCRIPTION}")]
    description: String,
    #[serde(rename = "{#UNIT.LOADSTATE}")]
    load_state: String,
    #[serde(rename = "{#UNIT.ACTIVESTATE}")]
    active_state: String,
    #[serde(rename = "{#UNIT.SUBSTATE}")]
    sub_state: String,
    #[serde(rename = "{#UNIT.OBJECTPATH}")]
    object_path: String,
    #[serde(rename = "{#UNIT.FRAGMENTPATH}", skip_serializing_if = "Option::is_none")]
    fragment_path: Option<String>,
    #[serde(
        rename = "{#UNIT.UNITFILESTATE}",
        skip_serializing_if = "Option::is_none"
    )]
    unit_file_state: Option<String>,
    #[serde(rename = "{#UNIT.FOLLOWING}", skip_serializing_if = "Option::is_none")]
    following: Option<String>,
    #[serde(
        rename = "{#UNIT.CONDITIONRESULT}",
        skip_serializing_if = "Option::is_none"
    )]
    condition_result: Option<String>,
}

#[derive(Debug, Serialize)]
struct ServiceRecord {
    #[serde(rename = "{#SERVICE.TYPE}")]
    service_type: &'static str,
    #[serde(rename = "{#SERVICE.NAME}", skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(
        rename = "{#SERVICE.DISPLAYNAME}",
        skip_serializing_if = "Option::is_none"
    )]
    display_name: Option<String>,
    #[serde(rename = "{#SERVICE.PATH}", skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(
        rename = "{#SERVICE.STARTUPNAME}",
        skip_serializing_if = "Option::is_none"
    )]
    startup_name: Option<String>,
    #[serde(
        rename = "{#SERVICE.CONDITIONRESULT}",
        skip_serializing_if = "Option::is_none"
    )]
    condition_result: Option<String>,
}

#[derive(Debug, Serialize)]
struct Document<T> {
    data: Vec<T>,
}

fn render<T: Serialize>(data: Vec<T>) -> Result<String, AgentError> {
    serde_json::to_string(&Document { data })
        .map_err(|err| AgentError::protocol(format!("cannot render discovery document: {err}")))
}

async fn optional_property(source: &dyn UnitSource, path: &str, property: &str) -> Option<String> {
    source
        .property_string(path, property)
        .await
        .filter(|value| !value.is_empty())
}

/// Discovery document over all units, optionally filtered by unit type
/// extension (the text after the first dot of the unit name).
pub async fn unit_discovery(
    source: &dyn UnitSource,
    filter: Option<&str>,
) -> Result<String, AgentError> {
    let filter = filter.filter(|value| !value.is_empty());
    let mut data = Vec::new();
    for unit in source.list_units().await? {
        if let Some(filter) = filter {
            if !unit_has_type(&unit.name, filter) {
                continue;
            }
        }

        let fragment_path = optional_property(source, &unit.object_path, "FragmentPath").await;
        let unit_file_state = optional_property(source, &unit.object_path, "UnitFileState").await;
        let following = optional_property(source, &unit.object_path, "Following").await;
        let condition_result =
            optional_property(source, &unit.object_path, "ConditionResult").await;

        data.push(UnitRecord {
            name: unit.name,
            description: unit.description,
            load_state: unit.load_state,
            active_state: unit.active_state,
            sub_state: unit.sub_state,
            object_path: unit.object_path,
            fragment_path,
            unit_file_state,
            following,
            condition_result,
        });
    }

    render(data)
}

/// Discovery document over service units only, keyed by object path.
pub async fn service_discovery(source: &dyn UnitSource) -> Result<String, AgentError> {
    let mut data = Vec::new();
    for unit in source.list_units().await? {
        if !is_service_path(&unit.object_path) {
            continue;
        }

        data.push(ServiceRecord {
            service_type: "service",
            name: optional_property(source, &unit.object_path, "Id").await,
            display_name: optional_property(source, &unit.object_path, "Description").await,
            path: optional_property(source, &unit.object_path, "FragmentPath").await,
            startup_name: optional_property(source, &unit.object_path, "UnitFileState").await,
            condition_result: optional_property(source, &unit.object_path, "ConditionResult")
                .await,
        });
    }

    render(data)
}
