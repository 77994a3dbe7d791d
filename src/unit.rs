//! Unit name resolution and lifecycle state code tables.

use zbus::zvariant::OwnedObjectPath;

use crate::bus::{self, value};
use crate::errors::AgentError;
use crate::Engine;

const SERVICE_SUFFIX: &str = "service";

/// Object paths escape dots, so a service unit's path ends in `_2eservice`.
const ESCAPED_SERVICE_SUFFIX: &str = "_2eservice";

/// Both sides of every state comparison are truncated to this many bytes.
/// Consumers depend on the truncated matching, so keep the window fixed.
const STATE_COMPARE_LEN: usize = 13;

/// Qualifies a bare unit name with the `.service` suffix.
///
/// The suffix check matches at the first literal dot, so any name already
/// carrying an extension is returned unchanged.
pub fn qualify_unit_name(unit: &str) -> String {
    if unit.contains('.') {
        unit.to_string()
    } else {
        format!("{unit}.{SERVICE_SUFFIX}")
    }
}

/// True iff the unit name carries the given type extension, e.g.
/// `unit_has_type("dbus.service", "service")`.
pub fn unit_has_type(unit: &str, extension: &str) -> bool {
    match unit.split_once('.') {
        Some((_, rest)) => rest == extension,
        None => false,
    }
}

/// True iff the object path addresses a service unit. Pure, no I/O.
pub fn is_service_path(path: &str) -> bool {
    path.ends_with(ESCAPED_SERVICE_SUFFIX)
}

fn matches_truncated(input: &str, state: &str) -> bool {
    let input = &input.as_bytes()[..input.len().min(STATE_COMPARE_LEN)];
    let state = &state.as_bytes()[..state.len().min(STATE_COMPARE_LEN)];
    input == state
}

/// Status code for an `ActiveState` value, roughly balancing LSB initscript
/// codes and Windows service status codes. First match wins.
pub fn service_state_code(state: &str) -> Option<u64> {
    const CODES: [(&str, u64); 5] = [
        ("active", 0),
        ("activating", 2),
        ("deactivating", 5),
        ("inactive", 6),
        ("failed", 8),
    ];
    CODES
        .iter()
        .find(|(name, _)| matches_truncated(state, name))
        .map(|(_, code)| *code)
}

/// Startup code for a `UnitFileState` value, mimicking Windows service
/// startup codes. First match wins.
pub fn service_startup_code(state: &str) -> Option<u64> {
    const CODES: [(&str, u64); 9] = [
        ("enabled", 0),
        ("enabled-runtime", 2),
        ("linked", 0),
        ("linked-runtime", 2),
        ("masked", 3),
        ("masked-runtime", 3),
        ("static", 0),
        ("disabled", 2),
        ("invalid", 4),
    ];
    CODES
        .iter()
        .find(|(name, _)| matches_truncated(state, name))
        .map(|(_, code)| *code)
}

impl Engine {
    /// Resolves a unit name to its bus object path via `Manager.GetUnit`.
    ///
    /// Object paths are unbounded in length; the result is copied out
    /// without truncation.
    pub async fn resolve_unit(&self, unit: &str) -> Result<OwnedObjectPath, AgentError> {
        if unit.is_empty() {
            return Err(AgentError::parameter("unit name must not be empty"));
        }

        let qualified = qualify_unit_name(unit);
        let proxy = self.bus().manager_proxy().await?;
        let path: Result<OwnedObjectPath, AgentError> =
            self.bus().call(&proxy, "GetUnit", &(qualified.as_str(),)).await;
        match path {
            Err(AgentError::Bus { name, .. }) if name == bus::NO_SUCH_UNIT_ERROR => {
                Err(AgentError::not_found(format!("unit not found: {qualified}")))
            }
            other => other,
        }
    }

    /// Executable path of a service, taken from the leading `ExecStart` entry.
    pub async fn exec_path(&self, object_path: &str) -> Result<String, AgentError> {
        let payload = self
            .bus()
            .get_property(
                bus::SYSTEMD_SERVICE,
                object_path,
                bus::SERVICE_INTERFACE,
                "ExecStart",
            )
            .await?;
        value::exec_start_path(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        is_service_path, qualify_unit_name, service_startup_code, service_state_code,
        unit_has_type,
    };

    #[test]
    fn qualifies_bare_unit_names() {
        assert_eq!(qualify_unit_name("sshd"), "sshd.service");
        assert_eq!(qualify_unit_name("sshd.service"), "sshd.service");
        assert_eq!(qualify_unit_name("dbus.socket"), "dbus.socket");
    }

    #[test]
    fn qualification_is_idempotent() {
        let once = qualify_unit_name("sshd");
        assert_eq!(qualify_unit_name(&once), once);
    }

    #[test]
    fn matches_unit_type_extension() {
        assert!(unit_has_type("dbus.service", "service"));
        assert!(unit_has_type("dbus.socket", "socket"));
        assert!(!unit_has_type("dbus.socket", "service"));
        assert!(!unit_has_type("dbus", "service"));
    }

    #[test]
    fn classifies_service_object_paths() {
        assert!(is_service_path(
            "/org/freedesktop/systemd1/unit/sshd_2eservice"
        ));
        assert!(!is_service_path(
            "/org/freedesktop/systemd1/unit/sshd_2esocket"
        ));
    }

    #[test]
    fn maps_active_states() {
        assert_eq!(service_state_code("active"), Some(0));
        assert_eq!(service_state_code("activating"), Some(2));
        assert_eq!(service_state_code("deactivating"), Some(5));
        assert_eq!(service_state_code("inactive"), Some(6));
        assert_eq!(service_state_code("failed"), Some(8));
        assert_eq!(service_state_code("bogus"), None);
    }

    #[test]
    fn maps_unit_file_states() {
        assert_eq!(service_startup_code("enabled"), Some(0));
        assert_eq!(service_startup_code("enabled-runtime"), Some(2));
        assert_eq!(service_startup_code("masked-runtime"), Some(3));
        assert_eq!(service_startup_code("static"), Some(0));
        assert_eq!(service_startup_code("disabled"), Some(2));
        assert_eq!(service_startup_code("invalid"), Some(4));
        assert_eq!(service_startup_code("garbage"), None);
    }

    #[test]
    fn state_comparison_truncates_to_thirteen_bytes() {
        // "enabled-runtime" is longer than the comparison window, so any
        // input sharing its first 13 bytes matches it.
        assert_eq!(service_startup_code("enabled-runtiXYZ"), Some(2));
        // Shorter inputs still require a full match.
        assert_eq!(service_startup_code("enabled-runt"), None);
    }
}
