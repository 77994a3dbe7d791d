//! Decoding of property reply payloads into result values.
//!
//! Properties arrive wrapped in a variant envelope whose payload can be any
//! wire type. The decoder maps a small closed set of types onto [`BusValue`]
//! and reports everything else as unsupported instead of inventing defaults.

use zbus::zvariant::{Structure, Value};

use crate::errors::AgentError;

/// Decoded property value. Lives for a single request/response cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum BusValue {
    Text(String),
    Bool(bool),
    Unsigned(u64),
    Double(f64),
    /// String array elements joined with single commas.
    TextList(String),
}

/// Decodes the unwrapped variant payload of a property reply.
///
/// Signed integers are reinterpreted as unsigned, not range-checked.
/// Non-string elements inside an array are skipped silently; unsupported
/// top-level types are a hard error naming the wire signature.
pub fn decode(value: &Value<'_>) -> Result<BusValue, AgentError> {
    match value {
        Value::Value(inner) => decode(inner),
        Value::Str(s) => Ok(BusValue::Text(s.as_str().to_string())),
        Value::Bool(b) => Ok(BusValue::Bool(*b)),
        Value::U64(v) => Ok(BusValue::Unsigned(*v)),
        Value::I64(v) => Ok(BusValue::Unsigned(*v as u64)),
        Value::U32(v) => Ok(BusValue::Unsigned(u64::from(*v))),
        Value::I32(v) => Ok(BusValue::Unsigned(u64::from(*v as u32))),
        Value::F64(v) => Ok(BusValue::Double(*v)),
        Value::Array(elements) => {
            let mut joined = String::new();
            for element in elements.iter() {
                if let Value::Str(s) = element {
                    if s.is_empty() {
                        continue;
                    }
                    if !joined.is_empty() {
                        joined.push(',');
                    }
                    joined.push_str(s);
                }
            }
            Ok(BusValue::TextList(joined))
        }
        other => Err(AgentError::unsupported_type(
            other.value_signature().to_string(),
        )),
    }
}

/// Extracts a string property payload, rejecting every other type.
pub fn string_value(value: &Value<'_>) -> Result<String, AgentError> {
    match value {
        Value::Value(inner) => string_value(inner),
        Value::Str(s) => Ok(s.as_str().to_string()),
        other => Err(AgentError::protocol(format!(
            "property is not a string: {}",
            other.value_signature()
        ))),
    }
}

/// Extracts the executable path from an `ExecStart` property value.
///
/// The wire type is `a(sasbttuii)`: an array of structures whose leading
/// field is the executable path.
pub fn exec_start_path(value: &Value<'_>) -> Result<String, AgentError> {
    let mut value = value;
    while let Value::Value(inner) = value {
        value = inner;
    }

    let Value::Array(entries) = value else {
        return Err(AgentError::protocol("ExecStart is not an array"));
    };
    let Some(first) = entries.iter().next() else {
        return Err(AgentError::not_found("ExecStart is empty"));
    };
    let Value::Structure(entry) = first else {
        return Err(AgentError::protocol("ExecStart entry is not a structure"));
    };
    entry_path(entry)
}

/// Leading string field of one `ExecStart` entry structure.
fn entry_path(entry: &Structure<'_>) -> Result<String, AgentError> {
    match entry.fields().first() {
        Some(Value::Str(path)) if !path.is_empty() => Ok(path.as_str().to_string()),
        Some(_) => Err(AgentError::protocol(
            "ExecStart entry does not begin with a path",
        )),
        None => Err(AgentError::not_found("ExecStart entry is empty")),
    }
}

#[cfg(test)]
mod tests {
    use zbus::zvariant::{Array, Structure, Value};

    use super::{decode, entry_path, exec_start_path, string_value, BusValue};
    use crate::errors::AgentError;

    #[test]
    fn decodes_scalars() {
        assert_eq!(
            decode(&Value::from("active")).expect("string decodes"),
            BusValue::Text("active".to_string())
        );
        assert_eq!(
            decode(&Value::from(true)).expect("bool decodes"),
            BusValue::Bool(true)
        );
        assert_eq!(
            decode(&Value::from(42u32)).expect("u32 decodes"),
            BusValue::Unsigned(42)
        );
        assert_eq!(
            decode(&Value::from(42u64)).expect("u64 decodes"),
            BusValue::Unsigned(42)
        );
        assert_eq!(
            decode(&Value::from(1.5f64)).expect("f64 decodes"),
            BusValue::Double(1.5)
        );
    }

    #[test]
    fn reinterprets_signed_integers() {
        assert_eq!(
            decode(&Value::from(-1i64)).expect("i64 decodes"),
            BusValue::Unsigned(u64::MAX)
        );
        assert_eq!(
            decode(&Value::from(-1i32)).expect("i32 decodes"),
            BusValue::Unsigned(u64::from(u32::MAX))
        );
    }

    #[test]
    fn unwraps_nested_variant() {
        let nested = Value::Value(Box::new(Value::from("inner")));
        assert_eq!(
            decode(&nested).expect("nested variant decodes"),
            BusValue::Text("inner".to_string())
        );
    }

    #[test]
    fn joins_string_array_with_commas() {
        let value = Value::from(Array::from(vec!["a", "", "b", "c"]));
        assert_eq!(
            decode(&value).expect("array decodes"),
            BusValue::TextList("a,b,c".to_string())
        );
    }

    #[test]
    fn empty_array_yields_empty_list() {
        let value = Value::from(Array::from(Vec::<&str>::new()));
        assert_eq!(
            decode(&value).expect("array decodes"),
            BusValue::TextList(String::new())
        );
    }

    #[test]
    fn skips_non_string_array_elements() {
        let value = Value::from(Array::from(vec![1u32, 2, 3]));
        assert_eq!(
            decode(&value).expect("array decodes"),
            BusValue::TextList(String::new())
        );
    }

    #[test]
    fn rejects_unsupported_top_level_type() {
        let value = Value::from(7u8);
        let err = decode(&value).expect_err("u8 is unsupported");
        assert!(matches!(err, AgentError::UnsupportedType(_)));
        assert!(err.to_string().contains('y'), "names the wire signature");
    }

    #[test]
    fn string_value_rejects_non_string() {
        let err = string_value(&Value::from(1u32)).expect_err("not a string");
        assert!(matches!(err, AgentError::Protocol(_)));
        assert_eq!(
            string_value(&Value::from("ok")).expect("string"),
            "ok".to_string()
        );
    }

    #[test]
    fn exec_start_entry_returns_leading_path() {
        let entry = Structure::from(("/usr/sbin/sshd", "-D"));
        assert_eq!(
            entry_path(&entry).expect("path extracted"),
            "/usr/sbin/sshd".to_string()
        );
    }

    #[test]
    fn exec_start_entry_rejects_non_string_lead() {
        let entry = Structure::from((42u32, "-D"));
        let err = entry_path(&entry).expect_err("leading field is not a path");
        assert!(matches!(err, AgentError::Protocol(_)));
    }

    #[test]
    fn exec_start_rejects_empty_array() {
        let value = Value::from(Array::from(Vec::<String>::new()));
        let err = exec_start_path(&value).expect_err("empty ExecStart");
        assert!(matches!(err, AgentError::NotFound(_)));
    }

    #[test]
    fn exec_start_rejects_non_array() {
        let err = exec_start_path(&Value::from("oops")).expect_err("not an array");
        assert!(matches!(err, AgentError::Protocol(_)));
    }
}
