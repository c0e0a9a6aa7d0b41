use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// A single method invocation as it travels over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Method name, either bare (`"ping"`) or group-qualified (`"store.save"`).
    /// Decodes as empty when absent; empty names are refused at dispatch.
    #[serde(default)]
    pub method: String,
    /// Opaque argument payload, forwarded to the handler untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Box<RawValue>>,
    /// Correlation id, echoed back verbatim in the response envelope.
    #[serde(default)]
    pub id: u64,
}

impl Request {
    /// Build a request without params.
    pub fn new(method: impl Into<String>, id: u64) -> Self {
        Self {
            method: method.into(),
            params: None,
            id,
        }
    }

    /// Build a request carrying `params` serialised verbatim.
    ///
    /// The caller's value shape is the wire shape: a tuple becomes a
    /// positional array, a struct an object, a scalar a bare value. A value
    /// serialising to JSON `null` (such as `()`) yields a request without
    /// params.
    pub fn with_params<P>(
        method: impl Into<String>,
        id: u64,
        params: &P,
    ) -> Result<Self, serde_json::Error>
    where
        P: Serialize + ?Sized,
    {
        let raw = serde_json::value::to_raw_value(params)?;
        let params = if raw.get() == "null" { None } else { Some(raw) };
        Ok(Self {
            method: method.into(),
            params,
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[test]
    fn test_request_wire_shape() {
        let req = Request::with_params("test", 123, &("blah", 42, true)).unwrap();
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"method":"test","params":["blah",42,true],"id":123}"#);
    }

    #[test]
    fn test_request_without_params_omits_field() {
        let req = Request::new("ping", 1);
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"method":"ping","id":1}"#);
    }

    #[test]
    fn test_null_params_collapse_to_absent() {
        let req = Request::with_params("ping", 7, &()).unwrap();
        assert!(req.params.is_none());
    }

    #[test]
    fn test_struct_params_stay_verbatim() {
        #[derive(Serialize)]
        struct Rec {
            value: String,
        }
        let req = Request::with_params("store.save", 2, &Rec { value: "v1".into() }).unwrap();
        assert_eq!(req.params.as_ref().unwrap().get(), r#"{"value":"v1"}"#);
    }

    #[test]
    fn test_scalar_params_stay_bare() {
        let req = Request::with_params("store.load", 3, "id-42").unwrap();
        assert_eq!(req.params.as_ref().unwrap().get(), r#""id-42""#);
    }

    #[test]
    fn test_request_roundtrip() {
        let wire = r#"{"method":"fn1","params":{"v":1},"id":9}"#;
        let req: Request = serde_json::from_str(wire).unwrap();
        assert_eq!(req.method, "fn1");
        assert_eq!(req.id, 9);
        assert_eq!(req.params.unwrap().get(), r#"{"v":1}"#);
    }

    #[test]
    fn test_missing_id_defaults_to_zero() {
        let req: Request = serde_json::from_str(r#"{"method":"fn1"}"#).unwrap();
        assert_eq!(req.id, 0);
        assert!(req.params.is_none());
    }

    #[test]
    fn test_missing_method_decodes_as_empty() {
        let req: Request = serde_json::from_str(r#"{"id":1}"#).unwrap();
        assert_eq!(req.method, "");
    }
}
