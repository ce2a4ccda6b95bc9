//! JSON encoding of request bodies and decoding of response bodies.
//!
//! # Design
//! Bodies are schema-less: anything `Serialize` can be sent, and any
//! `DeserializeOwned` shape can be requested back. Unknown fields in a
//! response are ignored so new server versions do not break old clients,
//! but a body that does not fit the requested shape is always an error.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::error::{ClientError, Result};
use crate::http::ResponseBody;

/// Knobs applied when encoding request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SerializationOptions {
    /// Drop object members whose value is `null`, at any depth. Array
    /// elements are never removed.
    pub ignore_null_values: bool,
    /// Percent-encode every string value.
    pub url_encode_values: bool,
}

/// Encode a value as a JSON request body.
pub fn encode<T>(value: &T, options: &SerializationOptions) -> Result<Bytes>
where
    T: Serialize + ?Sized,
{
    if !options.ignore_null_values && !options.url_encode_values {
        return serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| ClientError::Serialization(e.to_string()));
    }

    let mut tree =
        serde_json::to_value(value).map_err(|e| ClientError::Serialization(e.to_string()))?;
    if options.ignore_null_values {
        strip_nulls(&mut tree);
    }
    if options.url_encode_values {
        url_encode_strings(&mut tree);
    }
    serde_json::to_vec(&tree)
        .map(Bytes::from)
        .map_err(|e| ClientError::Serialization(e.to_string()))
}

/// Read a response body to the end and decode it as `T`.
pub async fn decode<T: DeserializeOwned>(body: ResponseBody) -> Result<T> {
    let bytes = body.bytes().await?;
    decode_slice(&bytes)
}

pub fn decode_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| ClientError::Deserialization(e.to_string()))
}

fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, member| !member.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

fn url_encode_strings(value: &mut Value) {
    match value {
        Value::String(s) => *s = encode_path_segment(s),
        Value::Object(map) => map.values_mut().for_each(url_encode_strings),
        Value::Array(items) => items.iter_mut().for_each(url_encode_strings),
        _ => {}
    }
}

/// Percent-encode one path segment (collection name, document key).
pub fn encode_path_segment(segment: &str) -> String {
    // form encoding turns spaces into '+'; a literal '+' is already %2B
    form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Ordered query-string builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &'static str, value: impl ToString) -> &mut Self {
        self.pairs.push((name, value.to_string()));
        self
    }

    /// Push `value` when it is `Some`.
    pub fn push_opt<V: ToString>(&mut self, name: &'static str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.push(name, value);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.pairs {
            serializer.append_pair(name, value);
        }
        serializer.finish()
    }

    /// Append the query string to `path`.
    pub fn apply(&self, path: &str) -> String {
        if self.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{}", self.to_query_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Person {
        name: String,
        age: u32,
    }

    #[test]
    fn encodes_heterogeneous_values() {
        let docs = vec![json!({"a": 1}), json!([1, "two", null]), json!("plain")];
        let bytes = encode(&docs, &SerializationOptions::default()).unwrap();
        let back: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, json!([{"a": 1}, [1, "two", null], "plain"]));
    }

    #[test]
    fn unit_and_none_encode_as_null() {
        let options = SerializationOptions::default();
        assert_eq!(encode(&(), &options).unwrap(), "null");
        assert_eq!(encode(&None::<u8>, &options).unwrap(), "null");
    }

    #[test]
    fn ignore_null_values_strips_object_members_only() {
        let options = SerializationOptions {
            ignore_null_values: true,
            ..Default::default()
        };
        let value = json!({"keep": 1, "drop": null, "nested": {"drop": null, "list": [null, 2]}});
        let bytes = encode(&value, &options).unwrap();
        let back: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, json!({"keep": 1, "nested": {"list": [null, 2]}}));
    }

    #[test]
    fn url_encode_values_encodes_strings() {
        let options = SerializationOptions {
            url_encode_values: true,
            ..Default::default()
        };
        let bytes = encode(&json!({"q": "a b/c", "n": 3}), &options).unwrap();
        let back: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, json!({"q": "a%20b%2Fc", "n": 3}));
    }

    #[tokio::test]
    async fn decode_ignores_unknown_fields() {
        let body = ResponseBody::from_bytes(r#"{"name":"Ann","age":41,"extra":true}"#);
        let person: Person = decode(body).await.unwrap();
        assert_eq!(
            person,
            Person {
                name: "Ann".to_string(),
                age: 41
            }
        );
    }

    #[tokio::test]
    async fn decode_rejects_incompatible_shape() {
        let body = ResponseBody::from_bytes(r#"{"name":"Ann","age":"old"}"#);
        let err = decode::<Person>(body).await.unwrap_err();
        assert!(matches!(err, ClientError::Deserialization(_)));
    }

    #[tokio::test]
    async fn decode_rejects_missing_fields() {
        let body = ResponseBody::from_bytes(r#"{"name":"Ann"}"#);
        assert!(matches!(
            decode::<Person>(body).await,
            Err(ClientError::Deserialization(_))
        ));
    }

    #[test]
    fn path_segments_are_percent_encoded() {
        assert_eq!(encode_path_segment("users"), "users");
        assert_eq!(encode_path_segment("a b"), "a%20b");
        assert_eq!(encode_path_segment("a+b"), "a%2Bb");
        assert_eq!(encode_path_segment("x/y"), "x%2Fy");
    }

    #[test]
    fn query_params_keep_order_and_skip_none() {
        let mut params = QueryParams::new();
        params
            .push("returnNew", true)
            .push_opt("returnOld", None::<bool>)
            .push_opt("overwriteMode", Some("update"));
        assert_eq!(
            params.apply("_api/document/users"),
            "_api/document/users?returnNew=true&overwriteMode=update"
        );
        assert_eq!(QueryParams::new().apply("p"), "p");
    }
}
