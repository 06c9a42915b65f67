//! HTTP → RPC request transcoding.
//!
//! # Message Shapes
//! ```text
//! list    GET    /api/v1/{d}         {page, page_size, filter}
//! search  GET    /api/v1/{d}/search  {query, page, page_size, filter}   (?q= required)
//! get     GET    /api/v1/{d}/{id}    {id}
//! create  POST   /api/v1/{d}         {<fields>}
//! update  PUT    /api/v1/{d}/{id}    {id, <fields>}
//! delete  DELETE /api/v1/{d}/{id}    {id}
//! ```
//!
//! # Design Decisions
//! - Body and filter fields are matched against the domain's field schema;
//!   unknown fields are ignored, known fields are type-checked
//! - A malformed body is rejected whole, never forwarded partially

use serde_json::{Map, Number, Value};

use crate::routing::catalog::{DomainDescriptor, FieldKind, FieldSpec, Operation};
use crate::routing::matcher::PathParams;
use crate::routing::router::RouteEntry;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Why a request could not be turned into an RPC message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscodeError {
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("missing required field '{0}'")]
    MissingField(String),
    #[error("invalid value for field '{field}': expected {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },
}

/// Message ready to be sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    /// `package.Service/Method`.
    pub method: String,
    pub message: Value,
}

/// Build the RPC request for `entry` from path parameters, raw query and body.
pub fn to_rpc_request(
    entry: &RouteEntry,
    params: &PathParams,
    query: Option<&str>,
    body: &[u8],
) -> Result<RpcRequest, TranscodeError> {
    let domain = entry.domain;
    let query = parse_query(query);

    let message = match entry.operation {
        Operation::List => Value::Object(listing(domain, &query)?),
        Operation::Search => {
            let text = query_value(&query, "q")
                .filter(|q| !q.trim().is_empty())
                .ok_or_else(|| TranscodeError::MissingField("q".to_string()))?;
            let mut message = listing(domain, &query)?;
            message.insert("query".to_string(), Value::String(text.to_string()));
            Value::Object(message)
        }
        Operation::Get | Operation::Delete => {
            let mut message = Map::new();
            message.insert("id".to_string(), Value::String(path_id(params)?));
            Value::Object(message)
        }
        Operation::Create => {
            let fields = body_fields(domain, body)?;
            if let Some(missing) = domain
                .fields
                .iter()
                .find(|f| f.required && !fields.contains_key(f.name))
            {
                return Err(TranscodeError::MissingField(missing.name.to_string()));
            }
            Value::Object(fields)
        }
        Operation::Update => {
            let mut fields = body_fields(domain, body)?;
            fields.insert("id".to_string(), Value::String(path_id(params)?));
            Value::Object(fields)
        }
    };

    Ok(RpcRequest {
        method: entry.rpc_method.clone(),
        message,
    })
}

fn parse_query(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

fn query_value<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn path_id(params: &PathParams) -> Result<String, TranscodeError> {
    params
        .get("id")
        .filter(|id| !id.is_empty())
        .cloned()
        .ok_or_else(|| TranscodeError::MissingField("id".to_string()))
}

/// `{page, page_size, filter}` from the query string.
fn listing(
    domain: &DomainDescriptor,
    query: &[(String, String)],
) -> Result<Map<String, Value>, TranscodeError> {
    let page = match query_value(query, "page") {
        Some(raw) => parse_positive("page", raw)?,
        None => 1,
    };
    let page_size = match query_value(query, "page_size") {
        Some(raw) => parse_positive("page_size", raw)?.min(MAX_PAGE_SIZE),
        None => DEFAULT_PAGE_SIZE,
    };

    let mut filter = Map::new();
    for (key, raw) in query {
        if let Some(spec) = domain.field(key) {
            filter.insert(spec.name.to_string(), query_field(spec, raw)?);
        }
    }

    let mut message = Map::new();
    message.insert("page".to_string(), Value::from(page));
    message.insert("page_size".to_string(), Value::from(page_size));
    message.insert("filter".to_string(), Value::Object(filter));
    Ok(message)
}

fn parse_positive(field: &str, raw: &str) -> Result<u64, TranscodeError> {
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(TranscodeError::InvalidField {
            field: field.to_string(),
            expected: "a positive integer",
        }),
    }
}

/// Convert a query string value to the field's JSON kind.
fn query_field(spec: &FieldSpec, raw: &str) -> Result<Value, TranscodeError> {
    let invalid = || TranscodeError::InvalidField {
        field: spec.name.to_string(),
        expected: kind_name(spec.kind),
    };
    match spec.kind {
        FieldKind::String => Ok(Value::String(raw.to_string())),
        FieldKind::Integer => raw
            .trim()
            .parse::<i64>()
            .map(|n| Value::Number(Number::from(n)))
            .map_err(|_| invalid()),
        FieldKind::Boolean => match raw.trim() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        FieldKind::StringList => Ok(Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        )),
    }
}

/// Decode the body and keep only schema fields, type-checked. Null means absent.
fn body_fields(domain: &DomainDescriptor, body: &[u8]) -> Result<Map<String, Value>, TranscodeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|e| TranscodeError::MalformedBody(e.to_string()))?;
    let Value::Object(input) = value else {
        return Err(TranscodeError::MalformedBody(
            "expected a JSON object".to_string(),
        ));
    };

    let mut fields = Map::new();
    for (key, value) in input {
        let Some(spec) = domain.field(&key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if !kind_matches(spec.kind, &value) {
            return Err(TranscodeError::InvalidField {
                field: key,
                expected: kind_name(spec.kind),
            });
        }
        fields.insert(key, value);
    }
    Ok(fields)
}

fn kind_matches(kind: FieldKind, value: &Value) -> bool {
    match kind {
        FieldKind::String => value.is_string(),
        FieldKind::Integer => value.is_i64() || value.is_u64(),
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::StringList => value
            .as_array()
            .map(|items| items.iter().all(Value::is_string))
            .unwrap_or(false),
    }
}

fn kind_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::String => "a string",
        FieldKind::Integer => "an integer",
        FieldKind::Boolean => "a boolean",
        FieldKind::StringList => "a list of strings",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::catalog::DOMAINS;
    use crate::routing::router::{RoutePolicy, RouteTable};
    use axum::http::Method;
    use serde_json::json;

    fn transcode(
        method: Method,
        path: &str,
        query: Option<&str>,
        body: &str,
    ) -> Result<RpcRequest, TranscodeError> {
        let table = RouteTable::from_catalog(DOMAINS, &RoutePolicy::default());
        let m = table.match_route(&method, path).unwrap();
        to_rpc_request(m.entry, &m.params, query, body.as_bytes())
    }

    #[test]
    fn test_list_defaults_and_filter() {
        let req = transcode(Method::GET, "/api/v1/ticket", Some("status=open&foo=bar"), "").unwrap();
        assert_eq!(req.method, "ticket.service.TicketService/ListTickets");
        assert_eq!(
            req.message,
            json!({"page": 1, "page_size": 20, "filter": {"status": "open"}})
        );
    }

    #[test]
    fn test_page_size_capped_and_validated() {
        let req = transcode(Method::GET, "/api/v1/faq", Some("page=3&page_size=500"), "").unwrap();
        assert_eq!(req.message["page"], 3);
        assert_eq!(req.message["page_size"], 100);

        let err = transcode(Method::GET, "/api/v1/faq", Some("page=0"), "").unwrap_err();
        assert!(matches!(err, TranscodeError::InvalidField { ref field, .. } if field == "page"));
    }

    #[test]
    fn test_typed_filters() {
        let req = transcode(
            Method::GET,
            "/api/v1/faq",
            Some("published=true&tags=billing,%20login"),
            "",
        )
        .unwrap();
        assert_eq!(
            req.message["filter"],
            json!({"published": true, "tags": ["billing", "login"]})
        );

        let err = transcode(Method::GET, "/api/v1/network", Some("vlan=ten"), "").unwrap_err();
        assert_eq!(
            err,
            TranscodeError::InvalidField {
                field: "vlan".into(),
                expected: "an integer"
            }
        );
    }

    #[test]
    fn test_search_requires_query() {
        let req = transcode(Method::GET, "/api/v1/issues/search", Some("q=disk+full"), "").unwrap();
        assert_eq!(req.method, "issues.service.IssuesService/SearchIssues");
        assert_eq!(req.message["query"], "disk full");
        assert_eq!(req.message["page"], 1);

        let err = transcode(Method::GET, "/api/v1/issues/search", None, "").unwrap_err();
        assert_eq!(err, TranscodeError::MissingField("q".into()));
    }

    #[test]
    fn test_id_operations() {
        let req = transcode(Method::GET, "/api/v1/track/tr-9", None, "").unwrap();
        assert_eq!(req.message, json!({"id": "tr-9"}));

        let req = transcode(Method::DELETE, "/api/v1/track/tr-9", None, "").unwrap();
        assert_eq!(req.method, "track.service.TrackService/DeleteTrack");
        assert_eq!(req.message, json!({"id": "tr-9"}));
    }

    #[test]
    fn test_create_maps_known_fields() {
        let req = transcode(
            Method::POST,
            "/api/v1/ticket",
            None,
            r#"{"title": "Printer", "helpdesk_id": "h-1", "unknown": 1, "status": null}"#,
        )
        .unwrap();
        assert_eq!(req.message, json!({"title": "Printer", "helpdesk_id": "h-1"}));
    }

    #[test]
    fn test_create_missing_required() {
        let err = transcode(Method::POST, "/api/v1/ticket", None, r#"{"title": "Printer"}"#)
            .unwrap_err();
        assert_eq!(err, TranscodeError::MissingField("helpdesk_id".into()));

        let err = transcode(Method::POST, "/api/v1/ticket", None, "").unwrap_err();
        assert_eq!(err, TranscodeError::MissingField("title".into()));
    }

    #[test]
    fn test_malformed_body() {
        let err = transcode(Method::POST, "/api/v1/faq", None, r#"{"question": "#).unwrap_err();
        assert!(matches!(err, TranscodeError::MalformedBody(_)));

        let err = transcode(Method::PUT, "/api/v1/faq/1", None, "[1, 2]").unwrap_err();
        assert!(matches!(err, TranscodeError::MalformedBody(_)));
    }

    #[test]
    fn test_update_wrong_type() {
        let err = transcode(Method::PUT, "/api/v1/faq/1", None, r#"{"published": "yes"}"#)
            .unwrap_err();
        assert_eq!(
            err,
            TranscodeError::InvalidField {
                field: "published".into(),
                expected: "a boolean"
            }
        );
    }

    #[test]
    fn test_update_path_id_wins() {
        let req = transcode(
            Method::PUT,
            "/api/v1/helpdesk/h-7",
            None,
            r#"{"id": "other", "name": "Front desk"}"#,
        )
        .unwrap();
        assert_eq!(req.method, "helpdesk.service.HelpdeskService/UpdateHelpdesk");
        assert_eq!(req.message, json!({"id": "h-7", "name": "Front desk"}));
    }

    #[test]
    fn test_every_route_transcodes() {
        let table = RouteTable::from_catalog(DOMAINS, &RoutePolicy::default());
        let mut params = PathParams::new();
        params.insert("id".into(), "x".into());
        for entry in table.entries() {
            let body: Value = entry
                .domain
                .fields
                .iter()
                .filter(|f| f.required)
                .map(|f| (f.name.to_string(), Value::String("v".into())))
                .collect::<Map<_, _>>()
                .into();
            let req = to_rpc_request(entry, &params, Some("q=x"), body.to_string().as_bytes());
            assert!(req.is_ok(), "{} failed: {:?}", entry.label(), req);
        }
    }
}
