//! Operation descriptors: which namespaces exist, what each operation is called,
//! the formal parameter names it takes, and the endpoint it calls.
//!
//! Formal parameter names are the contract with the message: the resolver maps
//! each name to a message field, and `Endpoint::bind` places each resolved value
//! in the path, query or body by the same name.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::tables;
use crate::api::{is_relative_segment, ApiRequest, ClientError, Verb};

/// A resource namespace of the M2X API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Collections,
    Commands,
    Devices,
    Distributions,
    Jobs,
    Keys,
    Charts,
}

impl Namespace {
    pub const ALL: [Namespace; 7] = [
        Namespace::Collections,
        Namespace::Commands,
        Namespace::Devices,
        Namespace::Distributions,
        Namespace::Jobs,
        Namespace::Keys,
        Namespace::Charts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Collections => "collections",
            Namespace::Commands => "commands",
            Namespace::Devices => "devices",
            Namespace::Distributions => "distributions",
            Namespace::Jobs => "jobs",
            Namespace::Keys => "keys",
            Namespace::Charts => "charts",
        }
    }

    /// Comma-separated namespace names, for error messages.
    pub fn names() -> String {
        Self::ALL.map(Namespace::as_str).join(", ")
    }

    pub fn operations(self) -> &'static [Operation] {
        match self {
            Namespace::Collections => tables::COLLECTIONS,
            Namespace::Commands => tables::COMMANDS,
            Namespace::Devices => tables::DEVICES,
            Namespace::Distributions => tables::DISTRIBUTIONS,
            Namespace::Jobs => tables::JOBS,
            Namespace::Keys => tables::KEYS,
            Namespace::Charts => tables::CHARTS,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown namespace: {0}")]
pub struct UnknownNamespace(pub String);

impl FromStr for Namespace {
    type Err = UnknownNamespace;

    /// Exact, case-sensitive match on the namespace name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| UnknownNamespace(s.to_string()))
    }
}

/// One invocable operation of a namespace.
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    pub name: &'static str,
    /// Formal parameter names in call order.
    pub params: &'static [&'static str],
    pub endpoint: Endpoint,
}

impl Operation {
    pub const fn new(
        name: &'static str,
        params: &'static [&'static str],
        endpoint: Endpoint,
    ) -> Self {
        Self {
            name,
            params,
            endpoint,
        }
    }

    /// Signature as shown to users, e.g. `view(id, callback)`.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.params.join(", "))
    }
}

/// Where the request body comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
    Empty,
    /// The named argument is the whole JSON body.
    Arg(&'static str),
    /// The named argument is sent as `{ key: value }`.
    Wrapped { arg: &'static str, key: &'static str },
}

/// How an argument reaches the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryArg {
    /// The named argument is a JSON object whose members become query pairs.
    Merge(&'static str),
    /// The named argument becomes the single pair `key=value`.
    Named { arg: &'static str, key: &'static str },
}

const PARAMS_QUERY: &[QueryArg] = &[QueryArg::Merge("params")];

/// HTTP shape of an operation. Path placeholders (`{id}`, `{name}`, ...) are
/// formal parameter names.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub verb: Verb,
    pub path: &'static str,
    pub query: &'static [QueryArg],
    pub body: Body,
}

impl Endpoint {
    /// GET; a `params` argument becomes the query string.
    pub const fn get(path: &'static str) -> Self {
        Self {
            verb: Verb::Get,
            path,
            query: PARAMS_QUERY,
            body: Body::Empty,
        }
    }

    /// DELETE; a `params` argument becomes the query string.
    pub const fn delete(path: &'static str) -> Self {
        Self {
            verb: Verb::Delete,
            ..Self::get(path)
        }
    }

    /// POST; a `params` argument is the JSON body.
    pub const fn post(path: &'static str) -> Self {
        Self {
            verb: Verb::Post,
            path,
            query: &[],
            body: Body::Arg("params"),
        }
    }

    /// PUT; a `params` argument is the JSON body.
    pub const fn put(path: &'static str) -> Self {
        Self {
            verb: Verb::Put,
            ..Self::post(path)
        }
    }

    pub const fn body(self, body: Body) -> Self {
        Self { body, ..self }
    }

    pub const fn query(self, query: &'static [QueryArg]) -> Self {
        Self { query, ..self }
    }

    /// Bind named argument values into a request. Arguments not referenced by the
    /// endpoint are ignored; a path placeholder without a value is an error.
    pub fn bind(&self, operation: &str, args: &[(&str, Value)]) -> Result<ApiRequest, ClientError> {
        let lookup = |name: &str| args.iter().find(|(n, _)| *n == name).map(|(_, v)| v);

        let segments = self
            .path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| render_segment(segment, operation, &lookup))
            .collect::<Result<Vec<_>, _>>()?;

        let mut query = Vec::new();
        for q in self.query {
            match *q {
                QueryArg::Merge(arg) => match lookup(arg) {
                    Some(Value::Object(map)) => {
                        query.extend(map.iter().map(|(k, v)| (k.clone(), query_text(v))));
                    }
                    Some(other) => {
                        return Err(ClientError::Invalid(format!(
                            "{} for '{}' must be an object to form a query, got {}",
                            arg, operation, other
                        )))
                    }
                    None => {}
                },
                QueryArg::Named { arg, key } => {
                    if let Some(v) = lookup(arg) {
                        query.push((key.to_string(), query_text(v)));
                    }
                }
            }
        }

        let body = match self.body {
            Body::Empty => None,
            Body::Arg(arg) => lookup(arg).cloned(),
            Body::Wrapped { arg, key } => lookup(arg).map(|v| {
                let mut map = Map::new();
                map.insert(key.to_string(), v.clone());
                Value::Object(map)
            }),
        };

        Ok(ApiRequest {
            verb: self.verb,
            segments,
            query,
            body,
        })
    }
}

/// Substitute `{name}` placeholders in one path segment.
fn render_segment<'a>(
    segment: &str,
    operation: &str,
    lookup: &impl Fn(&str) -> Option<&'a Value>,
) -> Result<String, ClientError> {
    let mut out = String::new();
    let mut rest = segment;
    while let Some(start) = rest.find('{') {
        let end = rest[start..]
            .find('}')
            .map(|i| start + i)
            .ok_or_else(|| ClientError::Invalid(format!("unclosed placeholder in {}", segment)))?;
        out.push_str(&rest[..start]);
        let name = &rest[start + 1..end];
        let value = lookup(name).ok_or_else(|| {
            ClientError::Invalid(format!("'{}' requires a value for {}", operation, name))
        })?;
        match value {
            Value::String(s) => out.push_str(s),
            Value::Number(n) => out.push_str(&n.to_string()),
            other => {
                return Err(ClientError::Invalid(format!(
                    "{} for '{}' must be a string, got {}",
                    name, operation, other
                )))
            }
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    if is_relative_segment(&out) {
        return Err(ClientError::Invalid(format!(
            "'{}' cannot use {:?} as a path segment",
            operation, out
        )));
    }
    Ok(out)
}


/// Query text for a JSON value: strings verbatim, arrays comma-joined, everything else as JSON.
fn query_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(query_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}
