//! Operation registry: the namespaces of the M2X API, their operations and each
//! operation's formal parameter names.
//!
//! Dispatch discovers operations only through this registry, so adding an
//! operation to a table makes it reachable from flow messages with no other code.

mod descriptor;
mod introspect;
mod tables;

pub use descriptor::{Body, Endpoint, Namespace, Operation, QueryArg, UnknownNamespace};
pub use introspect::{find_operation, list_operations, validate};
