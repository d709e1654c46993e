//! Enumerate and validate the operations of a namespace.

use std::collections::BTreeSet;

use super::descriptor::{Namespace, Operation};
use crate::dispatch::DispatchError;

/// Names of every operation in the namespace.
pub fn list_operations(namespace: Namespace) -> BTreeSet<&'static str> {
    namespace.operations().iter().map(|op| op.name).collect()
}

pub fn find_operation(namespace: Namespace, name: &str) -> Option<&'static Operation> {
    namespace.operations().iter().find(|op| op.name == name)
}

/// Resolve `action` to an operation of `namespace`. An unset action or a name the
/// namespace does not have fails with `InvalidAction` listing the legal names.
pub fn validate(
    namespace: Namespace,
    action: Option<&str>,
) -> Result<&'static Operation, DispatchError> {
    action
        .and_then(|name| find_operation(namespace, name))
        .ok_or_else(|| DispatchError::InvalidAction {
            namespace,
            action: action.map(str::to_string),
            available: list_operations(namespace).into_iter().collect(),
        })
}
