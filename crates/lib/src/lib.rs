//! M2X flow node: dispatches flow messages to the M2X REST API by parameter-name
//! convention and normalizes the responses into outbound messages.

pub mod api;
pub mod callback;
pub mod config;
pub mod dispatch;
pub mod message;
pub mod node;
pub mod normalize;
pub mod registry;
pub mod resolver;
