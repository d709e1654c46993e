//! Completion callback handed to an invocation in place of the `callback` parameter.
//!
//! The callback fires exactly once. If the invocation is dropped before it
//! completes (task aborted or panicked), the callback fires with
//! `Outcome::NoResponse` from its destructor.

use std::fmt;

use crate::api::{ApiResponse, ClientError};

/// What an invocation produced.
#[derive(Debug)]
pub enum Outcome {
    /// The API answered (any status).
    Response(ApiResponse),
    /// The request could not be built or sent, or timed out.
    Failed(ClientError),
    /// The invocation ended without reporting anything.
    NoResponse,
}

impl From<Result<ApiResponse, ClientError>> for Outcome {
    fn from(result: Result<ApiResponse, ClientError>) -> Self {
        match result {
            Ok(res) => Outcome::Response(res),
            Err(e) => Outcome::Failed(e),
        }
    }
}

type Respond = Box<dyn FnOnce(Outcome) + Send>;

pub struct Callback {
    respond: Option<Respond>,
}

impl Callback {
    pub fn new(respond: impl FnOnce(Outcome) + Send + 'static) -> Self {
        Self {
            respond: Some(Box::new(respond)),
        }
    }

    pub fn call(mut self, outcome: Outcome) {
        if let Some(respond) = self.respond.take() {
            respond(outcome);
        }
    }
}

impl Drop for Callback {
    fn drop(&mut self) {
        if let Some(respond) = self.respond.take() {
            log::warn!("callback dropped before the invocation completed");
            respond(Outcome::NoResponse);
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("pending", &self.respond.is_some())
            .finish()
    }
}
