//! Authenticated request gateway for the campus portal API
//!
//! Wraps an HTTP transport so that every outgoing request carries the
//! current access credential, a rejected credential triggers exactly one
//! refresh call no matter how many requests fail at the same moment,
//! requests queued behind that refresh are retried once with the new
//! token, and irrecoverable failures surface a normalized error plus a
//! process-wide unauthorized event.
//!
//! Request flow:
//! 1. A caller builds a `RequestDescription` and calls `Gateway::send`
//! 2. The gateway attaches the stored access token and dispatches via
//!    the `Transport`
//! 3. A 401 on a first attempt parks the request and, if no refresh is
//!    underway, starts one
//! 4. On refresh success every parked request is resubmitted exactly once
//! 5. On refresh failure the credential store is cleared, every parked
//!    request is rejected, and `SessionEvent::Unauthorized` is broadcast
//!    once

pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
mod metrics;
pub mod request;
pub mod transport;

pub use config::{ApiConfig, Config, CredentialsConfig};
pub use error::{Error, Result};
pub use events::SessionEvent;
pub use gateway::Gateway;
pub use request::RequestDescription;
pub use transport::{HttpTransport, Transport, TransportError};
