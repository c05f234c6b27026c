//! Portal session credential library
//!
//! Holds the signed-in session's access/refresh token pair and its backing
//! storage for the campus portal API gateway. This crate is a standalone
//! library with no dependency on the gateway itself; it can be tested and
//! used independently.
//!
//! Credential flow:
//! 1. A session is seeded with a refresh token (login happens elsewhere)
//! 2. The gateway reads the access token via `CredentialStore::access()`
//! 3. When the portal rejects the token, the gateway posts to `REFRESH_PATH`
//! 4. The refreshed tokens are written back via `set_access`/`set_refresh`
//! 5. An irrecoverable refresh clears the store via `clear()`

pub mod constants;
pub mod error;
pub mod store;
pub mod token;

pub use constants::REFRESH_PATH;
pub use error::{Error, Result};
pub use store::{CredentialStore, FileStore, MemoryStore, StoredCredential};
pub use token::TokenResponse;
