//! Refresh endpoint wire types
//!
//! The portal API issues a short-lived access token and a longer-lived
//! refresh token. Posting the refresh token to `REFRESH_PATH` exchanges it
//! for a fresh access token; the server may rotate the refresh token in
//! the same response. Field names are camelCase on the wire, matching the
//! portal backend.

use serde::{Deserialize, Serialize};

/// Success response from the refresh endpoint.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    /// Present when the server rotates the refresh token alongside the
    /// access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}
