//! Portal API authentication constants

/// Session refresh endpoint, relative to the portal API base URL.
///
/// The request body carries the refresh token; the access credential is
/// never attached to calls against this path, and a 401 from it means the
/// session is over rather than "refresh the refresh".
pub const REFRESH_PATH: &str = "/auth/refresh-token";
