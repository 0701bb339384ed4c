//! Identity types produced by the login flow.

/// Everything the login flow yields for authorised requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorisation {
    /// The session cookie value (`scratchsessionsid`).
    pub session_id: String,
    /// The CSRF token paired with the session.
    pub csrf_token: String,
    /// The API token for `x-token` authorised requests.
    pub token: String,
    /// Numeric id of the authorised user.
    pub user_id: u64,
    /// Username of the authorised user.
    pub username: String,
}

/// The identity slice of the `/session` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    /// Username of the session's user.
    pub username: String,
    /// Numeric id of the session's user.
    pub user_id: u64,
    /// API token, when the session reports one.
    pub token: Option<String>,
}
