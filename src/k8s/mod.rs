pub mod client;
pub mod deployments;
pub mod store;
pub mod utils;

/// Default user agent for `deploycast` - automatically uses the package version
///
/// All modules should use `client::new(Some(USER_AGENT))` for consistency.
/// The user agent can be overridden via the `DEPLOYCAST_USER_AGENT` environment variable.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
