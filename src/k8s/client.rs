// Client creation with custom user-agent support for kube 2.x
use crate::error::Result;
use hyper::http::{HeaderName, HeaderValue};
use kube::{Client, Config};
use tracing::warn;

/// Environment variable that overrides the user agent sent to the API server
pub const USER_AGENT_ENV: &str = "DEPLOYCAST_USER_AGENT";

/// Create a new k8s client to interact with k8s cluster api
///
/// # Errors
///
/// Will return `Err` if the kube config can not be inferred or the client can not be built
pub async fn new(custom_user_agent: Option<&str>) -> Result<Client> {
    let mut config = Config::infer().await?;

    let override_agent = std::env::var(USER_AGENT_ENV).ok();
    add_user_agent_header(&mut config, override_agent.as_deref().or(custom_user_agent));

    let client = Client::try_from(config)?;

    Ok(client)
}

/// Append a `user-agent` header to `config`. An invalid header value is
/// logged and skipped so the default user agent is used instead.
pub fn add_user_agent_header(config: &mut Config, user_agent: Option<&str>) {
    let Some(user_agent) = user_agent else {
        return;
    };
    match HeaderValue::from_str(user_agent) {
        Ok(header_value) => config
            .headers
            .push((HeaderName::from_static("user-agent"), header_value)),
        Err(e) => warn!("Ignoring invalid user agent '{}': {}", user_agent, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::new("http://127.0.0.1:8080".parse().unwrap())
    }

    #[test]
    fn test_user_agent_header_added() {
        let mut config = config();
        add_user_agent_header(&mut config, Some("deploycast/1.0"));
        assert!(config
            .headers
            .iter()
            .any(|(name, value)| name == "user-agent" && value == "deploycast/1.0"));
    }

    #[test]
    fn test_invalid_user_agent_skipped() {
        let mut config = config();
        let before = config.headers.len();
        add_user_agent_header(&mut config, Some("\u{007F}InvalidAgent"));
        add_user_agent_header(&mut config, None);
        assert_eq!(config.headers.len(), before);
    }
}
