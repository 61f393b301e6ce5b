/**
 * Resource snapshot transformer
 *
 * Turns one raw `Deployment` into a `ChangeEvent`. The transformation is total:
 * missing fields degrade to empty strings, empty lists and zero replicas so a
 * single malformed notification can never stall the watch loop.
 */
use crate::config::AgeSource;
use crate::event::{ChangeEvent, ContainerView};
use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, EnvVar};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

/// Rendered in place of an env value that is declared empty
pub const MASK: &str = "********";

/// Build the view model for `deployment` as observed at `now`
#[must_use]
pub fn transform(deployment: &Deployment, now: DateTime<Utc>, age_source: AgeSource) -> ChangeEvent {
    let containers = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .map(|pod_spec| pod_spec.containers.iter().map(container_view).collect())
        .unwrap_or_default();

    let status = deployment.status.as_ref();
    let current = status.and_then(|s| s.available_replicas).unwrap_or(0);
    // Observed replica count, which exceeds spec.replicas while a rollout surges
    let desired = status.and_then(|s| s.replicas).unwrap_or(0);

    let age = age_timestamp(deployment, age_source)
        .map(|time| time.0)
        .map(|since| format_age(now.signed_duration_since(since)))
        .unwrap_or_default();

    ChangeEvent {
        name: deployment.metadata.name.clone().unwrap_or_default(),
        namespace: deployment.metadata.namespace.clone().unwrap_or_default(),
        containers,
        replicas_current: current.max(0).to_string(),
        replicas_desired: desired.max(0).to_string(),
        age,
    }
}

fn container_view(container: &Container) -> ContainerView {
    let env_vars = container
        .env
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(render_env)
        .collect();

    ContainerView {
        name: container.name.clone(),
        image: container.image.clone().unwrap_or_default(),
        env_vars,
    }
}

/// Values are not escaped: a `:` or control character inside a value passes
/// through verbatim. Any empty value is masked, including `valueFrom` entries,
/// whether or not it is actually a secret.
fn render_env(env: &EnvVar) -> String {
    match env.value.as_deref() {
        None | Some("") => format!("{}:{MASK}", env.name),
        Some(value) => format!("{}:{value}", env.name),
    }
}

fn age_timestamp(deployment: &Deployment, source: AgeSource) -> Option<&Time> {
    match source {
        AgeSource::Created => deployment.metadata.creation_timestamp.as_ref(),
        AgeSource::LastUpdate => deployment
            .status
            .as_ref()?
            .conditions
            .as_ref()?
            .first()?
            .last_update_time
            .as_ref(),
    }
}

/// Render an elapsed duration as `{days}d{hours}h{minutes}m`.
///
/// Hours are the remainder after whole days and minutes the remainder after
/// whole hours. Negative durations (clock skew) render as `0d0h0m`.
#[must_use]
pub fn format_age(elapsed: Duration) -> String {
    let total_minutes = elapsed.num_minutes().max(0);
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;
    format!("{days}d{hours}h{minutes}m")
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::serde_json::{self, json};

    fn deployment(value: serde_json::Value) -> Deployment {
        serde_json::from_value(value).unwrap()
    }

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn web() -> Deployment {
        deployment(json!({
            "metadata": {
                "name": "web",
                "namespace": "prod",
                "creationTimestamp": "2024-03-01T10:00:00Z"
            },
            "spec": {
                "replicas": 3,
                "selector": {"matchLabels": {"app": "web"}},
                "template": {
                    "spec": {
                        "containers": [
                            {
                                "name": "app",
                                "image": "app:1.2",
                                "env": [
                                    {"name": "MODE", "value": "prod"},
                                    {"name": "SECRET", "value": ""}
                                ]
                            },
                            {"name": "sidecar", "image": "proxy:0.9"}
                        ]
                    }
                }
            },
            "status": {
                "replicas": 3,
                "availableReplicas": 2,
                "conditions": [
                    {
                        "type": "Available",
                        "status": "True",
                        "lastUpdateTime": "2024-03-03T09:30:00Z"
                    }
                ]
            }
        }))
    }

    #[test]
    fn test_web_deployment_snapshot() {
        let event = transform(&web(), at("2024-03-03T12:15:00Z"), AgeSource::Created);

        assert_eq!(event.name, "web");
        assert_eq!(event.namespace, "prod");
        assert_eq!(event.replicas_current, "2");
        assert_eq!(event.replicas_desired, "3");
        assert_eq!(
            event.containers,
            vec![
                ContainerView {
                    name: "app".to_string(),
                    image: "app:1.2".to_string(),
                    env_vars: vec!["MODE:prod".to_string(), "SECRET:********".to_string()],
                },
                ContainerView {
                    name: "sidecar".to_string(),
                    image: "proxy:0.9".to_string(),
                    env_vars: vec![],
                },
            ]
        );
        assert_eq!(event.age, "2d2h15m");
    }

    #[test]
    fn test_age_from_last_update() {
        let event = transform(&web(), at("2024-03-03T12:15:00Z"), AgeSource::LastUpdate);
        assert_eq!(event.age, "0d2h45m");
    }

    #[test]
    fn test_masking_rule() {
        let values = ["", "plain", "a:b:c", " "];
        for value in values {
            let env = EnvVar {
                name: "KEY".to_string(),
                value: Some(value.to_string()),
                ..EnvVar::default()
            };
            let rendered = render_env(&env);
            let (key, rest) = rendered.split_once(':').unwrap();
            assert_eq!(key, "KEY");
            if value.is_empty() {
                assert_eq!(rest, MASK);
            } else {
                assert_eq!(rest, value);
            }
        }
    }

    #[test]
    fn test_value_from_is_masked() {
        let env = EnvVar {
            name: "TOKEN".to_string(),
            value: None,
            ..EnvVar::default()
        };
        assert_eq!(render_env(&env), "TOKEN:********");
    }

    #[test]
    fn test_malformed_state_degrades() {
        let event = transform(&Deployment::default(), Utc::now(), AgeSource::Created);
        assert_eq!(event.name, "");
        assert_eq!(event.namespace, "");
        assert!(event.containers.is_empty());
        assert_eq!(event.replicas_current, "0");
        assert_eq!(event.replicas_desired, "0");
        assert_eq!(event.age, "");

        let event = transform(&Deployment::default(), Utc::now(), AgeSource::LastUpdate);
        assert_eq!(event.age, "");
    }

    #[test]
    fn test_desired_comes_from_status() {
        let d = deployment(json!({
            "metadata": {"name": "api", "namespace": "dev"},
            "status": {"replicas": 4, "availableReplicas": 1}
        }));
        let event = transform(&d, Utc::now(), AgeSource::Created);
        assert_eq!(event.replicas_desired, "4");
        assert_eq!(event.replicas_current, "1");
    }

    #[test]
    fn test_desired_during_surging_rollout() {
        let d = deployment(json!({
            "metadata": {"name": "api", "namespace": "dev"},
            "spec": {
                "replicas": 3,
                "selector": {"matchLabels": {"app": "api"}},
                "template": {"spec": {"containers": []}}
            },
            "status": {"replicas": 4, "availableReplicas": 3}
        }));
        let event = transform(&d, Utc::now(), AgeSource::Created);
        assert_eq!(event.replicas_desired, "4");
        assert_eq!(event.replicas_current, "3");

        let no_status = deployment(json!({
            "metadata": {"name": "api", "namespace": "dev"},
            "spec": {
                "replicas": 3,
                "selector": {"matchLabels": {"app": "api"}},
                "template": {"spec": {"containers": []}}
            }
        }));
        let event = transform(&no_status, Utc::now(), AgeSource::Created);
        assert_eq!(event.replicas_desired, "0");
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(Duration::zero()), "0d0h0m");
        assert_eq!(format_age(Duration::minutes(59)), "0d0h59m");
        assert_eq!(format_age(Duration::minutes(61)), "0d1h1m");
        assert_eq!(format_age(Duration::hours(49) + Duration::minutes(7)), "2d1h7m");
        assert_eq!(format_age(Duration::seconds(119)), "0d0h1m");
        assert_eq!(format_age(Duration::minutes(-5)), "0d0h0m");
    }
}
