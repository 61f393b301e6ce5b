use k8s_openapi::api::apps::v1::Deployment;
use std::fmt::Write;

/// `matchLabels` of the deployment rendered as a `key=value,...` label
/// selector. `None` when the deployment selects nothing by label, since an
/// empty selector would match every pod in the namespace.
pub(crate) fn pod_selector(deployment: &Deployment) -> Option<String> {
    let labels = deployment.spec.as_ref()?.selector.match_labels.as_ref()?;

    let mut selector = String::new();
    for (key, value) in labels {
        if !selector.is_empty() {
            selector.push(',');
        }
        let _ = write!(selector, "{key}={value}");
    }
    (!selector.is_empty()).then_some(selector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::serde_json::{self, json};

    fn with_match_labels(labels: serde_json::Value) -> Deployment {
        serde_json::from_value(json!({
            "metadata": {"name": "web", "namespace": "prod"},
            "spec": {
                "selector": {"matchLabels": labels},
                "template": {"spec": {"containers": []}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_pod_selector() {
        let d = with_match_labels(json!({"tier": "front", "app": "web"}));
        assert_eq!(pod_selector(&d).as_deref(), Some("app=web,tier=front"));
    }

    #[test]
    fn test_empty_selector_selects_nothing() {
        assert_eq!(pod_selector(&with_match_labels(json!({}))), None);
        assert_eq!(pod_selector(&Deployment::default()), None);
    }
}
