/**
 * Line-delimited JSON writer for a subscription
 *
 * Stands in for a network transport: drains the subscription in enqueue
 * order and writes one JSON object per line until the hub disconnects it.
 */
use crate::error::Result;
use crate::hub::{DisconnectReason, Subscription};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// # Errors
///
/// Will return `Err` if an event can not be serialized or written
pub async fn forward_json_lines<W>(
    mut subscription: Subscription,
    mut writer: W,
) -> Result<DisconnectReason>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = subscription.recv().await {
        let mut line = event.to_json()?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }

    let reason = subscription.closed().await;
    debug!(subscriber = %subscription.id(), ?reason, "Subscription closed");
    Ok(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BroadcastConfig;
    use crate::event::ChangeEvent;
    use crate::hub::Hub;

    #[tokio::test]
    async fn test_writes_one_line_per_event() {
        let hub = Hub::new(&BroadcastConfig::default());
        let subscription = hub.subscribe().await.unwrap();

        for name in ["web", "api"] {
            hub.publish(ChangeEvent {
                name: name.to_string(),
                namespace: "prod".to_string(),
                ..ChangeEvent::default()
            })
            .await
            .unwrap();
        }
        hub.shutdown().await;

        let mut out: Vec<u8> = Vec::new();
        let reason = forward_json_lines(subscription, &mut out).await.unwrap();
        assert_eq!(reason, DisconnectReason::Shutdown);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(r#"{"name":"web","namespace":"prod""#));
        assert!(lines[1].starts_with(r#"{"name":"api","namespace":"prod""#));
    }
}
