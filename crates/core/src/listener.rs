//! Inbound notification filtering.
//!
//! One listener task runs per subscription. Messages that announce a MODIS
//! or GBAD level-0 file of an EOS platform on this machine are parsed and
//! queued for the control loop; everything else is dropped here.

use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::message::{FileNotification, Message, MessageError};
use crate::metrics::NOTIFICATIONS_TOTAL;
use crate::net::LocalHosts;
use crate::scene::{Platform, SUPPORTED_SENSORS};
use crate::transport::{MessageSource, SourceEvent};

/// A notification accepted by the listener.
#[derive(Debug, Clone)]
pub struct Arrival {
    pub notification: FileNotification,
    /// The message as received; its data is echoed in completion messages.
    pub message: Message,
    /// Whether the file's host resolved to this machine. Resolved once, here,
    /// so the control loop never waits on name lookups.
    pub on_this_host: bool,
}

/// Why a message was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Not a file, dataset or collection message.
    NotFileMessage,
    /// Subject outside the subscribed topics.
    Topic(String),
    /// File lives on another host.
    ForeignHost(String),
    /// A required field is absent or malformed.
    Incomplete(&'static str),
    /// Not Terra or Aqua.
    Platform(String),
    /// A sensor other than MODIS or GBAD.
    Sensor(Vec<String>),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFileMessage => write!(f, "not a file message"),
            Self::Topic(subject) => write!(f, "subject {} is not subscribed", subject),
            Self::ForeignHost(host) => write!(f, "server {} is not the current one", host),
            Self::Incomplete(field) => write!(f, "message is lacking {}", field),
            Self::Platform(name) => write!(f, "{}: not an EOS satellite", name),
            Self::Sensor(sensors) => write!(f, "not MODIS or GBAD data: {:?}", sensors),
        }
    }
}

/// Whether `subject` falls under one of `topics`. No topics means all.
pub fn topic_matches(subject: &str, topics: &[String]) -> bool {
    if topics.is_empty() {
        return true;
    }
    let subject = subject.trim_start_matches('/');
    topics
        .iter()
        .map(|t| t.trim_start_matches('/'))
        .any(|topic| subject.starts_with(topic))
}

/// Decides whether a message is relevant to this runner.
pub async fn check_message(
    message: &Message,
    topics: &[String],
    local_hosts: &LocalHosts,
) -> Result<FileNotification, Rejection> {
    if !message.kind.carries_files() {
        return Err(Rejection::NotFileMessage);
    }
    if !topic_matches(&message.subject, topics) {
        return Err(Rejection::Topic(message.subject.clone()));
    }

    let notification = FileNotification::from_message(message).map_err(|e| match e {
        MessageError::MissingField { field } => Rejection::Incomplete(field),
        _ => Rejection::Incomplete("data"),
    })?;

    if !local_hosts.is_local(&notification.uri.host).await {
        return Err(Rejection::ForeignHost(notification.uri.host.clone()));
    }
    if Platform::from_name(&notification.platform_name).is_none() {
        return Err(Rejection::Platform(notification.platform_name.clone()));
    }
    if notification
        .sensors
        .iter()
        .any(|s| !SUPPORTED_SENSORS.contains(&s.as_str()))
    {
        return Err(Rejection::Sensor(notification.sensors.clone()));
    }

    Ok(notification)
}

/// Reads `source` until it closes, the queue is dropped or `shutdown`
/// flips, forwarding accepted notifications.
pub async fn run_listener(
    mut source: Box<dyn MessageSource>,
    topics: Vec<String>,
    local_hosts: Arc<LocalHosts>,
    tx: mpsc::Sender<Arrival>,
    mut shutdown: watch::Receiver<bool>,
) {
    let name = source.source_name().to_string();
    info!("Listening on {}", name);

    loop {
        let event = tokio::select! {
            event = source.next_message() => event,
            _ = shutdown.changed() => {
                info!("Listener {} stopping", name);
                break;
            }
        };

        let message = match event {
            Ok(SourceEvent::Message(message)) => message,
            Ok(SourceEvent::Closed) => {
                info!("Source {} closed", name);
                break;
            }
            Err(e) => {
                warn!("Listener {} failed: {}", name, e);
                break;
            }
        };

        match check_message(&message, &topics, &local_hosts).await {
            Ok(notification) => {
                debug!("Ok: message = {}", message.subject);
                let arrival = Arrival {
                    notification,
                    message,
                    on_this_host: true,
                };
                if tx.send(arrival).await.is_err() {
                    info!("Notification queue closed, listener {} stopping", name);
                    break;
                }
            }
            Err(rejection) => {
                NOTIFICATIONS_TOTAL.with_label_values(&["rejected"]).inc();
                match rejection {
                    Rejection::ForeignHost(_) => warn!("Dropping message: {}", rejection),
                    _ => debug!("Dropping message: {}", rejection),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use crate::testing::fixtures::file_message;
    use crate::testing::ScriptedSource;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::Path;

    fn hosts() -> LocalHosts {
        LocalHosts::from_addrs([IpAddr::V4(Ipv4Addr::LOCALHOST)])
    }

    fn message(platform: &str, sensors: &[&str]) -> Message {
        let start = NaiveDate::from_ymd_opt(2021, 10, 13)
            .unwrap()
            .and_hms_opt(13, 28, 53)
            .unwrap();
        file_message(platform, sensors, 3423, start, Path::new("/data/P1540064AAAAAAAAAAAAAA21286132853001.PDS"))
    }

    #[tokio::test]
    async fn test_accepts_aqua_modis() {
        let notification = check_message(&message("EOS-Aqua", &["modis"]), &[], &hosts()).await.unwrap();
        assert_eq!(notification.platform_name, "EOS-Aqua");
        assert_eq!(notification.orbit_number, 3423);
    }

    #[tokio::test]
    async fn test_accepts_mixed_sensor_list() {
        assert!(check_message(&message("EOS-Aqua", &["modis", "gbad"]), &[], &hosts()).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_other_platform() {
        let err = check_message(&message("NOAA-20", &["modis"]), &[], &hosts()).await.unwrap_err();
        assert_eq!(err, Rejection::Platform("NOAA-20".into()));
    }

    #[tokio::test]
    async fn test_rejects_other_sensor() {
        let err = check_message(&message("EOS-Terra", &["modis", "ceres"]), &[], &hosts()).await.unwrap_err();
        assert!(matches!(err, Rejection::Sensor(_)));
    }

    #[tokio::test]
    async fn test_rejects_non_file_message() {
        let mut msg = message("EOS-Terra", &["modis"]);
        msg.kind = MessageKind::Other("info".into());
        assert_eq!(
            check_message(&msg, &[], &hosts()).await.unwrap_err(),
            Rejection::NotFileMessage
        );
    }

    #[tokio::test]
    async fn test_rejects_missing_orbit() {
        let mut msg = message("EOS-Terra", &["modis"]);
        msg.data.as_object_mut().unwrap().remove("orbit_number");
        assert_eq!(
            check_message(&msg, &[], &hosts()).await.unwrap_err(),
            Rejection::Incomplete("orbit_number")
        );
    }

    #[tokio::test]
    async fn test_rejects_foreign_host() {
        let mut msg = message("EOS-Terra", &["modis"]);
        msg.data["uri"] = json!("ssh://192.0.2.1/data/file.PDS");
        assert_eq!(
            check_message(&msg, &[], &hosts()).await.unwrap_err(),
            Rejection::ForeignHost("192.0.2.1".into())
        );
    }

    #[tokio::test]
    async fn test_topic_filter() {
        let topics = vec!["/XLBANDANTENNA/EOS/".to_string()];
        assert!(topic_matches("/XLBANDANTENNA/EOS/ISP", &topics));
        assert!(topic_matches("XLBANDANTENNA/EOS/ISP", &topics));
        assert!(!topic_matches("/other/EOS/ISP", &topics));
        assert!(topic_matches("/anything", &[]));

        let err = check_message(
            &message("EOS-Terra", &["modis"]),
            &["/other".to_string()],
            &hosts(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Rejection::Topic(_)));
    }

    #[tokio::test]
    async fn test_host_name_resolved_in_listener() {
        let mut msg = message("EOS-Terra", &["modis"]);
        msg.data["uri"] = json!("ssh://localhost/data/P0420064AAAAAAAAAAAAAA21284194359001.PDS");
        assert!(check_message(&msg, &[], &hosts()).await.is_ok());

        msg.data["uri"] = json!("ssh://no-such-host.invalid/data/file.PDS");
        assert_eq!(
            check_message(&msg, &[], &hosts()).await.unwrap_err(),
            Rejection::ForeignHost("no-such-host.invalid".into())
        );
    }

    #[tokio::test]
    async fn test_listener_forwards_accepted_only() {
        let source = ScriptedSource::new(vec![
            message("EOS-Aqua", &["modis"]),
            message("NOAA-20", &["avhrr"]),
            message("EOS-Terra", &["modis"]),
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        run_listener(Box::new(source), Vec::new(), Arc::new(hosts()), tx, shutdown_rx).await;

        let mut platforms = Vec::new();
        while let Some(arrival) = rx.recv().await {
            assert!(arrival.on_this_host);
            platforms.push(arrival.notification.platform_name);
        }
        assert_eq!(platforms, vec!["EOS-Aqua", "EOS-Terra"]);
    }

    #[tokio::test]
    async fn test_listener_stops_on_shutdown() {
        struct Silent;

        #[async_trait::async_trait]
        impl MessageSource for Silent {
            async fn next_message(&mut self) -> Result<SourceEvent, crate::transport::TransportError> {
                std::future::pending().await
            }

            fn source_name(&self) -> &str {
                "silent"
            }
        }

        let (tx, _rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_listener(
            Box::new(Silent),
            Vec::new(),
            Arc::new(hosts()),
            tx,
            shutdown_rx,
        ));
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
