//! Wire types for the host protocol.
//!
//! The host writes one JSON envelope per line, `{"id": .., "event": .., ...}`,
//! and reads one reply per line, `{"id": .., "status": .., ...}`. Replies may
//! arrive out of order; `id` is echoed back unchanged.

use crate::error::WorkerError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dougcast_client::{Category, Source};
use dougcast_core::{GenerationId, Request, Response, ResponseType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An event delivered by the host.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum HostEvent {
    Install,
    Activate,
    Fetch {
        request: Request,
    },
    Sync {
        tag: String,
    },
    Push {
        #[serde(default)]
        data: Option<String>,
    },
    Message {
        #[serde(default)]
        data: Value,
    },
    #[serde(rename = "notificationclick")]
    NotificationClick {
        #[serde(default)]
        notification: ClickedNotification,
        #[serde(default)]
        clients: Vec<WindowClient>,
    },
}

/// A parsed stdin line.
#[derive(Debug)]
pub struct Envelope {
    pub id: Value,
    pub event: HostEvent,
}

impl Envelope {
    /// Parse one line. On failure the id is still returned when it was readable,
    /// so the host can match the `failed` reply.
    pub fn parse(line: &str) -> Result<Self, (Value, WorkerError)> {
        let mut value: Value =
            serde_json::from_str(line).map_err(|e| (Value::Null, WorkerError::InvalidEnvelope(e.to_string())))?;
        let id = value.as_object_mut().and_then(|map| map.remove("id")).unwrap_or(Value::Null);

        match serde_json::from_value(value) {
            Ok(event) => Ok(Self { id, event }),
            Err(e) => Err((id, WorkerError::InvalidEnvelope(e.to_string()))),
        }
    }
}

/// `data` attached to a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The notification a click event refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClickedNotification {
    #[serde(default)]
    pub data: NotificationData,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    #[default]
    Window,
    Worker,
    SharedWorker,
}

/// A client controlled by the worker, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: ClientKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
}

/// Something the worker asks the host to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HostCommand {
    SkipWaiting,
    ClaimClients,
    ShowNotification { title: String, options: NotificationOptions },
    CloseNotification,
    FocusClient { client_id: String },
    OpenWindow { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub generation: GenerationId,
    pub static_assets: usize,
    pub cdn_cached: Vec<String>,
    pub cdn_failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub generation: GenerationId,
    pub deleted: Vec<GenerationId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Report {
    Install(InstallReport),
    Activate(ActivateReport),
}

/// A response as sent to the host. The body is base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireResponse {
    pub status: u16,
    pub status_text: String,
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl From<&Response> for WireResponse {
    fn from(response: &Response) -> Self {
        Self {
            status: response.status,
            status_text: response.status_text.clone(),
            response_type: response.response_type,
            url: response.url.clone(),
            headers: response.headers.clone(),
            body: STANDARD.encode(&response.body),
        }
    }
}

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplyBody {
    Done {
        commands: Vec<HostCommand>,
        #[serde(skip_serializing_if = "Option::is_none")]
        report: Option<Report>,
    },
    Respond {
        response: WireResponse,
        source: Source,
        category: Category,
    },
    /// The host should perform the request itself.
    PassThrough,
    NetworkError {
        code: String,
        message: String,
    },
    Failed {
        code: String,
        message: String,
    },
}

impl ReplyBody {
    pub fn done(commands: Vec<HostCommand>) -> Self {
        Self::Done { commands, report: None }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub id: Value,
    #[serde(flatten)]
    pub body: ReplyBody,
}

#[cfg(test)]
mod tests {
    use super::*;
    use dougcast_core::{Destination, Method, RequestMode};
    use serde_json::json;

    #[test]
    fn test_parse_fetch_envelope() {
        let line = r#"{"id":7,"event":"fetch","request":{"url":"http://localhost:8080/song.mp3","headers":{"Accept":"audio/*"},"destination":"audio"}}"#;
        let envelope = Envelope::parse(line).unwrap();
        assert_eq!(envelope.id, json!(7));
        match envelope.event {
            HostEvent::Fetch { request } => {
                assert_eq!(request.method, Method::Get);
                assert_eq!(request.header("accept"), Some("audio/*"));
                assert_eq!(request.destination, Destination::Audio);
                assert_eq!(request.mode, RequestMode::Cors);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_extension_methods() {
        for name in ["TRACE", "PROPFIND", "CONNECT", "MKCALENDAR"] {
            let line = format!(r#"{{"id":1,"event":"fetch","request":{{"method":"{name}","url":"http://localhost:8080/dav/"}}}}"#);
            match Envelope::parse(&line).unwrap().event {
                HostEvent::Fetch { request } => assert_eq!(request.method.as_str(), name),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_lifecycle_envelopes() {
        assert!(matches!(Envelope::parse(r#"{"id":"a","event":"install"}"#).unwrap().event, HostEvent::Install));
        assert!(matches!(Envelope::parse(r#"{"id":"b","event":"activate"}"#).unwrap().event, HostEvent::Activate));
        let sync = Envelope::parse(r#"{"id":"c","event":"sync","tag":"sync-downloads"}"#).unwrap();
        assert!(matches!(sync.event, HostEvent::Sync { tag } if tag == "sync-downloads"));
    }

    #[test]
    fn test_parse_push_without_data() {
        let envelope = Envelope::parse(r#"{"id":1,"event":"push"}"#).unwrap();
        assert!(matches!(envelope.event, HostEvent::Push { data: None }));
    }

    #[test]
    fn test_parse_notification_click() {
        let line = r#"{"id":2,"event":"notificationclick","notification":{"data":{"url":"./#/episode/3"}},"clients":[{"id":"c1","url":"http://localhost:8080/index.html","type":"window"},{"id":"w1","url":"http://localhost:8080/sw.js","type":"worker"}]}"#;
        let envelope = Envelope::parse(line).unwrap();
        match envelope.event {
            HostEvent::NotificationClick { notification, clients } => {
                assert_eq!(notification.data.url.as_deref(), Some("./#/episode/3"));
                assert_eq!(clients.len(), 2);
                assert_eq!(clients[1].kind, ClientKind::Worker);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_errors_keep_id() {
        let (id, err) = Envelope::parse(r#"{"id":9,"event":"teleport"}"#).unwrap_err();
        assert_eq!(id, json!(9));
        assert_eq!(err.code(), "INVALID_INPUT");

        let (id, _) = Envelope::parse("not json").unwrap_err();
        assert_eq!(id, Value::Null);
    }

    #[test]
    fn test_reply_serialization() {
        let response = Response::new(200, "hi").with_header("Content-Type", "text/plain");
        let reply = Reply {
            id: json!(3),
            body: ReplyBody::Respond {
                response: WireResponse::from(&response),
                source: Source::Cache,
                category: Category::GenericCacheable,
            },
        };
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["id"], json!(3));
        assert_eq!(value["status"], json!("respond"));
        assert_eq!(value["source"], json!("cache"));
        assert_eq!(value["category"], json!("generic-cacheable"));
        assert_eq!(value["response"]["body"], json!("aGk="));
        assert_eq!(value["response"]["headers"]["content-type"], json!("text/plain"));
    }

    #[test]
    fn test_command_serialization() {
        let value = serde_json::to_value(ReplyBody::done(vec![HostCommand::SkipWaiting])).unwrap();
        assert_eq!(value, json!({"status": "done", "commands": [{"command": "skip_waiting"}]}));

        let focus = serde_json::to_value(HostCommand::FocusClient { client_id: "c1".into() }).unwrap();
        assert_eq!(focus, json!({"command": "focus_client", "client_id": "c1"}));

        let pass = serde_json::to_value(Reply { id: json!(1), body: ReplyBody::PassThrough }).unwrap();
        assert_eq!(pass, json!({"id": 1, "status": "pass_through"}));
    }
}
