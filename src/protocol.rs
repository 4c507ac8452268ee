//! Named requests and their responses.
//!
//! Every bridge operation is addressed by a unique event name, e.g.
//! `{"event": "fs.pathExpander", "payload": {"path": "users/42"}}`.
//! Responses carry either the result or `{kind, message}` of the error.

use crate::bridge::Bridge;
use crate::connection::ConnectionParams;
use crate::error::BridgeError;
use crate::query::{FilterDescriptor, SortDescriptor};
use crate::subscriptions::ListenerId;
use serde::{Deserialize, Serialize};

/// `{path, topic}` payload of the document and path-explorer subscriptions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopicRequest {
    pub path: String,
    pub topic: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionSubscribe {
    pub path: String,
    pub topic: String,
    #[serde(default, alias = "queryOptions")]
    pub filters: Vec<FilterDescriptor>,
    #[serde(default, alias = "sortOptions")]
    pub sorts: Vec<SortDescriptor>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListenerKey {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetDocuments {
    #[serde(alias = "docs")]
    pub paths: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateDocuments {
    /// Serialized snapshot holding the documents to write.
    #[serde(alias = "docs")]
    pub writes: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathRequest {
    pub path: String,
}

/// A bridge request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum Request {
    #[serde(rename = "fs.init")]
    Init(ConnectionParams),
    #[serde(rename = "fs.query.subscribe")]
    SubscribeDocument(TopicRequest),
    #[serde(rename = "fs.queryCollection.subscribe")]
    SubscribeCollection(CollectionSubscribe),
    #[serde(rename = "fs.pathExplorer.subscribe")]
    SubscribePathExplorer(TopicRequest),
    #[serde(rename = "fs.unsubscribe")]
    Unsubscribe(ListenerKey),
    #[serde(rename = "fs.getDocs")]
    GetDocuments(GetDocuments),
    #[serde(rename = "fs.getDocsByCollection")]
    GetDocumentsByCollection(PathRequest),
    #[serde(rename = "fs.updateDocs")]
    UpdateDocuments(UpdateDocuments),
    #[serde(rename = "fs.pathExpander")]
    ExpandPath(PathRequest),
}

impl Request {
    /// Event name of the request.
    pub fn event(&self) -> &'static str {
        match self {
            Request::Init(_) => "fs.init",
            Request::SubscribeDocument(_) => "fs.query.subscribe",
            Request::SubscribeCollection(_) => "fs.queryCollection.subscribe",
            Request::SubscribePathExplorer(_) => "fs.pathExplorer.subscribe",
            Request::Unsubscribe(_) => "fs.unsubscribe",
            Request::GetDocuments(_) => "fs.getDocs",
            Request::GetDocumentsByCollection(_) => "fs.getDocsByCollection",
            Request::UpdateDocuments(_) => "fs.updateDocs",
            Request::ExpandPath(_) => "fs.pathExpander",
        }
    }
}

/// Result of a request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    Collections(Vec<String>),
    Subscribed { id: ListenerId },
    Unsubscribed { success: bool },
    /// Serialized snapshot.
    Snapshot(String),
    Paths(Vec<String>),
    Updated { success: bool },
    Error { kind: String, message: String },
}

impl From<BridgeError> for Response {
    fn from(e: BridgeError) -> Self {
        Response::Error {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

impl Bridge {
    /// Execute a decoded request.
    pub fn dispatch(&self, request: Request) -> Response {
        let event = request.event();
        let result = match request {
            Request::Init(params) => self.init(&params).map(Response::Collections),
            Request::SubscribeDocument(req) => self
                .subscribe_document(&req.path, &req.topic)
                .map(|id| Response::Subscribed { id }),
            Request::SubscribeCollection(req) => self
                .subscribe_collection(&req.path, &req.topic, &req.filters, &req.sorts)
                .map(|id| Response::Subscribed { id }),
            Request::SubscribePathExplorer(req) => self
                .subscribe_path_explorer(&req.path, &req.topic)
                .map(|id| Response::Subscribed { id }),
            Request::Unsubscribe(key) => {
                // Malformed ids can't name a listener: same no-op as unknown ones.
                if let Ok(id) = key.id.parse::<ListenerId>() {
                    self.unsubscribe(id);
                }
                Ok(Response::Unsubscribed { success: true })
            }
            Request::GetDocuments(req) => self.get_documents(&req.paths).map(Response::Snapshot),
            Request::GetDocumentsByCollection(req) => self
                .get_documents_by_collection(&req.path)
                .map(Response::Snapshot),
            Request::UpdateDocuments(req) => self
                .update_documents(&req.writes)
                .map(|()| Response::Updated { success: true }),
            Request::ExpandPath(req) => self.expand_path(&req.path).map(Response::Paths),
        };

        result.unwrap_or_else(|e| {
            tracing::debug!(event, error = %e, "request failed");
            Response::from(e)
        })
    }

    /// Decode a JSON request, execute it, and encode the response.
    pub fn handle_json(&self, request: &str) -> String {
        let response = match serde_json::from_str::<Request>(request) {
            Ok(request) => self.dispatch(request),
            Err(e) => Response::from(BridgeError::Deserialization(format!("bad request: {}", e))),
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","data":{{"kind":"serialization_error","message":{:?}}}}}"#,
                e.to_string()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_names() {
        let request: Request = serde_json::from_value(json!({
            "event": "fs.queryCollection.subscribe",
            "payload": {
                "path": "users",
                "topic": "users-topic",
                "queryOptions": [{"field": "age", "operator": {"type": ">=", "values": [18]}}],
                "sortOptions": [{"field": "age", "sort": "ASC"}]
            }
        }))
        .unwrap();

        match &request {
            Request::SubscribeCollection(req) => {
                assert_eq!(req.filters.len(), 1);
                assert_eq!(req.sorts[0].direction, "ASC");
            }
            other => panic!("Expected collection subscribe, got {:?}", other),
        }
        assert_eq!(request.event(), "fs.queryCollection.subscribe");
    }

    #[test]
    fn test_init_payload() {
        let request: Request = serde_json::from_value(json!({
            "event": "fs.init",
            "payload": {"projectId": "alpha"}
        }))
        .unwrap();
        assert_eq!(request, Request::Init(ConnectionParams::new("alpha")));
    }

    #[test]
    fn test_error_response_shape() {
        let response = Response::from(BridgeError::InvalidQuery("bad op".into()));
        let raw = serde_json::to_value(&response).unwrap();
        assert_eq!(raw["type"], "error");
        assert_eq!(raw["data"]["kind"], "invalid_query_error");
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(serde_json::from_value::<Request>(json!({
            "event": "fs.dropDatabase",
            "payload": {}
        }))
        .is_err());
    }
}
