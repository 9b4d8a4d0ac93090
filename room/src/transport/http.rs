//! Session-capturing JSON client shared by the remote transports.

use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{RoomError, RoomResult};
use crate::protocol::{AckResponse, FactRequest, FactsRequest, FactsResponse, SelectRequest, SelectResponse};
use crate::term::Solution;

/// One POST per operation against the four endpoints. The first `id` a
/// response carries is captured and attached to every later request;
/// once set, it is immutable for the lifetime of the client. An async
/// mutex serializes exchanges so at most one request is outstanding
/// against the session at a time.
pub(crate) struct HttpClient {
    base_url: String,
    client: reqwest::Client,
    session: Mutex<Option<String>>,
    op_lock: tokio::sync::Mutex<()>,
}

impl HttpClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            session: Mutex::new(None),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.lock().ok().and_then(|s| s.clone())
    }

    /// First response wins; later ids are ignored.
    fn capture_session(&self, id: Option<String>) {
        let Some(id) = id else { return };
        if let Ok(mut session) = self.session.lock() {
            if session.is_none() {
                debug!(session = %id, "captured session id");
                *session = Some(id);
            }
        }
    }

    async fn exchange<B, R>(&self, endpoint: &str, body: &B) -> RoomResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let _guard = self.op_lock.lock().await;
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RoomError::Status(status.as_u16()));
        }
        response
            .json::<R>()
            .await
            .map_err(|e| RoomError::MalformedResponse(e.to_string()))
    }

    pub async fn facts(&self) -> RoomResult<Vec<String>> {
        let request = FactsRequest {
            id: self.session_id(),
        };
        let response: FactsResponse = self.exchange("facts", &request).await?;
        self.capture_session(response.id);
        Ok(response.facts)
    }

    pub async fn assert(&self, fact: &str) -> RoomResult<()> {
        let request = FactRequest {
            id: self.session_id(),
            fact: fact.to_string(),
        };
        let response: AckResponse = self.exchange("assert", &request).await?;
        self.capture_session(response.id);
        Ok(())
    }

    pub async fn retract(&self, fact: &str) -> RoomResult<()> {
        let request = FactRequest {
            id: self.session_id(),
            fact: fact.to_string(),
        };
        let response: AckResponse = self.exchange("retract", &request).await?;
        self.capture_session(response.id);
        Ok(())
    }

    pub async fn select(&self, queries: &[String]) -> RoomResult<Vec<Solution>> {
        let request = SelectRequest {
            id: self.session_id(),
            facts: queries.to_vec(),
        };
        let response: SelectResponse = self.exchange("select", &request).await?;
        self.capture_session(response.id);
        Ok(response.solutions)
    }

    /// Session id, performing one `/facts` exchange to obtain it if none
    /// has been captured yet.
    pub async fn ensure_session(&self) -> RoomResult<String> {
        if let Some(id) = self.session_id() {
            return Ok(id);
        }
        self.facts().await?;
        self.session_id().ok_or_else(|| {
            RoomError::MalformedResponse("server did not assign a session id".to_string())
        })
    }
}
