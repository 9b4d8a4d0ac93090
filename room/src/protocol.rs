//! Wire types shared by the remote transports and the gateway.
//!
//! One HTTP exchange per operation, JSON both ways. `id` is the session
//! identity: null on the first call from a fresh Room, assigned by the
//! server, echoed on every later exchange.

use serde::{Deserialize, Serialize};

use crate::term::Solution;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactsRequest {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactsResponse {
    pub id: Option<String>,
    pub facts: Vec<String>,
}

/// Body for `/assert` and `/retract`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRequest {
    pub id: Option<String>,
    pub fact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectRequest {
    pub id: Option<String>,
    pub facts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectResponse {
    pub id: Option<String>,
    pub solutions: Vec<Solution>,
}

/// Events on the duplex channel.
///
/// Client to server: `assert` and `retract` (one-element fact array), and
/// `updateSubscription` carrying the connection's current query list.
/// Server to client: `subscriptionFacts` with the full solution set for
/// that query list, sent whenever it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChannelEvent {
    #[serde(rename = "assert")]
    Assert { facts: Vec<String> },

    #[serde(rename = "retract")]
    Retract { facts: Vec<String> },

    #[serde(rename = "updateSubscription")]
    UpdateSubscription { facts: Vec<String> },

    #[serde(rename = "subscriptionFacts")]
    SubscriptionFacts { solutions: Vec<Solution> },
}
