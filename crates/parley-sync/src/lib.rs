//! Client side of the conversation sync contract: a timer-driven poller
//! over the plain request/response API. There is no push channel; closing
//! a conversation is just dropping the poll task.

pub mod heartbeat;
pub mod http;
pub mod poller;

pub use http::HttpClient;
pub use poller::{ConversationPoller, FetchMessages, POLL_INTERVAL, SyncState};
