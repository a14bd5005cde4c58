//! Database repositories for the call service.

pub mod call_sessions;
pub mod signaling_messages;

pub use call_sessions::CallSessionsRepository;
pub use signaling_messages::SignalingMessagesRepository;
