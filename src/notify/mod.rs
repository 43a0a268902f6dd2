//! Birthday greetings over the WhatsApp messaging service.

pub mod dispatcher;
pub mod gateway;

pub use dispatcher::{DispatchError, Dispatcher, NotificationRequest, NotificationResult};
pub use gateway::HttpGateway;
