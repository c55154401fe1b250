pub mod mqtt;
pub mod traits;

pub use mqtt::MqttConnector;
pub use traits::{BusConnector, BusSession, InboundMessage, OutboundMessage};
