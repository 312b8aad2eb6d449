/*!
 * Outbound integrations for device attributes.
 */

pub mod mqtt;

pub use mqtt::{Broker, MqttPublisher};
