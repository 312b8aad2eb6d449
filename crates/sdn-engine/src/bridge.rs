/*!
 * Bridge runtime.
 *
 * Connects the configured transport, runs the reader and writer loops
 * against one [`Scheduler`], and forwards attribute changes to MQTT when
 * enabled. The bridge stops as soon as either loop fails; the returned
 * error carries the process exit status.
 */
use tokio::sync::broadcast;
use tracing::{error, info};

use sdn_core::config::SharedConfig;
use sdn_core::event::SharedEventBus;
use sdn_core::utils::spawn_component;
use sdn_devices::address::parse_address;
use sdn_devices::{Address, AttributeChange, DeviceRegistry, Transport};

use crate::error::Result;
use crate::scheduler::Scheduler;

/// A configured bridge, ready to run over a transport
#[derive(Debug, Clone)]
pub struct Bridge {
    config: SharedConfig,
    scheduler: Scheduler,
    attributes: SharedEventBus<AttributeChange>,
}

impl Bridge {
    /// Build the bridge described by `config`
    pub fn new(config: impl Into<SharedConfig>) -> Self {
        let config = config.into();
        let attributes = SharedEventBus::new();
        let registry = DeviceRegistry::new(std::sync::Arc::new(attributes.clone()));
        let scheduler = Scheduler::new(&config.get().scheduler, registry);
        Self {
            config,
            scheduler,
            attributes,
        }
    }

    /// The scheduler, for queueing commands
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Receive every attribute change from now on
    pub fn subscribe(&self) -> broadcast::Receiver<AttributeChange> {
        self.attributes.get().subscribe()
    }

    /// Motors listed in the configuration
    pub fn known_motors(&self) -> Result<Vec<Address>> {
        let motors = self
            .config
            .get()
            .scheduler
            .known_motors
            .iter()
            .map(|text| parse_address(text))
            .collect::<sdn_devices::Result<Vec<_>>>()?;
        Ok(motors)
    }

    /// Open the configured transport
    pub async fn connect(&self) -> Result<Transport> {
        let transport = &self.config.get().transport;
        Ok(Transport::connect(&transport.port, transport.trace).await?)
    }

    /// Run until the reader or writer fails
    pub async fn run(&self, transport: Transport) -> Result<()> {
        let known = self.known_motors()?;
        self.scheduler.poll_known(&known).await;

        #[cfg(feature = "mqtt")]
        let forwarder = self.start_forwarder()?;

        let port = self.config.get().transport.port.clone();
        let (mut reader, mut writer) = transport.split();
        let mut reader_task = {
            let scheduler = self.scheduler.clone();
            spawn_component("reader", &port, async move { scheduler.run_reader(&mut reader).await })
        };
        let mut writer_task = {
            let scheduler = self.scheduler.clone();
            spawn_component("writer", &port, async move { scheduler.run_writer(&mut writer).await })
        };
        info!("Bridge running on {}", port);

        let finished = tokio::select! {
            result = &mut reader_task => result,
            result = &mut writer_task => result,
        };
        reader_task.abort();
        writer_task.abort();
        #[cfg(feature = "mqtt")]
        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }

        let result = finished?;
        if let Err(e) = &result {
            error!("Bridge stopped: {}", e);
        }
        result
    }

    #[cfg(feature = "mqtt")]
    fn start_forwarder(&self) -> Result<Option<tokio::task::JoinHandle<()>>> {
        use sdn_devices::protocols::MqttPublisher;

        let mqtt = &self.config.get().mqtt;
        if !mqtt.enabled {
            return Ok(None);
        }
        let publisher = MqttPublisher::new(mqtt)?;
        let changes = self.subscribe();
        Ok(Some(spawn_component("mqtt", &mqtt.device_id, async move {
            if let Err(e) = publisher.run(changes).await {
                error!("MQTT forwarding stopped: {}", e);
            }
        })))
    }
}
