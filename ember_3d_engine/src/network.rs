//! Networking collaborator boundary
//!
//! A `NetworkTransport` is an opaque byte-stream connection. The engine
//! drives it once per frame through a `NetworkPump`, which forwards status
//! changes and incoming messages to managed callbacks.

use std::time::{Duration, Instant};
use crate::callback::{CallbackArg, CallbackRegistry, ManagedCallback};
use crate::error::Result;
use crate::{engine_debug, engine_info, engine_warn};

const SOURCE: &str = "ember3d::Network";

/// Default time the pump may spend per frame before it warns
pub const DEFAULT_PUMP_BUDGET: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// Closed by the peer or locally, with the transport's reason
    Disconnected(String),
    /// The transport lost contact and gave up
    ProblemDetected(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    fn as_callback_text(&self) -> String {
        match self {
            ConnectionStatus::Connecting => "connecting".to_string(),
            ConnectionStatus::Connected => "connected".to_string(),
            ConnectionStatus::Disconnected(reason) => format!("disconnected: {}", reason),
            ConnectionStatus::ProblemDetected(reason) => format!("problem: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    StatusChanged(ConnectionStatus),
    Message(Vec<u8>),
}

/// Opaque send/receive service
pub trait NetworkTransport {
    fn send_data(&mut self, data: &[u8]) -> Result<()>;

    /// Move incoming packets from the socket into the transport's queue
    fn pump_events(&mut self) -> Result<()>;

    /// Drain the queued status changes and messages
    fn run_callbacks(&mut self) -> Vec<NetworkEvent>;
}

/// Drives a transport once per frame
pub struct NetworkPump {
    transport: Box<dyn NetworkTransport>,
    status_callback: ManagedCallback,
    message_callback: ManagedCallback,
    frame_budget: Duration,
    status: ConnectionStatus,
    last_pump: Duration,
}

impl NetworkPump {
    pub fn new(transport: Box<dyn NetworkTransport>) -> Self {
        Self {
            transport,
            status_callback: ManagedCallback::default(),
            message_callback: ManagedCallback::default(),
            frame_budget: DEFAULT_PUMP_BUDGET,
            status: ConnectionStatus::Connecting,
            last_pump: Duration::ZERO,
        }
    }

    pub fn with_status_callback(mut self, callback: ManagedCallback) -> Self {
        self.status_callback = callback;
        self
    }

    pub fn with_message_callback(mut self, callback: ManagedCallback) -> Self {
        self.message_callback = callback;
        self
    }

    pub fn with_frame_budget(mut self, budget: Duration) -> Self {
        self.frame_budget = budget;
        self
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// Time spent by the last `pump`
    pub fn last_pump_duration(&self) -> Duration {
        self.last_pump
    }

    /// Pump the transport and deliver its events. Returns the number of events.
    pub fn pump(&mut self, callbacks: &mut CallbackRegistry) -> Result<usize> {
        let start = Instant::now();

        self.transport.pump_events()?;
        let events = self.transport.run_callbacks();
        let count = events.len();

        for event in events {
            match event {
                NetworkEvent::StatusChanged(status) => {
                    if status != self.status {
                        engine_info!(SOURCE, "Connection status: {:?}", status);
                        self.status_callback.invoke_with(callbacks, status.as_callback_text());
                        self.status = status;
                    }
                }
                NetworkEvent::Message(bytes) => {
                    engine_debug!(SOURCE, "Received {} bytes", bytes.len());
                    self.message_callback.invoke_with(callbacks, CallbackArg::Bytes(bytes));
                }
            }
        }

        self.last_pump = start.elapsed();
        if self.last_pump > self.frame_budget {
            engine_warn!(
                SOURCE,
                "Network pump took {:?}, over its {:?} frame budget",
                self.last_pump,
                self.frame_budget
            );
        }
        Ok(count)
    }

    /// Send bytes to the peer. Sending while not connected is dropped with a warning.
    pub fn send(&mut self, data: &[u8]) -> Result<bool> {
        if !self.status.is_connected() {
            engine_warn!(SOURCE, "Dropping {} bytes: not connected", data.len());
            return Ok(false);
        }
        self.transport.send_data(data)?;
        Ok(true)
    }
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
