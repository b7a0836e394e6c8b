//! Device connection lifecycle and liveness tracking.
//!
//! The monitor is a plain synchronous state machine. Time never comes
//! from the clock directly; callers pass `Instant`s in, which keeps the
//! liveness rules testable without waiting.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::sigma as sg;
use crate::sigma::global::{self, GlobalSettingsRecord};
use crate::sigma::sysex::{self, DeviceIdentity};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport yet.
    Uninitialized,
    /// Transport is up, identity enquiry sent, no reply so far.
    AwaitingIdentity,
    Connected,
    /// Device went quiet; we keep probing.
    Degraded(String),
    /// Transport failed; recoverable if the ports come back.
    Error(String),
    /// Unrecoverable, requires a restart.
    Fatal(String),
}

/// Point-in-time view of the connection, shaped for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state: ConnectionState,
    pub device_version: Option<String>,
    pub seconds_since_heartbeat: Option<u64>,
}

pub struct ConnectionMonitor {
    state: ConnectionState,
    identity: Option<DeviceIdentity>,
    global: Option<GlobalSettingsRecord>,
    last_heartbeat: Option<Instant>,
    heartbeat_interval: Duration,
    device_id: u8,
}

impl ConnectionMonitor {
    pub fn new(device_id: u8) -> Self {
        Self {
            state: ConnectionState::Uninitialized,
            identity: None,
            global: None,
            last_heartbeat: None,
            heartbeat_interval: Duration::from_millis(sg::HEARTBEAT_INTERVAL_MS),
            device_id,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        return &self.state;
    }

    pub fn device_id(&self) -> u8 {
        return self.device_id;
    }

    pub fn identity(&self) -> Option<&DeviceIdentity> {
        return self.identity.as_ref();
    }

    pub fn global(&self) -> Option<&GlobalSettingsRecord> {
        return self.global.as_ref();
    }

    pub fn is_connected(&self) -> bool {
        return matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Degraded(_)
        );
    }

    /// The transport came up. Returns the opening enquiries to send:
    /// identity request first, then a global dump request.
    pub fn transport_ready(&mut self) -> Vec<Vec<u8>> {
        if let ConnectionState::Fatal(_) = self.state {
            return vec![];
        }
        self.state = ConnectionState::AwaitingIdentity;
        self.last_heartbeat = None;
        return vec![
            sysex::identity_request(self.device_id),
            sysex::global_dump_request(self.device_id),
        ];
    }

    /// An identity reply arrived. Replies from foreign devices on the
    /// same port are ignored.
    pub fn handle_identity_reply(&mut self, identity: DeviceIdentity, now: Instant) {
        if !identity.is_sigma() {
            log::info!(
                "Ignoring identity reply from foreign device {:02x?}",
                identity.manufacturer
            );
            return;
        }
        if let ConnectionState::Fatal(_) = self.state {
            return;
        }
        log::info!("Device identified: {}", identity.version_string());
        self.identity = Some(identity);
        self.state = ConnectionState::Connected;
        self.last_heartbeat = Some(now);
    }

    /// Any recognized inbound message counts as a heartbeat.
    pub fn note_traffic(&mut self, now: Instant) {
        self.last_heartbeat = Some(now);
        if let ConnectionState::Degraded(_) = self.state {
            log::info!("Device is responding again");
            self.state = ConnectionState::Connected;
        }
    }

    /// Runs the liveness rule. The connection degrades only after the
    /// silence STRICTLY exceeds the grace window.
    pub fn check_liveness(&mut self, now: Instant) {
        if self.state != ConnectionState::Connected {
            return;
        }
        let Some(last) = self.last_heartbeat else {
            return;
        };
        let grace = self.heartbeat_interval * sg::HEARTBEAT_GRACE_FACTOR;
        let silence = now.saturating_duration_since(last);
        if silence > grace {
            let message = format!("haven't seen heartbeat for {}s", silence.as_secs());
            log::warn!("Connection degraded; {}", message);
            self.state = ConnectionState::Degraded(message);
        }
    }

    /// Stores a global settings dump and returns the acknowledgement
    /// frame to send back. The dump carries the device's ID nibble;
    /// subsequent outbound frames are addressed with it.
    pub fn handle_global_dump(&mut self, payload: &[u8]) -> Vec<u8> {
        let record = global::decode(payload);
        if record.device_id != self.device_id {
            log::info!("Device ID is {}", record.device_id);
            self.device_id = record.device_id;
        }
        self.global = Some(record);
        return sysex::global_dump_received(self.device_id);
    }

    pub fn port_lost(&mut self, reason: &str) {
        if let ConnectionState::Fatal(_) = self.state {
            return;
        }
        log::error!("MIDI port lost; {}", reason);
        self.state = ConnectionState::Error(reason.to_string());
        self.last_heartbeat = None;
    }

    pub fn fatal(&mut self, reason: &str) {
        log::error!("Fatal connection failure; {}", reason);
        self.state = ConnectionState::Fatal(reason.to_string());
        self.last_heartbeat = None;
    }

    pub fn snapshot(&self, now: Instant) -> StatusSnapshot {
        return StatusSnapshot {
            state: self.state.clone(),
            device_version: self.identity.as_ref().map(|id| id.version_string()),
            seconds_since_heartbeat: self
                .last_heartbeat
                .map(|last| now.saturating_duration_since(last).as_secs()),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sigma_identity() -> DeviceIdentity {
        DeviceIdentity {
            manufacturer: sg::MANUFACTURER_ID,
            family: sg::FAMILY_ID,
            member: [0x01, 0x00],
            program_version: (1, 4),
            bootloader_version: 2,
            build_number: 17,
        }
    }

    #[test]
    fn test_transport_ready_sends_enquiries() {
        let mut monitor = ConnectionMonitor::new(0);
        let frames = monitor.transport_ready();
        assert_eq!(monitor.state(), &ConnectionState::AwaitingIdentity);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], sysex::identity_request(0));
        assert_eq!(frames[1], sysex::global_dump_request(0));
    }

    #[test]
    fn test_identity_reply_connects() {
        let mut monitor = ConnectionMonitor::new(0);
        monitor.transport_ready();
        monitor.handle_identity_reply(sigma_identity(), Instant::now());
        assert_eq!(monitor.state(), &ConnectionState::Connected);
        assert!(monitor.identity().is_some());
    }

    #[test]
    fn test_foreign_identity_is_ignored() {
        let mut monitor = ConnectionMonitor::new(0);
        monitor.transport_ready();
        let mut identity = sigma_identity();
        identity.manufacturer = [0x00, 0x20, 0x6B];
        monitor.handle_identity_reply(identity, Instant::now());
        assert_eq!(monitor.state(), &ConnectionState::AwaitingIdentity);
        assert!(monitor.identity().is_none());
    }

    #[test]
    fn test_liveness_boundary() {
        let mut monitor = ConnectionMonitor::new(0);
        monitor.transport_ready();
        let start = Instant::now();
        monitor.handle_identity_reply(sigma_identity(), start);

        // exactly at the grace window: still connected
        monitor.check_liveness(start + Duration::from_millis(15000));
        assert_eq!(monitor.state(), &ConnectionState::Connected);

        // one past it: degraded
        monitor.check_liveness(start + Duration::from_millis(15001));
        assert!(matches!(monitor.state(), ConnectionState::Degraded(_)));
    }

    #[test]
    fn test_traffic_recovers_degraded() {
        let mut monitor = ConnectionMonitor::new(0);
        monitor.transport_ready();
        let start = Instant::now();
        monitor.handle_identity_reply(sigma_identity(), start);
        monitor.check_liveness(start + Duration::from_secs(60));
        assert!(matches!(monitor.state(), ConnectionState::Degraded(_)));

        monitor.note_traffic(start + Duration::from_secs(61));
        assert_eq!(monitor.state(), &ConnectionState::Connected);
    }

    #[test]
    fn test_global_dump_is_acknowledged_and_device_id_adopted() {
        let mut monitor = ConnectionMonitor::new(0);
        let mut record = crate::sigma::global::GlobalSettingsRecord::default();
        record.device_id = 3;
        let ack = monitor.handle_global_dump(&global::encode(&record));
        assert!(monitor.global().is_some());
        assert_eq!(monitor.device_id(), 3);
        // the ack and everything after it is addressed with the new id
        assert_eq!(ack, sysex::global_dump_received(3));
        let frames = monitor.transport_ready();
        assert_eq!(frames[0], sysex::identity_request(3));
    }

    #[test]
    fn test_port_lost_is_recoverable() {
        let mut monitor = ConnectionMonitor::new(0);
        monitor.transport_ready();
        monitor.port_lost("output port vanished");
        assert!(matches!(monitor.state(), ConnectionState::Error(_)));
        let frames = monitor.transport_ready();
        assert_eq!(monitor.state(), &ConnectionState::AwaitingIdentity);
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_fatal_is_terminal() {
        let mut monitor = ConnectionMonitor::new(0);
        monitor.fatal("no MIDI backend");
        assert!(monitor.transport_ready().is_empty());
        monitor.handle_identity_reply(sigma_identity(), Instant::now());
        assert!(matches!(monitor.state(), ConnectionState::Fatal(_)));
    }

    #[test]
    fn test_snapshot_reports_age() {
        let mut monitor = ConnectionMonitor::new(0);
        monitor.transport_ready();
        let start = Instant::now();
        monitor.handle_identity_reply(sigma_identity(), start);
        let snapshot = monitor.snapshot(start + Duration::from_secs(7));
        assert_eq!(snapshot.state, ConnectionState::Connected);
        assert_eq!(snapshot.seconds_since_heartbeat, Some(7));
        assert_eq!(snapshot.device_version.as_deref(), Some("1.4 (bootloader 2, build 17)"));
    }
}
