//! The single event loop that owns all mutable state.
//!
//! Every stimulus (inbound MIDI, heartbeat ticks, console commands,
//! transport lifecycle) is funneled into one channel and handled one at
//! a time, so the connection monitor and the patch engine never need
//! locking.

use std::time::{Duration, Instant};

use tokio::{
    sync::mpsc::{Receiver, Sender},
    task::JoinHandle,
};

use crate::{
    command::Command,
    connection::ConnectionMonitor,
    error::{AppError, ErrorType},
    patch_engine::{ChangeOrigin, PatchEngine},
    sigma as sg,
    sigma::sysex::{self, SysexCommand},
};

#[derive(Debug)]
pub enum Event {
    /// One raw inbound MIDI message, channel voice or SysEx.
    MidiIn(Vec<u8>),
    HeartbeatTick,
    Command(Command),
    TransportReady,
    TransportFailed(String),
    PortsLost(String),
}

pub fn start(
    event_tx: Sender<Event>,
    mut event_rx: Receiver<Event>,
    midi_tx: Sender<Vec<u8>>,
) -> JoinHandle<()> {
    let handle = tokio::spawn(async move {
        let mut center = ControlCenter::new(event_tx, midi_tx);
        while let Some(event) = event_rx.recv().await {
            center.handle_event(event).await;
        }
        log::info!("Control center shutting down");
        center.stop_heartbeat();
    });
    return handle;
}

struct ControlCenter {
    event_tx: Sender<Event>,
    midi_tx: Sender<Vec<u8>>,
    monitor: ConnectionMonitor,
    engine: PatchEngine,
    heartbeat: Option<JoinHandle<()>>,
}

impl ControlCenter {
    fn new(event_tx: Sender<Event>, midi_tx: Sender<Vec<u8>>) -> Self {
        let device_id = 0;
        Self {
            event_tx,
            midi_tx,
            monitor: ConnectionMonitor::new(device_id),
            engine: PatchEngine::new(1, device_id),
            heartbeat: None,
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::MidiIn(bytes) => self.handle_midi(&bytes).await,
            Event::HeartbeatTick => self.handle_heartbeat_tick().await,
            Event::Command(command) => self.handle_command(command).await,
            Event::TransportReady => {
                let frames = self.monitor.transport_ready();
                self.send_frames(frames).await;
                self.start_heartbeat();
            }
            Event::TransportFailed(reason) => {
                self.monitor.fatal(&reason);
                self.stop_heartbeat();
            }
            Event::PortsLost(reason) => {
                self.monitor.port_lost(&reason);
                self.stop_heartbeat();
            }
        }
    }

    // inbound MIDI handling //////////////////////////////////////////

    async fn handle_midi(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if bytes[0] == sg::SYSEX_START {
            self.handle_sysex(bytes).await;
            return;
        }
        if bytes[0] & 0xF0 == sg::STATUS_CONTROL_CHANGE && bytes.len() >= 3 {
            self.monitor.note_traffic(Instant::now());
            self.engine.handle_control_change(bytes[1], bytes[2]);
            return;
        }
        log::debug!("Ignoring inbound message: {}", hex::encode(bytes));
    }

    async fn handle_sysex(&mut self, bytes: &[u8]) {
        let Some(command) = sysex::classify(bytes) else {
            log::debug!("Unrecognized SysEx: {}", hex::encode(bytes));
            return;
        };
        self.monitor.note_traffic(Instant::now());
        match command {
            SysexCommand::IdentityReply(identity) => {
                self.monitor.handle_identity_reply(identity, Instant::now());
            }
            SysexCommand::GlobalDump(payload) => {
                let ack = self.monitor.handle_global_dump(&payload);
                // outbound frames must follow the device's configured
                // channel and ID from here on
                self.engine.set_device_id(self.monitor.device_id());
                if let Some(global) = self.monitor.global() {
                    self.engine.set_channel(global.midi_channel);
                }
                self.send_frame(ack).await;
            }
            SysexCommand::EditBufferDump(payload) | SysexCommand::PatchDump(payload) => {
                self.engine.apply_dump(&payload);
            }
            SysexCommand::PatchName(payload) => {
                let name: String = payload
                    .iter()
                    .map(|b| if (0x20..=0x7E).contains(b) { *b as char } else { ' ' })
                    .collect();
                self.engine.set_name(name.trim_end(), ChangeOrigin::SysexDumpIn);
            }
            SysexCommand::ParamSet { param, value } => {
                self.engine.handle_param_set(param, value);
            }
            SysexCommand::PatternDump(payload) => {
                // no pattern editor yet; record the raw bytes in the log
                log::info!(
                    "Pattern dump received ({} bytes): {}",
                    payload.len(),
                    hex::encode(&payload)
                );
            }
            SysexCommand::SequencerDump(payload) => {
                log::info!(
                    "Sequencer dump received ({} bytes): {}",
                    payload.len(),
                    hex::encode(&payload)
                );
            }
            SysexCommand::GlobalDumpReceived => {
                log::debug!("Device acknowledged a global dump");
            }
            other => {
                // requests flow towards the device, not from it
                log::debug!("Ignoring inbound request: {:?}", other);
            }
        }
    }

    // heartbeat //////////////////////////////////////////////////////

    async fn handle_heartbeat_tick(&mut self) {
        self.monitor.check_liveness(Instant::now());
        let probing = self.monitor.is_connected()
            || *self.monitor.state() == crate::connection::ConnectionState::AwaitingIdentity;
        if probing {
            self.send_frame(sysex::identity_request(self.monitor.device_id()))
                .await;
        }
    }

    fn start_heartbeat(&mut self) {
        self.stop_heartbeat();
        let event_tx = self.event_tx.clone();
        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(sg::HEARTBEAT_INTERVAL_MS));
            // the first tick fires immediately; the opening enquiry
            // already went out, so skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if event_tx.send(Event::HeartbeatTick).await.is_err() {
                    return;
                }
            }
        });
        self.heartbeat = Some(handle);
    }

    fn stop_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
    }

    // console commands ///////////////////////////////////////////////

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Hi { resp } => {
                let _ = resp.send(Ok("hello".to_string()));
            }
            Command::Status { resp } => {
                let _ = resp.send(Ok(self.monitor.snapshot(Instant::now())));
            }
            Command::GetPatch { resp } => {
                let _ = resp.send(Ok(self.engine.patch().clone()));
            }
            Command::GetGlobal { resp } => {
                let _ = resp.send(Ok(self.monitor.global().cloned()));
            }
            Command::SetParam { param, value, resp } => {
                let frames = self.engine.set_param(param, value, ChangeOrigin::UserEdit);
                self.send_frames(frames).await;
                let _ = resp.send(Ok(()));
            }
            Command::SetName { name, resp } => {
                let frames = self.engine.set_name(&name, ChangeOrigin::UserEdit);
                self.send_frames(frames).await;
                let _ = resp.send(Ok(()));
            }
            Command::SelectPatch {
                group,
                bank,
                patch,
                resp,
            } => {
                let frames = self.engine.select_patch_address(group, bank, patch);
                self.send_frames(frames).await;
                let _ = resp.send(Ok(()));
            }
            Command::RequestGlobalDump { resp } => {
                let device_id = self.monitor.device_id();
                let _ = resp.send(
                    self.request_if_connected(sysex::global_dump_request(device_id))
                        .await,
                );
            }
            Command::RequestPatchDump { slot, resp } => {
                let device_id = self.monitor.device_id();
                let frame = match slot {
                    Some(slot) => sysex::patch_dump_request(device_id, slot),
                    None => sysex::edit_buffer_dump_request(device_id),
                };
                let _ = resp.send(self.request_if_connected(frame).await);
            }
            Command::RequestParamValue { param, resp } => {
                let frame = sysex::param_get(self.monitor.device_id(), param.cc());
                let _ = resp.send(self.request_if_connected(frame).await);
            }
            Command::RequestPatternDump { resp } => {
                let frame = sysex::pattern_dump_request(self.monitor.device_id());
                let _ = resp.send(self.request_if_connected(frame).await);
            }
            Command::RequestSequencerDump { resp } => {
                let frame = sysex::sequencer_dump_request(self.monitor.device_id());
                let _ = resp.send(self.request_if_connected(frame).await);
            }
            Command::RequestPatchName { resp } => {
                let frame = sysex::patch_name_request(self.monitor.device_id());
                let _ = resp.send(self.request_if_connected(frame).await);
            }
        }
    }

    async fn request_if_connected(&mut self, frame: Vec<u8>) -> Result<(), AppError> {
        if !self.monitor.is_connected() {
            return Err(AppError::new(
                ErrorType::NotConnected,
                format!("connection state is {:?}", self.monitor.state()),
            ));
        }
        self.send_frame(frame).await;
        return Ok(());
    }

    // outbound ///////////////////////////////////////////////////////

    async fn send_frame(&mut self, frame: Vec<u8>) {
        if let Err(e) = self.midi_tx.send(frame).await {
            log::error!("MIDI writer is gone: {:?}", e);
        }
    }

    async fn send_frames(&mut self, frames: Vec<Vec<u8>>) {
        for frame in frames {
            self.send_frame(frame).await;
        }
    }
}
