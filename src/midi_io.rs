//! MIDI transport wiring.
//!
//! Owns the midir port handles and bridges them to the event loop: the
//! input callback (which runs on the backend's own thread) pushes raw
//! messages into the event channel, and a writer task drains outbound
//! frames into the output port.

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput};
use tokio::{
    sync::mpsc::{Sender, channel},
    task::JoinHandle,
};

use crate::{
    control_center::Event,
    error::{AppError, ErrorType},
};

const CLIENT_NAME: &str = "sigma-control";

/// Keeps the transport alive. Dropping this closes both ports.
pub struct MidiIo {
    _input: MidiInputConnection<()>,
    _writer: JoinHandle<()>,
}

/// Opens the input and output ports and returns the outbound frame
/// sender. The port is picked by substring match on `port_hint`, or the
/// first available port when no hint is given.
pub fn connect(
    event_tx: Sender<Event>,
    port_hint: Option<&str>,
) -> Result<(Sender<Vec<u8>>, MidiIo), AppError> {
    let mut input = MidiInput::new(CLIENT_NAME)
        .map_err(|e| AppError::new(ErrorType::MidiUnavailable, format!("{:?}", e)))?;
    // SysEx is filtered out by default
    input.ignore(Ignore::None);

    let in_ports = input.ports();
    let in_port = pick_port(&in_ports, port_hint, |p| input.port_name(p).ok())?;
    let in_port_name = input.port_name(in_port).unwrap_or_default();
    log::info!("Using MIDI input port \"{}\"", in_port_name);

    let callback_tx = event_tx.clone();
    let input_connection = input
        .connect(
            in_port,
            CLIENT_NAME,
            move |_timestamp, bytes, _| {
                // runs on the MIDI backend thread, outside the runtime
                if let Err(e) = callback_tx.blocking_send(Event::MidiIn(bytes.to_vec())) {
                    log::error!("Event channel is gone: {:?}", e);
                }
            },
            (),
        )
        .map_err(|e| AppError::new(ErrorType::MidiUnavailable, format!("{:?}", e)))?;

    let output = MidiOutput::new(CLIENT_NAME)
        .map_err(|e| AppError::new(ErrorType::MidiUnavailable, format!("{:?}", e)))?;
    let out_ports = output.ports();
    let out_port = pick_port(&out_ports, port_hint, |p| output.port_name(p).ok())?;
    let out_port_name = output.port_name(out_port).unwrap_or_default();
    log::info!("Using MIDI output port \"{}\"", out_port_name);

    let mut output_connection = output
        .connect(out_port, CLIENT_NAME)
        .map_err(|e| AppError::new(ErrorType::MidiUnavailable, format!("{:?}", e)))?;

    let (midi_tx, mut midi_rx) = channel::<Vec<u8>>(64);
    let writer = tokio::spawn(async move {
        while let Some(frame) = midi_rx.recv().await {
            log::debug!("MIDI out: {}", hex::encode(&frame));
            if let Err(e) = output_connection.send(&frame) {
                log::error!("MIDI send failed: {:?}", e);
                let _ = event_tx
                    .send(Event::PortsLost(format!("{:?}", e)))
                    .await;
                return;
            }
        }
    });

    return Ok((
        midi_tx,
        MidiIo {
            _input: input_connection,
            _writer: writer,
        },
    ));
}

fn pick_port<'a, P, F>(ports: &'a [P], hint: Option<&str>, name_of: F) -> Result<&'a P, AppError>
where
    F: Fn(&P) -> Option<String>,
{
    if ports.is_empty() {
        return Err(AppError::new(
            ErrorType::MidiUnavailable,
            "no MIDI ports available".to_string(),
        ));
    }
    let Some(hint) = hint else {
        return Ok(&ports[0]);
    };
    for port in ports {
        if let Some(name) = name_of(port) {
            if name.contains(hint) {
                return Ok(port);
            }
        }
    }
    return Err(AppError::new(
        ErrorType::MidiUnavailable,
        format!("no MIDI port matching \"{}\"", hint),
    ));
}

/// A frame sender whose receiver discards everything. Lets the control
/// center run without a transport, e.g. when no device is plugged in.
pub fn null_sender() -> Sender<Vec<u8>> {
    let (midi_tx, mut midi_rx) = channel::<Vec<u8>>(64);
    tokio::spawn(async move {
        while let Some(frame) = midi_rx.recv().await {
            log::debug!("Discarding outbound frame: {}", hex::encode(&frame));
        }
    });
    return midi_tx;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_port() {
        let ports = vec!["Sigma VS MIDI 1".to_string(), "Through Port-0".to_string()];
        let name_of = |p: &String| Some(p.clone());

        let picked = pick_port(&ports, None, name_of).unwrap();
        assert_eq!(picked, "Sigma VS MIDI 1");

        let picked = pick_port(&ports, Some("Through"), name_of).unwrap();
        assert_eq!(picked, "Through Port-0");

        assert!(pick_port(&ports, Some("Prophet"), name_of).is_err());
        let empty: Vec<String> = vec![];
        assert!(pick_port(&empty, None, name_of).is_err());
    }
}
