pub mod command;
pub mod connection;
pub mod control_center;
pub mod error;
pub mod midi_io;
pub mod patch_engine;
pub mod sigma;
pub mod user_session;

use tokio::sync::mpsc::channel;

use crate::control_center::Event;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    log::info!("Sigma control started");

    let port_hint = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SIGMA_MIDI_PORT").ok());

    let (event_tx, event_rx) = channel::<Event>(64);

    // Bring the transport up first so the control center can start
    // probing as soon as it runs. Running without a device is fine; the
    // console still works, outbound frames go nowhere.
    let (midi_tx, _midi_io) = match midi_io::connect(event_tx.clone(), port_hint.as_deref()) {
        Ok((midi_tx, midi_io)) => {
            event_tx
                .send(Event::TransportReady)
                .await
                .expect("event channel closed before startup");
            (midi_tx, Some(midi_io))
        }
        Err(e) => {
            log::error!("MIDI transport unavailable: {}", e);
            event_tx
                .send(Event::TransportFailed(e.message.clone()))
                .await
                .expect("event channel closed before startup");
            (midi_io::null_sender(), None)
        }
    };

    let center_handle = control_center::start(event_tx.clone(), event_rx, midi_tx);

    let (mut command_rx, _session_handle) = user_session::start().await?;
    let command_event_tx = event_tx.clone();
    tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            if command_event_tx.send(Event::Command(command)).await.is_err() {
                return;
            }
        }
    });

    center_handle.await.expect("control center panicked");
    return Ok(());
}
