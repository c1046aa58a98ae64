use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{Command, EngineErrorEvent, Event};
use crate::controller::{ClipEndReceiver, StreamController};
use crate::session::SessionResolver;

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Sender used by the host to dispatch commands to the controller task.
pub type ControllerCommandSender = mpsc::Sender<Command>;

/// Receiver used by the host to read events emitted by the controller task.
pub type ControllerEventReceiver = mpsc::Receiver<Event>;

/// Spawns a tokio task that owns `controller`.
///
/// The task handles commands in arrival order, turns clip-end notices into
/// [`Command::ClipEnded`], and reports command failures as [`Event::Error`].
/// It exits once every command sender is dropped or the event receiver is
/// closed.
pub fn spawn_controller_bridge<R: SessionResolver>(
    controller: StreamController<R>,
    mut clip_ends: ClipEndReceiver,
) -> (
    ControllerCommandSender,
    ControllerEventReceiver,
    JoinHandle<()>,
) {
    let (command_tx, mut command_rx) = mpsc::channel::<Command>(COMMAND_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAPACITY);

    let task = tokio::spawn(async move {
        loop {
            let command = tokio::select! {
                command = command_rx.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
                Some(key) = clip_ends.recv() => Command::ClipEnded(key),
            };

            let events = match controller.handle_command(command).await {
                Ok(events) => events,
                Err(error) => vec![Event::Error(EngineErrorEvent::from_error(&error))],
            };
            for event in events {
                if event_tx.send(event).await.is_err() {
                    return;
                }
            }
        }
        controller.stop_playback();
    });

    (command_tx, event_rx, task)
}
