//! Dedicated thread owning the host backend.
//!
//! Host stream objects are not `Send`, so the backend is constructed and
//! driven entirely on one thread. The controller holds a
//! [`StreamThreadHandle`] and every operation is a command with its own
//! response channel; the handle is safe to keep behind the controller
//! mutex.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::device::{DeviceInfo, Direction};
use crate::error::EngineError;

use super::{HostBackend, OpenRequest};

enum StreamCommand {
    ListDevices(Direction, Sender<Result<Vec<DeviceInfo>, EngineError>>),
    Resolve(
        Direction,
        Option<String>,
        Sender<Result<DeviceInfo, EngineError>>,
    ),
    Open(Box<OpenRequest>, Sender<Result<(), EngineError>>),
    Start(Sender<Result<(), EngineError>>),
    Stop(Sender<Result<(), EngineError>>),
    Close(Sender<()>),
    Shutdown,
}

/// Handle to the stream thread. Commands block until the thread responds;
/// all of them are management-path only.
pub struct StreamThreadHandle {
    sender: Sender<StreamCommand>,
    thread: Option<JoinHandle<()>>,
}

impl StreamThreadHandle {
    /// Spawn the stream thread and construct the backend on it. Fails if
    /// the backend itself fails to come up.
    pub fn spawn<B, F>(factory: F) -> Result<Self, EngineError>
    where
        B: HostBackend,
        F: FnOnce() -> Result<B, EngineError> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("audio-host".into())
            .spawn(move || {
                let backend = match factory() {
                    Ok(backend) => {
                        let _ = ready_tx.send(Ok(()));
                        backend
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                stream_thread_main(backend, receiver);
            })
            .map_err(|err| EngineError::HostInitFailed(err.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| EngineError::HostInitFailed("host thread died during startup".into()))??;

        Ok(Self {
            sender,
            thread: Some(thread),
        })
    }

    pub fn list_devices(&self, direction: Direction) -> Result<Vec<DeviceInfo>, EngineError> {
        let (tx, rx) = mpsc::channel();
        self.send(StreamCommand::ListDevices(direction, tx))?;
        self.recv(rx)?
    }

    pub fn resolve(
        &self,
        direction: Direction,
        selector: Option<String>,
    ) -> Result<DeviceInfo, EngineError> {
        let (tx, rx) = mpsc::channel();
        self.send(StreamCommand::Resolve(direction, selector, tx))?;
        self.recv(rx)?
    }

    pub fn open(&self, request: OpenRequest) -> Result<(), EngineError> {
        let (tx, rx) = mpsc::channel();
        self.send(StreamCommand::Open(Box::new(request), tx))?;
        self.recv(rx)?
    }

    pub fn start(&self) -> Result<(), EngineError> {
        let (tx, rx) = mpsc::channel();
        self.send(StreamCommand::Start(tx))?;
        self.recv(rx)?
    }

    /// Stop both streams, giving the host a bounded time to comply. A
    /// deadline overrun means a device stopped responding.
    pub fn stop_with_deadline(&self, deadline: Duration) -> Result<(), EngineError> {
        let (tx, rx) = mpsc::channel();
        self.send(StreamCommand::Stop(tx))?;
        match rx.recv_timeout(deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(EngineError::DeviceLost(format!(
                "devices did not stop within {} ms",
                deadline.as_millis()
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(disconnected()),
        }
    }

    pub fn close(&self) -> Result<(), EngineError> {
        let (tx, rx) = mpsc::channel();
        self.send(StreamCommand::Close(tx))?;
        self.recv(rx)
    }

    /// A device lister detached from the handle's lifetime, for the device
    /// monitor thread.
    pub fn device_lister(&self) -> DeviceLister {
        DeviceLister {
            sender: self.sender.clone(),
        }
    }

    fn send(&self, command: StreamCommand) -> Result<(), EngineError> {
        self.sender.send(command).map_err(|_| disconnected())
    }

    fn recv<T>(&self, rx: Receiver<T>) -> Result<T, EngineError> {
        rx.recv().map_err(|_| disconnected())
    }
}

impl Drop for StreamThreadHandle {
    fn drop(&mut self) {
        let _ = self.sender.send(StreamCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Clonable enumeration access for the monitor thread. Returns an empty
/// list once the stream thread is gone, which the monitor treats as "no
/// change worth reporting" because the engine shuts the monitor down first.
pub struct DeviceLister {
    sender: Sender<StreamCommand>,
}

impl DeviceLister {
    pub fn list(&self, direction: Direction) -> Result<Vec<DeviceInfo>, EngineError> {
        let (tx, rx) = mpsc::channel();
        self.sender
            .send(StreamCommand::ListDevices(direction, tx))
            .map_err(|_| disconnected())?;
        rx.recv().map_err(|_| disconnected())?
    }
}

fn disconnected() -> EngineError {
    EngineError::HostInitFailed("host stream thread disconnected".into())
}

fn stream_thread_main<B: HostBackend>(mut backend: B, receiver: Receiver<StreamCommand>) {
    log::debug!("host stream thread started");

    while let Ok(command) = receiver.recv() {
        match command {
            StreamCommand::ListDevices(direction, tx) => {
                let _ = tx.send(backend.list_devices(direction));
            }
            StreamCommand::Resolve(direction, selector, tx) => {
                let _ = tx.send(backend.resolve(direction, selector.as_deref()));
            }
            StreamCommand::Open(request, tx) => {
                let _ = tx.send(backend.open(*request));
            }
            StreamCommand::Start(tx) => {
                let _ = tx.send(backend.start());
            }
            StreamCommand::Stop(tx) => {
                let _ = tx.send(backend.stop());
            }
            StreamCommand::Close(tx) => {
                backend.close();
                let _ = tx.send(());
            }
            StreamCommand::Shutdown => {
                backend.close();
                break;
            }
        }
    }

    log::debug!("host stream thread exiting");
}
