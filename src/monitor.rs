//! Device monitor thread.
//!
//! Watches the host's device population for arrivals and departures and
//! doubles as the engine's management heartbeat. The host backends in use
//! expose no portable change notification, so the monitor polls the
//! enumerator on an interval and diffs by device id. Communication follows
//! the dedicated-thread pattern used elsewhere: commands in, callback out,
//! join on drop.
//!
//! The sink callback must not block for long and must never take a lock the
//! engine holds while joining this thread; the engine satisfies that by
//! handing real work to short-lived detached threads.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::device::DeviceInfo;

/// Notifications delivered to the sink, in diff order (removals first).
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    DeviceAdded(DeviceInfo),
    DeviceRemoved(DeviceInfo),
    /// One poll cycle completed. Emitted every interval regardless of
    /// population changes; the engine uses it to surface callback-side
    /// faults and pending warnings.
    Poll,
}

enum MonitorCommand {
    Shutdown,
}

/// Handle to the monitor thread. Send + Sync; the thread is joined when the
/// handle drops.
pub struct DeviceMonitorHandle {
    command_tx: Sender<MonitorCommand>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceMonitorHandle {
    pub fn spawn<E, S>(poll_interval: Duration, enumerate: E, sink: S) -> Self
    where
        E: Fn() -> Vec<DeviceInfo> + Send + 'static,
        S: FnMut(MonitorEvent) + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("device-monitor".into())
            .spawn(move || {
                monitor_thread_main(poll_interval, enumerate, sink, command_rx);
            })
            .expect("spawning the device monitor thread");

        Self {
            command_tx,
            thread: Some(thread),
        }
    }

    #[allow(dead_code)]
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(MonitorCommand::Shutdown);
    }
}

impl Drop for DeviceMonitorHandle {
    fn drop(&mut self) {
        let _ = self.command_tx.send(MonitorCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn monitor_thread_main<E, S>(
    poll_interval: Duration,
    enumerate: E,
    mut sink: S,
    command_rx: Receiver<MonitorCommand>,
) where
    E: Fn() -> Vec<DeviceInfo>,
    S: FnMut(MonitorEvent),
{
    log::debug!("device monitor started, polling every {poll_interval:?}");
    let mut known = enumerate();

    loop {
        match command_rx.recv_timeout(poll_interval) {
            Ok(MonitorCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                let current = enumerate();
                for removed in known.iter().filter(|k| !contains(&current, k)) {
                    log::info!("device removed: \"{}\"", removed.id);
                    sink(MonitorEvent::DeviceRemoved(removed.clone()));
                }
                for added in current.iter().filter(|c| !contains(&known, c)) {
                    log::info!("device added: \"{}\"", added.id);
                    sink(MonitorEvent::DeviceAdded(added.clone()));
                }
                known = current;
                sink(MonitorEvent::Poll);
            }
        }
    }

    log::debug!("device monitor exiting");
}

fn contains(devices: &[DeviceInfo], device: &DeviceInfo) -> bool {
    devices.iter().any(|d| d.id == device.id)
}

#[cfg(test)]
#[path = "monitor_test.rs"]
mod tests;
