//! Idle detector background task
//!
//! Drives [`IdleMachine`] from a command channel and a single pending
//! deadline. Each loop iteration rebuilds the sleep from the machine's
//! current deadline, so an input always cancels the old countdown before a
//! new one is armed.

use std::time::Duration;
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{debug, info, warn};

use crate::{
    config::IdleConfig,
    state::{IdleMachine, IdlePhase, IdleSnapshot, IdleTransition},
};

/// Input to the idle detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleCommand {
    Presence,
    Confirm,
    Visibility(bool),
    Shutdown,
}

/// Transition broadcast to subscribers such as the escalation coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleEvent {
    Idle { tab_visible: bool },
    Active { from: IdlePhase, tab_visible: bool },
    PromptTimeout { idle_for: Duration, tab_visible: bool },
    VisibilityChanged { visible: bool },
}

/// Cloneable handle for feeding the detector and reading its phase
#[derive(Debug, Clone)]
pub struct IdleHandle {
    commands: mpsc::UnboundedSender<IdleCommand>,
    snapshot: watch::Receiver<IdleSnapshot>,
}

impl IdleHandle {
    fn send(&self, command: IdleCommand) {
        if self.commands.send(command).is_err() {
            debug!("Idle detector stopped, dropping {:?}", command);
        }
    }

    pub fn presence(&self) {
        self.send(IdleCommand::Presence);
    }

    pub fn confirm(&self) {
        self.send(IdleCommand::Confirm);
    }

    pub fn set_visible(&self, visible: bool) {
        self.send(IdleCommand::Visibility(visible));
    }

    /// Stop the detector; no transition fires after it has processed this
    pub fn shutdown(&self) {
        self.send(IdleCommand::Shutdown);
    }

    pub fn snapshot(&self) -> IdleSnapshot {
        *self.snapshot.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<IdleSnapshot> {
        self.snapshot.clone()
    }
}

/// Spawn the detector task and return its handle
pub fn spawn_idle_detector(
    config: IdleConfig,
    events: broadcast::Sender<IdleEvent>,
) -> (IdleHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let origin = Instant::now();
    let machine = IdleMachine::new(config, 0);
    let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());

    let task = tokio::spawn(idle_detector_task(
        machine,
        origin,
        command_rx,
        snapshot_tx,
        events,
    ));

    let handle = IdleHandle {
        commands: command_tx,
        snapshot: snapshot_rx,
    };
    (handle, task)
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

fn emit(events: &broadcast::Sender<IdleEvent>, event: IdleEvent) {
    // No subscribers is fine; the phase is still published on the watch channel
    if events.send(event).is_err() {
        debug!("No idle event subscribers for {:?}", event);
    }
}

/// Background task owning the idle state machine
pub async fn idle_detector_task(
    mut machine: IdleMachine,
    origin: Instant,
    mut commands: mpsc::UnboundedReceiver<IdleCommand>,
    snapshot: watch::Sender<IdleSnapshot>,
    events: broadcast::Sender<IdleEvent>,
) {
    info!("Starting idle detector task");
    let now_ms = || origin.elapsed().as_millis() as i64;

    loop {
        let deadline = machine
            .next_deadline()
            .map(|ms| origin + Duration::from_millis(ms.max(0) as u64));

        let transition = tokio::select! {
            command = commands.recv() => {
                let now = now_ms();
                match command {
                    None | Some(IdleCommand::Shutdown) => break,
                    Some(IdleCommand::Presence) => machine.presence(now),
                    Some(IdleCommand::Confirm) => machine.confirm(now),
                    Some(IdleCommand::Visibility(visible)) => {
                        if machine.set_visible(visible, now) {
                            info!("Tab visibility changed: visible={}", visible);
                            emit(&events, IdleEvent::VisibilityChanged { visible });
                        }
                        None
                    }
                }
            }
            _ = wait_for(deadline) => machine.poll(now_ms()),
        };

        let tab_visible = machine.tab_visible();
        match transition {
            Some(IdleTransition::Idle) => {
                info!("No presence for the idle threshold, prompting");
                emit(&events, IdleEvent::Idle { tab_visible });
            }
            Some(IdleTransition::Active { from }) => {
                info!("User active again (from {:?})", from);
                emit(&events, IdleEvent::Active { from, tab_visible });
            }
            Some(IdleTransition::PromptTimeout { idle_for_ms }) => {
                warn!("Idle prompt timed out after {}ms of inactivity", idle_for_ms);
                emit(
                    &events,
                    IdleEvent::PromptTimeout {
                        idle_for: Duration::from_millis(idle_for_ms.max(0) as u64),
                        tab_visible,
                    },
                );
            }
            None => {}
        }

        snapshot.send_if_modified(|current| {
            let next = machine.snapshot();
            let changed = *current != next;
            *current = next;
            changed
        });
    }

    info!("Idle detector task stopped");
}
