//! Update trigger dispatch
//!
//! [`UpdateDispatcher::attach`] registers one listener per [`UpdateTrigger`]
//! on the top-level view and, recursively, on every child view. Listeners
//! never build a payload themselves: an immediate trigger enqueues
//! [`Message::TriggerFired`] straight away, a debounced one (re)schedules it
//! through the [`Debouncer`]. The message loop then builds the payload from
//! the top-level view.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use gridsync_core::prelude::*;
use gridsync_core::UpdateTrigger;

use crate::message::Message;
use crate::view::{EventSource, ViewPath};

/// Identity of one attached listener: which view, which trigger entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriggerKey {
    pub path: ViewPath,
    /// Index into the trigger list
    pub slot: usize,
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view {:?} slot {}", self.path, self.slot)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Debouncer
// ─────────────────────────────────────────────────────────────────────────────

struct PendingFire {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct DebounceState {
    pending: HashMap<TriggerKey, PendingFire>,
    generation: u64,
}

/// Trailing-edge debounce keyed by [`TriggerKey`].
///
/// Each occurrence aborts the pending fire for its key and schedules a new
/// one `delay` later. Must be used from within a Tokio runtime.
#[derive(Clone)]
pub struct Debouncer {
    state: Arc<Mutex<DebounceState>>,
    msg_tx: mpsc::Sender<Message>,
}

impl fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("pending", &self.pending())
            .finish()
    }
}

impl Debouncer {
    pub fn new(msg_tx: mpsc::Sender<Message>) -> Self {
        Self {
            state: Arc::new(Mutex::new(DebounceState::default())),
            msg_tx,
        }
    }

    pub fn schedule(&self, key: TriggerKey, delay: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.generation += 1;
        let generation = state.generation;

        let shared = Arc::clone(&self.state);
        let msg_tx = self.msg_tx.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = shared.lock().unwrap_or_else(|e| e.into_inner());
                if !state
                    .pending
                    .get(&task_key)
                    .is_some_and(|p| p.generation == generation)
                {
                    // Superseded after the abort could land
                    return;
                }
                state.pending.remove(&task_key);
            }
            if msg_tx
                .send(Message::TriggerFired { key: task_key })
                .await
                .is_err()
            {
                debug!("Debounced trigger fired after the component stopped");
            }
        });

        if let Some(previous) = state.pending.insert(key, PendingFire { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Number of fires currently waiting
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending
            .len()
    }

    pub fn cancel_all(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for (_, pending) in state.pending.drain() {
            pending.handle.abort();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UpdateDispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// The parsed trigger table and the means to attach it to views.
///
/// An immediate trigger that finds the message queue full is not lost: it
/// raises the overflow flag, which the message loop turns into one dispatch
/// of the then-current view.
#[derive(Debug, Clone)]
pub struct UpdateDispatcher {
    triggers: Arc<[UpdateTrigger]>,
    msg_tx: mpsc::Sender<Message>,
    debouncer: Debouncer,
    overflow: Arc<AtomicBool>,
}

impl UpdateDispatcher {
    pub fn new(triggers: Vec<UpdateTrigger>, msg_tx: mpsc::Sender<Message>) -> Self {
        Self {
            triggers: triggers.into(),
            debouncer: Debouncer::new(msg_tx.clone()),
            msg_tx,
            overflow: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn triggers(&self) -> &[UpdateTrigger] {
        &self.triggers
    }

    pub fn trigger(&self, key: &TriggerKey) -> Option<&UpdateTrigger> {
        self.triggers.get(key.slot)
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    /// Clear the overflow flag, returning whether a trigger was collapsed
    pub fn take_overflow(&self) -> bool {
        self.overflow.swap(false, Ordering::AcqRel)
    }

    /// Attach every trigger to `view` and all of its descendants.
    ///
    /// Returns the number of listeners registered.
    pub fn attach(&self, view: &mut dyn EventSource) -> usize {
        let mut attached = 0;
        self.attach_at(view, Vec::new(), &mut attached);
        debug!(
            "Attached {} listener(s) for {} trigger(s)",
            attached,
            self.triggers.len()
        );
        attached
    }

    fn attach_at(&self, view: &mut dyn EventSource, path: ViewPath, attached: &mut usize) {
        for (slot, trigger) in self.triggers.iter().enumerate() {
            let key = TriggerKey {
                path: path.clone(),
                slot,
            };
            view.add_event_listener(trigger.event(), self.listener(key, trigger.delay()));
            *attached += 1;
        }

        let mut index = 0;
        view.for_each_child(&mut |child| {
            let mut child_path = path.clone();
            child_path.push(index);
            self.attach_at(child, child_path, attached);
            index += 1;
        });
    }

    fn listener(&self, key: TriggerKey, delay: Option<Duration>) -> crate::view::EventListener {
        match delay {
            None => {
                let msg_tx = self.msg_tx.clone();
                let overflow = Arc::clone(&self.overflow);
                Box::new(move |_event| {
                    match msg_tx.try_send(Message::TriggerFired { key: key.clone() }) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            debug!("Queue full, collapsing trigger for {}", key);
                            overflow.store(true, Ordering::Release);
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!("Trigger for {} after the component stopped", key);
                        }
                    }
                })
            }
            Some(delay) => {
                let debouncer = self.debouncer.clone();
                Box::new(move |_event| debouncer.schedule(key.clone(), delay))
            }
        }
    }
}
