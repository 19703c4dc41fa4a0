//! Broadcast event bus for flow run events.
//!
//! A single bus may carry events from several runs. [`EventBus::subscribe_run`]
//! follows exactly one of them: it latches onto the next `RunStarted` and
//! ends after that run's `RunCompleted`.

use agentflow_types::event::FlowEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

/// Run-level events per run (`RunStarted`, `RunCompleted`).
const RUN_EVENTS: usize = 2;

/// Upper bound on events a single node emits (started plus completed/failed).
const EVENTS_PER_NODE: usize = 2;

/// Smallest channel the bus will allocate.
const MIN_CAPACITY: usize = 16;

/// Largest channel sized from a node count.
const MAX_CAPACITY: usize = 1 << 16;

/// Multi-consumer bus for [`FlowEvent`]s.
///
/// Cloning shares the underlying channel. Publishing with no subscribers
/// drops the event.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<FlowEvent>,
}

impl EventBus {
    /// Create a bus with an explicit channel capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a bus large enough to hold every event of one run over
    /// `node_count` nodes (up to a fixed ceiling), so a subscriber that
    /// only drains after the run does not lag.
    pub fn for_nodes(node_count: usize) -> Self {
        Self::new(capacity_for(node_count))
    }

    /// Receive every future event, from any run.
    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.sender.subscribe()
    }

    /// Follow the next run that starts on this bus.
    pub fn subscribe_run(&self) -> RunEvents {
        RunEvents {
            rx: self.sender.subscribe(),
            run_id: None,
            finished: false,
        }
    }

    /// Publish to all current subscribers.
    pub fn publish(&self, event: FlowEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("flow event dropped, no subscribers");
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

fn capacity_for(node_count: usize) -> usize {
    node_count
        .saturating_mul(EVENTS_PER_NODE)
        .saturating_add(RUN_EVENTS)
        .clamp(MIN_CAPACITY, MAX_CAPACITY)
}

// ---------------------------------------------------------------------------
// RunEvents
// ---------------------------------------------------------------------------

/// Events of a single run, in publish order.
#[derive(Debug)]
pub struct RunEvents {
    rx: broadcast::Receiver<FlowEvent>,
    run_id: Option<Uuid>,
    finished: bool,
}

impl RunEvents {
    /// The followed run, once its `RunStarted` has been seen.
    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    /// Next event of the followed run.
    ///
    /// Returns `None` after `RunCompleted` or when every sender is gone.
    /// Events from other runs, and anything before the first `RunStarted`,
    /// are skipped.
    pub async fn next(&mut self) -> Option<FlowEvent> {
        if self.finished {
            return None;
        }
        loop {
            let event = match self.rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "run event subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => {
                    self.finished = true;
                    return None;
                }
            };

            match self.run_id {
                None => match &event {
                    FlowEvent::RunStarted { run_id, .. } => self.run_id = Some(*run_id),
                    _ => continue,
                },
                Some(run_id) if event.run_id() != run_id => continue,
                Some(_) => {}
            }

            if matches!(event, FlowEvent::RunCompleted { .. }) {
                self.finished = true;
            }
            return Some(event);
        }
    }
}
