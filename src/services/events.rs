//! Event system for registry operations
//!
//! Provides an event bus for notifying listeners about registry
//! operations. Useful for:
//! - Audit logging
//! - Analytics cache invalidation
//! - Real-time notifications

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Registry events emitted by services
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    // Content events
    ContentCreated {
        id: String,
        kind: String,
        owner_id: String,
    },
    ContentUpdated {
        id: String,
    },
    ContentDeleted {
        id: String,
    },

    // Survey events
    SurveyCreated {
        id: String,
        title: String,
    },
    ResponseSubmitted {
        survey_id: String,
        response_id: String,
        is_complete: bool,
    },
    AnalyticsComputed {
        survey_id: String,
        total_responses: u64,
    },

    // Petition events
    PetitionFiled {
        id: String,
        unit_id: Option<String>,
    },
    PetitionStatusChanged {
        id: String,
        status: String,
    },

    // Directory events
    PrincipalRegistered {
        id: String,
        role: String,
    },
    UnitCreated {
        id: String,
        name: String,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &RegistryEvent);
}

/// Event bus for broadcasting registry events
pub struct EventBus {
    sender: broadcast::Sender<RegistryEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: RegistryEvent) {
        trace!(event = ?event, "Emitting registry event");
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &RegistryEvent) {
        match event {
            RegistryEvent::ContentCreated { id, kind, owner_id } => {
                debug!(id = %id, kind = %kind, owner = %owner_id, "Content created");
            }
            RegistryEvent::ContentDeleted { id } => {
                debug!(id = %id, "Content deleted");
            }
            RegistryEvent::SurveyCreated { id, title } => {
                debug!(id = %id, title = %title, "Survey created");
            }
            RegistryEvent::ResponseSubmitted {
                survey_id,
                response_id,
                is_complete,
            } => {
                debug!(
                    survey = %survey_id,
                    response = %response_id,
                    complete = is_complete,
                    "Response submitted"
                );
            }
            RegistryEvent::PetitionStatusChanged { id, status } => {
                debug!(id = %id, status = %status, "Petition status changed");
            }
            _ => {
                trace!(event = ?event, "Registry event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
