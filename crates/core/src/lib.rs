pub mod config;
pub mod error;
pub mod presence;
pub mod reconcile;
pub mod roster;

// Re-export commonly used types
pub use config::{Config, ConfigLoader, ConfigValidator};
pub use error::{CraftwatchError, DomainError, InfraError};
pub use presence::{
    EndpointKind, EventSource, NotificationSnapshot, PlayerName, PollVerdict, PresenceEvent,
    PresenceKind, RosterMutation, RosterState, Signal,
};
pub use reconcile::{mutation_for, reconcile};
pub use roster::{Applied, RosterStore};
