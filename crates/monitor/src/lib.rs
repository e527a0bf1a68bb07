// Craftwatch Monitor
//
// Status polling, force-check handling, reconciliation and the runtime that
// ties them to the log tailer and the publisher.

pub mod controller;
pub mod diagnosis;
pub mod force_check;
pub mod poller;
pub mod runtime;

pub use controller::ReconciliationController;
pub use diagnosis::{diagnose, Diagnosis};
pub use force_check::ForceCheck;
pub use poller::{verdict_of, PollCycle, StatusPoller, StatusProbe};
pub use runtime::Monitor;
