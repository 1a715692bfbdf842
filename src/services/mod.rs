pub mod cleanup;
pub mod reservation;
pub mod snapshot;

pub use cleanup::CleanupService;
pub use reservation::{HoldOutcome, PurchaseReceipt, ReleaseOutcome, ReservationEngine};
pub use snapshot::{Snapshot, SnapshotPublisher};
