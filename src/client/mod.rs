pub mod api;
pub mod reconcile;

pub use api::{ClientError, HttpSeatsApi, LocalSeatsApi, SeatsApi};
pub use reconcile::{LocalSeatState, ReconciliationLoop, SeatAction, SeatBoard};
