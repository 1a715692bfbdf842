pub mod api;
pub mod seat;

pub use api::{HoldRequest, OperationResult, PurchaseRequest, ReleaseRequest};
pub use seat::{Category, ClientId, Seat, SeatId, SeatIdParseError, SeatState, SeatStatus};
