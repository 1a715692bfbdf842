//! Property tests: random operation sequences against the reservation engine.
//!
//! After every step the registry must satisfy:
//! - a purchased seat never changes again;
//! - a release by a non-holder changes nothing;
//! - a failed purchase changes none of its seats, a successful one
//!   purchases all of them under one name;
//! - a held seat has exactly one holder and a purchased seat none.

#![allow(clippy::unwrap_used)]

use chrono::{Duration as ChronoDuration, Utc};
use proptest::prelude::*;
use seat_booking::config::VenueConfig;
use seat_booking::models::{ClientId, SeatId, SeatState, SeatStatus};
use seat_booking::registry::SeatRegistry;
use seat_booking::services::ReservationEngine;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const ROWS: u16 = 3;
const COLS: u16 = 3;
const CLIENTS: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    Hold { seat: SeatId, client: usize, age_secs: i64 },
    Release { seat: SeatId, client: usize },
    Purchase { seats: Vec<SeatId>, client: usize },
    Sweep,
}

fn seat_strategy() -> impl Strategy<Value = SeatId> {
    (1..=ROWS, 1..=COLS).prop_map(|(row, col)| SeatId::new(row, col))
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (seat_strategy(), 0..CLIENTS, 0i64..600)
            .prop_map(|(seat, client, age_secs)| Op::Hold { seat, client, age_secs }),
        2 => (seat_strategy(), 0..CLIENTS).prop_map(|(seat, client)| Op::Release { seat, client }),
        2 => (prop::collection::vec(seat_strategy(), 1..4), 0..CLIENTS)
            .prop_map(|(seats, client)| Op::Purchase { seats, client }),
        1 => Just(Op::Sweep),
    ]
}

fn client(i: usize) -> ClientId {
    ClientId::new(format!("c{i}"))
}

fn statuses(registry: &SeatRegistry) -> BTreeMap<SeatId, SeatStatus> {
    registry.statuses().into_iter().collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn seat_state_invariants_hold_for_any_sequence(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let registry = Arc::new(SeatRegistry::new(&VenueConfig { rows: ROWS, cols: COLS, vip_rows: 1, ..VenueConfig::default() }));
        let engine = ReservationEngine::new(registry.clone());
        let now = Utc::now();
        let ttl = Duration::from_secs(300);

        for op in ops {
            let before = statuses(&registry);

            match &op {
                Op::Hold { seat, client: c, age_secs } => {
                    let res = engine.hold_at(*seat, &client(*c), now - ChronoDuration::seconds(*age_secs));
                    let was = &before[seat];
                    let may_hold = matches!(was, SeatStatus::Available) || was.is_held_by(&client(*c));
                    prop_assert_eq!(res.is_ok(), may_hold);
                    if res.is_err() {
                        prop_assert_eq!(&statuses(&registry), &before);
                    }
                }
                Op::Release { seat, client: c } => {
                    let res = engine.release(*seat, &client(*c));
                    prop_assert!(res.is_ok());
                    if !before[seat].is_held_by(&client(*c)) {
                        prop_assert_eq!(&statuses(&registry), &before);
                    }
                }
                Op::Purchase { seats, client: c } => {
                    let res = engine.purchase(seats, &client(*c), "Buyer");
                    let after = statuses(&registry);
                    match res {
                        Ok(receipt) => {
                            for seat in &receipt.seat_ids {
                                prop_assert!(before[seat].is_held_by(&client(*c)));
                                prop_assert_eq!(after[seat].purchaser_name(), Some("Buyer"));
                            }
                        }
                        Err(_) => {
                            prop_assert_eq!(&after, &before);
                        }
                    }
                }
                Op::Sweep => {
                    engine.expire_stale_holds(ttl, now);
                }
            }

            let after = statuses(&registry);
            for (seat, was) in &before {
                if let SeatStatus::Purchased { .. } = was {
                    prop_assert_eq!(&after[seat], was, "purchased seat {} changed", seat);
                }
            }
            for seat in registry.list() {
                match seat.state {
                    SeatState::Available => {
                        prop_assert!(seat.holder_id.is_none() && seat.purchaser_name.is_none());
                    }
                    SeatState::Held => {
                        prop_assert!(seat.holder_id.is_some() && seat.purchaser_name.is_none());
                    }
                    SeatState::Purchased => {
                        prop_assert!(seat.holder_id.is_none() && seat.purchaser_name.is_some());
                    }
                }
            }
        }
    }

    #[test]
    fn list_order_is_row_then_col(rows in 1u16..6, cols in 1u16..6) {
        let registry = SeatRegistry::new(&VenueConfig { rows, cols, vip_rows: 0, ..VenueConfig::default() });
        let ids: Vec<SeatId> = registry.list().into_iter().map(|s| s.id).collect();
        let expected: Vec<SeatId> = (1..=rows)
            .flat_map(|r| (1..=cols).map(move |c| SeatId::new(r, c)))
            .collect();
        prop_assert_eq!(ids, expected);
    }
}
