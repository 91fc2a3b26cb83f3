#![allow(clippy::result_large_err)]

//! Client-side core of the Confirmd credential-issuance demo.
//!
//! The flow is almost entirely state synchronization against two external
//! collaborators: the demo backend (a thin proxy in front of a Traction
//! tenant) and the push-event channel the backend relays agent webhooks
//! over. The modules here mirror that split:
//!
//! * [`api`] — typed surface of the backend plus invitation helpers
//! * [`channel`] — the push-event channel and its message envelope
//! * [`connection`] — connection state tracking with a monotonic `active`
//! * [`credential`] — credential templates and the issuance orchestrator
//! * [`wizard`] — the linear step controller gating forward progress
//! * [`flows`] — the scripted confirmed-person flow wiring it all up

#[macro_use]
extern crate log;

#[macro_use]
extern crate serde;

pub mod api;
pub mod channel;
pub mod connection;
pub mod credential;
pub mod errors;
pub mod flows;
pub mod wizard;
