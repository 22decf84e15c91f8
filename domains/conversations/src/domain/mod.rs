//! Conversations domain layer: aggregate, unread ledger, room state, errors

pub mod entities;
pub mod error;
pub mod ledger;
pub mod state;
