//! Document session and editor controller for Folio
//!
//! The session is an explicit state machine (`Loading`, `Clean`, `Dirty`)
//! owned by a single [`EditorController`]. Surfaces never mutate it; they
//! receive a [`folio_core::SessionView`] after every transition.

pub mod controller;
pub mod editor_state;

pub use controller::EditorController;
pub use editor_state::{DocumentSession, EditOutcome, LoadOutcome, LoadTicket};
