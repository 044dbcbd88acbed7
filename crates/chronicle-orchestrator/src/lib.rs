//! Chronicle Orchestrator — decides who acts next and drives turn cycles.
//!
//! The controller is a pure synchronous state machine; the driver is the
//! single async worker per session that consults it between turns. Neither
//! touches the event log directly: turns and hook commits go through the
//! [`driver::TurnRunner`] seam implemented by the session facade.

pub mod controller;
pub mod driver;

pub use controller::{
    ControllerError, ControllerFault, ControllerState, ControllerStatus, TurnController,
};
pub use driver::{CompletedTurn, TurnRunner, run_cycle};
