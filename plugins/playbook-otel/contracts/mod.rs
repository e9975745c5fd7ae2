//! Playbook OTel Contract Definitions
//!
//! This module defines the boundary between the execution engine and the
//! correlator: the lifecycle events the engine emits while a playbook runs.
//!
//! # Delivery guarantees assumed
//!
//! - Events arrive one at a time, in the engine's delivery order.
//! - A unit's start precedes all of that unit's completions.
//! - Nothing else is guaranteed: completions for different targets of one
//!   unit may arrive in any order, may repeat, or may never arrive.

pub mod events;

pub use events::{LifecycleEvent, Outcome, RunCounts, UnitId};
