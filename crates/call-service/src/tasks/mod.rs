//! Background tasks for the call service.

pub mod retention_sweep;
