//! Business logic services for the call service.

pub mod admission;

pub use admission::AdmissionService;
