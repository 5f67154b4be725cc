//! Background tasks

pub mod lock_eviction;
pub mod welcome;
