//! Correlating remote transcoding jobs with the requests waiting on them.

pub mod coordinator;
pub mod event;
pub mod registry;
pub mod waiter;
