//! Application services: dispatch, invocation, jobs, and polling.

pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod generator;
pub mod invoker;
pub mod jobs;
pub mod poller;
pub mod repos;

#[cfg(test)]
pub(crate) mod testing;
