//! Background execution of pipeline runs.

pub mod dispatcher;

pub use dispatcher::JobDispatcher;
