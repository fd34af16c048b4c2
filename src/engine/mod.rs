pub mod assignment;
pub mod coordinator;
pub mod packing;
pub mod publisher;
pub mod queue;
pub mod scoring;
pub mod transitions;
