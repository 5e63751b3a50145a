//! Output storage
//!
//! Atomic publication of vector envelopes to every configured target.

pub mod publisher;

pub use publisher::{
    dir_mode, encode_envelope, write_atomic, EmptyPolicy, PublishError, TargetFailure,
    VectorPublisher,
};
