pub mod chunker;
pub mod error;
pub mod executor;
