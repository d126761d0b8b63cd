pub mod codec;
pub mod core;
pub mod records;
