pub mod append;
pub mod batch;
pub mod raw;
pub mod row;
