pub mod convert;
pub mod descriptor;
pub mod error;
pub mod metrics;
pub mod serializer;
pub mod sink;

#[cfg(test)]
pub(crate) mod test_utils;
