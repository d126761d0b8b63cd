pub mod data_type;
pub mod identifiers;
pub mod schema;
pub mod value;
