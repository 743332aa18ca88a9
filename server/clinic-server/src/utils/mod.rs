pub mod numbers;
pub mod query_builder;
pub mod timestamps;
