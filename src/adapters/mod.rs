pub mod codegen;
pub mod store;
