pub mod document;
pub mod paths;
pub mod store;
