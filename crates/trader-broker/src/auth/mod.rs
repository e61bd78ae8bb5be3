pub mod lifecycle;
pub mod store;
