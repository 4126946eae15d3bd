pub mod sessions;
pub mod similarity;
pub mod store;
