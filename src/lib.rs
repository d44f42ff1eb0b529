pub mod api;
pub mod imaging;
pub mod models;
pub mod pipeline;
pub mod store;
