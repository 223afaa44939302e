pub mod api;
pub mod model;
pub mod sensor;

pub use api::Error;
