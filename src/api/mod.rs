pub mod http;

pub use http::{GraphQuery, HttpServer};
