pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod model;

pub use config::Config;
pub use controller::ControllerClient;
pub use error::{HagraphError, Result};
pub use graph::{GraphPayload, RelationGraph};
pub use ingest::{IngestionReport, Ingestor};
