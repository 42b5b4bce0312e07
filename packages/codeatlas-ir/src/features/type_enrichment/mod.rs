//! Type enrichment: language-server-backed type attachment.

pub mod enricher;
pub mod ports;

pub use enricher::{EnrichSummary, EnricherConfig, TypeEnricher};
pub use ports::{LspPort, LspState};
