// Batch generator: regional sweeps driven against the validation API
pub mod client; // HTTP client with retry/backoff
pub mod orchestrator; // Bounded-worker fanout per region
pub mod regions; // regions.yaml (region -> product -> exchanges)
pub mod summary; // Thread-safe per-region tally

pub use client::ApiClient;
pub use orchestrator::BatchValidator;
pub use regions::RegionsConfig;
pub use summary::{ExchangeOutcome, ValidationSummary};
