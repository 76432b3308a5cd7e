// Submodules for the declarative rule layer
pub mod loader; // Layered YAML hierarchy, named-set resolution, catalogs
pub mod model; // Rule document types and provenance

// Curated re-exports: the stable API surface for rules
pub use loader::RuleLoader;
pub use model::{normalize_product_type, Rule, RuleLevel, ScalarValue, ScopedRule};
