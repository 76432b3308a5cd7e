// Service layer sitting between the HTTP adapter and the engine
pub mod instruments; // Point reads and column filters over the data loader
pub mod validation; // Rule merging, suite runs, catalogs

pub use instruments::InstrumentService;
pub use validation::ValidationService;
