pub mod definition;
pub mod engine;
pub mod fakes;

pub use definition::{BuildCommand, BuildTarget, DependencySpec, Manifest, Toolchain};
pub use engine::fetcher::{FetchFailure, FetchOutcome};
pub use engine::report::RunReport;
pub use engine::resolver::ReadinessReport;
pub use engine::runner::BuildOutcome;
pub use engine::{Engine, EngineSettings};
