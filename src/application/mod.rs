pub mod use_cases;

pub use use_cases::ado_discovery::DiscoveryUseCase;
pub use use_cases::ado_import::ImportUseCase;
pub use use_cases::test_execution::TestExecutionUseCase;
