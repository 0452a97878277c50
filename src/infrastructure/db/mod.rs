pub mod sqlite;
pub mod test_cases;
pub mod test_runs;

pub use test_cases::TestCaseRepository;
pub use test_runs::TestRunRepository;
