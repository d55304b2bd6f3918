pub mod store;

pub use store::{LendingStore as PostgresLendingStore, run_migrations};
