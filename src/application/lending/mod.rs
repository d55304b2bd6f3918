mod catalog;
mod errors;
mod inventory_ledger;
mod loan_registry;
mod loan_service;

pub use catalog::{BookSelector, create_book, delete_book, get_book, list_books};
pub use errors::{LendingError, Result};
pub use inventory_ledger::{release_copy, reserve_copy};
pub use loan_registry::{close_loan, create_loan, find_open_loan};
pub use loan_service::{ServiceDependencies, borrow_book, return_book};
