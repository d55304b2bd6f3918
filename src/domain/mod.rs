pub mod book;
pub mod commands;
pub mod errors;
pub mod loan;
pub mod user;
pub mod value_objects;

pub use book::*;
pub use errors::*;
pub use loan::{LOAN_PERIOD_DAYS, Loan, LoanCore, OpenLoan, ReturnedLoan};
pub use user::*;
pub use value_objects::*;
