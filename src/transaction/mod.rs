//! The ledger: a user's income and expense transactions.

mod db;
mod domain;
mod endpoints;
mod ledger;

pub use db::{
    create_transaction_table, delete_transaction, get_transaction, insert_transaction,
    list_transactions, update_transaction,
};
pub use domain::{
    PaymentMethod, Transaction, TransactionFields, TransactionFilter, month_bounds,
    normalize_note, parse_date, validate_date,
};
pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
    get_transactions_endpoint, update_transaction_endpoint,
};
pub use ledger::{
    TransactionPatch, TransactionQuery, TransactionRequest, add_transaction, edit_transaction,
    find_transactions,
};
