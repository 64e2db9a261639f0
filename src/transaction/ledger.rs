//! The ledger operations: validating client input and recording, editing,
//! deleting and listing a user's transactions.
//!
//! Each operation runs inside one SQLite transaction so that concurrent
//! readers never see a partially applied write.

use rusqlite::Connection;
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    category::{CategoryType, get_category},
    database_id::{CategoryId, TransactionId, UserId},
    money::{Amount, DecimalInput},
    transaction::{
        PaymentMethod, Transaction, TransactionFields, TransactionFilter, get_transaction,
        insert_transaction, list_transactions, month_bounds, normalize_note, parse_date,
        update_transaction, validate_date,
    },
};

/// The body of a request to record a transaction.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub amount: DecimalInput,
    pub category_id: String,
    #[serde(rename = "type")]
    pub transaction_type: CategoryType,
    pub payment_method: PaymentMethod,
    pub date: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// The body of a request to edit a transaction. Absent fields are left unchanged.
///
/// An empty `note` removes the note.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPatch {
    pub amount: Option<DecimalInput>,
    pub category_id: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: Option<CategoryType>,
    pub payment_method: Option<PaymentMethod>,
    pub date: Option<String>,
    pub note: Option<String>,
}

/// The query string of a request to list transactions.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub category_id: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: Option<CategoryType>,
    pub year: Option<i32>,
    pub month: Option<u8>,
}

impl TryFrom<TransactionQuery> for TransactionFilter {
    type Error = Error;

    /// Parse the query string into a filter.
    ///
    /// A year and month select one calendar month, which is intersected with
    /// `from` and `to` when those are also given.
    fn try_from(query: TransactionQuery) -> Result<Self, Self::Error> {
        let mut from = query.from.as_deref().map(parse_date).transpose()?;
        let mut to = query.to.as_deref().map(parse_date).transpose()?;

        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(Error::InvalidDateRange { from, to });
            }
        }

        match (query.year, query.month) {
            (Some(year), Some(month)) => {
                let (first_day, last_day) = month_bounds(year, month)?;
                from = Some(from.map_or(first_day, |from| from.max(first_day)));
                to = Some(to.map_or(last_day, |to| to.min(last_day)));
            }
            (None, None) => {}
            _ => return Err(Error::IncompleteMonth),
        }

        let category_id = query
            .category_id
            .map(|raw_id| {
                raw_id
                    .parse::<CategoryId>()
                    .map_err(|_| Error::InvalidRequest(format!("invalid category ID {raw_id:?}")))
            })
            .transpose()?;

        Ok(Self {
            from,
            to,
            category_id,
            transaction_type: query.transaction_type,
        })
    }
}

/// Check the category rule: the category must be owned by `user_id` and have
/// the same type as the transaction.
fn check_category(
    user_id: UserId,
    category_id: CategoryId,
    transaction_type: CategoryType,
    connection: &Connection,
) -> Result<(), Error> {
    let category = get_category(user_id, category_id, connection)?;

    if category.category_type != transaction_type {
        return Err(Error::CategoryTypeMismatch {
            category_type: category.category_type,
            transaction_type,
        });
    }

    Ok(())
}

/// Record a new transaction for `user_id`.
///
/// `today` is the current UTC date, used to reject dates in the future.
///
/// # Errors
///
/// - a validation error if the amount is not positive or the date is malformed or in the future,
/// - [Error::NotFound] if the category does not exist or is owned by someone else,
/// - [Error::CategoryTypeMismatch] if the category has a different type.
pub fn add_transaction(
    user_id: UserId,
    request: TransactionRequest,
    today: Date,
    connection: &mut Connection,
) -> Result<Transaction, Error> {
    let amount = Amount::try_from(request.amount)?;
    let date = validate_date(parse_date(&request.date)?, today)?;
    let category_id: CategoryId = request.category_id.parse()?;
    let fields = TransactionFields {
        amount,
        transaction_type: request.transaction_type,
        category_id,
        payment_method: request.payment_method,
        date,
        note: normalize_note(request.note.as_deref()),
    };

    let sql_transaction = connection.transaction()?;
    check_category(
        user_id,
        fields.category_id,
        fields.transaction_type,
        &sql_transaction,
    )?;
    let transaction = insert_transaction(
        user_id,
        fields,
        OffsetDateTime::now_utc(),
        &sql_transaction,
    )?;
    sql_transaction.commit()?;

    Ok(transaction)
}

/// Apply `patch` to a transaction owned by `user_id`.
///
/// The merged transaction is validated the same way as a new one, so changing
/// only the type or only the category can still fail the category rule.
///
/// # Errors
///
/// Returns [Error::NotFound] if the transaction does not exist or is owned by
/// someone else, otherwise the same errors as [add_transaction].
pub fn edit_transaction(
    user_id: UserId,
    transaction_id: TransactionId,
    patch: TransactionPatch,
    today: Date,
    connection: &mut Connection,
) -> Result<Transaction, Error> {
    let amount = patch.amount.map(Amount::try_from).transpose()?;
    let date = patch
        .date
        .as_deref()
        .map(|raw_date| parse_date(raw_date).and_then(|date| validate_date(date, today)))
        .transpose()?;
    let category_id = patch
        .category_id
        .map(|raw_id| raw_id.parse::<CategoryId>())
        .transpose()?;

    let sql_transaction = connection.transaction()?;
    let existing = get_transaction(user_id, transaction_id, &sql_transaction)?;

    let mut fields = TransactionFields::from(&existing);
    if let Some(amount) = amount {
        fields.amount = amount;
    }
    if let Some(date) = date {
        fields.date = date;
    }
    if let Some(category_id) = category_id {
        fields.category_id = category_id;
    }
    if let Some(transaction_type) = patch.transaction_type {
        fields.transaction_type = transaction_type;
    }
    if let Some(payment_method) = patch.payment_method {
        fields.payment_method = payment_method;
    }
    if let Some(note) = patch.note.as_deref() {
        fields.note = normalize_note(Some(note));
    }

    check_category(
        user_id,
        fields.category_id,
        fields.transaction_type,
        &sql_transaction,
    )?;
    update_transaction(user_id, transaction_id, &fields, &sql_transaction)?;
    sql_transaction.commit()?;

    Ok(Transaction {
        id: existing.id,
        amount: fields.amount,
        transaction_type: fields.transaction_type,
        category_id: fields.category_id,
        payment_method: fields.payment_method,
        date: fields.date,
        note: fields.note,
        created_at: existing.created_at,
    })
}

/// List the transactions of `user_id` that match `query`.
///
/// # Errors
///
/// Returns a validation error if the query is malformed.
pub fn find_transactions(
    user_id: UserId,
    query: TransactionQuery,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let filter = TransactionFilter::try_from(query)?;

    list_transactions(user_id, &filter, connection)
}
