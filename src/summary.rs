//! Monthly totals of a user's transactions, computed on demand from the ledger.
//!
//! Nothing is cached: every summary is recomputed from the stored transactions,
//! so repeated requests with no writes in between return identical results.

use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::{Query, State, rejection::QueryRejection},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    app_state::LedgerState,
    auth::{CurrencyCode, UserIdentity, get_user_by_id},
    category::CategoryType,
    database_id::{CategoryId, UserId},
    transaction::{Transaction, TransactionFilter, list_transactions, month_bounds},
};

/// The income, expenses and budget remainder of one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub year: i32,
    pub month: u8,
    /// The user's display currency. Amounts are never converted.
    pub currency: CurrencyCode,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    /// Income minus expenses.
    pub net: Decimal,
    /// The monthly budget minus expenses, negative when overspent.
    pub budget_remaining: Decimal,
    /// The sum of amounts per category, for categories with at least one
    /// transaction in the month.
    pub by_category: BTreeMap<CategoryId, Decimal>,
    pub expense_by_category: BTreeMap<CategoryId, Decimal>,
    pub income_by_category: BTreeMap<CategoryId, Decimal>,
}

#[derive(Debug, Default)]
struct Totals {
    income: Decimal,
    expense: Decimal,
    expense_by_category: BTreeMap<CategoryId, Decimal>,
    income_by_category: BTreeMap<CategoryId, Decimal>,
}

fn add(total: &mut Decimal, amount: Decimal) -> Result<(), Error> {
    *total = total.checked_add(amount).ok_or(Error::TotalOverflow)?;

    Ok(())
}

fn aggregate(transactions: &[Transaction]) -> Result<Totals, Error> {
    let mut totals = Totals::default();

    for transaction in transactions {
        let amount = transaction.amount.value();

        let (total, by_category) = match transaction.transaction_type {
            CategoryType::Income => (&mut totals.income, &mut totals.income_by_category),
            CategoryType::Expense => (&mut totals.expense, &mut totals.expense_by_category),
        };

        add(total, amount)?;
        add(
            by_category
                .entry(transaction.category_id)
                .or_insert(Decimal::ZERO),
            amount,
        )?;
    }

    Ok(totals)
}

/// Compute the summary of `user_id`'s transactions dated in `month` of `year`.
///
/// A month without transactions gives a summary of zeros, with the whole
/// budget remaining.
///
/// # Errors
///
/// Returns [Error::InvalidMonth] if `month` is not in `1..=12`,
/// [Error::NotFound] if the user does not exist,
/// [Error::TotalOverflow] if stored amounts sum past [Decimal::MAX],
/// or [Error::SqlError] if there is some other SQL error.
pub fn monthly_summary(
    user_id: UserId,
    year: i32,
    month: u8,
    connection: &Connection,
) -> Result<Summary, Error> {
    let (first_day, last_day) = month_bounds(year, month)?;
    let user = get_user_by_id(user_id, connection)?;

    let filter = TransactionFilter {
        from: Some(first_day),
        to: Some(last_day),
        ..Default::default()
    };
    let transactions = list_transactions(user_id, &filter, connection)?;
    let totals = aggregate(&transactions)?;

    let mut by_category = totals.expense_by_category.clone();
    by_category.extend(
        totals
            .income_by_category
            .iter()
            .map(|(category_id, amount)| (*category_id, *amount)),
    );

    let net = totals
        .income
        .checked_sub(totals.expense)
        .ok_or(Error::TotalOverflow)?;
    let budget_remaining = user
        .monthly_budget
        .checked_sub(totals.expense)
        .ok_or(Error::TotalOverflow)?;

    Ok(Summary {
        year,
        month,
        currency: user.currency,
        total_income: totals.income,
        total_expense: totals.expense,
        net,
        budget_remaining,
        by_category,
        expense_by_category: totals.expense_by_category,
        income_by_category: totals.income_by_category,
    })
}

/// The query string of a summary request.
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub year: i32,
    pub month: u8,
}

/// Handler for the monthly summary of the current user.
pub async fn get_monthly_summary_endpoint(
    State(state): State<LedgerState>,
    Extension(identity): Extension<UserIdentity>,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<Json<Summary>, Error> {
    let Query(query) = query?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    monthly_summary(identity.user_id, query.year, query.month, &connection).map(Json)
}

#[cfg(test)]
mod summary_tests {
    use std::collections::BTreeMap;

    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use time::{
        Date, Month,
        macros::{date, datetime},
    };

    use crate::{
        Error,
        auth::{User, insert_test_user},
        category::{Category, CategoryName, CategoryType, create_category},
        db::initialize,
        money::{Amount, MAX_AMOUNT},
        transaction::{PaymentMethod, TransactionFields, insert_transaction},
    };

    use super::monthly_summary;

    struct Fixture {
        connection: Connection,
        user: User,
        groceries: Category,
        rent: Category,
        salary: Category,
    }

    fn get_fixture() -> Fixture {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = insert_test_user("foo@bar.baz", &connection);
        let category = |name: &str, category_type| {
            create_category(
                user.id,
                CategoryName::new_unchecked(name),
                category_type,
                datetime!(2024-01-01 00:00:00 UTC),
                &connection,
            )
            .unwrap()
        };
        let groceries = category("Groceries", CategoryType::Expense);
        let rent = category("Rent", CategoryType::Expense);
        let salary = category("Salary", CategoryType::Income);

        Fixture {
            connection,
            user,
            groceries,
            rent,
            salary,
        }
    }

    fn record(fixture: &Fixture, category: &Category, amount: Decimal, date: Date) {
        insert_transaction(
            fixture.user.id,
            TransactionFields {
                amount: Amount::new(amount).unwrap(),
                transaction_type: category.category_type,
                category_id: category.id,
                payment_method: PaymentMethod::Card,
                date,
                note: None,
            },
            datetime!(2024-06-01 00:00:00 UTC),
            &fixture.connection,
        )
        .unwrap();
    }

    #[test]
    fn single_expense_against_budget() {
        let fixture = get_fixture();
        record(
            &fixture,
            &fixture.groceries,
            dec!(300),
            date!(2024 - 05 - 10),
        );

        let summary = monthly_summary(fixture.user.id, 2024, 5, &fixture.connection).unwrap();

        assert_eq!(summary.total_expense, dec!(300));
        assert_eq!(summary.total_income, Decimal::ZERO);
        assert_eq!(summary.net, dec!(-300));
        assert_eq!(summary.budget_remaining, dec!(700));
        assert_eq!(
            summary.by_category,
            BTreeMap::from([(fixture.groceries.id, dec!(300))])
        );
        assert_eq!(summary.currency.as_ref(), "NZD");
    }

    #[test]
    fn only_counts_transactions_in_the_month() {
        let fixture = get_fixture();
        record(
            &fixture,
            &fixture.groceries,
            dec!(10),
            date!(2024 - 04 - 30),
        );
        record(
            &fixture,
            &fixture.groceries,
            dec!(20),
            date!(2024 - 05 - 01),
        );
        record(
            &fixture,
            &fixture.groceries,
            dec!(30),
            date!(2024 - 05 - 31),
        );
        record(
            &fixture,
            &fixture.groceries,
            dec!(40),
            date!(2024 - 06 - 01),
        );

        let summary = monthly_summary(fixture.user.id, 2024, 5, &fixture.connection).unwrap();

        assert_eq!(summary.total_expense, dec!(50));
    }

    #[test]
    fn splits_income_and_expenses_by_category() {
        let fixture = get_fixture();
        let may = |day| Date::from_calendar_date(2024, Month::May, day).unwrap();
        record(&fixture, &fixture.groceries, dec!(12.34), may(2));
        record(&fixture, &fixture.groceries, dec!(0.66), may(3));
        record(&fixture, &fixture.rent, dec!(1200), may(1));
        record(&fixture, &fixture.salary, dec!(2500.50), may(15));

        let summary = monthly_summary(fixture.user.id, 2024, 5, &fixture.connection).unwrap();

        assert_eq!(summary.total_income, dec!(2500.50));
        assert_eq!(summary.total_expense, dec!(1213.00));
        assert_eq!(summary.net, summary.total_income - summary.total_expense);
        assert_eq!(summary.budget_remaining, dec!(-213.00));
        assert_eq!(
            summary.expense_by_category,
            BTreeMap::from([
                (fixture.groceries.id, dec!(13.00)),
                (fixture.rent.id, dec!(1200)),
            ])
        );
        assert_eq!(
            summary.income_by_category,
            BTreeMap::from([(fixture.salary.id, dec!(2500.50))])
        );
        assert_eq!(summary.by_category.len(), 3);
    }

    #[test]
    fn sums_are_exact() {
        let fixture = get_fixture();
        for _ in 0..10 {
            record(
                &fixture,
                &fixture.groceries,
                dec!(0.1),
                date!(2024 - 05 - 10),
            );
        }

        let summary = monthly_summary(fixture.user.id, 2024, 5, &fixture.connection).unwrap();

        assert_eq!(summary.total_expense, dec!(1.0));
    }

    #[test]
    fn empty_month_is_all_zeros() {
        let fixture = get_fixture();

        let summary = monthly_summary(fixture.user.id, 2024, 5, &fixture.connection).unwrap();

        assert_eq!(summary.total_income, Decimal::ZERO);
        assert_eq!(summary.total_expense, Decimal::ZERO);
        assert_eq!(summary.net, Decimal::ZERO);
        assert_eq!(summary.budget_remaining, dec!(1000));
        assert!(summary.by_category.is_empty());
    }

    #[test]
    fn repeated_calls_are_identical() {
        let fixture = get_fixture();
        record(
            &fixture,
            &fixture.salary,
            dec!(42),
            date!(2024 - 05 - 10),
        );

        let first = monthly_summary(fixture.user.id, 2024, 5, &fixture.connection).unwrap();
        let second = monthly_summary(fixture.user.id, 2024, 5, &fixture.connection).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn ignores_other_users_transactions() {
        let fixture = get_fixture();
        record(
            &fixture,
            &fixture.groceries,
            dec!(300),
            date!(2024 - 05 - 10),
        );
        let other_user = insert_test_user("other@bar.baz", &fixture.connection);

        let summary = monthly_summary(other_user.id, 2024, 5, &fixture.connection).unwrap();

        assert_eq!(summary.total_expense, Decimal::ZERO);
    }

    #[test]
    fn max_amounts_sum_without_overflow() {
        let fixture = get_fixture();
        record(&fixture, &fixture.groceries, MAX_AMOUNT, date!(2024 - 05 - 10));
        record(&fixture, &fixture.groceries, MAX_AMOUNT, date!(2024 - 05 - 11));

        let summary = monthly_summary(fixture.user.id, 2024, 5, &fixture.connection).unwrap();

        assert_eq!(summary.total_expense, MAX_AMOUNT * dec!(2));
        assert_eq!(summary.budget_remaining, dec!(1000) - MAX_AMOUNT * dec!(2));
    }

    #[test]
    fn overflowing_stored_amounts_are_an_error() {
        let fixture = get_fixture();
        record(&fixture, &fixture.groceries, dec!(1), date!(2024 - 05 - 10));
        record(&fixture, &fixture.groceries, dec!(1), date!(2024 - 05 - 11));
        fixture
            .connection
            .execute(
                "UPDATE \"transaction\" SET amount = ?1",
                (Decimal::MAX.to_string(),),
            )
            .unwrap();

        let result = monthly_summary(fixture.user.id, 2024, 5, &fixture.connection);

        assert_eq!(result, Err(Error::TotalOverflow));
    }

    #[test]
    fn rejects_invalid_month() {
        let fixture = get_fixture();

        let result = monthly_summary(fixture.user.id, 2024, 13, &fixture.connection);

        assert_eq!(
            result,
            Err(Error::InvalidMonth {
                year: 2024,
                month: 13
            })
        );
    }
}
