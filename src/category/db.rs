//! Database operations for categories.
//!
//! Every query is scoped to the owning user, a category owned by someone else
//! behaves exactly like one that does not exist.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    category::{Category, CategoryName, CategoryType},
    database_id::{CategoryId, UserId},
};

/// Initialize the category table and indexes.
///
/// Names are unique per owner and type, ignoring ASCII case. The extra
/// `(id, user_id)` key lets transactions reference a category together with
/// its owner.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL COLLATE NOCASE,
            type TEXT NOT NULL CHECK (type IN ('INCOME', 'EXPENSE')),
            created_at TEXT NOT NULL,
            UNIQUE(user_id, name, type),
            UNIQUE(id, user_id),
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );",
    )?;

    Ok(())
}

/// Create a category for `user_id` and return it with its generated ID.
///
/// # Errors
///
/// Returns [Error::DuplicateCategory] if the user already has a category
/// with the same name and type, or [Error::SqlError] for other SQL errors.
pub fn create_category(
    user_id: UserId,
    name: CategoryName,
    category_type: CategoryType,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Category, Error> {
    connection.execute(
        "INSERT INTO category (user_id, name, type, created_at) VALUES (?1, ?2, ?3, ?4);",
        (user_id, name.as_ref(), category_type, created_at),
    )?;

    let id = CategoryId::new(connection.last_insert_rowid());

    Ok(Category {
        id,
        name,
        category_type,
        created_at,
    })
}

/// Retrieve a single category owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the category does not exist or belongs to another user.
pub fn get_category(
    user_id: UserId,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(
            "SELECT id, name, type, created_at FROM category
             WHERE id = ?1 AND user_id = ?2;",
        )?
        .query_row((category_id, user_id), map_row)
        .map_err(|error| error.into())
}

/// Retrieve all categories owned by `user_id` in the order they were created.
pub fn list_categories(user_id: UserId, connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, name, type, created_at FROM category
             WHERE user_id = :user_id ORDER BY id ASC;",
        )?
        .query_map(&[(":user_id", &user_id)], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Delete a category owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the category does not exist or belongs to
/// another user, or [Error::CategoryInUse] if any transaction references it.
pub fn delete_category(
    user_id: UserId,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<(), Error> {
    let references: i64 = connection.query_row(
        "SELECT COUNT(id) FROM \"transaction\" WHERE category_id = ?1 AND user_id = ?2;",
        (category_id, user_id),
        |row| row.get(0),
    )?;

    if references > 0 {
        // Only the owner can have transactions under the category, so this
        // does not reveal whether other users' categories exist.
        return Err(Error::CategoryInUse);
    }

    let rows_affected = connection.execute(
        "DELETE FROM category WHERE id = ?1 AND user_id = ?2",
        (category_id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let raw_name: String = row.get(1)?;

    Ok(Category {
        id: row.get(0)?,
        name: CategoryName::new_unchecked(&raw_name),
        category_type: row.get(2)?,
        created_at: row.get(3)?,
    })
}
