//! Categories for grouping income and expense transactions.

mod db;
mod domain;
mod endpoints;

pub use db::{
    create_category, create_category_table, delete_category, get_category, list_categories,
};
pub use domain::{Category, CategoryName, CategoryType};
pub use endpoints::{
    CategoryRequest, create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
    get_category_endpoint,
};
