//! Persistence for the storefront: products, carts and orders.
//!
//! The [`ProductStore`], [`CartStore`] and [`OrderStore`] traits describe the
//! remote CRUD surface the rest of the system is written against. Two
//! implementations are provided: [`PostgresStore`] backed by sqlx, and
//! [`InMemoryStore`] for tests and database-less development.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{FailPoint, InMemoryStore};
pub use model::{
    Address, Cart, CartItem, CustomerDetails, NewCartItem, NewOrder, NewOrderItem, NewProduct,
    Order, OrderItem, Product, ProductUpdate,
};
pub use postgres::PostgresStore;
pub use query::{OrderQuery, ProductQuery};
pub use store::{CartStore, OrderStore, OrderStoreExt, ProductStore, Store};
