pub mod auth;
pub mod customers;
pub mod payments;
pub mod products;
pub mod sales;
