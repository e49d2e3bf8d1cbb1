pub mod customer;
pub mod product;
pub mod sale;
pub mod user;

// Re-export only the types we actually use
pub use customer::{Customer, CreateCustomer, CustomerPayment};
pub use product::{CreateProduct, Product, UpdateProduct, Vehicle};
pub use sale::{
    Sale, SaleResponse, SaleStatus, SingleSaleRequest, TransactionItem, TransactionRequest,
    TransactionResponse,
};
pub use user::{CreateUser, LoginRequest, User, UserResponse};
