pub mod auth;
pub mod common;
pub mod files;
pub mod products;

pub use auth::auth_routes;
pub use files::file_routes;
pub use products::product_routes;
