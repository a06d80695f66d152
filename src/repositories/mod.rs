pub mod product_repository;
pub mod user_repository;

pub use product_repository::{ProductRepository, SaveReport, StoreProductRepository, UploadLimits};
pub use user_repository::UserRepository;

#[cfg(test)]
pub use product_repository::MockProductRepository;
