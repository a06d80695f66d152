pub mod image;
pub mod product;
pub mod user;

pub use image::{LocalFile, ProductImage, StagedImage};
pub use product::{Category, ProductDraft, ProductRecord, PRODUCTS_COLLECTION};
pub use user::{SellerContext, UserHandle, UserProfile, USERS_COLLECTION};
