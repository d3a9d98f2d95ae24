pub mod intent;
pub mod product;
