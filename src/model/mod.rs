//! Data models for stereotile cases.

mod annotation;
mod category;
mod tag;

pub use annotation::{Annotation, CategoryPoints, CategoryShape};
pub use category::{default_categories, Category, CategoryId, CategorySet};
pub use tag::Tag;
