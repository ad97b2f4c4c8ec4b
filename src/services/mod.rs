/// Service layer: consistency and media-derivation logic
pub mod categories;
pub mod cloudinary;
pub mod image_link;
pub mod pipeline;
pub mod uniqueness;

pub use categories::CategoryReconciler;
pub use cloudinary::{CloudinaryClient, TransformUrlBuilder};
pub use image_link::ImageLinker;
pub use pipeline::{DerivationOptions, DerivationPipeline, DerivedImage};
pub use uniqueness::{check_unique, UniquenessOutcome};
