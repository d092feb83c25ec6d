pub mod photo;

pub use photo::{select_image, EncodedImage, ImagePreview, SelectedImage};
