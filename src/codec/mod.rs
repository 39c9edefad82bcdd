pub mod data_url;
pub mod image_file;

pub use data_url::{decode_data_url_to_file, encode_file_to_data_url, DataUrl};
pub use image_file::{
    detect_mime_type, read_image_file, save_image_file, ImageFile, ACCEPTED_UPLOAD_MIME_TYPES,
};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed data URL: {0}")]
    MalformedInput(String),
    #[error("Unsupported image type '{0}', expected PNG or JPEG")]
    UnsupportedImageType(String),
    #[error("Image file I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
