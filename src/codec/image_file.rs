use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use tracing::debug;

use super::CodecError;

pub const ACCEPTED_UPLOAD_MIME_TYPES: &[&str] = &["image/png", "image/jpeg"];

/// In-memory image with the name and MIME type it was uploaded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub async fn read_image_file(path: &Path) -> Result<ImageFile, CodecError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| CodecError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mime_type = detect_mime_type(&bytes).unwrap_or_else(|| "application/octet-stream".to_string());
    if !ACCEPTED_UPLOAD_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(CodecError::UnsupportedImageType(mime_type));
    }

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    debug!(
        "Read upload {} ({}, {} bytes)",
        path.display(),
        mime_type,
        bytes.len()
    );
    Ok(ImageFile::new(name, mime_type, bytes))
}

/// Writes `file` into `dir` under `file_name`, creating `dir` when needed.
pub async fn save_image_file(
    file: &ImageFile,
    dir: &Path,
    file_name: &str,
) -> Result<PathBuf, CodecError> {
    let to_io_error = |path: &Path, source| CodecError::Io {
        path: path.display().to_string(),
        source,
    };
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|err| to_io_error(dir, err))?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, &file.bytes)
        .await
        .map_err(|err| to_io_error(&path, err))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn sniffs_png_and_jpeg() {
        assert_eq!(detect_mime_type(PNG_HEADER).as_deref(), Some("image/png"));
        assert_eq!(detect_mime_type(JPEG_HEADER).as_deref(), Some("image/jpeg"));
        assert_eq!(detect_mime_type(b"plain text"), None);
    }

    #[tokio::test]
    async fn reads_accepted_upload_from_disk() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("face.jpg");
        std::fs::write(&path, JPEG_HEADER)?;

        let file = read_image_file(&path).await?;
        assert_eq!(file.name, "face.jpg");
        assert_eq!(file.mime_type, "image/jpeg");
        assert_eq!(file.len(), JPEG_HEADER.len());
        Ok(())
    }

    #[tokio::test]
    async fn rejects_other_formats() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, b"not an image at all")?;

        let err = read_image_file(&path).await.unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedImageType(_)));
        Ok(())
    }

    #[tokio::test]
    async fn saves_bytes_under_the_given_name() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let dir = temp.path().join("downloads");
        let file = ImageFile::new("generated", "image/jpeg", JPEG_HEADER.to_vec());

        let path = save_image_file(&file, &dir, "birthday-shoot.jpg").await?;
        assert_eq!(path, dir.join("birthday-shoot.jpg"));
        assert_eq!(std::fs::read(&path)?, JPEG_HEADER);
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = read_image_file(Path::new("/definitely/not/here.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, CodecError::Io { .. }));
    }
}
