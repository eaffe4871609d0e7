// Upload validation and persistence.
// The validator sniffs the head of an upload and checks it against the
// allow-list; the persister names the file and copies it into storage.

use crate::sniff::{SNIFF_LEN, sniff};
use mime::Mime;
use std::{
    fmt,
    io::SeekFrom,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::{
    fs::File,
    io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWriteExt},
};
use tracing::debug;

#[derive(Debug)]
pub enum UploadError {
    UnsupportedType(Mime),
    InvalidName(String),
    Read(std::io::Error),
    Rewind(std::io::Error),
    Create(std::io::Error),
    Write(std::io::Error),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedType(mime) => write!(f, "Unsupported file type: {}", mime),
            Self::InvalidName(name) => write!(f, "Invalid file name: {:?}", name),
            Self::Read(e) => write!(f, "Failed to read upload content: {}", e),
            Self::Rewind(e) => write!(f, "Failed to rewind upload content: {}", e),
            Self::Create(e) => write!(f, "Failed to create destination file: {}", e),
            Self::Write(e) => write!(f, "Failed to write destination file: {}", e),
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(e) | Self::Rewind(e) | Self::Create(e) | Self::Write(e) => Some(e),
            Self::UnsupportedType(_) | Self::InvalidName(_) => None,
        }
    }
}

/// The set of sniffed MIME types (by essence) accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowList {
    types: &'static [&'static str],
}

impl AllowList {
    pub const IMAGE_TYPES: &'static [&'static str] =
        &["image/jpeg", "image/png", "image/gif", "image/webp"];

    /// Image types plus `application/octet-stream`, so any unrecognized
    /// binary content is accepted too.
    pub const PERMISSIVE_TYPES: &'static [&'static str] = &[
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "application/octet-stream",
    ];

    pub fn permissive() -> Self {
        Self {
            types: Self::PERMISSIVE_TYPES,
        }
    }

    pub fn images_only() -> Self {
        Self {
            types: Self::IMAGE_TYPES,
        }
    }

    pub fn types(&self) -> &'static [&'static str] {
        self.types
    }

    pub fn allows(&self, mime: &Mime) -> bool {
        self.types.contains(&mime.essence_str())
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::permissive()
    }
}

/// Reads at most [`SNIFF_LEN`] bytes, continuing across short reads until
/// the limit or end of stream.
pub async fn read_sample<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut sample = Vec::with_capacity(SNIFF_LEN);
    reader.take(SNIFF_LEN as u64).read_to_end(&mut sample).await?;
    Ok(sample)
}

#[derive(Debug, Clone, Default)]
pub struct UploadValidator {
    allow_list: AllowList,
}

impl UploadValidator {
    pub fn new(allow_list: AllowList) -> Self {
        Self { allow_list }
    }

    pub fn allow_list(&self) -> AllowList {
        self.allow_list
    }

    /// Sniffs the head of `stream` and checks it against the allow-list.
    /// On success the stream is positioned back at its start.
    pub async fn validate<R>(&self, stream: &mut R) -> Result<Mime, UploadError>
    where
        R: AsyncRead + AsyncSeek + Unpin,
    {
        let sample = read_sample(stream).await.map_err(UploadError::Read)?;
        let mime = sniff(&sample);
        debug!("Sniffed {} from {} byte sample", mime, sample.len());

        if !self.allow_list.allows(&mime) {
            return Err(UploadError::UnsupportedType(mime));
        }

        stream
            .seek(SeekFrom::Start(0))
            .await
            .map_err(UploadError::Rewind)?;

        Ok(mime)
    }
}

#[derive(Debug, Clone)]
pub struct UploadPersister {
    upload_dir: PathBuf,
}

impl UploadPersister {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Copies `stream` to `{unix_nanos}-{name}` in the upload directory and
    /// returns the stored file name. A failed copy leaves the partial file.
    pub async fn persist<R>(&self, stream: &mut R, original_name: &str) -> Result<String, UploadError>
    where
        R: AsyncRead + Unpin,
    {
        let name = sanitize_file_name(original_name)
            .ok_or_else(|| UploadError::InvalidName(original_name.to_string()))?;
        let filename = format!("{}-{}", unix_nanos(), name);
        let path = self.upload_dir.join(&filename);

        let mut file = File::create(&path).await.map_err(UploadError::Create)?;
        let written = tokio::io::copy(stream, &mut file)
            .await
            .map_err(UploadError::Write)?;
        file.flush().await.map_err(UploadError::Write)?;

        debug!("Stored {} bytes at {}", written, path.display());
        Ok(filename)
    }
}

/// Reduces a client-supplied file name to its final path component with
/// control characters removed. Returns `None` if nothing usable remains.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();

    match cleaned.trim() {
        "" | "." | ".." => None,
        trimmed => Some(trimmed.to_string()),
    }
}

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0DIHDR\x00\x00\x00\x01\x00\x00\x00\x01";

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("cat.png").as_deref(), Some("cat.png"));
        assert_eq!(
            sanitize_file_name("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_file_name("C:\\Users\\me\\dog.jpg").as_deref(),
            Some("dog.jpg")
        );
        assert_eq!(
            sanitize_file_name("bad\nname\0.gif").as_deref(),
            Some("badname.gif")
        );
        assert_eq!(sanitize_file_name(""), None);
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name("photos/"), None);
    }

    #[test]
    fn test_allow_list() {
        let permissive = AllowList::permissive();
        assert!(permissive.allows(&mime::IMAGE_PNG));
        assert!(permissive.allows(&mime::APPLICATION_OCTET_STREAM));
        assert!(!permissive.allows(&mime::TEXT_PLAIN_UTF_8));

        let images_only = AllowList::images_only();
        assert!(images_only.allows(&mime::IMAGE_JPEG));
        assert!(!images_only.allows(&mime::APPLICATION_OCTET_STREAM));
        assert_eq!(AllowList::default(), permissive);
    }

    #[tokio::test]
    async fn test_read_sample_tolerates_short_reads() {
        let mut reader = tokio_test::io::Builder::new()
            .read(b"GIF8")
            .read(b"9a")
            .read(b"\x01\x00\x01\x00")
            .build();

        let sample = read_sample(&mut reader).await.unwrap();
        assert_eq!(sample, b"GIF89a\x01\x00\x01\x00");
    }

    #[tokio::test]
    async fn test_read_sample_is_limited() {
        let data = vec![7u8; SNIFF_LEN * 3];
        let mut reader = Cursor::new(data);

        let sample = read_sample(&mut reader).await.unwrap();
        assert_eq!(sample.len(), SNIFF_LEN);
    }

    #[tokio::test]
    async fn test_validate_accepts_image_and_rewinds() {
        let validator = UploadValidator::default();
        let mut stream = Cursor::new(PNG_BYTES.to_vec());

        let mime = validator.validate(&mut stream).await.unwrap();
        assert_eq!(mime, mime::IMAGE_PNG);

        let mut content = Vec::new();
        stream.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, PNG_BYTES);
    }

    #[tokio::test]
    async fn test_validate_rejects_text() {
        let validator = UploadValidator::default();
        let mut stream = Cursor::new(b"just some notes".to_vec());

        let err = validator.validate(&mut stream).await.unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType(_)));
        assert_eq!(
            err.to_string(),
            "Unsupported file type: text/plain; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_validate_executable_depends_on_allow_list() {
        let mut exe = b"MZ\x90\x00\x03\x00\x00\x00".to_vec();
        exe.resize(128, 0);

        let permissive = UploadValidator::new(AllowList::permissive());
        let mime = permissive
            .validate(&mut Cursor::new(exe.clone()))
            .await
            .unwrap();
        assert_eq!(mime, mime::APPLICATION_OCTET_STREAM);

        let images_only = UploadValidator::new(AllowList::images_only());
        let err = images_only
            .validate(&mut Cursor::new(exe))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported file type: application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_persist_writes_prefixed_file() {
        let temp_dir = TempDir::new().unwrap();
        let persister = UploadPersister::new(temp_dir.path());

        let filename = persister
            .persist(&mut Cursor::new(PNG_BYTES.to_vec()), "cat.png")
            .await
            .unwrap();

        let (prefix, rest) = filename.split_once('-').unwrap();
        assert!(prefix.parse::<u128>().is_ok());
        assert_eq!(rest, "cat.png");
        assert_eq!(
            std::fs::read(temp_dir.path().join(&filename)).unwrap(),
            PNG_BYTES
        );
    }

    #[tokio::test]
    async fn test_persist_strips_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let uploads = temp_dir.path().join("uploads");
        std::fs::create_dir(&uploads).unwrap();
        let persister = UploadPersister::new(&uploads);

        let filename = persister
            .persist(&mut Cursor::new(PNG_BYTES.to_vec()), "../escape.png")
            .await
            .unwrap();

        assert!(filename.ends_with("-escape.png"));
        assert!(uploads.join(&filename).is_file());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_persist_rejects_unusable_name() {
        let temp_dir = TempDir::new().unwrap();
        let persister = UploadPersister::new(temp_dir.path());

        let err = persister
            .persist(&mut Cursor::new(PNG_BYTES.to_vec()), "..")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidName(_)));
    }

    #[tokio::test]
    async fn test_persist_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let persister = UploadPersister::new(temp_dir.path().join("missing"));

        let err = persister
            .persist(&mut Cursor::new(PNG_BYTES.to_vec()), "cat.png")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Create(_)));
    }
}
