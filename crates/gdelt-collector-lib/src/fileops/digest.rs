use crate::error::CollectorError;
use digest::Digest;
use md5::Md5;
use std::path::Path;
use tokio::io::AsyncReadExt;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Incremental MD5 digest over arbitrarily chunked input.
pub struct Md5Digest {
    hasher: Md5,
}

impl Md5Digest {
    #[inline]
    pub fn new() -> Self {
        Self { hasher: Md5::new() }
    }

    #[inline]
    pub fn update(&mut self, data: impl AsRef<[u8]>) {
        Digest::update(&mut self.hasher, data.as_ref());
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl Default for Md5Digest {
    fn default() -> Self {
        Self::new()
    }
}

/// Streaming MD5 of a file, as lowercase hex. Memory usage is independent of
/// the file size.
pub async fn md5_hex(path: &Path) -> Result<String, CollectorError> {
    let file = tokio::fs::File::open(path).await?;
    let mut reader = tokio::io::BufReader::new(file);
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut digest = Md5Digest::new();

    loop {
        let bytes_read = reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        digest.update(&buffer[..bytes_read]);
    }

    Ok(digest.finalize_hex())
}
