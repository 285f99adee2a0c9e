mod archive;
mod digest;
mod download;

pub use archive::{ensure_dir, extract_zip};
pub use digest::{Md5Digest, md5_hex};
pub use download::Downloader;
