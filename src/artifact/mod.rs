//! Artifact retrieval: streamed download plus container-archive unpacking

mod download;
mod unpack;

pub use download::{DownloadError, Retriever, DOWNLOAD_STALL_CEILING};
pub use unpack::{find_payload, unpack_archive, UnpackError};
