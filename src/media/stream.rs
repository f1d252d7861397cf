use std::path::PathBuf;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::io::ReaderStream;

use crate::media::error::MediaError;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, MediaError>> + Send>>;

/// Uniform source of plaintext bytes for the encrypting pipeline.
pub enum StreamSource {
    Buffer(Vec<u8>),
    File(PathBuf),
    Url(String),
    Stream(ByteStream),
}

impl StreamSource {
    /// Treat `spec` as a URL if it begins with `http://`/`https://`,
    /// otherwise as a local file path.
    pub fn from_path_or_url(spec: impl Into<String>) -> Self {
        let spec = spec.into();
        if spec.starts_with("http://") || spec.starts_with("https://") {
            StreamSource::Url(spec)
        } else {
            StreamSource::File(PathBuf::from(spec))
        }
    }

    /// Open the source, producing a consume-once byte stream. The
    /// underlying resource (open file, HTTP connection) is torn down when
    /// the returned stream is dropped or exhausted.
    pub async fn open(self, http: &reqwest::Client) -> Result<ByteStream, MediaError> {
        match self {
            StreamSource::Buffer(data) => {
                let chunk: Result<Bytes, MediaError> = Ok(Bytes::from(data));
                Ok(Box::pin(futures_util::stream::once(async { chunk })))
            }
            StreamSource::File(path) => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|e| MediaError::StreamError(format!("opening {:?}: {}", path, e)))?;
                let stream = ReaderStream::new(file)
                    .map(|r| r.map_err(|e| MediaError::StreamError(e.to_string())));
                Ok(Box::pin(stream))
            }
            StreamSource::Url(url) => {
                let resp = http
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| MediaError::StreamError(format!("GET {}: {}", url, e)))?;
                let stream = resp
                    .bytes_stream()
                    .map(|r| r.map_err(|e| MediaError::StreamError(e.to_string())));
                Ok(Box::pin(stream))
            }
            StreamSource::Stream(s) => Ok(s),
        }
    }
}
