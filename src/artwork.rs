/// Thumbnail resolution: turns an opaque artwork handle into a hosted URL.
///
/// Bytes are pulled from the media source, uploaded as multipart form data,
/// and the link from the JSON reply is kept. Any failure along the way lands
/// on the `"default"` sentinel; nothing here ever bubbles an error up to the loop.
///
use serde::Deserialize;
use thiserror::Error;

use crate::track::{Artwork, DEFAULT_ARTWORK};

pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://api.imgur.com/3/image";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("image host answered with HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response body: {0}")]
    MalformedBody(String),

    #[error("refusing to upload an empty image")]
    EmptyImage,
}

/// Anywhere we can push cover bytes and get a public link back
pub trait ImageHost {
    fn upload(&self, image: &[u8]) -> Result<String, UploadError>;
}

#[derive(Deserialize, Debug)]
struct UploadResponse {
    data: UploadData,
}

#[derive(Deserialize, Debug)]
struct UploadData {
    link: Option<String>,
}

/// Imgur-compatible anonymous upload endpoint
pub struct ImgurHost {
    agent: ureq::Agent,
    endpoint: String,
    client_id: String,
}

impl ImgurHost {
    pub fn new(endpoint: &str, client_id: &str) -> Self {
        Self {
            agent: ureq::Agent::new(),
            endpoint: endpoint.to_string(),
            client_id: client_id.to_string(),
        }
    }
}

impl ImageHost for ImgurHost {
    fn upload(&self, image: &[u8]) -> Result<String, UploadError> {
        if image.is_empty() {
            return Err(UploadError::EmptyImage);
        }

        let boundary = format!("nowcast-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_body(&boundary, image);

        let response = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Client-ID {}", self.client_id))
            .set("Content-Type", &format!("multipart/form-data; boundary={}", boundary))
            .send_bytes(&body);

        let response = match response {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, _)) => return Err(UploadError::Status(code)),
            Err(ureq::Error::Transport(e)) => return Err(UploadError::Transport(e.to_string())),
        };

        // ureq only errors on 4xx/5xx, other non-200 codes still count as failures
        if response.status() != 200 {
            return Err(UploadError::Status(response.status()));
        }

        let parsed: UploadResponse = response
            .into_json()
            .map_err(|e| UploadError::MalformedBody(e.to_string()))?;

        parsed
            .data
            .link
            .filter(|link| !link.is_empty())
            .ok_or_else(|| UploadError::MalformedBody("missing data.link".to_string()))
    }
}

/// Sniff the image format so the upload part carries a sensible MIME type
fn content_type(image: &[u8]) -> (&'static str, &'static str) {
    match image::guess_format(image) {
        Ok(image::ImageFormat::Png) => ("image/png", "png"),
        Ok(image::ImageFormat::Jpeg) => ("image/jpeg", "jpg"),
        Ok(image::ImageFormat::Gif) => ("image/gif", "gif"),
        Ok(image::ImageFormat::WebP) => ("image/webp", "webp"),
        Ok(image::ImageFormat::Bmp) => ("image/bmp", "bmp"),
        _ => ("application/octet-stream", "bin"),
    }
}

/// Single-part `multipart/form-data` body with the image under the `image` field
fn multipart_body(boundary: &str, image: &[u8]) -> Vec<u8> {
    let (mime, ext) = content_type(image);

    let mut body = Vec::with_capacity(image.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"image\"; filename=\"cover.{}\"\r\n",
            ext
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
    body.extend_from_slice(image);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

pub struct ThumbnailResolver<H> {
    host: H,
}

impl<H: ImageHost> ThumbnailResolver<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    /// Resolve artwork to a URL. Already-resolved values pass through untouched.
    pub fn resolve(&self, artwork: &Artwork) -> Artwork {
        match artwork {
            Artwork::Resolved(url) => Artwork::Resolved(url.clone()),
            Artwork::Absent => {
                tracing::debug!("[Artwork] No artwork reported, using default");
                Artwork::Resolved(DEFAULT_ARTWORK.to_string())
            }
            Artwork::Handle(source) => {
                let bytes = match source.read_bytes() {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!("[Artwork] Failed to read thumbnail stream: {}", e);
                        return Artwork::Resolved(DEFAULT_ARTWORK.to_string());
                    }
                };

                match self.host.upload(&bytes) {
                    Ok(link) => {
                        tracing::info!("[Artwork] Uploaded {} bytes → {}", bytes.len(), link);
                        Artwork::Resolved(link)
                    }
                    Err(e) => {
                        tracing::warn!("[Artwork] Upload failed, using default: {}", e);
                        Artwork::Resolved(DEFAULT_ARTWORK.to_string())
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::ArtworkSource;
    use std::cell::Cell;
    use std::io::{self, BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::thread;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    struct Bytes(Vec<u8>);
    impl ArtworkSource for Bytes {
        fn read_bytes(&self) -> io::Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;
    impl ArtworkSource for Broken {
        fn read_bytes(&self) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::Other, "stream closed"))
        }
    }

    struct CountingHost {
        calls: Cell<usize>,
        result: fn() -> Result<String, UploadError>,
    }

    impl ImageHost for CountingHost {
        fn upload(&self, _image: &[u8]) -> Result<String, UploadError> {
            self.calls.set(self.calls.get() + 1);
            (self.result)()
        }
    }

    /// One-shot HTTP server: reads a full request, replies with the canned response
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(value) = lower.strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = reader.into_inner();
            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
        });

        format!("http://{}/3/image", addr)
    }

    #[test]
    fn test_upload_success_returns_link() {
        let url = serve_once("HTTP/1.1 200 OK", r#"{"data":{"link":"https://i.imgur.com/abc.png"},"success":true}"#);
        let host = ImgurHost::new(&url, "client");
        assert_eq!(host.upload(PNG_MAGIC).unwrap(), "https://i.imgur.com/abc.png");
    }

    #[test]
    fn test_upload_http_500_is_status_error() {
        let url = serve_once("HTTP/1.1 500 Internal Server Error", r#"{"success":false}"#);
        let host = ImgurHost::new(&url, "client");
        assert!(matches!(host.upload(PNG_MAGIC), Err(UploadError::Status(500))));
    }

    #[test]
    fn test_upload_malformed_body() {
        let url = serve_once("HTTP/1.1 200 OK", r#"{"unexpected":true}"#);
        let host = ImgurHost::new(&url, "client");
        assert!(matches!(host.upload(PNG_MAGIC), Err(UploadError::MalformedBody(_))));
    }

    #[test]
    fn test_upload_network_error() {
        // Bind then drop to get a port nobody listens on
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let host = ImgurHost::new(&format!("http://{}/3/image", addr), "client");
        assert!(matches!(host.upload(PNG_MAGIC), Err(UploadError::Transport(_))));
    }

    #[test]
    fn test_resolver_http_500_gives_default() {
        let url = serve_once("HTTP/1.1 500 Internal Server Error", "{}");
        let resolver = ThumbnailResolver::new(ImgurHost::new(&url, "client"));
        let art = Artwork::Handle(Arc::new(Bytes(PNG_MAGIC.to_vec())));
        assert_eq!(resolver.resolve(&art).url(), DEFAULT_ARTWORK);
    }

    #[test]
    fn test_resolver_passes_resolved_values_through() {
        let host = CountingHost { calls: Cell::new(0), result: || Ok("new".into()) };
        let resolver = ThumbnailResolver::new(host);

        let hosted = Artwork::Resolved("https://i.imgur.com/old.png".into());
        assert_eq!(resolver.resolve(&hosted).url(), "https://i.imgur.com/old.png");

        let sentinel = Artwork::Resolved(DEFAULT_ARTWORK.into());
        assert_eq!(resolver.resolve(&sentinel).url(), DEFAULT_ARTWORK);

        assert_eq!(resolver.host.calls.get(), 0);
    }

    #[test]
    fn test_resolver_uploads_handle_once() {
        let host = CountingHost { calls: Cell::new(0), result: || Ok("https://i.imgur.com/x.png".into()) };
        let resolver = ThumbnailResolver::new(host);
        let art = Artwork::Handle(Arc::new(Bytes(vec![1, 2, 3])));

        assert_eq!(resolver.resolve(&art).url(), "https://i.imgur.com/x.png");
        assert_eq!(resolver.host.calls.get(), 1);
    }

    #[test]
    fn test_resolver_unreadable_stream_skips_upload() {
        let host = CountingHost { calls: Cell::new(0), result: || Ok("never".into()) };
        let resolver = ThumbnailResolver::new(host);
        let art = Artwork::Handle(Arc::new(Broken));

        assert_eq!(resolver.resolve(&art).url(), DEFAULT_ARTWORK);
        assert_eq!(resolver.host.calls.get(), 0);
    }

    #[test]
    fn test_resolver_absent_gives_default() {
        let host = CountingHost { calls: Cell::new(0), result: || Err(UploadError::EmptyImage) };
        let resolver = ThumbnailResolver::new(host);
        assert_eq!(resolver.resolve(&Artwork::Absent).url(), DEFAULT_ARTWORK);
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body("XYZ", PNG_MAGIC);
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with("--XYZ\r\n"));
        assert!(text.contains("name=\"image\"; filename=\"cover.png\""));
        assert!(text.contains("Content-Type: image/png"));
        assert!(text.ends_with("\r\n--XYZ--\r\n"));
    }

    #[test]
    fn test_unknown_format_is_octet_stream() {
        assert_eq!(content_type(b"not an image"), ("application/octet-stream", "bin"));
    }
}
