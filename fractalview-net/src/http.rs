use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use fractalview_core::wire::{HistogramReply, ImageReply, PaletteReply};
use fractalview_core::{PaletteUpload, RecentreRequest, Transport, TransportError, ViewportParameters};

use crate::error::NetError;

/// Longest slice of an undecodable body quoted in an error message.
const BODY_EXCERPT_CHARS: usize = 200;

/// [`Transport`] over HTTP to a running generation service.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    /// Connect to the service rooted at `server_url`, e.g.
    /// `http://127.0.0.1:8080`.
    pub fn new(server_url: &str) -> Result<Self, NetError> {
        let invalid = |reason: String| NetError::InvalidUrl {
            url: server_url.to_string(),
            reason,
        };
        let mut base = Url::parse(server_url).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(invalid("expected an http(s) URL".into()));
        }
        // Endpoints are joined relative to the base, so it must end in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .build()
            .map_err(|e| NetError::Client(e.to_string()))?;
        debug!(%base, "HTTP transport ready");
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Absolute URL of a service path.
    pub fn endpoint(&self, path: &str) -> Result<Url, NetError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| NetError::InvalidUrl {
                url: path.to_string(),
                reason: e.to_string(),
            })
    }

    /// URL of a generated image under the service's static image path.
    pub fn image_url(&self, image_path: &str, filename: &str) -> Result<Url, NetError> {
        let dir = image_path.trim_matches('/');
        if dir.is_empty() {
            self.endpoint(filename)
        } else {
            self.endpoint(&format!("{dir}/{filename}"))
        }
    }

    /// Download a generated image.
    pub async fn fetch_image(
        &self,
        image_path: &str,
        filename: &str,
    ) -> Result<Vec<u8>, TransportError> {
        let url = self.image_url(image_path, filename)?;
        debug!(%url, "GET image");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::new(format!("image download failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::new(format!(
                "image download failed: HTTP {status}"
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransportError::new(format!("image download interrupted: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn exchange<R: DeserializeOwned>(
        &self,
        what: &str,
        request: RequestBuilder,
    ) -> Result<R, TransportError> {
        let resp = request
            .send()
            .await
            .map_err(|e| TransportError::new(format!("{what} request failed: {e}")))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError::new(format!("{what} reply interrupted: {e}")))?;
        debug!(what, status, bytes = body.len(), "Reply received");
        decode_body(status, &body).inspect_err(|e| warn!(what, status, "Undecodable reply: {e}"))
    }
}

/// Decode a reply body regardless of HTTP status.
///
/// The service reports domain failures as JSON with a non-2xx status, so
/// the status only matters for describing bodies that are not JSON.
pub fn decode_body<R: DeserializeOwned>(status: u16, body: &[u8]) -> Result<R, TransportError> {
    serde_json::from_slice(body).map_err(|e| {
        let text = String::from_utf8_lossy(body);
        let text = text.trim();
        if text.is_empty() {
            TransportError::new(format!("HTTP {status}: empty reply"))
        } else if text.starts_with('{') {
            TransportError::new(format!("HTTP {status}: unexpected reply shape: {e}"))
        } else {
            let excerpt: String = text.chars().take(BODY_EXCERPT_CHARS).collect();
            TransportError::new(format!("HTTP {status}: {excerpt}"))
        }
    })
}

impl Transport for HttpTransport {
    async fn generate(&self, params: ViewportParameters) -> Result<ImageReply, TransportError> {
        let url = self.endpoint("generate")?;
        debug!(%url, "POST generate");
        self.exchange("generate", self.client.post(url).json(&params))
            .await
    }

    async fn recentre(&self, request: RecentreRequest) -> Result<ImageReply, TransportError> {
        let url = self.endpoint("recentre")?;
        debug!(%url, "POST recentre");
        self.exchange("recentre", self.client.post(url).json(&request))
            .await
    }

    async fn render(&self) -> Result<ImageReply, TransportError> {
        let url = self.endpoint("render")?;
        debug!(%url, "POST render");
        self.exchange("render", self.client.post(url)).await
    }

    async fn histogram(&self) -> Result<HistogramReply, TransportError> {
        let url = self.endpoint("histogram")?;
        debug!(%url, "GET histogram");
        self.exchange("histogram", self.client.get(url)).await
    }

    async fn upload_palette(&self, upload: PaletteUpload) -> Result<PaletteReply, TransportError> {
        let url = self.endpoint("palette")?;
        debug!(%url, file = %upload.file_name, "POST palette");
        let part = Part::bytes(upload.bytes).file_name(upload.file_name);
        let form = Form::new().part("file", part);
        self.exchange("palette", self.client.post(url).multipart(form))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_under_base() {
        let t = HttpTransport::new("http://127.0.0.1:8080").unwrap();
        assert_eq!(
            t.endpoint("generate").unwrap().as_str(),
            "http://127.0.0.1:8080/generate"
        );
        assert_eq!(
            t.endpoint("/histogram").unwrap().as_str(),
            "http://127.0.0.1:8080/histogram"
        );
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let t = HttpTransport::new("https://example.org/fractals-app").unwrap();
        assert_eq!(
            t.endpoint("recentre").unwrap().as_str(),
            "https://example.org/fractals-app/recentre"
        );
    }

    #[test]
    fn image_url_uses_static_path() {
        let t = HttpTransport::new("http://localhost:8080/").unwrap();
        assert_eq!(
            t.image_url("/fractals", "fractal-002.png").unwrap().as_str(),
            "http://localhost:8080/fractals/fractal-002.png"
        );
        assert_eq!(
            t.image_url("", "a.png").unwrap().as_str(),
            "http://localhost:8080/a.png"
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            HttpTransport::new("not a url"),
            Err(NetError::InvalidUrl { .. })
        ));
        assert!(HttpTransport::new("mailto:someone@example.org").is_err());
    }

    #[test]
    fn json_is_decoded_even_on_server_error() {
        let body = br#"{"generation":"False","time":"0.000 sec","error":"Failed to generate fractal image."}"#;
        let reply: ImageReply = decode_body(500, body).unwrap();
        assert!(!reply.success.0);
        assert_eq!(
            reply.error.as_deref(),
            Some("Failed to generate fractal image.")
        );
    }

    #[test]
    fn plain_text_body_is_a_transport_error() {
        let err = decode_body::<PaletteReply>(400, b"No palette file provided").unwrap_err();
        assert_eq!(err.message(), "HTTP 400: No palette file provided");
    }

    #[test]
    fn empty_body_is_a_transport_error() {
        let err = decode_body::<HistogramReply>(502, b"  ").unwrap_err();
        assert_eq!(err.message(), "HTTP 502: empty reply");
    }

    #[test]
    fn long_bodies_are_excerpted() {
        let body = "x".repeat(1000);
        let err = decode_body::<ImageReply>(500, body.as_bytes()).unwrap_err();
        assert!(err.message().len() < 300);
    }
}
