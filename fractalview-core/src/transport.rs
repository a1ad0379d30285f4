use std::future::Future;

use crate::error::TransportError;
use crate::params::ViewportParameters;
use crate::wire::{HistogramReply, ImageReply, PaletteReply, PaletteUpload, RecentreRequest};

/// The outbound seam to the generation service.
///
/// Each method issues exactly one call and resolves to the decoded reply
/// body. Replies must be decoded whatever the HTTP status, because the
/// service reports domain failures in the body. Only an unreachable
/// service or an undecodable body is a [`TransportError`].
pub trait Transport {
    /// `POST /generate` with the full parameter snapshot.
    fn generate(
        &self,
        params: ViewportParameters,
    ) -> impl Future<Output = Result<ImageReply, TransportError>>;

    /// `POST /recentre` with the click and the locally mapped centre.
    fn recentre(
        &self,
        request: RecentreRequest,
    ) -> impl Future<Output = Result<ImageReply, TransportError>>;

    /// `POST /render`: re-colour the last image with the active palette.
    fn render(&self) -> impl Future<Output = Result<ImageReply, TransportError>>;

    /// `GET /histogram` for the last generated image.
    fn histogram(&self) -> impl Future<Output = Result<HistogramReply, TransportError>>;

    /// `POST /palette` as a multipart file upload.
    fn upload_palette(
        &self,
        upload: PaletteUpload,
    ) -> impl Future<Output = Result<PaletteReply, TransportError>>;
}
