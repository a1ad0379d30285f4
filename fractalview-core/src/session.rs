use std::cell::RefCell;
use std::sync::mpsc;

use tracing::{debug, info, warn};

use crate::error::{PreconditionError, SessionError, TransportError};
use crate::event::{SessionEvent, Subscribers};
use crate::mapper::{map_click_to_center, ClickPoint, ImageDimensions, PlanePoint};
use crate::mode::{InteractionController, InteractionMode};
use crate::params::{ParameterPatch, ViewportParameters, ZoomFactor};
use crate::request::{OperationKind, RequestState, RequestTracker, Ticket};
use crate::store::{DisplayState, ImageInfo, ParameterStore};
use crate::transport::Transport;
use crate::wire::{
    HistogramOutcome, HistogramReply, ImageReply, PaletteReply, PaletteUpload, RecentreRequest,
    ReplyError,
};

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns the viewport parameters, per-kind request state and interaction
/// mode for one single-user session, and sequences calls to the
/// generation service.
///
/// Meant for a single-threaded event loop: every method takes `&self`, no
/// internal borrow is held across an `.await`, so requests of different
/// kinds can be in flight at once. Requests of the same kind follow
/// last-issued-wins: a reply that is no longer the newest for its kind is
/// dropped with [`SessionError::Superseded`] and changes nothing.
pub struct SessionController<T> {
    transport: T,
    state: RefCell<SessionState>,
}

impl<T: Transport> SessionController<T> {
    pub fn new(transport: T, initial: ViewportParameters) -> Self {
        debug!(?initial, "Creating session");
        Self {
            transport,
            state: RefCell::new(SessionState {
                store: ParameterStore::new(initial),
                requests: RequestTracker::new(),
                interaction: InteractionController::new(),
                subscribers: Subscribers::default(),
            }),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Receive change notifications from now on.
    pub fn subscribe(&self) -> mpsc::Receiver<SessionEvent> {
        let mut st = self.state.borrow_mut();
        let rx = st.subscribers.subscribe();
        debug!(subscribers = st.subscribers.len(), "Subscriber added");
        rx
    }

    // -- Queries --

    pub fn parameters(&self) -> ViewportParameters {
        self.state.borrow().store.read()
    }

    pub fn display(&self) -> DisplayState {
        self.state.borrow().store.display().clone()
    }

    pub fn request_state(&self, kind: OperationKind) -> RequestState {
        self.state.borrow().requests.state(kind).clone()
    }

    /// Lets the presentation layer disable a control while its kind is busy.
    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.state.borrow().requests.is_pending(kind)
    }

    pub fn mode(&self) -> InteractionMode {
        self.state.borrow().interaction.mode()
    }

    // -- Local operations --

    /// Merge user edits into the parameters. Fields that fail to parse keep
    /// their previous value and are reported.
    pub fn edit(&self, patch: &ParameterPatch) -> crate::Result<ViewportParameters> {
        let mut st = self.state.borrow_mut();
        let before = st.store.read();
        let result = st.store.write(patch);
        let after = st.store.read();
        if after != before {
            st.subscribers.emit(SessionEvent::ParametersChanged(after));
        }
        match result {
            Ok(()) => Ok(after),
            Err(e) => {
                warn!("Parameter edit rejected: {e}");
                st.subscribers.emit(SessionEvent::ValidationFailed(e.clone()));
                Err(e.into())
            }
        }
    }

    /// Zoom in by a discrete factor. Local only, no request is issued.
    pub fn zoom(&self, factor: ZoomFactor) -> crate::Result<f64> {
        let mut st = self.state.borrow_mut();
        match st.store.zoom(factor) {
            Ok(division) => {
                debug!(%factor, division, "Zoomed");
                let params = st.store.read();
                st.subscribers.emit(SessionEvent::ParametersChanged(params));
                Ok(division)
            }
            Err(e) => {
                st.subscribers.emit(SessionEvent::ValidationFailed(e.clone()));
                Err(e.into())
            }
        }
    }

    /// Press of the recentre control.
    pub fn toggle_recentre(&self) -> InteractionMode {
        let mut st = self.state.borrow_mut();
        let mode = st.interaction.toggle();
        debug!(%mode, "Interaction mode toggled");
        st.subscribers.emit(SessionEvent::ModeChanged(mode));
        mode
    }

    /// Report the size the image is actually displayed at.
    pub fn set_image_dimensions(&self, dims: ImageDimensions) -> crate::Result<()> {
        if dims.width_px == 0 || dims.height_px == 0 {
            return Err(PreconditionError::ZeroImageDimension {
                width: dims.width_px,
                height: dims.height_px,
            }
            .into());
        }
        let mut st = self.state.borrow_mut();
        if st.store.set_image_dimensions(dims.width_px, dims.height_px) {
            debug!(width = dims.width_px, height = dims.height_px, "Image dimensions updated");
            Ok(())
        } else {
            Err(PreconditionError::NoImage.into())
        }
    }

    /// Return a settled kind to `Idle` once its status has been shown.
    pub fn acknowledge(&self, kind: OperationKind) {
        let mut st = self.state.borrow_mut();
        if st.requests.acknowledge(kind) {
            st.subscribers.emit(SessionEvent::RequestStateChanged {
                kind,
                state: RequestState::Idle,
            });
        }
    }

    // -- Remote operations --

    /// Generate an image from the current parameters and reconcile the
    /// parameters with the service's echo.
    pub async fn generate(&self) -> crate::Result<ImageInfo> {
        let (ticket, snapshot) = {
            let mut st = self.state.borrow_mut();
            let snapshot = st.store.read();
            (st.begin(OperationKind::Generate), snapshot)
        };
        info!(seq = ticket.seq, ?snapshot, "Requesting fractal generation");
        let reply = self.transport.generate(snapshot).await;
        self.state
            .borrow_mut()
            .complete_image(ticket, reply, MissingEcho::Fail)
    }

    /// Apply pending field edits, then generate. Nothing is sent when any
    /// edit fails validation.
    pub async fn generate_with(&self, patch: &ParameterPatch) -> crate::Result<ImageInfo> {
        if !patch.is_empty() {
            self.edit(patch)?;
        }
        self.generate().await
    }

    /// A click on the rendered image.
    ///
    /// While browsing the click is not ours and `Ok(None)` is returned
    /// without any request. While armed, the click is mapped to a new
    /// centre, the mode drops back to browsing and a recentre is issued.
    /// If the click cannot be mapped the mode stays armed.
    pub async fn click(&self, click: ClickPoint) -> crate::Result<Option<ImageInfo>> {
        let (ticket, request, center) = {
            let mut st = self.state.borrow_mut();
            if st.interaction.mode() != InteractionMode::RecentreArmed {
                debug!(x = click.x, y = click.y, "Click ignored while browsing");
                return Ok(None);
            }
            let (request, center) = st.prepare_recentre(click)?;
            st.interaction.consume_click();
            st.subscribers
                .emit(SessionEvent::ModeChanged(InteractionMode::Browsing));
            (st.begin(OperationKind::Recentre), request, center)
        };
        self.send_recentre(ticket, request, center).await.map(Some)
    }

    /// Recentre on a pixel of the current image, regardless of mode.
    pub async fn recentre(&self, click: ClickPoint) -> crate::Result<ImageInfo> {
        let (ticket, request, center) = {
            let mut st = self.state.borrow_mut();
            let (request, center) = st.prepare_recentre(click)?;
            (st.begin(OperationKind::Recentre), request, center)
        };
        self.send_recentre(ticket, request, center).await
    }

    async fn send_recentre(
        &self,
        ticket: Ticket,
        request: RecentreRequest,
        center: PlanePoint,
    ) -> crate::Result<ImageInfo> {
        info!(
            seq = ticket.seq,
            row = request.click_row,
            col = request.click_col,
            re = request.new_center_re,
            im = request.new_center_im,
            "Requesting recentre"
        );
        let reply = self.transport.recentre(request).await;
        self.state
            .borrow_mut()
            .complete_image(ticket, reply, MissingEcho::Centre(center))
    }

    /// Re-colour the last image with the active palette.
    pub async fn render(&self) -> crate::Result<ImageInfo> {
        let ticket = {
            let mut st = self.state.borrow_mut();
            if st.store.display().image.is_none() {
                return Err(PreconditionError::NoImage.into());
            }
            st.begin(OperationKind::Render)
        };
        info!(seq = ticket.seq, "Requesting re-render");
        let reply = self.transport.render().await;
        self.state
            .borrow_mut()
            .complete_image(ticket, reply, MissingEcho::KeepCurrent)
    }

    /// Fetch the divergence histogram of the last image.
    pub async fn histogram(&self) -> crate::Result<HistogramOutcome> {
        let ticket = self.state.borrow_mut().begin(OperationKind::Histogram);
        info!(seq = ticket.seq, "Requesting divergence histogram");
        let reply = self.transport.histogram().await;
        self.state.borrow_mut().complete_histogram(ticket, reply)
    }

    /// Upload a palette file and record it as the active palette.
    pub async fn upload_palette(&self, upload: PaletteUpload) -> crate::Result<String> {
        let ticket = self.state.borrow_mut().begin(OperationKind::Palette);
        let file_name = upload.file_name.clone();
        info!(seq = ticket.seq, file = %file_name, bytes = upload.bytes.len(), "Uploading palette");
        let reply = self.transport.upload_palette(upload).await;
        self.state
            .borrow_mut()
            .complete_palette(ticket, reply, &file_name)
    }
}

// ---------------------------------------------------------------------------
// Shared mutable state
// ---------------------------------------------------------------------------

/// What an accepted image reply without a parameter echo reconciles to.
#[derive(Debug, Clone, Copy)]
enum MissingEcho {
    Fail,
    /// Only the centre that was sent is authoritative. The other fields
    /// keep whatever the store holds when the reply lands.
    Centre(PlanePoint),
    KeepCurrent,
}

struct SessionState {
    store: ParameterStore,
    requests: RequestTracker,
    interaction: InteractionController,
    subscribers: Subscribers,
}

impl SessionState {
    fn begin(&mut self, kind: OperationKind) -> Ticket {
        let ticket = self.requests.begin(kind);
        self.subscribers.emit(SessionEvent::RequestStateChanged {
            kind,
            state: RequestState::Pending,
        });
        ticket
    }

    /// Map a click against the current image. Also returns the mapped
    /// centre, which is adopted if the service does not echo parameters.
    fn prepare_recentre(
        &self,
        click: ClickPoint,
    ) -> Result<(RecentreRequest, PlanePoint), PreconditionError> {
        let image = self
            .store
            .display()
            .image
            .as_ref()
            .ok_or(PreconditionError::NoImage)?;
        let params = self.store.read();
        let center = map_click_to_center(
            click,
            ImageDimensions::from(image),
            params.center_re,
            params.center_im,
            params.pixel_division,
        )?;
        let (click_row, click_col) = click.row_col();
        Ok((
            RecentreRequest {
                click_row,
                click_col,
                new_center_re: center.re,
                new_center_im: center.im,
            },
            center,
        ))
    }

    /// Settle an image-producing request. `missing` decides what to adopt
    /// when the service accepted but did not echo parameters.
    fn complete_image(
        &mut self,
        ticket: Ticket,
        reply: Result<ImageReply, TransportError>,
        missing: MissingEcho,
    ) -> crate::Result<ImageInfo> {
        let kind = ticket.kind;
        self.ensure_current(ticket)?;

        let outcome = match reply {
            Ok(reply) => match reply.into_outcome() {
                Ok(outcome) => outcome,
                Err(e) => return Err(self.fail(ticket, reply_error(kind, e))),
            },
            Err(e) => return Err(self.fail(ticket, e.into())),
        };

        let params = match (outcome.params, missing) {
            (Some(echoed), _) => echoed,
            (None, MissingEcho::Centre(center)) => {
                let mut params = self.store.read();
                params.center_re = center.re;
                params.center_im = center.im;
                params
            }
            (None, MissingEcho::KeepCurrent) => self.store.read(),
            (None, MissingEcho::Fail) => {
                let err = TransportError::new("reply carried no parameters");
                return Err(self.fail(ticket, err.into()));
            }
        };
        if let Err(e) = self.store.apply_server_defaults(params) {
            let err = TransportError::new(format!("service echoed unusable parameters: {e}"));
            return Err(self.fail(ticket, err.into()));
        }

        let dims = ImageDimensions::of_params(&params);
        let image = ImageInfo {
            filename: outcome.image,
            width_px: dims.width_px,
            height_px: dims.height_px,
            elapsed: outcome.elapsed,
        };
        self.store.set_image(image.clone());
        self.subscribers.emit(SessionEvent::ParametersChanged(params));
        self.subscribers.emit(SessionEvent::ImageReady {
            kind,
            image: image.clone(),
        });

        info!(
            %kind,
            image = %image.filename,
            elapsed = image.elapsed.as_deref().unwrap_or("?"),
            "Image ready"
        );
        self.succeed(ticket, kind.success_text(image.elapsed.as_deref()));
        Ok(image)
    }

    fn complete_histogram(
        &mut self,
        ticket: Ticket,
        reply: Result<HistogramReply, TransportError>,
    ) -> crate::Result<HistogramOutcome> {
        self.ensure_current(ticket)?;
        let outcome = match reply.map_err(SessionError::from).and_then(|r| {
            r.into_outcome()
                .map_err(|e| reply_error(OperationKind::Histogram, e))
        }) {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail(ticket, e)),
        };

        self.subscribers.emit(SessionEvent::HistogramReady {
            chart: outcome.chart.clone(),
            elapsed: outcome.elapsed.clone(),
        });
        self.succeed(
            ticket,
            OperationKind::Histogram.success_text(outcome.elapsed.as_deref()),
        );
        Ok(outcome)
    }

    fn complete_palette(
        &mut self,
        ticket: Ticket,
        reply: Result<PaletteReply, TransportError>,
        uploaded: &str,
    ) -> crate::Result<String> {
        self.ensure_current(ticket)?;
        let name = match reply.map_err(SessionError::from).and_then(|r| {
            r.into_outcome(uploaded)
                .map_err(|e| reply_error(OperationKind::Palette, e))
        }) {
            Ok(name) => name,
            Err(e) => return Err(self.fail(ticket, e)),
        };

        info!(palette = %name, "Active palette changed");
        self.store.set_active_palette(name.clone());
        self.subscribers
            .emit(SessionEvent::PaletteChanged(name.clone()));
        self.succeed(
            ticket,
            format!("{}: {name}", OperationKind::Palette.success_text(None)),
        );
        Ok(name)
    }

    fn ensure_current(&self, ticket: Ticket) -> crate::Result<()> {
        if self.requests.is_current(ticket) {
            Ok(())
        } else {
            debug!(kind = %ticket.kind, seq = ticket.seq, "Dropping stale reply");
            Err(SessionError::Superseded { kind: ticket.kind })
        }
    }

    fn succeed(&mut self, ticket: Ticket, text: String) {
        let state = RequestState::Succeeded(text);
        if self.requests.finish(ticket, state.clone()) {
            self.subscribers.emit(SessionEvent::RequestStateChanged {
                kind: ticket.kind,
                state,
            });
        }
    }

    fn fail(&mut self, ticket: Ticket, err: SessionError) -> SessionError {
        let message = err.to_string();
        warn!(kind = %ticket.kind, seq = ticket.seq, "Request failed: {message}");
        let state = RequestState::Failed(message);
        if self.requests.finish(ticket, state.clone()) {
            self.subscribers.emit(SessionEvent::RequestStateChanged {
                kind: ticket.kind,
                state,
            });
        }
        err
    }
}

fn reply_error(kind: OperationKind, err: ReplyError) -> SessionError {
    match err {
        ReplyError::Refused(message) => SessionError::Domain { kind, message },
        ReplyError::Malformed(message) => TransportError::new(message).into(),
    }
}
