pub mod error;
pub mod event;
pub mod mapper;
pub mod mode;
pub mod params;
pub mod request;
pub mod session;
pub mod store;
pub mod transport;
pub mod wire;

// Re-export primary types for convenience.
pub use error::{FieldError, PreconditionError, SessionError, TransportError, ValidationError};
pub use event::SessionEvent;
pub use mapper::{map_click_to_center, ClickPoint, ImageDimensions, PlanePoint};
pub use mode::{InteractionController, InteractionMode};
pub use params::{ParamField, ParameterPatch, ViewportParameters, ZoomFactor};
pub use request::{OperationKind, RequestState, RequestTracker};
pub use session::SessionController;
pub use store::{DisplayState, ImageInfo, ParameterStore};
pub use transport::Transport;
pub use wire::{HistogramOutcome, PaletteUpload, RecentreRequest};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, SessionError>;
