use std::sync::mpsc;

use crate::error::ValidationError;
use crate::mode::InteractionMode;
use crate::params::ViewportParameters;
use crate::request::{OperationKind, RequestState};
use crate::store::ImageInfo;

/// Change notification sent to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ParametersChanged(ViewportParameters),
    RequestStateChanged {
        kind: OperationKind,
        state: RequestState,
    },
    ModeChanged(InteractionMode),
    /// A new image is available from the operation `kind`.
    ImageReady {
        kind: OperationKind,
        image: ImageInfo,
    },
    /// Chart data for a separate presentation surface.
    HistogramReady {
        chart: serde_json::Value,
        elapsed: Option<String>,
    },
    PaletteChanged(String),
    ValidationFailed(ValidationError),
}

/// Fan-out of session events to any number of receivers.
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    senders: Vec<mpsc::Sender<SessionEvent>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&mut self) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel();
        self.senders.push(tx);
        rx
    }

    /// Send to every live receiver, dropping those that have gone away.
    pub(crate) fn emit(&mut self, event: SessionEvent) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}
