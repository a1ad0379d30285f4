use std::fmt;

/// The remote operations the session can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Generate,
    Recentre,
    Render,
    Histogram,
    Palette,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        Self::Generate,
        Self::Recentre,
        Self::Render,
        Self::Histogram,
        Self::Palette,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Recentre => "recentre",
            Self::Render => "render",
            Self::Histogram => "histogram",
            Self::Palette => "palette",
        }
    }

    /// Status line shown once the operation succeeded.
    pub fn success_text(self, elapsed: Option<&str>) -> String {
        let what = match self {
            Self::Generate => "Fractal generated",
            Self::Recentre => "Fractal recentred",
            Self::Render => "Fractal re-rendered",
            Self::Histogram => "Divergence histogram ready",
            Self::Palette => "Palette loaded",
        };
        match elapsed {
            Some(t) => format!("{what} in {t}"),
            None => what.to_string(),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Visible lifecycle of one operation kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Pending,
    /// Carries the status line to show.
    Succeeded(String),
    /// Carries a human-readable reason.
    Failed(String),
}

impl RequestState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Text for a status bar.
    pub fn status_text(&self) -> &str {
        match self {
            Self::Idle => "",
            Self::Pending => "Pending\u{2026}",
            Self::Succeeded(text) | Self::Failed(text) => text,
        }
    }
}

/// Identifies one issued request so its reply can be matched against the
/// latest issue of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub kind: OperationKind,
    pub seq: u64,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    state: RequestState,
    latest: u64,
}

/// Per-kind request state with last-issued-wins sequencing.
///
/// Kinds are fully independent. Issuing a kind that is already pending
/// takes over its visible state; the older reply is then stale and
/// [`finish`](Self::finish) refuses it.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    slots: [Slot; OperationKind::ALL.len()],
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `kind` to `Pending` and hand out a fresh ticket.
    pub fn begin(&mut self, kind: OperationKind) -> Ticket {
        let slot = &mut self.slots[kind.index()];
        slot.latest += 1;
        slot.state = RequestState::Pending;
        Ticket {
            kind,
            seq: slot.latest,
        }
    }

    /// Whether `ticket` is still the newest request of its kind.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.slots[ticket.kind.index()].latest == ticket.seq
    }

    /// Record the outcome of `ticket`. Returns `false` and changes nothing
    /// when a newer request of the same kind exists.
    pub fn finish(&mut self, ticket: Ticket, outcome: RequestState) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        debug_assert!(!outcome.is_pending());
        self.slots[ticket.kind.index()].state = outcome;
        true
    }

    /// Return a settled kind to `Idle` once its status has been shown.
    /// Pending requests are left alone.
    pub fn acknowledge(&mut self, kind: OperationKind) -> bool {
        let slot = &mut self.slots[kind.index()];
        match slot.state {
            RequestState::Succeeded(_) | RequestState::Failed(_) => {
                slot.state = RequestState::Idle;
                true
            }
            RequestState::Idle | RequestState::Pending => false,
        }
    }

    pub fn state(&self, kind: OperationKind) -> &RequestState {
        &self.slots[kind.index()].state
    }

    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.state(kind).is_pending()
    }
}
