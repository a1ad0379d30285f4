use std::fmt;

/// Whether the next click on the image is a recentre click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Browsing,
    RecentreArmed,
}

impl InteractionMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Browsing => "Browsing",
            Self::RecentreArmed => "Recentre armed",
        }
    }
}

impl fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Two-state machine separating ordinary clicks from recentre clicks.
///
/// Only an explicit toggle arms it, and an armed state is spent by
/// exactly one click.
#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    mode: InteractionMode,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// Press of the recentre control. Returns the new mode.
    pub fn toggle(&mut self) -> InteractionMode {
        self.mode = match self.mode {
            InteractionMode::Browsing => InteractionMode::RecentreArmed,
            InteractionMode::RecentreArmed => InteractionMode::Browsing,
        };
        self.mode
    }

    /// Spend the armed state on a click. `false` while browsing.
    pub fn consume_click(&mut self) -> bool {
        if self.mode == InteractionMode::RecentreArmed {
            self.mode = InteractionMode::Browsing;
            true
        } else {
            false
        }
    }
}
