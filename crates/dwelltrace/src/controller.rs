use crate::timeline::DisplayMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    ByApp,
    Timeline,
    ByHour,
}

impl ViewKind {
    pub const ALL: [ViewKind; 3] = [ViewKind::ByApp, ViewKind::Timeline, ViewKind::ByHour];

    pub fn title(self) -> &'static str {
        match self {
            Self::ByApp => "Time per App",
            Self::Timeline => "App Timeline",
            Self::ByHour => "Activity per Hour",
        }
    }
}

/// Controls that only exist while the timeline is on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimelineControls {
    pub mode: DisplayMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveView {
    ByApp,
    Timeline(TimelineControls),
    ByHour,
}

impl ActiveView {
    fn construct(kind: ViewKind) -> Self {
        match kind {
            ViewKind::ByApp => Self::ByApp,
            ViewKind::Timeline => Self::Timeline(TimelineControls::default()),
            ViewKind::ByHour => Self::ByHour,
        }
    }

    pub fn kind(&self) -> ViewKind {
        match self {
            Self::ByApp => ViewKind::ByApp,
            Self::Timeline(_) => ViewKind::Timeline,
            Self::ByHour => ViewKind::ByHour,
        }
    }
}

/// Cycles through the three charts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotController {
    index: usize,
    active: ActiveView,
}

impl Default for PlotController {
    fn default() -> Self {
        Self {
            index: 0,
            active: ActiveView::construct(ViewKind::ALL[0]),
        }
    }
}

impl PlotController {
    pub fn current(&self) -> ViewKind {
        self.active.kind()
    }

    pub fn active(&self) -> &ActiveView {
        &self.active
    }

    pub fn next(&mut self) -> ViewKind {
        self.switch_to((self.index + 1) % ViewKind::ALL.len())
    }

    pub fn previous(&mut self) -> ViewKind {
        let len = ViewKind::ALL.len();
        self.switch_to((self.index + len - 1) % len)
    }

    /// e.g. "App Timeline (2/3)".
    pub fn title(&self) -> String {
        format!(
            "{} ({}/{})",
            self.current().title(),
            self.index + 1,
            ViewKind::ALL.len()
        )
    }

    /// Detail mode of the live timeline toggle, if the timeline is shown.
    pub fn detail_mode(&self) -> Option<DisplayMode> {
        match &self.active {
            ActiveView::Timeline(controls) => Some(controls.mode),
            _ => None,
        }
    }

    /// Flips the timeline detail toggle. Returns `false` when no toggle is
    /// on screen.
    pub fn toggle_detail(&mut self) -> bool {
        match &mut self.active {
            ActiveView::Timeline(controls) => {
                controls.mode = controls.mode.toggled();
                true
            }
            _ => false,
        }
    }

    fn switch_to(&mut self, index: usize) -> ViewKind {
        if let Some(controls) = self.teardown() {
            tracing::debug!(mode = ?controls.mode, "timeline controls removed");
        }
        self.index = index;
        self.active = ActiveView::construct(ViewKind::ALL[index]);
        self.current()
    }

    /// Removes the view-specific controls of the active view.
    fn teardown(&mut self) -> Option<TimelineControls> {
        match std::mem::replace(&mut self.active, ActiveView::ByApp) {
            ActiveView::Timeline(controls) => Some(controls),
            _ => None,
        }
    }
}
