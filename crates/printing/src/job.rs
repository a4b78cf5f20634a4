use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

use rustnotepad_core::Location;
use rustnotepad_settings::Preferences;
use thiserror::Error;
use tracing::debug;

use crate::compositor::{Compositor, CompositorConfig, PageSetup, PageSurface};
use crate::engine::{CancelToken, EngineError, PrintCallbacks, PrintEngine, PrintRequest};
use crate::status::{PrintJobResult, PrintJobStatus, PrintStatus, StatusError, StatusEvent};
use crate::template::TemplateError;

/// Opaque identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrintJobId(u64);

impl PrintJobId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for PrintJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PrintJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "print-job-{}", self.0)
    }
}

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintAction {
    Print,
    Preview,
    /// Print to a file.
    Export,
}

impl PrintAction {
    pub fn is_preview(self) -> bool {
        self == PrintAction::Preview
    }
}

/// The document being printed.
/// 要列印的文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub location: Option<Location>,
    /// Name used when the document has no location, e.g. "Untitled Document 1".
    pub title: String,
    pub text: String,
    /// The document has a language with highlighting enabled.
    pub highlight_syntax: bool,
}

impl DocumentInfo {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            location: None,
            title: title.into(),
            text: text.into(),
            highlight_syntax: false,
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_syntax_highlighting(mut self, enabled: bool) -> Self {
        self.highlight_syntax = enabled;
        self
    }

    /// Full name for the page header.
    pub fn display_name(&self) -> String {
        match &self.location {
            Some(location) => location.parse_name(),
            None => self.title.clone(),
        }
    }

    /// Short name used as the job name.
    pub fn short_name(&self) -> String {
        match &self.location {
            Some(location) => location.short_name(),
            None => self.title.clone(),
        }
    }
}

/// Notifications for the job owner, drained with [`PrintJob::take_events`].
#[derive(Debug)]
pub enum PrintJobEvent {
    /// Status or progress changed.
    Printing(PrintJobStatus),
    /// Pagination for a preview finished and pages can be shown.
    ShowPreview { n_pages: usize },
    /// Emitted exactly once; `error` is the engine's error, unchanged.
    Done {
        result: PrintJobResult,
        error: Option<EngineError>,
    },
}

#[derive(Debug, Error)]
pub enum PrintJobError {
    #[error("print job {0} was already started")]
    AlreadyStarted(PrintJobId),
    #[error("invalid page header: {0}")]
    Header(#[from] TemplateError),
    #[error("print engine failed to start: {0}")]
    Engine(#[from] EngineError),
}

/// Coordinates one print or preview run: creates the compositor when
/// rendering begins, tracks status and progress, and reports to its owner.
/// 協調單次列印或預覽：開始時建立排版器、追蹤狀態與進度並通知擁有者。
pub struct PrintJob {
    id: PrintJobId,
    document: DocumentInfo,
    preferences: Preferences,
    status: PrintStatus,
    is_preview: bool,
    started: bool,
    config: Option<CompositorConfig>,
    compositor: Option<Compositor>,
    cancel: CancelToken,
    events: Vec<PrintJobEvent>,
}

impl PrintJob {
    /// Takes a snapshot of the preferences; later changes do not affect this job.
    pub fn new(document: DocumentInfo, preferences: &Preferences) -> Self {
        Self {
            id: PrintJobId::new(),
            document,
            preferences: preferences.clone(),
            status: PrintStatus::new(),
            is_preview: false,
            started: false,
            config: None,
            compositor: None,
            cancel: CancelToken::new(),
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> PrintJobId {
        self.id
    }

    pub fn document(&self) -> &DocumentInfo {
        &self.document
    }

    pub fn job_name(&self) -> String {
        self.document.short_name()
    }

    pub fn status(&self) -> PrintJobStatus {
        self.status.phase()
    }

    pub fn status_text(&self) -> &str {
        self.status.status_text()
    }

    pub fn progress(&self) -> f64 {
        self.status.progress()
    }

    pub fn result(&self) -> Option<PrintJobResult> {
        self.status.result()
    }

    pub fn is_preview(&self) -> bool {
        self.is_preview
    }

    /// Compositor settings in use, once printing has started.
    pub fn compositor_config(&self) -> Option<&CompositorConfig> {
        self.config.as_ref()
    }

    /// Whether the compositor is alive (between begin and end of rendering).
    pub fn has_compositor(&self) -> bool {
        self.compositor.is_some()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Asks the engine to stop. The job finishes once the engine reports `Cancel`.
    pub fn cancel(&self) {
        debug!(job = %self.id, "print job cancel requested");
        self.cancel.cancel();
    }

    pub fn take_events(&mut self) -> Vec<PrintJobEvent> {
        mem::take(&mut self.events)
    }

    /// Runs the job on `engine`. A job can be started only once.
    pub fn print(
        &mut self,
        action: PrintAction,
        engine: &mut dyn PrintEngine,
    ) -> Result<(), PrintJobError> {
        if self.started {
            return Err(PrintJobError::AlreadyStarted(self.id));
        }
        self.started = true;
        self.is_preview = action.is_preview();
        self.config = Some(CompositorConfig::from_preferences(
            &self.preferences,
            &self.document,
        )?);

        let request = PrintRequest {
            job_name: self.job_name(),
            action,
            cancel: self.cancel.clone(),
        };
        debug!(job = %self.id, name = %request.job_name, ?action, "starting print job");
        engine.run(&request, self)?;
        Ok(())
    }

    fn emit_status(&mut self) {
        self.events.push(PrintJobEvent::Printing(self.status.phase()));
    }

    fn compositor_mut(&mut self, event: StatusEvent) -> Result<&mut Compositor, StatusError> {
        let phase = self.status.phase();
        self.compositor
            .as_mut()
            .ok_or(StatusError::OutOfOrder { phase, event })
    }
}

impl PrintCallbacks for PrintJob {
    fn on_begin(&mut self, _setup: &PageSetup) -> Result<(), StatusError> {
        self.status.check(StatusEvent::Begin)?;
        let config = self.config.clone().ok_or(StatusError::OutOfOrder {
            phase: self.status.phase(),
            event: StatusEvent::Begin,
        })?;
        self.compositor = Some(Compositor::new(config, &self.document.text));
        self.status.on_begin()?;
        self.emit_status();
        Ok(())
    }

    fn on_paginate(&mut self, setup: &PageSetup) -> Result<bool, StatusError> {
        self.status.check(StatusEvent::Paginate)?;
        let compositor = self.compositor_mut(StatusEvent::Paginate)?;
        let complete = compositor.paginate(setup);
        let fraction = compositor.pagination_progress();
        let is_preview = self.is_preview;
        self.status.on_paginate_step(fraction, is_preview)?;
        self.emit_status();
        Ok(complete)
    }

    fn on_preview_ready(&mut self) -> Result<(), StatusError> {
        if self.status.is_done() {
            return Err(StatusError::Finished);
        }
        self.is_preview = true;
        let n_pages = self.n_pages();
        self.events.push(PrintJobEvent::ShowPreview { n_pages });
        Ok(())
    }

    fn n_pages(&self) -> usize {
        self.compositor.as_ref().map_or(0, Compositor::n_pages)
    }

    fn on_draw_page(
        &mut self,
        page_nr: usize,
        surface: &mut PageSurface,
    ) -> Result<(), StatusError> {
        self.status.check(StatusEvent::DrawPage)?;
        let n_pages = self.n_pages();
        let is_preview = self.is_preview;
        self.status.on_draw_page(page_nr, n_pages, is_preview)?;
        if !is_preview {
            self.emit_status();
        }
        let compositor = self.compositor_mut(StatusEvent::DrawPage)?;
        compositor.draw_page(page_nr, surface);
        Ok(())
    }

    fn on_end(&mut self) {
        self.compositor = None;
    }

    fn on_done(
        &mut self,
        result: PrintJobResult,
        error: Option<EngineError>,
    ) -> Result<(), StatusError> {
        self.status.on_done(result)?;
        match &error {
            Some(err) => debug!(job = %self.id, ?result, %err, "print job finished"),
            None => debug!(job = %self.id, ?result, "print job finished"),
        }
        self.events.push(PrintJobEvent::Done { result, error });
        Ok(())
    }
}
