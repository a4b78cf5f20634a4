//! Print engine seam and a reference engine that prints plain-text pages.
//! 列印引擎介面，以及輸出純文字頁面的參考實作。

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::compositor::{PageSetup, PageSurface};
use crate::job::PrintAction;
use crate::status::{PrintJobResult, StatusError};

/// Shared, advisory cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Errors reported by an engine, either when starting or through `on_done`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("page setup of {columns}x{lines_per_page} cells is too small")]
    InvalidSetup {
        columns: usize,
        lines_per_page: usize,
    },
    #[error("print callback rejected: {0}")]
    Callback(#[from] StatusError),
    #[error("failed to write printed output: {0}")]
    Output(#[from] io::Error),
}

/// Callbacks an engine invokes while it runs, in this order:
/// `on_begin`, `on_paginate` until it returns `true`, optionally
/// `on_preview_ready`, `on_draw_page` per page, `on_end`, then `on_done` once.
pub trait PrintCallbacks {
    fn on_begin(&mut self, setup: &PageSetup) -> Result<(), StatusError>;
    fn on_paginate(&mut self, setup: &PageSetup) -> Result<bool, StatusError>;
    fn on_preview_ready(&mut self) -> Result<(), StatusError>;
    fn n_pages(&self) -> usize;
    fn on_draw_page(&mut self, page_nr: usize, surface: &mut PageSurface)
        -> Result<(), StatusError>;
    fn on_end(&mut self);
    fn on_done(
        &mut self,
        result: PrintJobResult,
        error: Option<EngineError>,
    ) -> Result<(), StatusError>;
}

/// What the engine is asked to do.
#[derive(Debug, Clone)]
pub struct PrintRequest {
    pub job_name: String,
    pub action: PrintAction,
    pub cancel: CancelToken,
}

/// Drives a print operation. Returning `Err` means the operation never
/// started and no callback was invoked.
pub trait PrintEngine {
    fn run(
        &mut self,
        request: &PrintRequest,
        callbacks: &mut dyn PrintCallbacks,
    ) -> Result<(), EngineError>;
}

/// Synchronous engine that paginates into fixed-size text pages. Printed pages
/// are written to the sink, separated by form feeds; previews are only kept.
pub struct PagedTextEngine {
    setup: PageSetup,
    sink: Option<Box<dyn Write>>,
    pages: Vec<PageSurface>,
}

impl PagedTextEngine {
    pub fn new(setup: PageSetup) -> Self {
        Self {
            setup,
            sink: None,
            pages: Vec::new(),
        }
    }

    pub fn with_sink(setup: PageSetup, sink: Box<dyn Write>) -> Self {
        Self {
            setup,
            sink: Some(sink),
            pages: Vec::new(),
        }
    }

    pub fn setup(&self) -> PageSetup {
        self.setup
    }

    /// Pages drawn by the last run.
    pub fn pages(&self) -> &[PageSurface] {
        &self.pages
    }

    fn write_page(&mut self, page_nr: usize, surface: &PageSurface) -> io::Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        if page_nr > 0 {
            sink.write_all(b"\x0c")?;
        }
        for line in surface.lines() {
            sink.write_all(line.as_bytes())?;
            sink.write_all(b"\n")?;
        }
        sink.flush()
    }

    fn drive(
        &mut self,
        request: &PrintRequest,
        callbacks: &mut dyn PrintCallbacks,
    ) -> (PrintJobResult, Option<EngineError>) {
        let preview = request.action.is_preview();

        if let Err(err) = callbacks.on_begin(&self.setup) {
            return (PrintJobResult::Error, Some(err.into()));
        }

        loop {
            if request.cancel.is_cancelled() {
                return (PrintJobResult::Cancel, None);
            }
            match callbacks.on_paginate(&self.setup) {
                Ok(true) => break,
                Ok(false) => continue,
                Err(err) => return (PrintJobResult::Error, Some(err.into())),
            }
        }

        if preview {
            if let Err(err) = callbacks.on_preview_ready() {
                return (PrintJobResult::Error, Some(err.into()));
            }
        }

        for page_nr in 0..callbacks.n_pages() {
            if request.cancel.is_cancelled() {
                return (PrintJobResult::Cancel, None);
            }
            let mut surface = PageSurface::default();
            if let Err(err) = callbacks.on_draw_page(page_nr, &mut surface) {
                return (PrintJobResult::Error, Some(err.into()));
            }
            if !preview {
                if let Err(err) = self.write_page(page_nr, &surface) {
                    return (PrintJobResult::Error, Some(err.into()));
                }
            }
            self.pages.push(surface);
        }

        (PrintJobResult::Ok, None)
    }
}

impl PrintEngine for PagedTextEngine {
    fn run(
        &mut self,
        request: &PrintRequest,
        callbacks: &mut dyn PrintCallbacks,
    ) -> Result<(), EngineError> {
        if self.setup.columns < 8 || self.setup.lines_per_page < 3 {
            return Err(EngineError::InvalidSetup {
                columns: self.setup.columns,
                lines_per_page: self.setup.lines_per_page,
            });
        }

        self.pages.clear();
        debug!(job = %request.job_name, action = ?request.action, "print engine started");
        let (result, error) = self.drive(request, callbacks);
        callbacks.on_end();
        if let Err(err) = callbacks.on_done(result, error) {
            debug!(%err, "print job refused completion");
        }
        Ok(())
    }
}
