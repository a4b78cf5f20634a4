use std::fmt;

use thiserror::Error;
use tracing::debug;

/// Phase of a print job.
/// 列印作業目前所處的階段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrintJobStatus {
    Init,
    Paginating,
    Drawing,
    Done,
}

impl fmt::Display for PrintJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrintJobStatus::Init => "init",
            PrintJobStatus::Paginating => "paginating",
            PrintJobStatus::Drawing => "drawing",
            PrintJobStatus::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a print job finished.
/// 列印作業的最終結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrintJobResult {
    Ok,
    Cancel,
    Error,
}

/// Engine callback that drives the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    Begin,
    Paginate,
    DrawPage,
    Done,
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusEvent::Begin => "begin",
            StatusEvent::Paginate => "paginate",
            StatusEvent::DrawPage => "draw-page",
            StatusEvent::Done => "done",
        };
        f.write_str(name)
    }
}

/// Rejected state transitions. The state is left untouched when one is returned.
/// 被拒絕的狀態轉換；回傳時狀態維持不變。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("unexpected {event} callback while {phase}")]
    OutOfOrder {
        phase: PrintJobStatus,
        event: StatusEvent,
    },
    #[error("page index {page} is outside the {total} paginated pages")]
    PageOutOfRange { page: usize, total: usize },
    #[error("print job has already finished")]
    Finished,
}

const PREPARING: &str = "Preparing...";

/// Progress and status text reported to the user while a job runs.
/// 列印期間回報給使用者的進度與狀態文字。
#[derive(Debug, Clone, PartialEq)]
pub struct PrintStatus {
    phase: PrintJobStatus,
    progress: f64,
    status_text: String,
    result: Option<PrintJobResult>,
}

impl Default for PrintStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl PrintStatus {
    pub fn new() -> Self {
        Self {
            phase: PrintJobStatus::Init,
            progress: 0.0,
            status_text: PREPARING.to_string(),
            result: None,
        }
    }

    pub fn phase(&self) -> PrintJobStatus {
        self.phase
    }

    /// Fraction in `[0, 1]`; never decreases during a run.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn result(&self) -> Option<PrintJobResult> {
        self.result
    }

    pub fn is_done(&self) -> bool {
        self.phase == PrintJobStatus::Done
    }

    /// Checks whether `event` is acceptable in the current phase.
    pub fn check(&self, event: StatusEvent) -> Result<(), StatusError> {
        let allowed = match (self.phase, event) {
            (PrintJobStatus::Done, _) => return Err(StatusError::Finished),
            (_, StatusEvent::Done) => true,
            (PrintJobStatus::Init, StatusEvent::Begin) => true,
            (PrintJobStatus::Paginating, StatusEvent::Paginate) => true,
            (PrintJobStatus::Paginating | PrintJobStatus::Drawing, StatusEvent::DrawPage) => true,
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            debug!(phase = %self.phase, %event, "rejected print status transition");
            Err(StatusError::OutOfOrder {
                phase: self.phase,
                event,
            })
        }
    }

    /// Rendering started: pagination begins from zero.
    pub fn on_begin(&mut self) -> Result<(), StatusError> {
        self.check(StatusEvent::Begin)?;
        self.phase = PrintJobStatus::Paginating;
        self.progress = 0.0;
        Ok(())
    }

    /// Records one pagination step and returns whether pagination is complete.
    ///
    /// When previewing the whole bar belongs to pagination; when printing,
    /// pagination fills the first half and drawing the second.
    pub fn on_paginate_step(&mut self, fraction: f64, is_preview: bool) -> Result<bool, StatusError> {
        self.check(StatusEvent::Paginate)?;
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let progress = if is_preview { fraction } else { fraction / 2.0 };
        self.advance(progress);
        Ok(fraction >= 1.0)
    }

    /// Records that page `page_index` (0-based) of `total_pages` is being drawn.
    /// Preview pages are drawn on demand and do not move the progress bar.
    pub fn on_draw_page(
        &mut self,
        page_index: usize,
        total_pages: usize,
        is_preview: bool,
    ) -> Result<(), StatusError> {
        self.check(StatusEvent::DrawPage)?;
        if page_index >= total_pages {
            return Err(StatusError::PageOutOfRange {
                page: page_index,
                total: total_pages,
            });
        }
        if is_preview {
            return Ok(());
        }

        self.phase = PrintJobStatus::Drawing;
        self.status_text = format!("Rendering page {} of {}...", page_index + 1, total_pages);
        self.advance(page_index as f64 / (2.0 * total_pages as f64) + 0.5);
        Ok(())
    }

    /// Terminal transition. Later callbacks are rejected with [`StatusError::Finished`].
    pub fn on_done(&mut self, result: PrintJobResult) -> Result<(), StatusError> {
        self.check(StatusEvent::Done)?;
        self.phase = PrintJobStatus::Done;
        self.result = Some(result);
        Ok(())
    }

    fn advance(&mut self, progress: f64) {
        self.progress = self.progress.max(progress.clamp(0.0, 1.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn starts_in_init() {
        let status = PrintStatus::new();
        assert_eq!(status.phase(), PrintJobStatus::Init);
        assert_eq!(status.status_text(), "Preparing...");
        assert_eq!(status.progress(), 0.0);
        assert_eq!(status.result(), None);
    }

    #[test]
    fn pagination_fills_first_half_when_printing() {
        let mut status = PrintStatus::new();
        status.on_begin().unwrap();
        assert!(!status.on_paginate_step(0.5, false).unwrap());
        assert!(approx(status.progress(), 0.25));
        assert!(status.on_paginate_step(1.0, false).unwrap());
        assert!(approx(status.progress(), 0.5));
    }

    #[test]
    fn preview_pagination_uses_full_bar() {
        let mut status = PrintStatus::new();
        status.on_begin().unwrap();
        status.on_paginate_step(0.8, true).unwrap();
        assert!(approx(status.progress(), 0.8));
        status.on_draw_page(0, 3, true).unwrap();
        assert_eq!(status.phase(), PrintJobStatus::Paginating);
        assert_eq!(status.status_text(), "Preparing...");
    }

    #[test]
    fn drawing_page_five_of_ten() {
        let mut status = PrintStatus::new();
        status.on_begin().unwrap();
        status.on_paginate_step(1.0, false).unwrap();
        status.on_draw_page(4, 10, false).unwrap();
        assert_eq!(status.phase(), PrintJobStatus::Drawing);
        assert_eq!(status.status_text(), "Rendering page 5 of 10...");
        assert!(approx(status.progress(), 0.7));
    }

    #[test]
    fn progress_never_decreases() {
        let mut status = PrintStatus::new();
        status.on_begin().unwrap();
        status.on_paginate_step(0.6, true).unwrap();
        status.on_paginate_step(0.2, true).unwrap();
        assert!(approx(status.progress(), 0.6));
    }

    #[test]
    fn out_of_order_transitions_are_rejected() {
        let mut status = PrintStatus::new();
        assert_eq!(
            status.on_paginate_step(0.5, false),
            Err(StatusError::OutOfOrder {
                phase: PrintJobStatus::Init,
                event: StatusEvent::Paginate,
            })
        );
        status.on_begin().unwrap();
        status.on_paginate_step(1.0, false).unwrap();
        status.on_draw_page(0, 2, false).unwrap();
        assert!(status.on_begin().is_err());
        assert!(status.on_paginate_step(1.0, false).is_err());
        assert_eq!(
            status.on_draw_page(2, 2, false),
            Err(StatusError::PageOutOfRange { page: 2, total: 2 })
        );
        assert_eq!(status.phase(), PrintJobStatus::Drawing);
    }

    #[test]
    fn done_is_terminal() {
        let mut status = PrintStatus::new();
        status.on_begin().unwrap();
        status.on_done(PrintJobResult::Cancel).unwrap();
        let snapshot = status.clone();
        assert_eq!(status.on_done(PrintJobResult::Ok), Err(StatusError::Finished));
        assert_eq!(status.on_draw_page(0, 1, false), Err(StatusError::Finished));
        assert_eq!(status, snapshot);
        assert_eq!(status.result(), Some(PrintJobResult::Cancel));
    }
}
