//! Print job coordination: status reporting, page composition and the engine seam.

pub mod compositor;
pub mod engine;
pub mod job;
pub mod status;
pub mod template;

pub use compositor::{
    Compositor, CompositorConfig, HeaderFormat, PageSetup, PageSurface, RenderedHeader,
    HEADER_NAME_LENGTH, PAGINATION_CHUNK,
};
pub use engine::{
    CancelToken, EngineError, PagedTextEngine, PrintCallbacks, PrintEngine, PrintRequest,
};
pub use job::{DocumentInfo, PrintAction, PrintJob, PrintJobError, PrintJobEvent, PrintJobId};
pub use status::{PrintJobResult, PrintJobStatus, PrintStatus, StatusError, StatusEvent};
pub use template::{
    escape_template_text, PageTemplate, TemplateError, TemplateSegment, TemplateToken,
};
