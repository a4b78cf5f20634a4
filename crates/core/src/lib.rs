//! File-failure classification and text file I/O for RustNotePad.

pub mod classify;
pub mod decision;
pub mod display;
pub mod failure;
pub mod file_io;
pub mod location;

pub use classify::{already_open_warning, classify, is_recoverable};
pub use decision::{Action, Decision, Severity};
pub use display::{escape_markup, middle_truncate, uri_for_display, MAX_URI_IN_DIALOG_LENGTH};
pub use failure::{
    ConversionErrorCode, DocumentErrorCode, FailureCode, FailureContext, FailureDomain,
    FileOperation, IoErrorCode, ParseFailureCodeError,
};
pub use file_io::{
    backup_path, load_text, save_text, FileError, FileStamp, LoadOptions, LoadedText, SaveOptions,
};
pub use location::Location;
