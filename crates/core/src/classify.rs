//! Turns failed load/save/revert operations into banner decisions.
//!
//! Dispatch order matters: operation-specific paths run first, then the encoding
//! paths, then the shared per-domain tables, and only then the generic fallback.

use std::borrow::Cow;

use tracing::warn;

use crate::decision::{Action, Decision, Severity};
use crate::display::{escape_markup, uri_for_display};
use crate::failure::{
    DocumentErrorCode, FailureCode, FailureContext, FileOperation, IoErrorCode,
};
use crate::location::Location;

const APP_NAME: &str = "RustNotePad";

const OPEN_PRIMARY: &str = "Could not open the file {uri}.";
const REVERT_PRIMARY: &str = "Could not revert the file {uri}.";
const SAVE_PRIMARY: &str = "Could not save the file {uri}.";

/// How the secondary text of a table entry is produced.
enum Details {
    Text(&'static str),
    /// Mentions the location's URI scheme when there is a location to take it from.
    Scheme {
        known: &'static str,
        unknown: &'static str,
    },
    /// Mentions the host name when the location has one.
    Host,
}

struct Entry {
    code: FailureCode,
    primary: Option<&'static str>,
    details: Details,
}

const fn entry(code: FailureCode, primary: Option<&'static str>, details: Details) -> Entry {
    Entry {
        code,
        primary,
        details,
    }
}

const fn io(code: IoErrorCode) -> FailureCode {
    FailureCode::Io(code)
}

const LOAD_FAST_PATHS: &[Entry] = &[
    entry(
        io(IoErrorCode::TooManyLinks),
        None,
        Details::Text(
            "The number of followed links is limited and the actual file could not be found \
             within this limit.",
        ),
    ),
    entry(
        io(IoErrorCode::PermissionDenied),
        None,
        Details::Text("You do not have the permissions necessary to open the file."),
    ),
];

const REVERT_FAST_PATHS: &[Entry] = &[entry(
    io(IoErrorCode::NotFound),
    None,
    Details::Text("{app} cannot find the file. Perhaps it has recently been deleted."),
)];

const SAVE_FAST_PATHS: &[Entry] = &[
    entry(
        io(IoErrorCode::NotSupported),
        None,
        Details::Scheme {
            known: "{app} cannot handle {scheme}: locations in write mode. Please check that \
                    you typed the location correctly and try again.",
            unknown: "{app} cannot handle this location in write mode. Please check that you \
                      typed the location correctly and try again.",
        },
    ),
    entry(
        io(IoErrorCode::InvalidFilename),
        None,
        Details::Text(
            "{uri} is not a valid location. Please check that you typed the location \
             correctly and try again.",
        ),
    ),
    entry(
        io(IoErrorCode::PermissionDenied),
        None,
        Details::Text(
            "You do not have the permissions necessary to save the file. Please check that \
             you typed the location correctly and try again.",
        ),
    ),
    entry(
        io(IoErrorCode::NoSpace),
        None,
        Details::Text(
            "There is not enough disk space to save the file. Please free some disk space \
             and try again.",
        ),
    ),
    entry(
        io(IoErrorCode::ReadOnly),
        None,
        Details::Text(
            "You are trying to save the file on a read-only disk. Please check that you \
             typed the location correctly and try again.",
        ),
    ),
    entry(
        io(IoErrorCode::Exists),
        None,
        Details::Text("A file with the same name already exists. Please use a different name."),
    ),
    entry(
        io(IoErrorCode::FilenameTooLong),
        None,
        Details::Text(
            "The disk where you are trying to save the file has a limitation on length of \
             the file names. Please use a shorter name.",
        ),
    ),
    entry(
        FailureCode::Document(DocumentErrorCode::TooBig),
        None,
        Details::Text(
            "The disk where you are trying to save the file has a limitation on file sizes. \
             Please try saving a smaller file or saving it to a disk that does not have this \
             limitation.",
        ),
    ),
];

const SHARED_TABLE: &[Entry] = &[
    entry(
        io(IoErrorCode::NotFound),
        Some("Could not find the file {uri}."),
        Details::Text("Please check that you typed the location correctly and try again."),
    ),
    entry(
        io(IoErrorCode::NotDirectory),
        Some("Could not find the file {uri}."),
        Details::Text("Please check that you typed the location correctly and try again."),
    ),
    entry(
        io(IoErrorCode::NotSupported),
        None,
        Details::Scheme {
            known: "{app} cannot handle {scheme}: locations.",
            unknown: "{app} cannot handle this location.",
        },
    ),
    entry(
        io(IoErrorCode::NotMountableFile),
        None,
        Details::Text("The location of the file cannot be mounted."),
    ),
    entry(
        io(IoErrorCode::NotMounted),
        None,
        Details::Text(
            "The location of the file cannot be accessed because it is not mounted.",
        ),
    ),
    entry(
        io(IoErrorCode::IsDirectory),
        Some("{uri} is a directory."),
        Details::Text("Please check that you typed the location correctly and try again."),
    ),
    entry(
        io(IoErrorCode::InvalidFilename),
        Some("{uri} is not a valid location."),
        Details::Text("Please check that you typed the location correctly and try again."),
    ),
    entry(io(IoErrorCode::HostNotFound), None, Details::Host),
    entry(
        io(IoErrorCode::NotRegularFile),
        None,
        Details::Text("{uri} is not a regular file."),
    ),
    entry(
        io(IoErrorCode::TimedOut),
        None,
        Details::Text("Connection timed out. Please try again."),
    ),
    entry(
        FailureCode::Document(DocumentErrorCode::TooBig),
        None,
        Details::Text("The file is too big."),
    ),
];

/// Whether retrying the same operation may succeed without further user action.
pub fn is_recoverable(code: FailureCode) -> bool {
    matches!(
        code,
        FailureCode::Io(
            IoErrorCode::PermissionDenied
                | IoErrorCode::NotFound
                | IoErrorCode::HostNotFound
                | IoErrorCode::TimedOut
                | IoErrorCode::NotMountableFile
                | IoErrorCode::NotMounted
                | IoErrorCode::Busy
        )
    )
}

/// Chooses the banner for a failed file operation. Never fails: codes without a
/// dedicated message fall back to a generic text carrying the raw error message.
pub fn classify(context: &FailureContext) -> Decision {
    let vars = Vars::new(context);
    match context.operation {
        FileOperation::Load => classify_load(context, &vars),
        FileOperation::Revert => classify_revert(context, &vars),
        FileOperation::Save => classify_save(context, &vars),
    }
}

/// Banner shown when a file is opened read-only because another window already edits it.
pub fn already_open_warning(location: &Location) -> Decision {
    let uri = uri_for_display(Some(location));
    Decision::new(
        Severity::Warning,
        format!("This file ({uri}) is already open in another {APP_NAME} window."),
        Some(format!(
            "{APP_NAME} opened this instance of the file in a non-editable way. \
             Do you want to edit it anyway?"
        )),
    )
    .with_actions(&[Action::EditAnyway, Action::DontEdit])
}

fn classify_load(context: &FailureContext, vars: &Vars<'_>) -> Decision {
    if context.is_document(DocumentErrorCode::ExternallyModified) {
        return changed_on_disk(context, vars);
    }
    if let Some(entry) = lookup(LOAD_FAST_PATHS, context.code) {
        return io_failure(context, vars, OPEN_PRIMARY, describe(entry, vars));
    }
    if let Some(decision) = load_encoding_failure(context, vars) {
        return decision;
    }
    generic_failure(context, vars, OPEN_PRIMARY)
}

fn classify_revert(context: &FailureContext, vars: &Vars<'_>) -> Decision {
    if context.is_document(DocumentErrorCode::ExternallyModified) {
        return changed_on_disk(context, vars);
    }
    if let Some(entry) = lookup(REVERT_FAST_PATHS, context.code) {
        return io_failure(context, vars, REVERT_PRIMARY, describe(entry, vars));
    }
    generic_failure(context, vars, REVERT_PRIMARY)
}

fn classify_save(context: &FailureContext, vars: &Vars<'_>) -> Decision {
    match context.code {
        FailureCode::Io(IoErrorCode::CantCreateBackup)
        | FailureCode::Document(DocumentErrorCode::CantCreateBackup) => {
            return backup_failed(context, vars);
        }
        FailureCode::Document(DocumentErrorCode::ExternallyModified) => {
            return modified_since_reading(vars);
        }
        FailureCode::Conversion(_) | FailureCode::Io(IoErrorCode::InvalidData) => {
            return save_conversion_failure(vars);
        }
        _ => {}
    }
    if let Some(entry) = lookup(SAVE_FAST_PATHS, context.code) {
        return io_failure(context, vars, SAVE_PRIMARY, describe(entry, vars));
    }
    generic_failure(context, vars, SAVE_PRIMARY)
}

fn load_encoding_failure(context: &FailureContext, vars: &Vars<'_>) -> Option<Decision> {
    let invalid_data = context.is_io(IoErrorCode::InvalidData)
        || matches!(context.code, FailureCode::Conversion(_));

    if (invalid_data && context.encoding.is_none())
        || context.is_document(DocumentErrorCode::EncodingAutoDetectionFailed)
    {
        let secondary = vars.render(
            "{app} has not been able to detect the character encoding.\n\
             Please check that you are not trying to open a binary file.\n\
             Select a character encoding from the menu and try again.",
        );
        return Some(conversion_failure(vars.render(OPEN_PRIMARY), secondary, false));
    }

    if context.is_document(DocumentErrorCode::ConversionFallback) {
        return Some(conversion_failure(
            vars.render("There was a problem opening the file {uri}."),
            "The file you opened has some invalid characters. If you continue editing this \
             file you could make this document useless.\n\
             You can also choose another character encoding and try again."
                .to_string(),
            true,
        ));
    }

    if invalid_data {
        return Some(conversion_failure(
            vars.render("Could not open the file {uri} using the {encoding} character encoding."),
            "Please check that you are not trying to open a binary file.\n\
             Select a different character encoding from the menu and try again."
                .to_string(),
            false,
        ));
    }

    None
}

fn save_conversion_failure(vars: &Vars<'_>) -> Decision {
    conversion_failure(
        vars.render("Could not save the file {uri} using the {encoding} character encoding."),
        "The document contains one or more characters that cannot be encoded using the \
         specified character encoding.\n\
         Select a different character encoding from the menu and try again."
            .to_string(),
        false,
    )
}

fn conversion_failure(primary: String, secondary: String, edit_anyway: bool) -> Decision {
    let decision = if edit_anyway {
        Decision::new(Severity::Warning, primary, Some(secondary)).with_actions(&[
            Action::Retry,
            Action::EditAnyway,
            Action::DontEdit,
        ])
    } else {
        Decision::new(Severity::Error, primary, Some(secondary))
            .with_actions(&[Action::Retry, Action::Cancel])
    };
    decision.with_encoding_choice()
}

fn changed_on_disk(context: &FailureContext, vars: &Vars<'_>) -> Decision {
    let secondary = if context.document_modified {
        "Do you want to drop your changes and reload the file?"
    } else {
        "Do you want to reload the file?"
    };
    Decision::new(
        Severity::Warning,
        vars.render("The file {uri} changed on disk."),
        Some(secondary.to_string()),
    )
    .with_actions(&[Action::Reload, Action::Cancel])
}

fn modified_since_reading(vars: &Vars<'_>) -> Decision {
    Decision::new(
        Severity::Warning,
        vars.render("The file {uri} has been modified since reading it."),
        Some(
            "If you save it, all the external changes could be lost. Save it anyway?".to_string(),
        ),
    )
    .with_actions(&[Action::SaveAnyway, Action::DontSave])
}

fn backup_failed(context: &FailureContext, vars: &Vars<'_>) -> Decision {
    let primary = if context.create_backup_copy {
        "Could not create a backup file while saving {uri}"
    } else {
        "Could not create a temporary backup file while saving {uri}"
    };
    Decision::new(
        Severity::Warning,
        vars.render(primary),
        Some(vars.render(
            "{app} could not back up the old copy of the file before saving the new one. \
             You can ignore this warning and save the file anyway, but if an error occurs \
             while saving, you could lose the old copy of the file. Save anyway?",
        )),
    )
    .with_actions(&[Action::SaveAnyway, Action::DontSave])
}

fn generic_failure(context: &FailureContext, vars: &Vars<'_>, default_primary: &str) -> Decision {
    let messages = match lookup(SHARED_TABLE, context.code) {
        Some(entry) => describe(entry, vars),
        None => unexpected(context),
    };
    io_failure(context, vars, default_primary, messages)
}

fn io_failure(
    context: &FailureContext,
    vars: &Vars<'_>,
    default_primary: &str,
    messages: Messages,
) -> Decision {
    let primary = messages
        .primary
        .unwrap_or_else(|| vars.render(default_primary));
    let actions: &[Action] = if is_recoverable(context.code) {
        &[Action::Retry, Action::Cancel]
    } else {
        &[Action::Cancel]
    };
    Decision::new(Severity::Error, primary, messages.secondary).with_actions(actions)
}

struct Messages {
    primary: Option<String>,
    secondary: Option<String>,
}

fn lookup(table: &'static [Entry], code: FailureCode) -> Option<&'static Entry> {
    table.iter().find(|entry| entry.code == code)
}

fn describe(entry: &Entry, vars: &Vars<'_>) -> Messages {
    let secondary = match entry.details {
        Details::Text(text) => vars.render(text),
        Details::Scheme { known, unknown } => {
            if vars.context.location.is_some() {
                vars.render(known)
            } else {
                vars.render(unknown)
            }
        }
        Details::Host => match vars.host() {
            Some(_) => vars.render(
                "Host {host} could not be found. Please check that your proxy settings are \
                 correct and try again.",
            ),
            None => vars.render(
                "Hostname was invalid. Please check that you typed the location correctly \
                 and try again.",
            ),
        },
    };
    Messages {
        primary: entry.primary.map(|template| vars.render(template)),
        secondary: Some(secondary),
    }
}

fn unexpected(context: &FailureContext) -> Messages {
    warn!(
        operation = ?context.operation,
        domain = %context.domain(),
        code = context.code.raw(),
        "hit unhandled failure {} ({})",
        context.code,
        context.message
    );
    Messages {
        primary: None,
        secondary: Some(format!(
            "Unexpected error: {}",
            escape_markup(&context.message)
        )),
    }
}

/// Values substituted into message templates. Every value is markup-escaped.
struct Vars<'a> {
    context: &'a FailureContext,
    uri: String,
    encoding: String,
}

impl<'a> Vars<'a> {
    fn new(context: &'a FailureContext) -> Self {
        let encoding = context.encoding.as_deref().unwrap_or("UTF-8");
        Self {
            context,
            uri: uri_for_display(context.location.as_ref()),
            encoding: escape_markup(encoding).into_owned(),
        }
    }

    fn host(&self) -> Option<String> {
        self.context
            .location
            .as_ref()
            .and_then(Location::host)
            .map(|host| escape_markup(&host).into_owned())
    }

    fn value(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "app" => Some(Cow::Borrowed(APP_NAME)),
            "uri" => Some(Cow::Borrowed(&self.uri)),
            "encoding" => Some(Cow::Borrowed(&self.encoding)),
            "scheme" => self
                .context
                .location
                .as_ref()
                .map(|location| Cow::Owned(escape_markup(location.scheme()).into_owned())),
            "host" => self.host().map(Cow::Owned),
            _ => None,
        }
    }

    /// Single pass over the template, so substituted values are never re-expanded.
    fn render(&self, template: &str) -> String {
        let mut output = String::with_capacity(template.len() + self.uri.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            output.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    match self.value(key) {
                        Some(value) => output.push_str(&value),
                        None => {
                            output.push('{');
                            output.push_str(key);
                            output.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    output.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        output.push_str(rest);
        output
    }
}
