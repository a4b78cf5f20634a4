use std::fmt;
use std::io;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::location::Location;

/// Error domain a failure code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureDomain {
    Io,
    Conversion,
    Document,
}

impl FailureDomain {
    pub fn name(self) -> &'static str {
        match self {
            FailureDomain::Io => "io",
            FailureDomain::Conversion => "conversion",
            FailureDomain::Document => "document",
        }
    }
}

impl fmt::Display for FailureDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

macro_rules! failure_codes {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $raw:literal => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every code of the domain, in numeric order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stable numeric value shared with the host I/O library.
            pub fn raw(self) -> i32 {
                match self {
                    $($name::$variant => $raw),+
                }
            }

            pub fn from_raw(raw: i32) -> Option<Self> {
                match raw {
                    $($raw => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($label => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

failure_codes! {
    /// Filesystem and network error codes.
    IoErrorCode {
        Failed = 0 => "failed",
        NotFound = 1 => "not-found",
        Exists = 2 => "exists",
        IsDirectory = 3 => "is-directory",
        NotDirectory = 4 => "not-directory",
        NotEmpty = 5 => "not-empty",
        NotRegularFile = 6 => "not-regular-file",
        NotSymbolicLink = 7 => "not-symbolic-link",
        NotMountableFile = 8 => "not-mountable-file",
        FilenameTooLong = 9 => "filename-too-long",
        InvalidFilename = 10 => "invalid-filename",
        TooManyLinks = 11 => "too-many-links",
        NoSpace = 12 => "no-space",
        InvalidArgument = 13 => "invalid-argument",
        PermissionDenied = 14 => "permission-denied",
        NotSupported = 15 => "not-supported",
        NotMounted = 16 => "not-mounted",
        AlreadyMounted = 17 => "already-mounted",
        Closed = 18 => "closed",
        Cancelled = 19 => "cancelled",
        Pending = 20 => "pending",
        ReadOnly = 21 => "read-only",
        CantCreateBackup = 22 => "cant-create-backup",
        WrongEtag = 23 => "wrong-etag",
        TimedOut = 24 => "timed-out",
        WouldRecurse = 25 => "would-recurse",
        Busy = 26 => "busy",
        WouldBlock = 27 => "would-block",
        HostNotFound = 28 => "host-not-found",
        WouldMerge = 29 => "would-merge",
        FailedHandled = 30 => "failed-handled",
        TooManyOpenFiles = 31 => "too-many-open-files",
        NotInitialized = 32 => "not-initialized",
        AddressInUse = 33 => "address-in-use",
        PartialInput = 34 => "partial-input",
        InvalidData = 35 => "invalid-data",
        HostUnreachable = 37 => "host-unreachable",
        NetworkUnreachable = 38 => "network-unreachable",
        ConnectionRefused = 39 => "connection-refused",
    }
}

failure_codes! {
    /// Errors raised by the editor's document layer.
    DocumentErrorCode {
        ExternallyModified = 0 => "externally-modified",
        CantCreateBackup = 1 => "cant-create-backup",
        TooBig = 2 => "too-big",
        EncodingAutoDetectionFailed = 3 => "encoding-auto-detection-failed",
        ConversionFallback = 4 => "conversion-fallback",
    }
}

failure_codes! {
    /// Character-set conversion errors.
    ConversionErrorCode {
        NoConversion = 0 => "no-conversion",
        IllegalSequence = 1 => "illegal-sequence",
        Failed = 2 => "failed",
        PartialInput = 3 => "partial-input",
        BadUri = 4 => "bad-uri",
        NotAbsolutePath = 5 => "not-absolute-path",
        NoMemory = 6 => "no-memory",
        EmbeddedNul = 7 => "embedded-nul",
    }
}

impl From<io::ErrorKind> for IoErrorCode {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => IoErrorCode::NotFound,
            io::ErrorKind::PermissionDenied => IoErrorCode::PermissionDenied,
            io::ErrorKind::AlreadyExists => IoErrorCode::Exists,
            io::ErrorKind::InvalidData => IoErrorCode::InvalidData,
            io::ErrorKind::InvalidInput => IoErrorCode::InvalidArgument,
            io::ErrorKind::TimedOut => IoErrorCode::TimedOut,
            io::ErrorKind::Unsupported => IoErrorCode::NotSupported,
            io::ErrorKind::WouldBlock => IoErrorCode::WouldBlock,
            io::ErrorKind::Interrupted => IoErrorCode::Cancelled,
            io::ErrorKind::UnexpectedEof => IoErrorCode::PartialInput,
            io::ErrorKind::WriteZero => IoErrorCode::NoSpace,
            io::ErrorKind::StorageFull => IoErrorCode::NoSpace,
            io::ErrorKind::FileTooLarge => IoErrorCode::NoSpace,
            io::ErrorKind::ReadOnlyFilesystem => IoErrorCode::ReadOnly,
            io::ErrorKind::IsADirectory => IoErrorCode::IsDirectory,
            io::ErrorKind::NotADirectory => IoErrorCode::NotDirectory,
            io::ErrorKind::DirectoryNotEmpty => IoErrorCode::NotEmpty,
            io::ErrorKind::ResourceBusy => IoErrorCode::Busy,
            io::ErrorKind::HostUnreachable => IoErrorCode::HostUnreachable,
            io::ErrorKind::NetworkUnreachable => IoErrorCode::NetworkUnreachable,
            io::ErrorKind::AddrInUse => IoErrorCode::AddressInUse,
            io::ErrorKind::ConnectionRefused => IoErrorCode::ConnectionRefused,
            _ => IoErrorCode::Failed,
        }
    }
}

/// A failure code together with its domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCode {
    Io(IoErrorCode),
    Document(DocumentErrorCode),
    Conversion(ConversionErrorCode),
}

impl FailureCode {
    pub fn domain(self) -> FailureDomain {
        match self {
            FailureCode::Io(_) => FailureDomain::Io,
            FailureCode::Document(_) => FailureDomain::Document,
            FailureCode::Conversion(_) => FailureDomain::Conversion,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            FailureCode::Io(code) => code.raw(),
            FailureCode::Document(code) => code.raw(),
            FailureCode::Conversion(code) => code.raw(),
        }
    }

    pub fn from_raw(domain: FailureDomain, raw: i32) -> Option<Self> {
        match domain {
            FailureDomain::Io => IoErrorCode::from_raw(raw).map(FailureCode::Io),
            FailureDomain::Document => DocumentErrorCode::from_raw(raw).map(FailureCode::Document),
            FailureDomain::Conversion => {
                ConversionErrorCode::from_raw(raw).map(FailureCode::Conversion)
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FailureCode::Io(code) => code.name(),
            FailureCode::Document(code) => code.name(),
            FailureCode::Conversion(code) => code.name(),
        }
    }

    /// Iterates every known code across all domains.
    pub fn all() -> impl Iterator<Item = FailureCode> {
        IoErrorCode::ALL
            .iter()
            .copied()
            .map(FailureCode::Io)
            .chain(DocumentErrorCode::ALL.iter().copied().map(FailureCode::Document))
            .chain(
                ConversionErrorCode::ALL
                    .iter()
                    .copied()
                    .map(FailureCode::Conversion),
            )
    }
}

impl From<IoErrorCode> for FailureCode {
    fn from(code: IoErrorCode) -> Self {
        FailureCode::Io(code)
    }
}

impl From<DocumentErrorCode> for FailureCode {
    fn from(code: DocumentErrorCode) -> Self {
        FailureCode::Document(code)
    }
}

impl From<ConversionErrorCode> for FailureCode {
    fn from(code: ConversionErrorCode) -> Self {
        FailureCode::Conversion(code)
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.domain(), self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailureCodeError {
    #[error("expected <domain>:<code>, got '{0}'")]
    MissingSeparator(String),
    #[error("unknown error domain '{0}'")]
    UnknownDomain(String),
    #[error("unknown {domain} error code '{code}'")]
    UnknownCode { domain: FailureDomain, code: String },
}

impl FromStr for FailureCode {
    type Err = ParseFailureCodeError;

    /// Parses `domain:code`, where `code` is either the kebab-case name or the numeric value.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (domain, code) = input
            .split_once(':')
            .ok_or_else(|| ParseFailureCodeError::MissingSeparator(input.to_string()))?;
        let domain = match domain.trim().to_ascii_lowercase().as_str() {
            "io" => FailureDomain::Io,
            "document" | "doc" => FailureDomain::Document,
            "conversion" | "convert" => FailureDomain::Conversion,
            other => return Err(ParseFailureCodeError::UnknownDomain(other.to_string())),
        };
        let code = code.trim().to_ascii_lowercase().replace('_', "-");
        let parsed = match code.parse::<i32>() {
            Ok(raw) => FailureCode::from_raw(domain, raw),
            Err(_) => match domain {
                FailureDomain::Io => IoErrorCode::from_name(&code).map(FailureCode::Io),
                FailureDomain::Document => {
                    DocumentErrorCode::from_name(&code).map(FailureCode::Document)
                }
                FailureDomain::Conversion => {
                    ConversionErrorCode::from_name(&code).map(FailureCode::Conversion)
                }
            },
        };
        parsed.ok_or(ParseFailureCodeError::UnknownCode { domain, code })
    }
}

/// File operation that was being attempted when the failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Load,
    Revert,
    Save,
}

impl FileOperation {
    pub const ALL: [FileOperation; 3] = [
        FileOperation::Load,
        FileOperation::Revert,
        FileOperation::Save,
    ];
}

/// Everything the classifier knows about one failed file operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureContext {
    pub operation: FileOperation,
    pub code: FailureCode,
    /// Raw text of the underlying error.
    pub message: String,
    pub location: Option<Location>,
    pub encoding: Option<String>,
    pub document_modified: bool,
    pub create_backup_copy: bool,
}

impl FailureContext {
    pub fn new(
        operation: FileOperation,
        code: impl Into<FailureCode>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            code: code.into(),
            message: message.into(),
            location: None,
            encoding: None,
            document_modified: false,
            create_backup_copy: false,
        }
    }

    pub fn from_io_error(operation: FileOperation, error: &io::Error) -> Self {
        Self::new(operation, IoErrorCode::from(error.kind()), error.to_string())
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn document_modified(mut self, modified: bool) -> Self {
        self.document_modified = modified;
        self
    }

    pub fn create_backup_copy(mut self, enabled: bool) -> Self {
        self.create_backup_copy = enabled;
        self
    }

    pub fn domain(&self) -> FailureDomain {
        self.code.domain()
    }

    pub(crate) fn is_io(&self, code: IoErrorCode) -> bool {
        self.code == FailureCode::Io(code)
    }

    pub(crate) fn is_document(&self, code: DocumentErrorCode) -> bool {
        self.code == FailureCode::Document(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_roundtrip_for_every_code() {
        for code in FailureCode::all() {
            assert_eq!(FailureCode::from_raw(code.domain(), code.raw()), Some(code));
        }
        assert_eq!(IoErrorCode::from_raw(36), None);
    }

    #[test]
    fn parses_names_and_numbers() {
        assert_eq!(
            "io:not-found".parse::<FailureCode>(),
            Ok(FailureCode::Io(IoErrorCode::NotFound))
        );
        assert_eq!(
            "document:ENCODING_AUTO_DETECTION_FAILED".parse::<FailureCode>(),
            Ok(FailureCode::Document(
                DocumentErrorCode::EncodingAutoDetectionFailed
            ))
        );
        assert_eq!(
            "io:14".parse::<FailureCode>(),
            Ok(FailureCode::Io(IoErrorCode::PermissionDenied))
        );
        assert!(matches!(
            "gio:1".parse::<FailureCode>(),
            Err(ParseFailureCodeError::UnknownDomain(_))
        ));
        assert!(matches!(
            "io".parse::<FailureCode>(),
            Err(ParseFailureCodeError::MissingSeparator(_))
        ));
    }

    #[test]
    fn io_error_kinds_map_to_codes() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let context = FailureContext::from_io_error(FileOperation::Save, &err);
        assert_eq!(context.code, FailureCode::Io(IoErrorCode::PermissionDenied));
        assert_eq!(context.domain(), FailureDomain::Io);
        assert_eq!(context.message, "denied");
        assert_eq!(
            IoErrorCode::from(io::ErrorKind::Other),
            IoErrorCode::Failed
        );

        let cases = [
            (io::ErrorKind::StorageFull, IoErrorCode::NoSpace),
            (io::ErrorKind::FileTooLarge, IoErrorCode::NoSpace),
            (io::ErrorKind::ReadOnlyFilesystem, IoErrorCode::ReadOnly),
            (io::ErrorKind::IsADirectory, IoErrorCode::IsDirectory),
            (io::ErrorKind::NotADirectory, IoErrorCode::NotDirectory),
            (io::ErrorKind::HostUnreachable, IoErrorCode::HostUnreachable),
            (io::ErrorKind::NetworkUnreachable, IoErrorCode::NetworkUnreachable),
        ];
        for (kind, code) in cases {
            assert_eq!(IoErrorCode::from(kind), code, "{kind:?}");
        }
    }
}
