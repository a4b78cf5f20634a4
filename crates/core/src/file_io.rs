use std::ffi::OsString;
use std::fs::{self, File, Metadata};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use thiserror::Error;
use tracing::debug;

use crate::failure::{
    ConversionErrorCode, DocumentErrorCode, FailureCode, FailureContext, FileOperation,
    IoErrorCode,
};
use crate::location::Location;

/// 反映磁碟上的檔案狀態，用以偵測外部修改。 / Snapshot of the on-disk state used to detect external modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    len: u64,
    modified_nanos: Option<u128>,
}

impl FileStamp {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let modified_nanos = metadata.modified().ok().and_then(system_time_to_nanos);
        Self {
            len: metadata.len(),
            modified_nanos,
        }
    }

    /// 讀取目前磁碟上的檔案狀態。 / Reads the current on-disk state of `path`.
    pub fn of(path: impl AsRef<Path>) -> io::Result<Self> {
        fs::metadata(path).map(|metadata| Self::from_metadata(&metadata))
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// 載入選項。 / Options controlling how a text file is read.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// 指定編碼；`None` 代表自動偵測。 / Explicit encoding; `None` means auto-detect.
    pub encoding: Option<&'static Encoding>,
    /// 檔案大小上限（位元組）。 / Largest accepted file size in bytes.
    pub max_size: Option<u64>,
}

/// 儲存選項。 / Options controlling how a text file is written.
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    pub encoding: &'static Encoding,
    pub include_bom: bool,
    /// 覆寫前保留舊檔為 `name~`。 / Keep the previous file as `name~` before overwriting it.
    pub create_backup: bool,
    /// 載入時的檔案狀態；若磁碟上已不同則拒絕儲存。 / State seen at load time; saving is refused when the disk differs.
    pub expected_stamp: Option<FileStamp>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            encoding: UTF_8,
            include_bom: false,
            create_backup: false,
            expected_stamp: None,
        }
    }
}

/// 已解碼的文字檔。 / A decoded text file.
#[derive(Debug, Clone)]
pub struct LoadedText {
    pub text: String,
    pub encoding: &'static Encoding,
    pub has_bom: bool,
    pub stamp: FileStamp,
}

/// 載入或儲存文字檔時可能發生的錯誤。 / Errors that can occur while loading or saving a text file.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("{} is a directory", .0.display())]
    IsDirectory(PathBuf),
    #[error("{} is not a regular file", .0.display())]
    NotRegularFile(PathBuf),
    #[error("file is {size} bytes, the limit is {limit}")]
    TooBig { size: u64, limit: u64 },
    #[error("data is not valid {encoding}")]
    InvalidData { encoding: &'static str },
    #[error("could not detect the character encoding")]
    EncodingAutoDetectionFailed,
    #[error("decoded as {encoding} with invalid characters replaced")]
    ConversionFallback {
        encoding: &'static str,
        /// 以替代字元解碼的內容，供使用者選擇仍要編輯時使用。 / Content decoded with replacement characters, for "edit anyway".
        lossy: Box<LoadedText>,
    },
    #[error("the file changed on disk since it was read")]
    ExternallyModified,
    #[error("could not create backup copy {}: {source}", .path.display())]
    CantCreateBackup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("text cannot be represented in target encoding {0}")]
    Unrepresentable(&'static str),
}

impl FileError {
    /// 對應的失敗代碼。 / The failure code this error maps to.
    pub fn failure_code(&self) -> FailureCode {
        match self {
            FileError::Io(err) => FailureCode::Io(IoErrorCode::from(err.kind())),
            FileError::IsDirectory(_) => FailureCode::Io(IoErrorCode::IsDirectory),
            FileError::NotRegularFile(_) => FailureCode::Io(IoErrorCode::NotRegularFile),
            FileError::TooBig { .. } => FailureCode::Document(DocumentErrorCode::TooBig),
            FileError::InvalidData { .. } => FailureCode::Io(IoErrorCode::InvalidData),
            FileError::EncodingAutoDetectionFailed => {
                FailureCode::Document(DocumentErrorCode::EncodingAutoDetectionFailed)
            }
            FileError::ConversionFallback { .. } => {
                FailureCode::Document(DocumentErrorCode::ConversionFallback)
            }
            FileError::ExternallyModified => {
                FailureCode::Document(DocumentErrorCode::ExternallyModified)
            }
            FileError::CantCreateBackup { .. } => {
                FailureCode::Document(DocumentErrorCode::CantCreateBackup)
            }
            FileError::Unrepresentable(_) => {
                FailureCode::Conversion(ConversionErrorCode::IllegalSequence)
            }
        }
    }

    /// 發生錯誤時使用的編碼名稱（若有）。 / Name of the encoding involved, if any.
    pub fn encoding(&self) -> Option<&'static str> {
        match self {
            FileError::InvalidData { encoding } | FileError::ConversionFallback { encoding, .. } => {
                Some(*encoding)
            }
            FileError::Unrepresentable(encoding) => Some(*encoding),
            _ => None,
        }
    }

    /// 轉為錯誤分類器的輸入。 / Builds the classifier input for this error.
    pub fn to_failure(&self, operation: FileOperation, location: Option<Location>) -> FailureContext {
        let mut context = FailureContext::new(operation, self.failure_code(), self.to_string());
        context.location = location;
        context.encoding = self.encoding().map(str::to_string);
        context
    }
}

/// 讀取並解碼文字檔。 / Reads and decodes a text file.
pub fn load_text(path: impl AsRef<Path>, options: &LoadOptions) -> Result<LoadedText, FileError> {
    let path = path.as_ref();
    let metadata = fs::metadata(path)?;
    if metadata.is_dir() {
        return Err(FileError::IsDirectory(path.to_path_buf()));
    }
    if !metadata.is_file() {
        return Err(FileError::NotRegularFile(path.to_path_buf()));
    }
    if let Some(limit) = options.max_size {
        if metadata.len() > limit {
            return Err(FileError::TooBig {
                size: metadata.len(),
                limit,
            });
        }
    }

    let bytes = fs::read(path)?;
    let stamp = FileStamp::from_metadata(&metadata);
    let decoded = match options.encoding {
        Some(encoding) => decode_with(&bytes, encoding)?,
        None => detect_and_decode(&bytes, stamp)?,
    };
    debug!(
        path = %path.display(),
        encoding = decoded.encoding.name(),
        bom = decoded.has_bom,
        "loaded text file"
    );
    Ok(LoadedText {
        text: decoded.text,
        encoding: decoded.encoding,
        has_bom: decoded.has_bom,
        stamp,
    })
}

/// 編碼並寫入文字檔，回傳新的檔案狀態。 / Encodes and writes a text file, returning the new on-disk stamp.
pub fn save_text(
    path: impl AsRef<Path>,
    text: &str,
    options: &SaveOptions,
) -> Result<FileStamp, FileError> {
    let path = path.as_ref();

    if let Some(expected) = options.expected_stamp {
        match FileStamp::of(path) {
            Ok(current) if current != expected => return Err(FileError::ExternallyModified),
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(FileError::Io(err)),
        }
    }

    let encoded = encode_text(text, options.encoding, options.include_bom)?;

    if options.create_backup && path.is_file() {
        let backup = backup_path(path);
        fs::copy(path, &backup).map_err(|source| FileError::CantCreateBackup {
            path: backup.clone(),
            source,
        })?;
        debug!(backup = %backup.display(), "created backup copy");
    }

    // 先寫入暫存檔再重新命名，避免出現部分寫入的情況。 / Write a temporary file and rename it so readers never see a partial write.
    let tmp_path = temporary_path(path);
    if let Err(err) =
        write_temporary(&tmp_path, &encoded).and_then(|()| fs::rename(&tmp_path, path))
    {
        let _ = fs::remove_file(&tmp_path);
        return Err(FileError::Io(err));
    }

    debug!(
        path = %path.display(),
        encoding = options.encoding.name(),
        bytes = encoded.len(),
        "saved text file"
    );
    Ok(FileStamp::of(path)?)
}

fn write_temporary(tmp_path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp_file = File::create(tmp_path)?;
    tmp_file.write_all(bytes)?;
    tmp_file.sync_all()
}

/// 備份檔路徑：原檔名後加上 `~`。 / Backup path: the file name with `~` appended.
pub fn backup_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, "~")
}

fn temporary_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, ".rustnotepad-tmp")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

struct Decoded {
    text: String,
    encoding: &'static Encoding,
    has_bom: bool,
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> Result<Decoded, FileError> {
    let (payload, has_bom) = match Encoding::for_bom(bytes) {
        Some((bom_encoding, bom_len)) if bom_encoding == encoding => (&bytes[bom_len..], true),
        _ => (bytes, false),
    };
    let (text, had_errors) = encoding.decode_without_bom_handling(payload);
    if had_errors {
        return Err(FileError::InvalidData {
            encoding: encoding.name(),
        });
    }
    Ok(Decoded {
        text: text.into_owned(),
        encoding,
        has_bom,
    })
}

fn detect_and_decode(bytes: &[u8], stamp: FileStamp) -> Result<Decoded, FileError> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding).map_err(detection_failed);
    }

    if looks_like_utf16(bytes, false) {
        return decode_with(bytes, UTF_16LE).map_err(detection_failed);
    }
    if looks_like_utf16(bytes, true) {
        return decode_with(bytes, UTF_16BE).map_err(detection_failed);
    }

    if bytes.contains(&0) {
        return Err(FileError::EncodingAutoDetectionFailed);
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(Decoded {
            text: text.to_owned(),
            encoding: UTF_8,
            has_bom: false,
        });
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let guess = detector.guess(None, true);
    let (text, had_errors) = guess.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(FileError::ConversionFallback {
            encoding: guess.name(),
            lossy: Box::new(LoadedText {
                text: text.into_owned(),
                encoding: guess,
                has_bom: false,
                stamp,
            }),
        });
    }
    Ok(Decoded {
        text: text.into_owned(),
        encoding: guess,
        has_bom: false,
    })
}

/// 偵測路徑上的解碼錯誤一律回報為偵測失敗。 / Decode errors on the detection path surface as a detection failure.
fn detection_failed(err: FileError) -> FileError {
    match err {
        FileError::InvalidData { .. } => FileError::EncodingAutoDetectionFailed,
        other => other,
    }
}

fn encode_text(
    text: &str,
    encoding: &'static Encoding,
    include_bom: bool,
) -> Result<Vec<u8>, FileError> {
    if encoding == UTF_16LE || encoding == UTF_16BE {
        return Ok(encode_utf16(text, include_bom, encoding == UTF_16BE));
    }
    if encoding == UTF_8 {
        let mut bytes = Vec::with_capacity(text.len() + 3);
        if include_bom {
            bytes.extend_from_slice(b"\xEF\xBB\xBF");
        }
        bytes.extend_from_slice(text.as_bytes());
        return Ok(bytes);
    }

    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(FileError::Unrepresentable(encoding.name()));
    }
    Ok(bytes.into_owned())
}

fn encode_utf16(text: &str, include_bom: bool, big_endian: bool) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(text.len() * 2 + if include_bom { 2 } else { 0 });
    if include_bom {
        buffer.extend_from_slice(if big_endian { b"\xFE\xFF" } else { b"\xFF\xFE" });
    }
    for unit in text.encode_utf16() {
        let bytes = if big_endian {
            unit.to_be_bytes()
        } else {
            unit.to_le_bytes()
        };
        buffer.extend_from_slice(&bytes);
    }
    buffer
}

fn looks_like_utf16(bytes: &[u8], big_endian: bool) -> bool {
    if bytes.len() < 2 || bytes.len() % 2 != 0 {
        return false;
    }

    let sample_len = bytes.len().min(64);
    let mut zero_count = 0;
    let mut total = 0;
    for chunk in bytes[..sample_len].chunks_exact(2) {
        let (zero_byte, other_byte) = if big_endian {
            (chunk[0], chunk[1])
        } else {
            (chunk[1], chunk[0])
        };
        if zero_byte == 0 && other_byte != 0 {
            zero_count += 1;
        }
        total += 1;
    }

    total > 0 && zero_count * 2 >= total
}

fn system_time_to_nanos(time: SystemTime) -> Option<u128> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|duration| duration.as_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::decision::Action;
    use encoding_rs::{SHIFT_JIS, WINDOWS_1252};
    use std::thread;
    use std::time::Duration;

    fn write_bytes(path: &Path, bytes: &[u8]) {
        fs::write(path, bytes).expect("failed to seed test file");
    }

    #[test]
    fn load_detects_utf8_bom() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("bom.txt");
        write_bytes(&file_path, b"\xEF\xBB\xBFhello\n");

        let loaded = load_text(&file_path, &LoadOptions::default()).unwrap();
        assert_eq!(loaded.text, "hello\n");
        assert_eq!(loaded.encoding, UTF_8);
        assert!(loaded.has_bom);
    }

    #[test]
    fn load_detects_utf16_le_without_bom() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("utf16.txt");
        write_bytes(&file_path, b"h\x00i\x00!\x00");

        let loaded = load_text(&file_path, &LoadOptions::default()).unwrap();
        assert_eq!(loaded.text, "hi!");
        assert_eq!(loaded.encoding, UTF_16LE);
        assert!(!loaded.has_bom);
    }

    #[test]
    fn load_rejects_binary_data() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("blob.bin");
        write_bytes(&file_path, &[0x7F, b'E', b'L', b'F', 0x00, 0x00, 0x00, 0x01, 0x02]);

        let err = load_text(&file_path, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, FileError::EncodingAutoDetectionFailed));

        let decision = classify(&err.to_failure(
            FileOperation::Load,
            Some(Location::from_path(&file_path)),
        ));
        assert!(decision.requires_encoding_choice);
        assert!(decision.has_action(Action::Retry));
    }

    #[test]
    fn load_guesses_legacy_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("sjis.txt");
        let (encoded, _, _) = SHIFT_JIS.encode("日本語のテキストファイルです。");
        write_bytes(&file_path, encoded.as_ref());

        let loaded = load_text(&file_path, &LoadOptions::default()).unwrap();
        assert_eq!(loaded.encoding, SHIFT_JIS);
        assert_eq!(loaded.text, "日本語のテキストファイルです。");
    }

    #[test]
    fn explicit_encoding_reports_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("invalid-sjis.txt");
        write_bytes(&file_path, &[0x82, 0xFF]);

        let options = LoadOptions {
            encoding: Some(SHIFT_JIS),
            ..LoadOptions::default()
        };
        let err = load_text(&file_path, &options).unwrap_err();
        assert!(matches!(err, FileError::InvalidData { encoding: "Shift_JIS" }));

        let context = err.to_failure(FileOperation::Load, None);
        assert_eq!(context.code, FailureCode::Io(IoErrorCode::InvalidData));
        assert_eq!(context.encoding.as_deref(), Some("Shift_JIS"));
    }

    #[test]
    fn load_enforces_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("big.txt");
        write_bytes(&file_path, &[b'a'; 128]);

        let options = LoadOptions {
            max_size: Some(64),
            ..LoadOptions::default()
        };
        let err = load_text(&file_path, &options).unwrap_err();
        assert!(matches!(err, FileError::TooBig { size: 128, limit: 64 }));
        assert_eq!(
            err.failure_code(),
            FailureCode::Document(DocumentErrorCode::TooBig)
        );
    }

    #[test]
    fn load_maps_missing_and_directory_paths() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_text(dir.path().join("missing.txt"), &LoadOptions::default())
            .unwrap_err();
        assert_eq!(
            missing.failure_code(),
            FailureCode::Io(IoErrorCode::NotFound)
        );

        let directory = load_text(dir.path(), &LoadOptions::default()).unwrap_err();
        assert_eq!(
            directory.failure_code(),
            FailureCode::Io(IoErrorCode::IsDirectory)
        );
    }

    #[test]
    fn save_serialises_utf16_be_with_bom() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("utf16-be.txt");
        let options = SaveOptions {
            encoding: UTF_16BE,
            include_bom: true,
            ..SaveOptions::default()
        };
        save_text(&file_path, "AB", &options).unwrap();

        let bytes = fs::read(&file_path).unwrap();
        assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, b'A', 0x00, b'B']);
    }

    #[test]
    fn save_rejects_unrepresentable_characters() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("latin1.txt");
        let options = SaveOptions {
            encoding: WINDOWS_1252,
            ..SaveOptions::default()
        };
        let err = save_text(&file_path, "漢", &options).unwrap_err();
        assert!(matches!(err, FileError::Unrepresentable("windows-1252")));
        assert!(!file_path.exists());
    }

    #[test]
    fn save_keeps_backup_copy() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("notes.txt");
        write_bytes(&file_path, b"old");

        let options = SaveOptions {
            create_backup: true,
            ..SaveOptions::default()
        };
        save_text(&file_path, "new", &options).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new");
        assert_eq!(
            fs::read_to_string(dir.path().join("notes.txt~")).unwrap(),
            "old"
        );
        assert!(!dir.path().join("notes.txt.rustnotepad-tmp").exists());
    }

    #[test]
    fn save_refuses_externally_modified_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("shared.txt");
        write_bytes(&file_path, b"alpha");

        let loaded = load_text(&file_path, &LoadOptions::default()).unwrap();
        thread::sleep(Duration::from_millis(10));
        write_bytes(&file_path, b"alpha-beta");

        let options = SaveOptions {
            expected_stamp: Some(loaded.stamp),
            ..SaveOptions::default()
        };
        let err = save_text(&file_path, "mine", &options).unwrap_err();
        assert!(matches!(err, FileError::ExternallyModified));
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "alpha-beta");

        let decision = classify(&err.to_failure(
            FileOperation::Save,
            Some(Location::from_path(&file_path)),
        ));
        assert_eq!(decision.actions, vec![Action::SaveAnyway, Action::DontSave]);
    }

    #[test]
    fn save_returns_fresh_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("stamp.txt");
        let stamp = save_text(&file_path, "12345", &SaveOptions::default()).unwrap();
        assert_eq!(stamp.len(), 5);
        assert_eq!(FileStamp::of(&file_path).unwrap(), stamp);
    }

    #[test]
    fn detected_utf16_with_broken_surrogate_names_no_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("broken16.txt");
        write_bytes(&file_path, b"A\x00\x00\xD8B\x00C\x00");

        let err = load_text(&file_path, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, FileError::EncodingAutoDetectionFailed));
        assert_eq!(err.encoding(), None);

        let context = err.to_failure(FileOperation::Load, Some(Location::from_path(&file_path)));
        let decision = classify(&context);
        assert!(decision.requires_encoding_choice);
        assert!(decision.primary_message.starts_with("Could not open the file"));
        assert!(!decision.primary_message.contains("character encoding"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_temporary_write_is_cleaned_up() {
        let device = Path::new("/dev/full");
        if !device.exists() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("big.txt");
        let tmp_path = temporary_path(&file_path);
        std::os::unix::fs::symlink(device, &tmp_path).unwrap();

        let err = save_text(&file_path, "payload", &SaveOptions::default()).unwrap_err();
        assert_eq!(err.failure_code(), FailureCode::Io(IoErrorCode::NoSpace));
        assert!(fs::symlink_metadata(&tmp_path).is_err());
        assert!(!file_path.exists());

        let decision = classify(&err.to_failure(FileOperation::Save, None));
        assert!(decision
            .secondary_message
            .as_deref()
            .unwrap()
            .starts_with("There is not enough disk space to save the file."));
    }
}
