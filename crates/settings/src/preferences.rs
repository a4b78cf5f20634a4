use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const PREFERENCES_VERSION: u32 = 1;

pub const DEFAULT_BODY_FONT: &str = "Monospace 9";
pub const DEFAULT_HEADER_FONT: &str = "Sans 11";
pub const DEFAULT_NUMBERS_FONT: &str = "Sans 8";

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("failed to read preferences {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse preferences {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize preferences {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write preferences {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub editor: EditorPreferences,
    #[serde(default)]
    pub print: PrintPreferences,
}

fn default_version() -> u32 {
    PREFERENCES_VERSION
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            editor: EditorPreferences::default(),
            print: PrintPreferences::default(),
        }
    }
}

impl Preferences {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = PREFERENCES_VERSION;
        }
        self.editor.sanitize();
        self.print.sanitize();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorPreferences {
    /// 儲存前保留舊檔備份。 / Keep a backup of the previous file when saving.
    #[serde(default)]
    pub create_backup_copy: bool,
    #[serde(default = "default_tab_width")]
    pub tab_width: u32,
}

fn default_tab_width() -> u32 {
    8
}

impl Default for EditorPreferences {
    fn default() -> Self {
        Self {
            create_backup_copy: false,
            tab_width: default_tab_width(),
        }
    }
}

impl EditorPreferences {
    fn sanitize(&mut self) {
        if self.tab_width == 0 {
            self.tab_width = default_tab_width();
        }
        self.tab_width = self.tab_width.clamp(1, 32);
    }
}

/// 列印時的斷行方式。 / How long lines are wrapped on the printed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintWrapMode {
    /// 不斷行，超出頁寬的部分被裁掉。 / No wrapping; text past the page edge is clipped.
    None,
    /// 任意字元處斷行。 / Break at any character.
    Char,
    /// 只在字詞之間斷行。 / Break between words only.
    #[default]
    Word,
}

impl PrintWrapMode {
    /// 由對話框的兩個核取方塊組出斷行方式。 / Builds the mode from the dialog's "wrap" and "don't split words" toggles.
    pub fn from_toggles(wrap: bool, dont_split_words: bool) -> Self {
        match (wrap, dont_split_words) {
            (false, _) => PrintWrapMode::None,
            (true, true) => PrintWrapMode::Word,
            (true, false) => PrintWrapMode::Char,
        }
    }

    /// 回傳 `(wrap, dont_split_words)`。 / Returns `(wrap, dont_split_words)`.
    pub fn to_toggles(self) -> (bool, bool) {
        match self {
            PrintWrapMode::None => (false, true),
            PrintWrapMode::Char => (true, false),
            PrintWrapMode::Word => (true, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintPreferences {
    #[serde(default = "default_true")]
    pub syntax_highlighting: bool,
    #[serde(default = "default_true")]
    pub print_header: bool,
    /// 每隔幾行印一次行號；0 代表不印。 / Print a line number every N lines; 0 disables them.
    #[serde(default)]
    pub line_numbers: u32,
    #[serde(default)]
    pub wrap_mode: PrintWrapMode,
    #[serde(default = "default_body_font")]
    pub font_body: String,
    #[serde(default = "default_header_font")]
    pub font_header: String,
    #[serde(default = "default_numbers_font")]
    pub font_numbers: String,
}

fn default_true() -> bool {
    true
}

fn default_body_font() -> String {
    DEFAULT_BODY_FONT.to_string()
}

fn default_header_font() -> String {
    DEFAULT_HEADER_FONT.to_string()
}

fn default_numbers_font() -> String {
    DEFAULT_NUMBERS_FONT.to_string()
}

impl Default for PrintPreferences {
    fn default() -> Self {
        Self {
            syntax_highlighting: true,
            print_header: true,
            line_numbers: 0,
            wrap_mode: PrintWrapMode::default(),
            font_body: default_body_font(),
            font_header: default_header_font(),
            font_numbers: default_numbers_font(),
        }
    }
}

impl PrintPreferences {
    fn sanitize(&mut self) {
        if self.font_body.trim().is_empty() {
            self.font_body = default_body_font();
        }
        if self.font_header.trim().is_empty() {
            self.font_header = default_header_font();
        }
        if self.font_numbers.trim().is_empty() {
            self.font_numbers = default_numbers_font();
        }
    }

    /// 行號間隔（若有啟用）。 / Line-number interval, when line numbers are enabled.
    pub fn line_number_interval(&self) -> Option<u32> {
        (self.line_numbers > 0).then_some(self.line_numbers)
    }

    /// 啟用時間隔至少為 1。 / When enabled the interval is at least 1.
    pub fn set_line_numbers(&mut self, enabled: bool, interval: u32) {
        self.line_numbers = if enabled { interval.max(1) } else { 0 };
    }

    pub fn set_wrap_toggles(&mut self, wrap: bool, dont_split_words: bool) {
        self.wrap_mode = PrintWrapMode::from_toggles(wrap, dont_split_words);
    }

    /// 將三種列印字型還原為預設值。 / Restores the three print fonts to their defaults.
    pub fn reset_print_fonts(&mut self) {
        self.font_body = default_body_font();
        self.font_header = default_header_font();
        self.font_numbers = default_numbers_font();
    }
}

#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    data: Preferences,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>, preferences: Preferences) -> Self {
        Self {
            path: path.into(),
            data: preferences,
        }
    }

    /// 工作區內偏好設定檔的位置。 / Location of the preferences file inside a workspace.
    pub fn workspace_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(".rustnotepad").join("preferences.json")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PreferencesError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!(path = %path.display(), "preferences file missing, using defaults");
            let mut data = Preferences::default();
            data.sanitize();
            return Ok(Self { path, data });
        }

        let contents = fs::read_to_string(&path).map_err(|source| PreferencesError::Read {
            path: path.clone(),
            source,
        })?;
        let mut data: Preferences =
            serde_json::from_str(&contents).map_err(|source| PreferencesError::Parse {
                path: path.clone(),
                source,
            })?;
        data.sanitize();
        Ok(Self { path, data })
    }

    pub fn preferences(&self) -> &Preferences {
        &self.data
    }

    pub fn update<F>(&mut self, mut op: F) -> Result<(), PreferencesError>
    where
        F: FnMut(&mut Preferences),
    {
        op(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    pub fn overwrite(&mut self, preferences: Preferences) -> Result<(), PreferencesError> {
        self.data = preferences;
        self.data.sanitize();
        self.save()
    }

    pub fn save(&self) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PreferencesError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload = serde_json::to_string_pretty(&self.data).map_err(|source| {
            PreferencesError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, payload.as_bytes()).map_err(|source| PreferencesError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| PreferencesError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "saved preferences");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
