use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

/// 檔案所在位置：本機路徑或遠端 URI。 / Where a document lives: a local path or a remote URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote(Url),
}

impl Location {
    /// 以本機路徑建立位置。 / Builds a location from a local path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Location::Local(path.into())
    }

    /// 解析使用者輸入；`file:` URI 轉為本機路徑，其他帶有配置的字串視為遠端 URI。 / Parses user input; `file:` URIs become local paths, other strings carrying a scheme are remote URIs.
    pub fn parse(input: &str) -> Self {
        if let Ok(url) = Url::parse(input) {
            // Single-letter schemes are Windows drive letters, not URIs.
            if url.scheme().len() > 1 {
                if url.scheme() == "file" {
                    if let Ok(path) = url.to_file_path() {
                        return Location::Local(path);
                    }
                }
                return Location::Remote(url);
            }
        }
        Location::Local(PathBuf::from(input))
    }

    pub fn scheme(&self) -> &str {
        match self {
            Location::Local(_) => "file",
            Location::Remote(url) => url.scheme(),
        }
    }

    /// 遠端位置的主機名稱（已轉為合法 UTF-8）。 / Host name of a remote location, decoded to valid UTF-8.
    pub fn host(&self) -> Option<String> {
        match self {
            Location::Local(_) => None,
            Location::Remote(url) => url.host_str().map(percent_decode_lossy),
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Location::Local(path) => Some(path),
            Location::Remote(_) => None,
        }
    }

    /// 供顯示用的完整名稱：本機為路徑，遠端為解碼後的 URI。 / Full name for display: the path for local files, the decoded URI otherwise.
    pub fn parse_name(&self) -> String {
        match self {
            Location::Local(path) => path.display().to_string(),
            Location::Remote(url) => percent_decode_lossy(url.as_str()),
        }
    }

    /// 最後一個路徑片段，用於列印作業名稱等短標籤。 / Last path segment, used for short labels such as print job names.
    pub fn short_name(&self) -> String {
        match self {
            Location::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Location::Remote(url) => url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(percent_decode_lossy)
                .or_else(|| url.host_str().map(str::to_string))
                .unwrap_or_else(|| url.as_str().to_string()),
        }
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Location::Local(path)
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        Location::Local(path.to_path_buf())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parse_name())
    }
}

fn percent_decode_lossy(input: &str) -> String {
    let decoded = urlencoding::decode_binary(input.as_bytes());
    String::from_utf8_lossy(&decoded).into_owned()
}
