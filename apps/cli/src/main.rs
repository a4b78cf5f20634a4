use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use encoding_rs::Encoding;
use rustnotepad_core::{
    classify, load_text, Action, Decision, FailureCode, FailureContext, FileError, FileOperation,
    LoadOptions, LoadedText, Location, Severity,
};
use rustnotepad_printing::{
    DocumentInfo, PageSetup, PagedTextEngine, PrintAction, PrintJob, PrintJobEvent,
    PrintJobResult,
};
use rustnotepad_settings::{Preferences, PreferencesStore};
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rustnotepad-cli",
    about = "Utility commands for RustNotePad editors",
    author,
    version
)]
struct Cli {
    /// 指定工作區根目錄；預設為目前目錄。 / Workspace root (defaults to current directory).
    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 說明檔案錯誤會顯示的訊息與按鈕。 / Show the banner a file failure would produce.
    Explain(ExplainArgs),
    /// 載入文字檔，失敗時顯示錯誤說明。 / Load a text file, explaining any failure.
    Open(OpenArgs),
    /// 列印、預覽或匯出文字檔。 / Print, preview or export a text file.
    Print(PrintArgs),
    /// 檢視或修改偏好設定。 / Show or change preferences.
    #[command(subcommand)]
    Preferences(PreferencesCommand),
}

#[derive(Args)]
struct ExplainArgs {
    /// 錯誤代碼，例如 `io:not-found` 或 `document:2`。 / Failure code such as `io:not-found` or `document:2`.
    #[arg(value_name = "DOMAIN:CODE")]
    code: FailureCode,

    /// 發生錯誤時的檔案操作。 / File operation that failed.
    #[arg(long, value_enum, default_value_t = OperationChoice::Load)]
    operation: OperationChoice,

    /// 檔案位置（路徑或 URI）。 / File location (path or URI).
    #[arg(long, value_name = "URI")]
    location: Option<String>,

    /// 使用中的字元編碼名稱。 / Name of the character encoding in use.
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<String>,

    /// 底層錯誤訊息；預設為代碼名稱。 / Underlying error text; defaults to the code name.
    #[arg(long, value_name = "TEXT")]
    message: Option<String>,

    /// 文件有未儲存的修改。 / The document has unsaved changes.
    #[arg(long)]
    modified: bool,

    /// 是否建立備份；預設沿用偏好設定。 / Whether backups are enabled; defaults to the preference.
    #[arg(long, value_name = "true|false")]
    backup: Option<bool>,

    /// 以 JSON 輸出。 / Emit JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OperationChoice {
    Load,
    Revert,
    Save,
}

impl From<OperationChoice> for FileOperation {
    fn from(choice: OperationChoice) -> Self {
        match choice {
            OperationChoice::Load => FileOperation::Load,
            OperationChoice::Revert => FileOperation::Revert,
            OperationChoice::Save => FileOperation::Save,
        }
    }
}

#[derive(Args)]
struct OpenArgs {
    /// 要開啟的檔案。 / File to open.
    path: PathBuf,

    /// 指定編碼；若略過則採自動偵測。 / Encoding to use; detection is used when omitted.
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<String>,

    /// 可接受的最大檔案大小（位元組）。 / Largest accepted file size in bytes.
    #[arg(long, value_name = "BYTES")]
    max_size: Option<u64>,

    /// 即使含有無效字元仍輸出內容。 / Print the content even when invalid characters were replaced.
    #[arg(long)]
    edit_anyway: bool,

    /// 以 JSON 輸出。 / Emit JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PrintArgs {
    /// 要列印的檔案。 / File to print.
    path: PathBuf,

    /// 將頁面寫入檔案而非標準輸出。 / Write pages to a file instead of standard output.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// 只分頁並顯示預覽。 / Paginate and show a preview only.
    #[arg(long, conflicts_with = "output")]
    preview: bool,

    /// 每行字元數。 / Characters per line.
    #[arg(long, default_value_t = 80)]
    columns: usize,

    /// 每頁行數。 / Lines per page.
    #[arg(long, default_value_t = 66)]
    lines: usize,

    /// 指定編碼；若略過則採自動偵測。 / Encoding to use; detection is used when omitted.
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<String>,
}

#[derive(Subcommand)]
enum PreferencesCommand {
    /// 顯示目前偏好設定。 / Print current preferences as JSON.
    Show,
    /// 修改偏好設定。 / Change preferences.
    Set(PreferencesSetArgs),
}

#[derive(Args)]
struct PreferencesSetArgs {
    /// 儲存時保留舊檔備份。 / Keep a backup copy when saving.
    #[arg(long, value_name = "true|false")]
    backup: Option<bool>,

    /// Tab 寬度。 / Tab width.
    #[arg(long, value_name = "N")]
    tab_width: Option<u32>,

    /// 列印時套用語法上色。 / Use syntax highlighting when printing.
    #[arg(long, value_name = "true|false")]
    syntax: Option<bool>,

    /// 列印頁首。 / Print the page header.
    #[arg(long, value_name = "true|false")]
    header: Option<bool>,

    /// 每 N 行印一次行號。 / Print a line number every N lines.
    #[arg(long, value_name = "N", conflicts_with = "no_line_numbers")]
    line_numbers: Option<u32>,

    /// 不列印行號。 / Do not print line numbers.
    #[arg(long)]
    no_line_numbers: bool,

    /// 列印時自動斷行。 / Wrap long lines when printing.
    #[arg(long, value_name = "true|false")]
    wrap: Option<bool>,

    /// 斷行時允許拆開字詞。 / Allow breaking inside words when wrapping.
    #[arg(long, value_name = "true|false")]
    split_words: Option<bool>,

    /// 內文字型。 / Body font.
    #[arg(long, value_name = "FONT")]
    body_font: Option<String>,

    /// 頁首字型。 / Header font.
    #[arg(long, value_name = "FONT")]
    header_font: Option<String>,

    /// 行號字型。 / Line-number font.
    #[arg(long, value_name = "FONT")]
    numbers_font: Option<String>,

    /// 還原列印字型為預設值。 / Restore the print fonts to their defaults.
    #[arg(long)]
    reset_fonts: bool,
}

impl PreferencesSetArgs {
    fn is_empty(&self) -> bool {
        self.backup.is_none()
            && self.tab_width.is_none()
            && self.syntax.is_none()
            && self.header.is_none()
            && self.line_numbers.is_none()
            && !self.no_line_numbers
            && self.wrap.is_none()
            && self.split_words.is_none()
            && self.body_font.is_none()
            && self.header_font.is_none()
            && self.numbers_font.is_none()
            && !self.reset_fonts
    }

    fn apply(&self, preferences: &mut Preferences) {
        if let Some(backup) = self.backup {
            preferences.editor.create_backup_copy = backup;
        }
        if let Some(width) = self.tab_width {
            preferences.editor.tab_width = width;
        }

        let print = &mut preferences.print;
        if let Some(syntax) = self.syntax {
            print.syntax_highlighting = syntax;
        }
        if let Some(header) = self.header {
            print.print_header = header;
        }
        if self.no_line_numbers {
            print.set_line_numbers(false, 0);
        } else if let Some(interval) = self.line_numbers {
            print.set_line_numbers(interval > 0, interval);
        }
        if self.wrap.is_some() || self.split_words.is_some() {
            let (wrap, dont_split_words) = print.wrap_mode.to_toggles();
            print.set_wrap_toggles(
                self.wrap.unwrap_or(wrap),
                self.split_words.map_or(dont_split_words, |split| !split),
            );
        }
        if self.reset_fonts {
            print.reset_print_fonts();
        }
        if let Some(font) = &self.body_font {
            print.font_body = font.clone();
        }
        if let Some(font) = &self.header_font {
            print.font_header = font.clone();
        }
        if let Some(font) = &self.numbers_font {
            print.font_numbers = font.clone();
        }
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // 日誌寫到 stderr，stdout 保留給指令輸出。 / Logs go to stderr; stdout carries command output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<()> {
    let Cli { workspace, command } = Cli::parse();
    match command {
        Commands::Explain(args) => {
            let workspace_root = resolve_workspace(workspace)?;
            execute_explain(args, &workspace_root)
        }
        Commands::Open(args) => execute_open(args),
        Commands::Print(args) => {
            let workspace_root = resolve_workspace(workspace)?;
            execute_print(args, &workspace_root)
        }
        Commands::Preferences(subcommand) => {
            let workspace_root = resolve_workspace(workspace)?;
            execute_preferences_command(subcommand, &workspace_root)
        }
    }
}

fn execute_explain(args: ExplainArgs, workspace_root: &Path) -> Result<()> {
    let create_backup_copy = match args.backup {
        Some(enabled) => enabled,
        None => load_preferences(workspace_root)?.editor.create_backup_copy,
    };
    let message = args
        .message
        .clone()
        .unwrap_or_else(|| args.code.name().to_string());

    let mut context = FailureContext::new(args.operation.into(), args.code, message)
        .document_modified(args.modified)
        .create_backup_copy(create_backup_copy);
    if let Some(location) = &args.location {
        context = context.with_location(Location::parse(location));
    }
    if let Some(encoding) = &args.encoding {
        context = context.with_encoding(encoding.clone());
    }

    let decision = classify(&context);
    report_decision(&context, &decision, args.json)
}

fn execute_open(args: OpenArgs) -> Result<()> {
    let path = resolve_input_path(&args.path)?;
    let options = LoadOptions {
        encoding: args.encoding.as_deref().map(parse_encoding).transpose()?,
        max_size: args.max_size,
    };

    match load_text(&path, &options) {
        Ok(loaded) => write_loaded(&path, &loaded, args.json),
        Err(FileError::ConversionFallback { encoding, lossy }) if args.edit_anyway => {
            warn!(path = %path.display(), encoding, "invalid characters were replaced");
            write_loaded(&path, &lossy, args.json)
        }
        Err(err) => {
            let context = err.to_failure(FileOperation::Load, Some(Location::from_path(&path)));
            report_decision(&context, &classify(&context), args.json)?;
            bail!("failed to open {}: {err}", path.display());
        }
    }
}

fn write_loaded(path: &Path, loaded: &LoadedText, as_json: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if as_json {
        let report = json!({
            "path": path.display().to_string(),
            "encoding": loaded.encoding.name(),
            "has_bom": loaded.has_bom,
            "size": loaded.stamp.len(),
            "text": loaded.text,
        });
        writeln!(stdout, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        stdout.write_all(loaded.text.as_bytes())?;
    }
    stdout.flush()?;
    Ok(())
}

fn execute_print(args: PrintArgs, workspace_root: &Path) -> Result<()> {
    let preferences = load_preferences(workspace_root)?;
    let path = resolve_input_path(&args.path)?;
    let options = LoadOptions {
        encoding: args.encoding.as_deref().map(parse_encoding).transpose()?,
        max_size: None,
    };
    let loaded = match load_text(&path, &options) {
        Ok(loaded) => loaded,
        Err(err) => {
            let context = err.to_failure(FileOperation::Load, Some(Location::from_path(&path)));
            report_decision(&context, &classify(&context), false)?;
            bail!("failed to open {}: {err}", path.display());
        }
    };

    let location = Location::from_path(&path);
    let document = DocumentInfo::new(location.short_name(), loaded.text).with_location(location);
    let setup = PageSetup {
        columns: args.columns,
        lines_per_page: args.lines,
    };

    let (action, mut engine) = if args.preview {
        (PrintAction::Preview, PagedTextEngine::new(setup))
    } else if let Some(output) = &args.output {
        let output = resolve_input_path(output)?;
        let file = File::create(&output)
            .with_context(|| format!("failed to create {}", output.display()))?;
        (
            PrintAction::Export,
            PagedTextEngine::with_sink(setup, Box::new(BufWriter::new(file))),
        )
    } else {
        (
            PrintAction::Print,
            PagedTextEngine::with_sink(setup, Box::new(io::stdout())),
        )
    };

    let mut job = PrintJob::new(document, &preferences);
    job.print(action, &mut engine)
        .with_context(|| format!("failed to print {}", path.display()))?;

    let mut outcome = None;
    for event in job.take_events() {
        match event {
            PrintJobEvent::Printing(status) => debug!(job = %job.id(), %status, "print status"),
            PrintJobEvent::ShowPreview { n_pages } => {
                info!(job = %job.id(), n_pages, "preview ready")
            }
            PrintJobEvent::Done { result, error } => outcome = Some((result, error)),
        }
    }

    match outcome {
        Some((PrintJobResult::Ok, _)) => {}
        Some((PrintJobResult::Cancel, _)) => bail!("printing {} was cancelled", path.display()),
        Some((PrintJobResult::Error, Some(err))) => {
            return Err(anyhow::Error::new(err)
                .context(format!("failed to print {}", path.display())));
        }
        Some((PrintJobResult::Error, None)) | None => {
            bail!("printing {} did not finish", path.display())
        }
    }

    let pages = engine.pages();
    if args.preview {
        let mut stdout = io::stdout().lock();
        for (index, page) in pages.iter().enumerate() {
            writeln!(stdout, "--- Page {} of {} ---", index + 1, pages.len())?;
            writeln!(stdout, "{}", page.to_text())?;
        }
    } else if let Some(output) = &args.output {
        println!("Printed {} page(s) to {}", pages.len(), output.display());
    }
    Ok(())
}

fn execute_preferences_command(command: PreferencesCommand, workspace_root: &Path) -> Result<()> {
    match command {
        PreferencesCommand::Show => show_preferences(workspace_root),
        PreferencesCommand::Set(args) => set_preferences(args, workspace_root),
    }
}

fn show_preferences(workspace_root: &Path) -> Result<()> {
    let preferences = load_preferences(workspace_root)?;
    println!("{}", serde_json::to_string_pretty(&preferences)?);
    Ok(())
}

fn set_preferences(args: PreferencesSetArgs, workspace_root: &Path) -> Result<()> {
    if args.is_empty() {
        bail!("no preference changes were given");
    }
    let prefs_path = PreferencesStore::workspace_path(workspace_root);
    let mut store = PreferencesStore::load(&prefs_path)
        .with_context(|| format!("failed to load preferences from {}", prefs_path.display()))?;
    store
        .update(|preferences| args.apply(preferences))
        .with_context(|| format!("failed to save preferences to {}", prefs_path.display()))?;
    println!("Updated preferences at {}", prefs_path.display());
    Ok(())
}

fn load_preferences(workspace_root: &Path) -> Result<Preferences> {
    let prefs_path = PreferencesStore::workspace_path(workspace_root);
    let store = PreferencesStore::load(&prefs_path)
        .with_context(|| format!("failed to load preferences from {}", prefs_path.display()))?;
    Ok(store.preferences().clone())
}

fn report_decision(context: &FailureContext, decision: &Decision, as_json: bool) -> Result<()> {
    if as_json {
        let report = json!({
            "operation": context.operation,
            "code": context.code.to_string(),
            "decision": decision,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let severity = match decision.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    println!("{severity}: {}", unescape_markup(&decision.primary_message));
    if let Some(secondary) = &decision.secondary_message {
        println!("{}", unescape_markup(secondary));
    }
    let actions = decision
        .actions
        .iter()
        .map(|action| plain_label(*action))
        .collect::<Vec<_>>();
    println!("Actions: {}", actions.join(", "));
    if decision.requires_encoding_choice {
        println!("Choose a character encoding to retry.");
    }
    Ok(())
}

/// 終端機輸出不需要標記跳脫。 / Terminal output shows the text without markup escapes.
fn unescape_markup(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn plain_label(action: Action) -> String {
    action.label().replace('_', "")
}

fn parse_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| anyhow!("unknown character encoding '{label}'"))
}

fn resolve_workspace(workspace: Option<PathBuf>) -> Result<PathBuf> {
    match workspace {
        Some(path) => resolve_input_path(&path),
        None => std::env::current_dir().context("determine current directory"),
    }
}

fn resolve_input_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("determine current directory")?
            .join(path))
    }
}
