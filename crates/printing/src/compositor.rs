use rustnotepad_core::middle_truncate;
use rustnotepad_settings::{Preferences, PrintWrapMode};

use crate::job::DocumentInfo;
use crate::template::{escape_template_text, PageTemplate, TemplateError};

/// Source lines laid out per [`Compositor::paginate`] call.
pub const PAGINATION_CHUNK: usize = 200;

/// Longest document name (in characters) shown in the page header.
pub const HEADER_NAME_LENGTH: usize = 60;

/// Printable page measured in character cells.
/// 以字元格為單位的可列印頁面。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSetup {
    pub columns: usize,
    pub lines_per_page: usize,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            columns: 80,
            lines_per_page: 66,
        }
    }
}

/// One rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageSurface {
    lines: Vec<String>,
}

impl PageSurface {
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Header text for the left, center and right slots.
/// 頁首左、中、右三個位置的文字範本。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderFormat {
    /// Draw a rule under the header.
    pub separator: bool,
    pub left: Option<PageTemplate>,
    pub center: Option<PageTemplate>,
    pub right: Option<PageTemplate>,
}

impl HeaderFormat {
    pub fn parse(
        separator: bool,
        left: Option<&str>,
        center: Option<&str>,
        right: Option<&str>,
    ) -> Result<Self, TemplateError> {
        Ok(Self {
            separator,
            left: left.map(PageTemplate::parse).transpose()?,
            center: center.map(PageTemplate::parse).transpose()?,
            right: right.map(PageTemplate::parse).transpose()?,
        })
    }

    pub fn render(&self, page_number: usize, page_count: usize) -> RenderedHeader {
        let render = |slot: &Option<PageTemplate>| {
            slot.as_ref()
                .map(|template| template.render(page_number, page_count))
                .unwrap_or_default()
        };
        RenderedHeader {
            left: render(&self.left),
            center: render(&self.center),
            right: render(&self.right),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedHeader {
    pub left: String,
    pub center: String,
    pub right: String,
}

/// Everything the compositor needs to lay out a document.
/// 排版所需的全部設定，於列印開始前由偏好設定建立。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositorConfig {
    pub tab_width: usize,
    pub highlight_syntax: bool,
    pub wrap_mode: PrintWrapMode,
    /// Line-number interval; 0 disables line numbers.
    pub line_numbers: u32,
    pub print_header: bool,
    pub print_footer: bool,
    pub body_font: String,
    pub header_font: String,
    pub numbers_font: String,
    pub header: Option<HeaderFormat>,
}

impl CompositorConfig {
    /// Reads the print preferences. Syntax highlighting needs both the document
    /// flag and the preference. Footers are never printed.
    pub fn from_preferences(
        preferences: &Preferences,
        document: &DocumentInfo,
    ) -> Result<Self, TemplateError> {
        let print = &preferences.print;
        let header = if print.print_header {
            let display_name = document.display_name();
            let name = middle_truncate(&display_name, HEADER_NAME_LENGTH);
            let left = format!("File: {}", escape_template_text(&name));
            Some(HeaderFormat::parse(
                true,
                Some(&left),
                None,
                Some("Page %N of %Q"),
            )?)
        } else {
            None
        };

        Ok(Self {
            tab_width: preferences.editor.tab_width.max(1) as usize,
            highlight_syntax: document.highlight_syntax && print.syntax_highlighting,
            wrap_mode: print.wrap_mode,
            line_numbers: print.line_numbers,
            print_header: print.print_header,
            print_footer: false,
            body_font: print.font_body.clone(),
            header_font: print.font_header.clone(),
            numbers_font: print.font_numbers.clone(),
            header,
        })
    }
}

#[derive(Debug, Clone)]
struct Row {
    /// 1-based source line number, set on the first row of each line.
    line_number: Option<usize>,
    text: String,
}

/// Paginates and draws plain text. Pagination runs in bounded steps so a
/// caller can report progress and honour cancellation between them.
/// 以分段方式分頁並繪製純文字，讓呼叫端能在步驟之間回報進度與取消。
#[derive(Debug)]
pub struct Compositor {
    config: CompositorConfig,
    source: Vec<String>,
    next_line: usize,
    rows: Vec<Row>,
    setup: Option<PageSetup>,
    n_pages: usize,
}

impl Compositor {
    pub fn new(config: CompositorConfig, text: &str) -> Self {
        let source = text
            .lines()
            .map(|line| expand_tabs(line, config.tab_width))
            .collect();
        Self {
            config,
            source,
            next_line: 0,
            rows: Vec::new(),
            setup: None,
            n_pages: 0,
        }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Lays out the next chunk of lines; returns `true` once every line is placed.
    /// A different page setup restarts pagination.
    pub fn paginate(&mut self, setup: &PageSetup) -> bool {
        if self.setup != Some(*setup) {
            self.setup = Some(*setup);
            self.next_line = 0;
            self.rows.clear();
            self.n_pages = 0;
        }
        if self.is_paginated() {
            return true;
        }

        let width = self.text_columns(setup);
        let end = (self.next_line + PAGINATION_CHUNK).min(self.source.len());
        for index in self.next_line..end {
            let wrapped = wrap_line(&self.source[index], width, self.config.wrap_mode);
            for (row_index, text) in wrapped.into_iter().enumerate() {
                self.rows.push(Row {
                    line_number: (row_index == 0).then_some(index + 1),
                    text,
                });
            }
        }
        self.next_line = end;

        if self.next_line < self.source.len() {
            return false;
        }
        let per_page = self.body_rows(setup);
        self.n_pages = ((self.rows.len() + per_page - 1) / per_page).max(1);
        true
    }

    pub fn is_paginated(&self) -> bool {
        self.n_pages > 0
    }

    pub fn pagination_progress(&self) -> f64 {
        if self.is_paginated() {
            return 1.0;
        }
        if self.source.is_empty() {
            return 0.0;
        }
        self.next_line as f64 / self.source.len() as f64
    }

    /// Page count; zero until pagination has finished.
    pub fn n_pages(&self) -> usize {
        self.n_pages
    }

    pub fn draw_page(&self, page_nr: usize, surface: &mut PageSurface) {
        let Some(setup) = self.setup else {
            return;
        };
        if page_nr >= self.n_pages {
            return;
        }

        if let Some(header) = self.config.header.as_ref().filter(|_| self.config.print_header) {
            let rendered = header.render(page_nr + 1, self.n_pages);
            surface.push_line(compose_header_line(setup.columns, &rendered));
            if header.separator {
                surface.push_line("-".repeat(setup.columns));
            } else {
                surface.push_line(String::new());
            }
        }

        let per_page = self.body_rows(&setup);
        let start = page_nr * per_page;
        let end = (start + per_page).min(self.rows.len());
        let number_width = self.number_width();
        for row in &self.rows[start.min(end)..end] {
            if number_width == 0 {
                surface.push_line(row.text.clone());
                continue;
            }
            let number = row
                .line_number
                .filter(|n| n % self.config.line_numbers as usize == 0);
            let line = match number {
                Some(n) => format!("{:>width$} {}", n, row.text, width = number_width - 1),
                None => format!("{}{}", " ".repeat(number_width), row.text),
            };
            surface.push_line(line.trim_end().to_string());
        }
    }

    fn header_rows(&self) -> usize {
        if self.config.print_header && self.config.header.is_some() {
            2
        } else {
            0
        }
    }

    fn body_rows(&self, setup: &PageSetup) -> usize {
        setup.lines_per_page.saturating_sub(self.header_rows()).max(1)
    }

    fn number_width(&self) -> usize {
        if self.config.line_numbers == 0 {
            return 0;
        }
        let digits = self.source.len().max(1).to_string().len();
        digits + 1
    }

    fn text_columns(&self, setup: &PageSetup) -> usize {
        setup.columns.saturating_sub(self.number_width()).max(1)
    }
}

fn expand_tabs(line: &str, tab_width: usize) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let tab_width = tab_width.max(1);
    let mut output = String::with_capacity(line.len() + tab_width);
    let mut column = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let spaces = tab_width - column % tab_width;
            output.extend(std::iter::repeat(' ').take(spaces));
            column += spaces;
        } else {
            output.push(ch);
            column += 1;
        }
    }
    output
}

fn wrap_line(line: &str, width: usize, mode: PrintWrapMode) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= width {
        return vec![line.to_string()];
    }
    match mode {
        PrintWrapMode::None => vec![chars[..width].iter().collect()],
        PrintWrapMode::Char => chars
            .chunks(width)
            .map(|chunk| chunk.iter().collect())
            .collect(),
        PrintWrapMode::Word => {
            let mut rows = Vec::new();
            let mut start = 0;
            while chars.len() - start > width {
                let window = &chars[start..start + width + 1];
                let end = match window.iter().rposition(|c| c.is_whitespace()) {
                    Some(space) if space > 0 => start + space + 1,
                    _ => start + width,
                };
                let row: String = chars[start..end].iter().collect();
                rows.push(row.trim_end().to_string());
                start = end;
            }
            rows.push(chars[start..].iter().collect());
            rows
        }
    }
}

fn compose_header_line(columns: usize, header: &RenderedHeader) -> String {
    let left: Vec<char> = header.left.chars().collect();
    let center: Vec<char> = header.center.chars().collect();
    let right: Vec<char> = header.right.chars().collect();

    if left.len() + center.len() + right.len() + 2 > columns {
        let joined = [&header.left, &header.center, &header.right]
            .into_iter()
            .filter(|part| !part.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        return joined.chars().take(columns).collect();
    }

    let mut line = vec![' '; columns];
    line[..left.len()].copy_from_slice(&left);
    if !center.is_empty() {
        let earliest = if left.is_empty() { 0 } else { left.len() + 1 };
        let latest = columns - right.len() - center.len() - usize::from(!right.is_empty());
        let start = ((columns - center.len()) / 2).clamp(earliest, latest);
        line[start..start + center.len()].copy_from_slice(&center);
    }
    line[columns - right.len()..].copy_from_slice(&right);
    line.into_iter().collect::<String>().trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_config() -> CompositorConfig {
        CompositorConfig {
            tab_width: 4,
            highlight_syntax: false,
            wrap_mode: PrintWrapMode::Word,
            line_numbers: 0,
            print_header: false,
            print_footer: false,
            body_font: "Monospace 9".into(),
            header_font: "Sans 11".into(),
            numbers_font: "Sans 8".into(),
            header: None,
        }
    }

    #[test]
    fn word_wrap_breaks_between_words() {
        let rows = wrap_line("alpha beta gamma delta", 11, PrintWrapMode::Word);
        assert_eq!(rows, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn char_wrap_and_clipping() {
        assert_eq!(
            wrap_line("abcdefgh", 3, PrintWrapMode::Char),
            vec!["abc", "def", "gh"]
        );
        assert_eq!(wrap_line("abcdefgh", 3, PrintWrapMode::None), vec!["abc"]);
        assert_eq!(
            wrap_line("abcdefgh", 3, PrintWrapMode::Word),
            vec!["abc", "def", "gh"]
        );
    }

    #[test]
    fn tabs_expand_to_stops() {
        assert_eq!(expand_tabs("a\tb", 4), "a   b");
        assert_eq!(expand_tabs("\tx", 8), "        x");
    }

    #[test]
    fn header_places_slots() {
        let header = RenderedHeader {
            left: "File: a.txt".into(),
            center: String::new(),
            right: "Page 1 of 2".into(),
        };
        let line = compose_header_line(30, &header);
        assert_eq!(line.chars().count(), 30);
        assert!(line.starts_with("File: a.txt"));
        assert!(line.ends_with("Page 1 of 2"));
    }

    #[test]
    fn paginates_in_chunks() {
        let text = (1..=450).map(|n| format!("line {n}\n")).collect::<String>();
        let mut compositor = Compositor::new(plain_config(), &text);
        let setup = PageSetup {
            columns: 40,
            lines_per_page: 100,
        };

        assert!(!compositor.paginate(&setup));
        assert!((compositor.pagination_progress() - 200.0 / 450.0).abs() < 1e-9);
        assert!(!compositor.paginate(&setup));
        assert!(compositor.paginate(&setup));
        assert_eq!(compositor.n_pages(), 5);

        let mut surface = PageSurface::default();
        compositor.draw_page(4, &mut surface);
        assert_eq!(surface.lines().len(), 50);
        assert_eq!(surface.lines()[0], "line 401");
    }

    #[test]
    fn empty_document_prints_one_page() {
        let mut compositor = Compositor::new(plain_config(), "");
        assert!(compositor.paginate(&PageSetup::default()));
        assert_eq!(compositor.n_pages(), 1);
        assert_eq!(compositor.pagination_progress(), 1.0);
    }

    #[test]
    fn line_numbers_follow_interval() {
        let config = CompositorConfig {
            line_numbers: 2,
            ..plain_config()
        };
        let mut compositor = Compositor::new(config, "a\nb\nc\nd\n");
        compositor.paginate(&PageSetup::default());
        let mut surface = PageSurface::default();
        compositor.draw_page(0, &mut surface);
        assert_eq!(surface.lines(), &["  a", "2 b", "  c", "4 d"]);
    }
}
