use std::fmt::Write;

use thiserror::Error;

/// Tokens recognised by the header/footer parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateToken {
    /// `%N`, the current page number (1-based).
    PageNumber,
    /// `%Q`, the total number of pages.
    PageCount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    Literal(String),
    Token(TemplateToken),
}

/// Parsed header/footer text for one alignment slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageTemplate {
    segments: Vec<TemplateSegment>,
}

impl PageTemplate {
    pub fn parse(input: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut buffer = String::new();

        let mut chars = input.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch != '%' {
                buffer.push(ch);
                continue;
            }

            let Some(next) = chars.peek().copied() else {
                buffer.push('%');
                break;
            };

            let token = match next {
                '%' => {
                    buffer.push('%');
                    chars.next();
                    continue;
                }
                'N' => TemplateToken::PageNumber,
                'Q' => TemplateToken::PageCount,
                other => return Err(TemplateError::UnknownToken(other)),
            };
            chars.next();
            flush_buffer(&mut buffer, &mut segments);
            segments.push(TemplateSegment::Token(token));
        }

        flush_buffer(&mut buffer, &mut segments);
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[TemplateSegment] {
        &self.segments
    }

    pub fn render(&self, page_number: usize, page_count: usize) -> String {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => output.push_str(text),
                TemplateSegment::Token(TemplateToken::PageNumber) => {
                    let _ = write!(output, "{page_number}");
                }
                TemplateSegment::Token(TemplateToken::PageCount) => {
                    let _ = write!(output, "{page_count}");
                }
            }
        }
        output
    }
}

/// Escapes `%` so arbitrary text (such as a file name) can be embedded in a template.
pub fn escape_template_text(text: &str) -> String {
    text.replace('%', "%%")
}

fn flush_buffer(buffer: &mut String, segments: &mut Vec<TemplateSegment>) {
    if buffer.is_empty() {
        return;
    }
    segments.push(TemplateSegment::Literal(std::mem::take(buffer)));
}

/// Errors raised while parsing header/footer templates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown header/footer token '%{0}'")]
    UnknownToken(char),
}
