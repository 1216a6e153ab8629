use serde::{Deserialize, Serialize};

/// Page size, margins and line advances in PDF points.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PageGeometry {
    pub page_width: f32,
    pub page_height: f32,
    pub left_margin: f32,
    /// Baseline of the first line on a page.
    pub top: f32,
    /// Lowest baseline a line may be placed on.
    pub bottom_margin: f32,
    pub title_advance: f32,
    pub line_advance: f32,
    pub section_gap: f32,
    pub font_size: f32,
    /// Width budget for one wrapped line, in characters.
    pub max_chars: usize,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            page_width: 595.0,
            page_height: 842.0,
            left_margin: 50.0,
            top: 800.0,
            bottom_margin: 50.0,
            title_advance: 20.0,
            line_advance: 15.0,
            section_gap: 30.0,
            font_size: 12.0,
            max_chars: 80,
        }
    }
}

impl PageGeometry {
    /// # Errors
    ///
    /// Returns a description of the first setting that makes a line impossible to place.
    pub fn check(&self) -> Result<(), String> {
        if self.max_chars == 0 {
            return Err("max_chars must be at least 1".into());
        }
        if self.top > self.page_height {
            return Err(format!(
                "top {} is above the page height {}",
                self.top, self.page_height
            ));
        }
        if self.top < self.bottom_margin {
            return Err(format!(
                "top {} is below the bottom margin {}",
                self.top, self.bottom_margin
            ));
        }
        if self.left_margin < 0.0 || self.left_margin >= self.page_width {
            return Err(format!("left margin {} is off the page", self.left_margin));
        }
        if self.title_advance <= 0.0 || self.line_advance <= 0.0 || self.section_gap < 0.0 {
            return Err("advances must be positive".into());
        }
        if self.font_size <= 0.0 {
            return Err("font_size must be positive".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub heading: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub lines: Vec<PlacedLine>,
}

/// Greedy word wrap on whitespace. No line is longer than `max_chars`
/// characters; a word that alone exceeds the budget is cut into
/// `max_chars`-sized pieces, each on its own line.
#[must_use]
pub fn wrap_words(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                lines.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };
        if needed > max_chars {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len = needed;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

struct Cursor<'g> {
    geometry: &'g PageGeometry,
    pages: Vec<Page>,
    y: f32,
}

impl<'g> Cursor<'g> {
    fn new(geometry: &'g PageGeometry) -> Self {
        Self {
            geometry,
            pages: vec![Page::default()],
            y: geometry.top,
        }
    }

    fn place(&mut self, text: String, heading: bool, advance: f32) {
        if self.y < self.geometry.bottom_margin {
            self.pages.push(Page::default());
            self.y = self.geometry.top;
        }
        let line = PlacedLine {
            x: self.geometry.left_margin,
            y: self.y,
            text,
            heading,
        };
        if let Some(page) = self.pages.last_mut() {
            page.lines.push(line);
        }
        self.y -= advance;
    }
}

/// Place `(title, body)` sections top to bottom: the heading, the wrapped
/// body lines, then a gap. A new page starts whenever the next baseline would
/// fall below the bottom margin.
#[must_use]
pub fn layout<S: AsRef<str>>(sections: &[(S, S)], geometry: &PageGeometry) -> Vec<Page> {
    let mut cursor = Cursor::new(geometry);
    for (title, body) in sections {
        cursor.place(title.as_ref().to_owned(), true, geometry.title_advance);
        for line in wrap_words(body.as_ref(), geometry.max_chars) {
            cursor.place(line, false, geometry.line_advance);
        }
        cursor.y -= geometry.section_gap;
    }
    cursor.pages
}
