use serde::Serialize;

pub const SIZE_STEPS: &[(&str, i32)] = &[
    ("huge", 7),
    ("very-large", 5),
    ("large", 3),
    ("normal", 0),
    ("small", -2),
    ("tiny", -4),
];

pub fn size_relative(keyword: &str) -> i32 {
    let keyword = keyword.trim().to_ascii_lowercase();
    SIZE_STEPS
        .iter()
        .find(|(name, _)| *name == keyword)
        .map(|(_, step)| *step)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    Black,
    Blue,
    Green,
    Red,
    Orange,
    Grey,
}

impl Color {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "blue" => Color::Blue,
            "green" => Color::Green,
            "red" => Color::Red,
            "orange" => Color::Orange,
            "grey" | "gray" => Color::Grey,
            _ => Color::Black,
        }
    }

    pub fn rgb(self) -> [u8; 3] {
        match self {
            Color::Black => [33, 33, 33],
            Color::Blue => [25, 118, 210],
            Color::Green => [46, 125, 50],
            Color::Red => [211, 47, 47],
            Color::Orange => [245, 124, 0],
            Color::Grey => [117, 117, 117],
        }
    }

    pub fn hex(self) -> String {
        let [r, g, b] = self.rgb();
        format!("{r:02X}{g:02X}{b:02X}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "center" | "centre" => Alignment::Center,
            "right" => Alignment::Right,
            _ => Alignment::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FormattingSpec {
    pub bold: bool,
    pub size_relative: i32,
    pub color: Color,
    pub alignment: Alignment,
}

impl FormattingSpec {
    // Red without bold is almost always underline bleed from the source image.
    pub fn effective_color(&self) -> Color {
        if self.color == Color::Red && !self.bold {
            Color::Black
        } else {
            self.color
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBlock {
    pub original: String,
    pub translated: String,
    pub formatting: FormattingSpec,
    pub ends_with_break: bool,
}

impl TextBlock {
    pub fn new(text: &str, formatting: FormattingSpec) -> Self {
        let ends_with_break = text.ends_with('\n');
        let text = text.trim_end_matches('\n');
        Self {
            original: text.to_string(),
            translated: text.to_string(),
            formatting,
            ends_with_break,
        }
    }

    pub fn plain(text: &str) -> Self {
        Self::new(text, FormattingSpec::default())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Line {
    pub alignment: Alignment,
    pub blocks: Vec<TextBlock>,
}

impl Line {
    pub fn spacer() -> Self {
        Self::default()
    }

    pub fn is_spacer(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "schema", content = "content", rename_all = "lowercase")]
pub enum StructuredDocument {
    Lines(Vec<Line>),
    Flat(Vec<TextBlock>),
}

impl StructuredDocument {
    // A flat block that does not end with a break shares the paragraph of the
    // block that follows it.
    pub fn lines(&self) -> Vec<Line> {
        match self {
            StructuredDocument::Lines(lines) => lines.clone(),
            StructuredDocument::Flat(blocks) => {
                let mut lines = Vec::new();
                let mut current: Option<Line> = None;
                for block in blocks {
                    let line = current.get_or_insert_with(|| Line {
                        alignment: block.formatting.alignment,
                        blocks: Vec::new(),
                    });
                    line.blocks.push(block.clone());
                    if block.ends_with_break {
                        lines.extend(current.take());
                    }
                }
                lines.extend(current);
                lines
            }
        }
    }

    pub fn block_count(&self) -> usize {
        match self {
            StructuredDocument::Lines(lines) => lines.iter().map(|line| line.blocks.len()).sum(),
            StructuredDocument::Flat(blocks) => blocks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.block_count() == 0
    }

    pub fn translated_texts(&self) -> Vec<String> {
        self.lines()
            .iter()
            .flat_map(|line| line.blocks.iter().map(|block| block.translated.clone()))
            .collect()
    }

    pub fn from_plain_text(text: &str) -> Self {
        let mut lines: Vec<Line> = Vec::new();
        for raw in text.lines() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                if lines.last().is_some_and(|line| !line.is_spacer()) {
                    lines.push(Line::spacer());
                }
                continue;
            }
            lines.push(Line {
                alignment: Alignment::Left,
                blocks: vec![TextBlock::plain(trimmed)],
            });
        }
        while lines.last().is_some_and(Line::is_spacer) {
            lines.pop();
        }
        StructuredDocument::Lines(lines)
    }
}
