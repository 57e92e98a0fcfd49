use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::document::{
    Alignment, Color, FormattingSpec, Line, StructuredDocument, TextBlock, size_relative,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepairError {
    #[error("response contains no JSON object")]
    NoJson,
    #[error("JSON could not be repaired: {0}")]
    Unrepairable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub document: StructuredDocument,
    pub repaired: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Lines { lines: Vec<RawLine> },
    Blocks { blocks: Vec<RawBlock> },
}

#[derive(Debug, Deserialize)]
struct RawLine {
    #[serde(default)]
    alignment: Option<String>,
    #[serde(default)]
    blocks: Option<Vec<RawBlock>>,
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    bold: Option<Value>,
    #[serde(default)]
    size: Option<Value>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    alignment: Option<String>,
}

impl RawBlock {
    fn into_block(self, line_alignment: Option<Alignment>) -> Option<TextBlock> {
        let text = self.text?;
        let alignment = line_alignment.unwrap_or_else(|| {
            self.alignment
                .as_deref()
                .map(Alignment::from_name)
                .unwrap_or_default()
        });
        let formatting = FormattingSpec {
            bold: truthy(self.bold.as_ref()),
            size_relative: match &self.size {
                Some(Value::String(keyword)) => size_relative(keyword),
                Some(Value::Number(number)) => number.as_i64().unwrap_or(0) as i32,
                _ => 0,
            },
            color: self.color.as_deref().map(Color::from_name).unwrap_or_default(),
            alignment,
        };
        Some(TextBlock::new(&text, formatting))
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => text.eq_ignore_ascii_case("true"),
        Some(Value::Number(number)) => number.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

impl RawDocument {
    fn into_document(self, repaired: bool) -> StructuredDocument {
        match self {
            RawDocument::Lines { lines } => StructuredDocument::Lines(
                lines
                    .into_iter()
                    .filter_map(|line| {
                        let alignment = line
                            .alignment
                            .as_deref()
                            .map(Alignment::from_name)
                            .unwrap_or_default();
                        // a line cut before its "blocks" key is a truncation artifact;
                        // in a complete response it is an empty line
                        let blocks = match line.blocks {
                            Some(blocks) => blocks,
                            None if repaired => return None,
                            None => Vec::new(),
                        };
                        Some(Line {
                            alignment,
                            blocks: blocks
                                .into_iter()
                                .filter_map(|block| block.into_block(Some(alignment)))
                                .collect(),
                        })
                    })
                    .collect(),
            ),
            RawDocument::Blocks { blocks } => StructuredDocument::Flat(
                blocks
                    .into_iter()
                    .filter_map(|block| block.into_block(None))
                    .collect(),
            ),
        }
    }
}

pub fn parse_document(raw: &str) -> Result<Parsed, RepairError> {
    let payload = strip_code_fences(raw);
    if payload.is_empty() || !payload.contains('{') {
        return Err(RepairError::NoJson);
    }
    match serde_json::from_str::<RawDocument>(payload) {
        Ok(document) => Ok(Parsed {
            document: document.into_document(false),
            repaired: false,
        }),
        Err(first) => {
            let repaired = repair_truncated(payload)
                .ok_or_else(|| RepairError::Unrepairable(first.to_string()))?;
            let document = serde_json::from_str::<RawDocument>(&repaired)
                .map_err(|err| RepairError::Unrepairable(err.to_string()))?;
            Ok(Parsed {
                document: document.into_document(true),
                repaired: true,
            })
        }
    }
}

pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let body_start = after.find('\n').map(|idx| idx + 1).unwrap_or(after.len());
        let first_line = &after[..body_start];
        // ```{"lines": ...}``` on one line has no language tag to skip
        let body = if first_line.trim_start().starts_with('{') {
            after
        } else {
            &after[body_start..]
        };
        text = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };
        text = text.trim();
    }
    match text.find('{') {
        Some(idx) => &text[idx..],
        None => text,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Key,
    Colon,
    Value,
    Next,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    closer: char,
    expect: Expect,
}

struct Boundary {
    end: usize,
    closers: String,
}

fn closers_for(stack: &[Frame]) -> String {
    stack.iter().rev().map(|frame| frame.closer).collect()
}

fn complete_value(stack: &mut [Frame], end: usize, boundary: &mut Option<Boundary>) {
    if let Some(top) = stack.last_mut() {
        top.expect = Expect::Next;
    }
    *boundary = Some(Boundary {
        end,
        closers: closers_for(stack),
    });
}

// Walks the text once, remembering the last offset at which every open
// container holds only complete members, then cuts there and closes them.
pub fn repair_truncated(text: &str) -> Option<String> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut boundary: Option<Boundary> = None;
    let mut in_string = false;
    let mut string_is_key = false;
    let mut escaped = false;
    let mut in_scalar = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
                if string_is_key {
                    if let Some(top) = stack.last_mut() {
                        top.expect = Expect::Colon;
                    }
                } else {
                    complete_value(&mut stack, idx + 1, &mut boundary);
                }
            }
            continue;
        }

        if in_scalar {
            if ch.is_whitespace() || matches!(ch, ',' | '}' | ']' | ':') {
                in_scalar = false;
                complete_value(&mut stack, idx, &mut boundary);
            } else {
                continue;
            }
        }

        match ch {
            c if c.is_whitespace() => {}
            '"' => {
                in_string = true;
                string_is_key = stack
                    .last()
                    .is_some_and(|top| top.closer == '}' && top.expect == Expect::Key);
            }
            '{' | '[' => {
                let frame = if ch == '{' {
                    Frame {
                        closer: '}',
                        expect: Expect::Key,
                    }
                } else {
                    Frame {
                        closer: ']',
                        expect: Expect::Value,
                    }
                };
                stack.push(frame);
                boundary = Some(Boundary {
                    end: idx + 1,
                    closers: closers_for(&stack),
                });
            }
            '}' | ']' => {
                if stack.pop().is_none() {
                    break;
                }
                complete_value(&mut stack, idx + 1, &mut boundary);
                if stack.is_empty() {
                    break;
                }
            }
            ':' => {
                if let Some(top) = stack.last_mut() {
                    top.expect = Expect::Value;
                }
            }
            ',' => {
                if let Some(top) = stack.last_mut() {
                    top.expect = if top.closer == '}' {
                        Expect::Key
                    } else {
                        Expect::Value
                    };
                }
            }
            _ => in_scalar = true,
        }
    }

    let boundary = boundary?;
    let mut repaired = text[..boundary.end].trim_end().to_string();
    repaired.push_str(&boundary.closers);
    Some(repaired)
}
