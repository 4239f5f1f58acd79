//! Indentation tree on top of the tokenizer.

use crate::error::{Result, TextError};
use crate::lexer::{tokenize, Body, Line};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub tag: String,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub line: usize,
    pub key: String,
    pub value: TextValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextValue {
    /// Raw scalar text, still quoted if it was written quoted.
    Scalar(String),
    /// `{}`: an empty container or member-less struct.
    Empty,
    /// Nested entries, optionally introduced by `!Type` on the key line.
    Block { tag: Option<String>, entries: Vec<Entry> },
}

pub fn parse(text: &str) -> Result<Document> {
    let lines = tokenize(text)?;
    let Some(first) = lines.first() else {
        return Err(TextError::syntax(1, "empty document"));
    };
    let tag = match (&first.body, first.indent) {
        (Body::Tag(tag), 0) => tag.clone(),
        _ => return Err(TextError::syntax(first.number, "document must start with `!Type`")),
    };
    let mut parser = Parser { lines, pos: 1 };
    let entries = match parser.lines.get(1) {
        Some(line) if line.indent == 0 => parser.block(0)?,
        Some(line) => return Err(TextError::syntax(line.number, "unexpected indentation")),
        None => Vec::new(),
    };
    Ok(Document { tag, entries })
}

struct Parser {
    lines: Vec<Line>,
    pos: usize,
}

impl Parser {
    fn child_indent(&self, parent: usize) -> Option<usize> {
        self.lines.get(self.pos).map(|l| l.indent).filter(|i| *i > parent)
    }

    fn block(&mut self, indent: usize) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        while let Some(line) = self.lines.get(self.pos) {
            if line.indent < indent {
                break;
            }
            let number = line.number;
            if line.indent > indent {
                return Err(TextError::syntax(number, "unexpected indentation"));
            }
            let (key, value) = match &line.body {
                Body::Entry { key, value } => (key.clone(), value.clone()),
                Body::Tag(_) => {
                    return Err(TextError::syntax(number, "type tag must follow a key"));
                }
            };
            self.pos += 1;
            let value = match value {
                None => self.nested(indent, None)?,
                Some(v) if v.starts_with('!') => self.nested(indent, Some(v[1..].to_string()))?,
                Some(v) => {
                    if self.child_indent(indent).is_some() {
                        return Err(TextError::syntax(number, "scalar value cannot have nested entries"));
                    }
                    if v == "{}" {
                        TextValue::Empty
                    } else {
                        TextValue::Scalar(v)
                    }
                }
            };
            entries.push(Entry { line: number, key, value });
        }
        Ok(entries)
    }

    fn nested(&mut self, indent: usize, tag: Option<String>) -> Result<TextValue> {
        let entries = match self.child_indent(indent) {
            Some(child) => self.block(child)?,
            None => Vec::new(),
        };
        Ok(TextValue::Block { tag, entries })
    }
}
