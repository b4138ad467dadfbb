use super::{VdfDocument, VdfValue};
use std::{iter::Enumerate, str::Lines};

/// A line the parser could not make sense of and skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseWarning {
    /// The line had no usable key.
    #[error("line {line}: no key found")]
    EmptyKey { line: usize },
    /// A key without an inline value that was not followed by `{`.
    ///
    /// The key is stored with an empty value and the line after it is
    /// consumed, including a closing `}`.
    #[error("line {line}: key '{key}' is not followed by an opening brace")]
    DanglingKey {
        line: usize,
        key: String,
        discarded: Option<String>,
    },
}

/// Parses VDF text, skipping malformed lines.
pub fn parse(text: &str) -> VdfDocument {
    let (document, warnings) = parse_with_warnings(text);
    for warning in &warnings {
        warn!("skipped malformed vdf input: {warning}");
    }
    document
}

/// Parses VDF text and reports every skipped line.
///
/// Parsing never aborts: an unterminated object is closed at end of input.
pub fn parse_with_warnings(text: &str) -> (VdfDocument, Vec<ParseWarning>) {
    let mut parser = Parser {
        lines: text.lines().enumerate(),
        warnings: Vec::new(),
    };
    let document = parser.parse_object();
    (document, parser.warnings)
}

struct Parser<'a> {
    lines: Enumerate<Lines<'a>>,
    warnings: Vec<ParseWarning>,
}

impl<'a> Parser<'a> {
    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        self.lines.next().map(|(idx, line)| (idx + 1, line.trim()))
    }

    fn parse_object(&mut self) -> VdfDocument {
        let mut object = VdfDocument::new();

        while let Some((line_no, line)) = self.next_line() {
            if line.is_empty() {
                continue;
            }
            if line == "}" {
                break;
            }

            let mut parts = line.split('\t').map(str::trim).filter(|part| !part.is_empty());
            let Some(first) = parts.next() else {
                self.warnings.push(ParseWarning::EmptyKey { line: line_no });
                continue;
            };
            let key = first.trim_matches('"');

            // values keep their quotes, only keys are unquoted
            if let Some(value) = parts.last() {
                object.insert(key, value);
                continue;
            }

            match self.next_line() {
                Some((_, "{")) => {
                    let nested = self.parse_object();
                    object.insert(key, nested);
                }
                peeked => {
                    self.warnings.push(ParseWarning::DanglingKey {
                        line: line_no,
                        key: key.to_owned(),
                        discarded: peeked.map(|(_, line)| line.to_owned()),
                    });
                    // stored as an empty quoted value so it serializes as a pair
                    object.insert(key, "\"\"");
                }
            }
        }

        object
    }
}

/// Serializes a document in Steam's tab indented layout.
///
/// Keys are quoted, string values are written verbatim after two tabs.
pub fn serialize(document: &VdfDocument) -> String {
    let mut out = String::new();
    write_object(&mut out, document, 0);
    out
}

fn write_object(out: &mut String, object: &VdfDocument, depth: usize) {
    for (key, value) in object.iter() {
        push_indent(out, depth);
        out.push('"');
        out.push_str(key);
        out.push('"');

        match value {
            VdfValue::Object(child) => {
                out.push('\n');
                push_indent(out, depth);
                out.push_str("{\n");
                write_object(out, child, depth + 1);
                push_indent(out, depth);
                out.push_str("}\n");
            }
            VdfValue::String(s) => {
                out.push_str("\t\t");
                out.push_str(s);
                out.push('\n');
            }
        }
    }
}

#[inline]
fn push_indent(out: &mut String, depth: usize) {
    out.extend(std::iter::repeat_n('\t', depth));
}
