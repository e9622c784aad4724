//! Parser for the line-oriented randomizer grammar.
//!
//! A document is a sequence of declarations separated by blank lines. A
//! declaration is a name line followed by one or more body lines:
//!
//! ```text
//! BARE            a single template line
//! LONG
//! | first line    '|' lines, joined with newlines
//! | second line
//! PICK
//! - one           '-' lines: uniform random pick
//! - two
//! RARITY
//! 3- common       '<weight>-' lines: weighted random pick
//! 1- rare
//! CYCLE
//! + first         '+' lines: round-robin rotation
//! + second
//! ONCE
//! - first time    one '-' line then one '+' line: first/subsequent
//! + afterwards
//! MANY
//! 4*{PICK}        '<count>*': expand the template count times
//! ```
//!
//! Body markers start at column 0 and one optional space after `-`, `+`,
//! `|` and `<weight>-` is consumed; the repeater template starts verbatim
//! after `*`. The dispatch has to see a second line before committing: a
//! `-` line followed by a `+` line is the first/subsequent form, not a
//! one-item list. References are resolved later, when the registry is
//! built, so a template may point at a declaration further down the file.

use regex::Regex;
use std::collections::HashSet;

use crate::ast::{Body, Document, RandomizerDef, Segment, StringTemplate, is_identifier};
use crate::utils::ParseError;

/// Parse grammar source text into a [`Document`]
pub fn parse(source: &str) -> Result<Document, ParseError> {
    Parser::new().parse(source)
}

/// A source line that survived blank-line splitting
#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    number: usize,
    text: &'a str,
}

/// What shape a body line has, with the marker stripped
#[derive(Debug)]
enum LineKind<'a> {
    /// `- template`
    Item(&'a str),
    /// `+ template`
    Rotation(&'a str),
    /// `| template`
    LongLine(&'a str),
    /// `<weight>- template`
    Weighted(u32, &'a str),
    /// `<count>*template`
    Repeat(u32, &'a str),
    /// anything else: a bare template line
    Bare,
}

struct Parser {
    weighted_re: Regex,
    repeat_re: Regex,
}

impl Parser {
    fn new() -> Self {
        Parser {
            weighted_re: Regex::new(r"^(\d+)-(.*)$").unwrap(),
            repeat_re: Regex::new(r"^(\d+)\*(.*)$").unwrap(),
        }
    }

    fn parse(&self, source: &str) -> Result<Document, ParseError> {
        let mut defs = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for block in blocks(source) {
            let def = self.parse_declaration(&block)?;
            if !seen.insert(def.name.clone()) {
                return Err(ParseError::DuplicateName {
                    name: def.name,
                    line: block[0].number,
                });
            }
            defs.push(def);
        }

        Ok(Document::from_defs(defs))
    }

    fn parse_declaration(&self, block: &[Line<'_>]) -> Result<RandomizerDef, ParseError> {
        let name_line = block[0];
        let name = name_line.text.trim();
        if !is_identifier(name) {
            return Err(ParseError::UnexpectedToken {
                line: name_line.number,
                snippet: name.to_string(),
                reason: "randomizer name must be an identifier".to_string(),
            });
        }

        let body_lines = &block[1..];
        if body_lines.is_empty() {
            return Err(ParseError::EmptyBody {
                name: name.to_string(),
                line: name_line.number,
            });
        }

        let body = self.parse_body(body_lines)?;
        Ok(RandomizerDef::new(name, body))
    }

    fn parse_body(&self, lines: &[Line<'_>]) -> Result<Body, ParseError> {
        let mut kinds = Vec::with_capacity(lines.len());
        for line in lines {
            kinds.push(self.classify(line)?);
        }

        // The first/subsequent form wins over the uniform block forms, so
        // the second line decides what the first one meant.
        if kinds.len() == 2 {
            if let (LineKind::Item(first), LineKind::Rotation(subsequent)) =
                (&kinds[0], &kinds[1])
            {
                return Ok(Body::IfBranch {
                    first: scan_template(first, lines[0].number)?,
                    subsequent: scan_template(subsequent, lines[1].number)?,
                });
            }
        }

        if kinds.iter().all(|kind| matches!(kind, LineKind::Item(_))) {
            let mut items = Vec::new();
            for (kind, line) in kinds.iter().zip(lines) {
                if let LineKind::Item(rest) = kind {
                    items.push(scan_template(rest, line.number)?);
                }
            }
            return Ok(Body::List(items));
        }

        if kinds.iter().all(|kind| matches!(kind, LineKind::Weighted(..))) {
            let mut items = Vec::new();
            for (kind, line) in kinds.iter().zip(lines) {
                if let LineKind::Weighted(weight, rest) = kind {
                    items.push((*weight, scan_template(rest, line.number)?));
                }
            }
            return Ok(Body::WeightedList(items));
        }

        if kinds.iter().all(|kind| matches!(kind, LineKind::Rotation(_))) {
            let mut items = Vec::new();
            for (kind, line) in kinds.iter().zip(lines) {
                if let LineKind::Rotation(rest) = kind {
                    items.push(scan_template(rest, line.number)?);
                }
            }
            return Ok(Body::RotateList(items));
        }

        if kinds.iter().all(|kind| matches!(kind, LineKind::LongLine(_))) {
            let mut template = StringTemplate::default();
            for (index, (kind, line)) in kinds.iter().zip(lines).enumerate() {
                if let LineKind::LongLine(rest) = kind {
                    if index > 0 {
                        template.push_text("\n");
                    }
                    let scanned = scan_template(rest, line.number)?;
                    for segment in scanned.segments {
                        template.push(segment);
                    }
                }
            }
            return Ok(Body::Literal(template));
        }

        if kinds.len() == 1 {
            if let LineKind::Repeat(count, rest) = &kinds[0] {
                return Ok(Body::Repeater {
                    count: *count,
                    template: scan_template(rest, lines[0].number)?,
                });
            }
            return Ok(Body::Literal(scan_template(
                lines[0].text,
                lines[0].number,
            )?));
        }

        // Mixed shapes. Point at the first line that breaks the pattern.
        if kinds.len() > 2
            && matches!(
                (&kinds[0], &kinds[1]),
                (LineKind::Item(_), LineKind::Rotation(_))
            )
        {
            return Err(ParseError::UnexpectedToken {
                line: lines[2].number,
                snippet: lines[2].text.to_string(),
                reason: "a first/subsequent body takes exactly two lines".to_string(),
            });
        }

        let first = std::mem::discriminant(&kinds[0]);
        for (kind, line) in kinds.iter().zip(lines).skip(1) {
            if std::mem::discriminant(kind) != first {
                return Err(ParseError::UnexpectedToken {
                    line: line.number,
                    snippet: line.text.to_string(),
                    reason: "line does not match the body form started above".to_string(),
                });
            }
        }

        // Uniform but not a block form: several bare or repeater lines.
        Err(ParseError::UnexpectedToken {
            line: lines[1].number,
            snippet: lines[1].text.to_string(),
            reason: "this body form takes a single line".to_string(),
        })
    }

    fn classify<'a>(&self, line: &Line<'a>) -> Result<LineKind<'a>, ParseError> {
        let text = line.text;

        if let Some(rest) = text.strip_prefix('-') {
            return Ok(LineKind::Item(strip_marker_space(rest)));
        }
        if let Some(rest) = text.strip_prefix('+') {
            return Ok(LineKind::Rotation(strip_marker_space(rest)));
        }
        if let Some(rest) = text.strip_prefix('|') {
            return Ok(LineKind::LongLine(strip_marker_space(rest)));
        }

        if let Some(captures) = self.weighted_re.captures(text) {
            let digits = captures.get(1).unwrap().as_str();
            let weight: u32 = digits.parse().map_err(|_| ParseError::UnexpectedToken {
                line: line.number,
                snippet: text.to_string(),
                reason: "weight out of range".to_string(),
            })?;
            if weight == 0 {
                return Err(ParseError::UnexpectedToken {
                    line: line.number,
                    snippet: text.to_string(),
                    reason: "weight must be positive".to_string(),
                });
            }
            let rest = captures.get(2).unwrap().as_str();
            return Ok(LineKind::Weighted(weight, strip_marker_space(rest)));
        }

        if let Some(captures) = self.repeat_re.captures(text) {
            let digits = captures.get(1).unwrap().as_str();
            let count: u32 = digits.parse().map_err(|_| ParseError::UnexpectedToken {
                line: line.number,
                snippet: text.to_string(),
                reason: "repeat count out of range".to_string(),
            })?;
            let rest = captures.get(2).unwrap().as_str();
            return Ok(LineKind::Repeat(count, rest));
        }

        Ok(LineKind::Bare)
    }
}

/// Split source into declaration blocks. A line is blank when it is empty
/// after trimming, so whitespace-only separators work; `str::lines` also
/// strips the `\r` of CRLF input.
fn blocks(source: &str) -> Vec<Vec<Line<'_>>> {
    let mut blocks = Vec::new();
    let mut current: Vec<Line<'_>> = Vec::new();

    for (index, text) in source.lines().enumerate() {
        if text.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(Line {
                number: index + 1,
                text,
            });
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

/// One optional space after a marker separates it from the template; any
/// further whitespace belongs to the template
fn strip_marker_space(rest: &str) -> &str {
    rest.strip_prefix(' ').unwrap_or(rest)
}

/// Scan one line of template text into segments.
///
/// A `{` always opens a reference: `{NAME}` is a caller reference,
/// `{<NAME}` and `{3<NAME}` are pointer references. A stray `}` is
/// literal text. There is no escape mechanism; text that needs a leading
/// marker character goes through the `|` long form instead.
pub(crate) fn scan_template(text: &str, line: usize) -> Result<StringTemplate, ParseError> {
    let mut template = StringTemplate::default();
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        template.push_text(&rest[..open]);
        let after = &rest[open + 1..];
        let close = match after.find('}') {
            Some(close) => close,
            None => {
                return Err(ParseError::MalformedReference {
                    line,
                    snippet: rest[open..].to_string(),
                    reason: "unterminated reference".to_string(),
                });
            }
        };
        let inner = &after[..close];
        if inner.contains('{') {
            return Err(ParseError::MalformedReference {
                line,
                snippet: rest[open..open + close + 2].to_string(),
                reason: "unterminated reference".to_string(),
            });
        }
        template.push(parse_reference(inner, line)?);
        rest = &after[close + 1..];
    }
    template.push_text(rest);

    Ok(template)
}

fn parse_reference(inner: &str, line: usize) -> Result<Segment, ParseError> {
    match inner.find('<') {
        None => {
            check_reference_name(inner, inner, line)?;
            Ok(Segment::CallerRef(inner.to_string()))
        }
        Some(position) => {
            let digits = &inner[..position];
            let name = &inner[position + 1..];
            check_reference_name(name, inner, line)?;

            let depth = if digits.is_empty() {
                None
            } else if !digits.bytes().all(|byte| byte.is_ascii_digit()) {
                return Err(malformed_reference(inner, line, "reference depth must be numeric"));
            } else {
                let depth: usize = digits
                    .parse()
                    .map_err(|_| malformed_reference(inner, line, "reference depth out of range"))?;
                if depth == 0 {
                    return Err(malformed_reference(inner, line, "reference depth must be positive"));
                }
                Some(depth)
            };

            Ok(Segment::PointerRef {
                depth,
                name: name.to_string(),
            })
        }
    }
}

fn check_reference_name(name: &str, inner: &str, line: usize) -> Result<(), ParseError> {
    if name.is_empty() {
        return Err(malformed_reference(inner, line, "empty randomizer name"));
    }
    if !is_identifier(name) {
        return Err(malformed_reference(inner, line, "invalid randomizer name"));
    }
    Ok(())
}

fn malformed_reference(inner: &str, line: usize, reason: &str) -> ParseError {
    ParseError::MalformedReference {
        line,
        snippet: format!("{{{}}}", inner),
        reason: reason.to_string(),
    }
}
