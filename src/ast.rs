use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::utils::ParseError;

/// A single unit of an interpolated template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Segment {
    /// Literal text, spliced into the output verbatim
    Text(String),
    /// `{NAME}`: evaluate the named randomizer in place
    CallerRef(String),
    /// `{<NAME}` or `{2<NAME}`: without a depth this behaves like a
    /// caller reference; with a depth it splices the n-th most recent
    /// output the named randomizer produced during the current evaluation
    PointerRef { depth: Option<usize>, name: String },
}

/// An interpolated string: literal text interleaved with references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct StringTemplate {
    /// The segments in splice order
    pub segments: Vec<Segment>,
}

impl StringTemplate {
    /// Create a template consisting of a single literal text run
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut template = StringTemplate::default();
        template.push_text(&text);
        template
    }

    /// Create a template from segments.
    ///
    /// Empty text runs are dropped and adjacent text runs are merged, so
    /// the result compares equal to what the parser produces for the same
    /// content.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        let mut template = StringTemplate::default();
        for segment in segments {
            template.push(segment);
        }
        template
    }

    /// Parse a one-line template, e.g. `"Hello, {NAME}!"`
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        crate::parser::scan_template(source, 1)
    }

    /// Whether the template has no segments at all
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a literal text run, merging with a trailing text segment
    pub(crate) fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Segment::Text(existing)) = self.segments.last_mut() {
            existing.push_str(text);
        } else {
            self.segments.push(Segment::Text(text.to_string()));
        }
    }

    /// Append a segment, routing text through [`Self::push_text`]
    pub(crate) fn push(&mut self, segment: Segment) {
        match segment {
            Segment::Text(text) => self.push_text(&text),
            other => self.segments.push(other),
        }
    }

    /// Names referenced by this template, in splice order
    pub(crate) fn reference_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Text(_) => None,
            Segment::CallerRef(name) => Some(name.as_str()),
            Segment::PointerRef { name, .. } => Some(name.as_str()),
        })
    }

    /// Names this template evaluates (as opposed to splicing recorded
    /// output): caller references and depth-less pointers
    pub(crate) fn live_reference_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::CallerRef(name) => Some(name.as_str()),
            Segment::PointerRef { depth: None, name } => Some(name.as_str()),
            _ => None,
        })
    }
}

/// The body of a randomizer definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Body {
    /// A single template, expanded as-is
    Literal(StringTemplate),
    /// Uniform random pick between the items
    List(Vec<StringTemplate>),
    /// Random pick weighted by the attached positive weights
    WeightedList(Vec<(u32, StringTemplate)>),
    /// Round-robin over the items; the cursor persists across evaluations
    RotateList(Vec<StringTemplate>),
    /// `first` on the first evaluation, `subsequent` on every later one
    IfBranch {
        first: StringTemplate,
        subsequent: StringTemplate,
    },
    /// The template expanded `count` times, concatenated without separator
    Repeater { count: u32, template: StringTemplate },
}

impl Body {
    /// All templates contained in this body
    pub(crate) fn templates(&self) -> Vec<&StringTemplate> {
        match self {
            Body::Literal(template) | Body::Repeater { template, .. } => vec![template],
            Body::List(items) | Body::RotateList(items) => items.iter().collect(),
            Body::WeightedList(items) => items.iter().map(|(_, template)| template).collect(),
            Body::IfBranch { first, subsequent } => vec![first, subsequent],
        }
    }
}

/// A named randomizer definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RandomizerDef {
    /// The name other definitions reference this one by
    pub name: String,
    /// What evaluating this definition does
    pub body: Body,
}

impl RandomizerDef {
    /// Create a definition from a name and a body
    pub fn new(name: impl Into<String>, body: Body) -> Self {
        RandomizerDef {
            name: name.into(),
            body,
        }
    }
}

/// An ordered collection of randomizer definitions.
///
/// Order is the declaration order of the source text and is preserved for
/// deterministic iteration; name lookup goes through the
/// [`Registry`](crate::registry::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    defs: Vec<RandomizerDef>,
}

impl Document {
    /// Build a document from definitions, enforcing the same invariants
    /// the parser does: identifier names, unique names, non-empty item
    /// lists, positive weights and pointer depths, single-line item
    /// templates. Errors report the 1-based definition position where the
    /// parser would report a line number.
    pub fn new(defs: Vec<RandomizerDef>) -> Result<Self, ParseError> {
        let mut seen = HashSet::new();
        for (index, def) in defs.iter().enumerate() {
            let position = index + 1;
            if !is_identifier(&def.name) {
                return Err(ParseError::UnexpectedToken {
                    line: position,
                    snippet: def.name.clone(),
                    reason: "randomizer name must be an identifier".to_string(),
                });
            }
            if !seen.insert(def.name.as_str()) {
                return Err(ParseError::DuplicateName {
                    name: def.name.clone(),
                    line: position,
                });
            }
            validate_body(&def.name, &def.body, position)?;
        }
        Ok(Document { defs })
    }

    /// Construct without validation; the parser has already enforced the
    /// document invariants with real line numbers
    pub(crate) fn from_defs(defs: Vec<RandomizerDef>) -> Self {
        Document { defs }
    }

    /// The definitions in declaration order
    pub fn defs(&self) -> &[RandomizerDef] {
        &self.defs
    }

    /// Look up a definition by name (linear scan; the registry indexes)
    pub fn get(&self, name: &str) -> Option<&RandomizerDef> {
        self.defs.iter().find(|def| def.name == name)
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether the document has no definitions
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Iterate the definitions in declaration order
    pub fn iter(&self) -> std::slice::Iter<'_, RandomizerDef> {
        self.defs.iter()
    }
}

/// Check the `[A-Za-z_][A-Za-z0-9_]*` identifier shape
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_body(name: &str, body: &Body, position: usize) -> Result<(), ParseError> {
    let empty_body = || ParseError::EmptyBody {
        name: name.to_string(),
        line: position,
    };

    match body {
        Body::Literal(template) => validate_references(template, position)?,
        Body::List(items) | Body::RotateList(items) => {
            if items.is_empty() {
                return Err(empty_body());
            }
            for item in items {
                validate_item(item, position)?;
            }
        }
        Body::WeightedList(items) => {
            if items.is_empty() {
                return Err(empty_body());
            }
            for (weight, item) in items {
                if *weight == 0 {
                    return Err(ParseError::UnexpectedToken {
                        line: position,
                        snippet: format!("0- {}", item),
                        reason: "weight must be positive".to_string(),
                    });
                }
                validate_item(item, position)?;
            }
        }
        Body::IfBranch { first, subsequent } => {
            validate_item(first, position)?;
            validate_item(subsequent, position)?;
        }
        Body::Repeater { template, .. } => validate_item(template, position)?,
    }
    Ok(())
}

/// Item templates live on a single source line, so embedded newlines
/// cannot round-trip; only literals (via the long form) may span lines
fn validate_item(template: &StringTemplate, position: usize) -> Result<(), ParseError> {
    validate_references(template, position)?;
    for segment in &template.segments {
        if let Segment::Text(text) = segment {
            if text.contains('\n') {
                return Err(ParseError::UnexpectedToken {
                    line: position,
                    snippet: template.to_string(),
                    reason: "item template cannot span lines".to_string(),
                });
            }
        }
    }
    Ok(())
}

fn validate_references(template: &StringTemplate, position: usize) -> Result<(), ParseError> {
    for segment in &template.segments {
        match segment {
            Segment::Text(_) => {}
            Segment::PointerRef { depth: Some(0), name } => {
                return Err(ParseError::MalformedReference {
                    line: position,
                    snippet: format!("{{0<{}}}", name),
                    reason: "reference depth must be positive".to_string(),
                });
            }
            Segment::CallerRef(name) | Segment::PointerRef { name, .. } => {
                if !is_identifier(name) {
                    return Err(ParseError::MalformedReference {
                        line: position,
                        snippet: name.clone(),
                        reason: "invalid randomizer name".to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Whether a rendered literal must be printed in the `|` long form to
/// survive a reparse: embedded newlines, blank content, or a first
/// character that would read as a body marker
fn needs_long_form(rendered: &str) -> bool {
    rendered.contains('\n') || rendered.trim().is_empty() || looks_like_marker(rendered)
}

fn looks_like_marker(line: &str) -> bool {
    match line.chars().next() {
        Some('-') | Some('+') | Some('|') => true,
        Some(c) if c.is_ascii_digit() => {
            let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
            rest.starts_with('-') || rest.starts_with('*')
        }
        _ => false,
    }
}

impl fmt::Display for StringTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => f.write_str(text)?,
                Segment::CallerRef(name) => write!(f, "{{{}}}", name)?,
                Segment::PointerRef { depth: None, name } => write!(f, "{{<{}}}", name)?,
                Segment::PointerRef {
                    depth: Some(depth),
                    name,
                } => write!(f, "{{{}<{}}}", depth, name)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for RandomizerDef {
    /// Canonical source form: parsing the rendered text yields this
    /// definition back
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        match &self.body {
            Body::Literal(template) => {
                let rendered = template.to_string();
                if needs_long_form(&rendered) {
                    for line in rendered.split('\n') {
                        if line.is_empty() {
                            write!(f, "\n|")?;
                        } else {
                            write!(f, "\n| {}", line)?;
                        }
                    }
                } else {
                    write!(f, "\n{}", rendered)?;
                }
            }
            Body::List(items) => {
                for item in items {
                    write!(f, "\n- {}", item)?;
                }
            }
            Body::WeightedList(items) => {
                for (weight, item) in items {
                    write!(f, "\n{}- {}", weight, item)?;
                }
            }
            Body::RotateList(items) => {
                for item in items {
                    write!(f, "\n+ {}", item)?;
                }
            }
            Body::IfBranch { first, subsequent } => {
                write!(f, "\n- {}", first)?;
                write!(f, "\n+ {}", subsequent)?;
            }
            Body::Repeater { count, template } => {
                write!(f, "\n{}*{}", count, template)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, def) in self.defs.iter().enumerate() {
            if index > 0 {
                write!(f, "\n\n")?;
            }
            write!(f, "{}", def)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_template_display() {
        let template = StringTemplate::from_segments(vec![
            Segment::Text("Hello, ".to_string()),
            Segment::CallerRef("NAME".to_string()),
            Segment::Text("!".to_string()),
        ]);
        assert_eq!(template.to_string(), "Hello, {NAME}!");

        let template = StringTemplate::from_segments(vec![
            Segment::PointerRef {
                depth: None,
                name: "A".to_string(),
            },
            Segment::Text(" ".to_string()),
            Segment::PointerRef {
                depth: Some(2),
                name: "B".to_string(),
            },
        ]);
        assert_eq!(template.to_string(), "{<A} {2<B}");
    }

    #[test]
    fn test_from_segments_merges_text_runs() {
        let merged = StringTemplate::from_segments(vec![
            Segment::Text("ab".to_string()),
            Segment::Text("".to_string()),
            Segment::Text("cd".to_string()),
        ]);
        assert_eq!(merged, StringTemplate::text("abcd"));
        assert_eq!(merged.segments.len(), 1);
    }

    #[test]
    fn test_def_display_every_body_form() {
        let source = "\
BARE
plain {X} text

LONG
| first
|
| third

PICK
- one
- two

WEIGHTED
3- common
1- rare

ROTATE
+ alpha
+ beta

BRANCH
- first time
+ afterwards

REPEAT
4*{X}

X
x";
        let doc = parse(source).unwrap();
        assert_eq!(doc.to_string(), source);
    }

    #[test]
    fn test_parse_is_left_inverse_of_display() {
        let source = "\
GREETING
Hello, {NAME}!

NAME
- Ann
- Bo";
        let doc = parse(source).unwrap();
        let reparsed = parse(&doc.to_string()).unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn test_marker_colliding_literal_uses_long_form() {
        let def = RandomizerDef::new("DASH", Body::Literal(StringTemplate::text("- not a list")));
        let doc = Document::new(vec![def]).unwrap();
        assert_eq!(doc.to_string(), "DASH\n| - not a list");

        let reparsed = parse(&doc.to_string()).unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn test_empty_and_blank_literals_round_trip() {
        let empty = RandomizerDef::new("EMPTY", Body::Literal(StringTemplate::default()));
        let blank = RandomizerDef::new("BLANK", Body::Literal(StringTemplate::text("   ")));
        let doc = Document::new(vec![empty, blank]).unwrap();
        assert_eq!(doc.to_string(), "EMPTY\n|\n\nBLANK\n|    ");

        let reparsed = parse(&doc.to_string()).unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn test_document_rejects_duplicate_names() {
        let defs = vec![
            RandomizerDef::new("A", Body::Literal(StringTemplate::text("x"))),
            RandomizerDef::new("A", Body::Literal(StringTemplate::text("y"))),
        ];
        let err = Document::new(defs).unwrap_err();
        assert_eq!(
            err,
            ParseError::DuplicateName {
                name: "A".to_string(),
                line: 2,
            }
        );
    }

    #[test]
    fn test_document_rejects_bad_shapes() {
        let err = Document::new(vec![RandomizerDef::new("X", Body::List(vec![]))]).unwrap_err();
        assert!(matches!(err, ParseError::EmptyBody { .. }));

        let err = Document::new(vec![RandomizerDef::new(
            "X",
            Body::WeightedList(vec![(0, StringTemplate::text("never"))]),
        )])
        .unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));

        let err = Document::new(vec![RandomizerDef::new(
            "bad name",
            Body::Literal(StringTemplate::text("x")),
        )])
        .unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));

        let err = Document::new(vec![RandomizerDef::new(
            "X",
            Body::Literal(StringTemplate::from_segments(vec![Segment::PointerRef {
                depth: Some(0),
                name: "X".to_string(),
            }])),
        )])
        .unwrap_err();
        assert!(matches!(err, ParseError::MalformedReference { .. }));

        let err = Document::new(vec![RandomizerDef::new(
            "X",
            Body::List(vec![StringTemplate::text("two\nlines")]),
        )])
        .unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn test_document_lookup() {
        let doc = parse("A\na\n\nB\nb").unwrap();
        assert_eq!(doc.len(), 2);
        assert!(!doc.is_empty());
        assert_eq!(doc.get("B").unwrap().name, "B");
        assert!(doc.get("C").is_none());

        let names: Vec<&str> = doc.iter().map(|def| def.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_document_serializes_to_json() {
        let doc = parse("COIN\n- heads\n- tails").unwrap();
        let value = serde_json::to_value(&doc).unwrap();
        let items = &value["defs"][0]["body"]["List"];
        assert_eq!(items[0]["segments"][0]["Text"], "heads");
        assert_eq!(items[1]["segments"][0]["Text"], "tails");
    }
}
