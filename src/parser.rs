// File: ./src/parser.rs
// GEDCOM 5.5.1 tokenizer and record assembler.
//
// Grammar per line: `<level> [<xref>] <tag> [<value>]`. Cross-references are
// `@…@`-delimited. A malformed level or missing tag aborts the whole parse;
// assembly depends on level correctness, so no partial file is ever returned.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One tokenized GEDCOM line.
///
/// `xref` and `pointer` are stored without their `@` delimiters, so they
/// compare directly against `Record::id`. `value` is whitespace-preserving:
/// everything after the single space following the tag is kept verbatim.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Line {
    pub level: u8,
    pub xref: Option<String>,
    pub tag: String,
    pub value: String,
    /// Set when `value` is a single `@…@` cross-reference to another record.
    pub pointer: Option<String>,
}

// Serialized because diagnostics carry the offending record kind across the
// persistence/UI boundary.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Individual,
    Family,
    Header,
    Trailer,
    Source,
    Object,
    Other,
}

impl RecordKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "INDI" => RecordKind::Individual,
            "FAM" => RecordKind::Family,
            "HEAD" => RecordKind::Header,
            "TRLR" => RecordKind::Trailer,
            "SOUR" => RecordKind::Source,
            "OBJE" => RecordKind::Object,
            _ => RecordKind::Other,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Individual => "individual",
            RecordKind::Family => "family",
            RecordKind::Header => "header",
            RecordKind::Trailer => "trailer",
            RecordKind::Source => "source",
            RecordKind::Object => "object",
            RecordKind::Other => "other",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ParseError {
    InvalidLevel { line: usize, token: String },
    MissingTag { line: usize },
    OrphanLine { line: usize, tag: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidLevel { line, token } => {
                write!(f, "line {}: invalid or missing level '{}'", line, token)
            }
            ParseError::MissingTag { line } => write!(f, "line {}: missing tag", line),
            ParseError::OrphanLine { line, tag } => {
                write!(f, "line {}: '{}' at level >= 1 outside of any record", line, tag)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// A top-level GEDCOM record: its source lines in original order plus a
/// tag index over every descendant line. Built once by `RecordBuilder`,
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct Record {
    pub kind: RecordKind,
    pub id: Option<String>,
    lines: Vec<Line>,
    index: HashMap<String, Vec<usize>>,
}

impl Record {
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Indices of every descendant line carrying `tag`, in document order.
    pub fn descendant_indices(&self, tag: &str) -> &[usize] {
        self.index.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First direct child (level 1) carrying `tag`.
    pub fn find_child(&self, tag: &str) -> Option<usize> {
        self.descendant_indices(tag)
            .iter()
            .copied()
            .find(|&i| self.lines[i].level == 1)
    }

    /// All direct children (level 1) carrying `tag`, in document order.
    pub fn children(&self, tag: &str) -> Vec<usize> {
        self.descendant_indices(tag)
            .iter()
            .copied()
            .filter(|&i| self.lines[i].level == 1)
            .collect()
    }

    /// Value of the first direct child carrying `tag`.
    pub fn child_value(&self, tag: &str) -> Option<&str> {
        self.find_child(tag).map(|i| self.lines[i].value.as_str())
    }

    /// The sub-tree under the line at `idx`: every following line whose
    /// level is strictly greater, stopping at the first sibling or uncle.
    pub fn subtree(&self, idx: usize) -> &[Line] {
        let parent_level = self.lines[idx].level;
        let start = idx + 1;
        let mut end = start;
        while end < self.lines.len() && self.lines[end].level > parent_level {
            end += 1;
        }
        &self.lines[start..end]
    }

    /// Walk a chain of tags from the record root, one nesting level at a
    /// time, and return the value at the end of the chain. Used for header
    /// queries like HEAD > GEDC > VERS.
    pub fn nested_value(&self, path: &[&str]) -> Option<&str> {
        let mut idx = self.find_child(path.first()?)?;
        for tag in &path[1..] {
            let want_level = self.lines[idx].level + 1;
            let sub_end = idx + 1 + self.subtree(idx).len();
            idx = (idx + 1..sub_end)
                .find(|&i| self.lines[i].level == want_level && self.lines[i].tag == *tag)?;
        }
        Some(self.lines[idx].value.as_str())
    }
}

/// Append-then-finalize builder: lines are appended in source order and
/// entered into the tag index as they arrive; `finish` yields the immutable
/// record, so the index can never drift from the line list.
struct RecordBuilder {
    kind: RecordKind,
    id: Option<String>,
    lines: Vec<Line>,
    index: HashMap<String, Vec<usize>>,
}

impl RecordBuilder {
    fn new(line: Line) -> Self {
        let mut builder = RecordBuilder {
            kind: RecordKind::from_tag(&line.tag),
            id: line.xref.clone(),
            lines: Vec::new(),
            index: HashMap::new(),
        };
        builder.push(line);
        builder
    }

    fn push(&mut self, line: Line) {
        self.index
            .entry(line.tag.clone())
            .or_default()
            .push(self.lines.len());
        self.lines.push(line);
    }

    fn finish(self) -> Record {
        Record {
            kind: self.kind,
            id: self.id,
            lines: self.lines,
            index: self.index,
        }
    }
}

/// The result of one parse call. Immutable; records are grouped by kind and
/// kept in file order within each group.
#[derive(Debug, Clone, Default)]
pub struct GedcomFile {
    pub header: Option<Record>,
    pub trailer: Option<Record>,
    pub individuals: Vec<Record>,
    pub families: Vec<Record>,
    pub sources: Vec<Record>,
    pub objects: Vec<Record>,
    /// Unrecognized top-level records, preserved to avoid silent data loss.
    pub others: Vec<Record>,
    pub version: Option<String>,
    pub charset: Option<String>,
    pub source_system: Option<String>,
    pub transmission_date: Option<NaiveDate>,
}

impl GedcomFile {
    fn place(&mut self, record: Record) {
        match record.kind {
            RecordKind::Header => self.header = Some(record),
            RecordKind::Trailer => self.trailer = Some(record),
            RecordKind::Individual => self.individuals.push(record),
            RecordKind::Family => self.families.push(record),
            RecordKind::Source => self.sources.push(record),
            RecordKind::Object => self.objects.push(record),
            RecordKind::Other => self.others.push(record),
        }
    }

    /// Look up a source record by bare xref id (no `@` delimiters).
    pub fn source_by_id(&self, id: &str) -> Option<&Record> {
        self.sources.iter().find(|r| r.id.as_deref() == Some(id))
    }

    /// Look up a media object record by bare xref id.
    pub fn object_by_id(&self, id: &str) -> Option<&Record> {
        self.objects.iter().find(|r| r.id.as_deref() == Some(id))
    }
}

/// Tokenize a single non-blank line. `lineno` is 1-based and only used for
/// error reporting.
fn tokenize_line(raw: &str, lineno: usize) -> Result<Line, ParseError> {
    let raw = raw.strip_suffix('\r').unwrap_or(raw);
    let rest = raw.trim_start();

    let (level_token, rest) = match rest.split_once(' ') {
        Some((first, rest)) => (first, rest),
        None => (rest, ""),
    };
    let level: u8 = level_token.parse().map_err(|_| ParseError::InvalidLevel {
        line: lineno,
        token: level_token.to_string(),
    })?;

    // Optional xref between level and tag: `0 @I1@ INDI`.
    let rest = rest.trim_start();
    let (xref, rest) = if let Some(stripped) = rest.strip_prefix('@')
        && let Some(end) = stripped.find('@')
    {
        (Some(stripped[..end].to_string()), stripped[end + 1..].trim_start())
    } else {
        (None, rest)
    };

    // Tag runs to the first space; everything after that one space is the
    // value, verbatim.
    let (tag, value) = match rest.split_once(' ') {
        Some((tag, value)) => (tag, value),
        None => (rest, ""),
    };
    if tag.is_empty() {
        return Err(ParseError::MissingTag { line: lineno });
    }

    let pointer = parse_pointer(value);

    Ok(Line {
        level,
        xref,
        tag: tag.to_string(),
        value: value.to_string(),
        pointer,
    })
}

/// A value that is exactly one `@…@` token is a pointer to another record.
fn parse_pointer(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let inner = trimmed.strip_prefix('@')?.strip_suffix('@')?;
    if inner.is_empty() || inner.contains('@') {
        return None;
    }
    Some(inner.to_string())
}

/// Parse a complete decoded GEDCOM text into a `GedcomFile`.
///
/// Blank lines are skipped. Any tokenizer error is fatal for the whole
/// parse. Level jumps deeper than +1 are tolerated (real producers emit
/// them and sub-tree resolution is relative), but a nested line arriving
/// before any record has opened leaves assembly undefined and is rejected.
pub fn parse(text: &str) -> Result<GedcomFile, ParseError> {
    let mut file = GedcomFile::default();
    let mut open: Option<RecordBuilder> = None;

    for (i, raw) in text.lines().enumerate() {
        let lineno = i + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let line = tokenize_line(raw, lineno)?;

        if line.level == 0 {
            if let Some(builder) = open.take() {
                file.place(builder.finish());
            }
            open = Some(RecordBuilder::new(line));
        } else {
            match open.as_mut() {
                Some(builder) => builder.push(line),
                None => {
                    return Err(ParseError::OrphanLine {
                        line: lineno,
                        tag: line.tag,
                    });
                }
            }
        }
    }
    if let Some(builder) = open.take() {
        file.place(builder.finish());
    }

    if let Some(header) = &file.header {
        file.version = header.nested_value(&["GEDC", "VERS"]).map(str::to_string);
        file.charset = header.child_value("CHAR").map(str::to_string);
        file.source_system = header.child_value("SOUR").map(str::to_string);
        // Transmission date is best effort; GEDCOM writes `2 JAN 2024`.
        file.transmission_date = header
            .child_value("DATE")
            .and_then(|v| NaiveDate::parse_from_str(v.trim(), "%d %b %Y").ok());
    }

    Ok(file)
}
