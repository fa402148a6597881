//! # Field Paths
//!
//! A `FieldPath` names a location inside a document using the same
//! notation operators see in error output:
//! `emissions_reports[0].tech_carbon_standard.direct_emissions.servers.emissions`.
//!
//! Paths are built bottom-up: leaf constructors report errors relative
//! to themselves and each enclosing constructor re-roots the error with
//! [`FieldPath::prefixed`].

use std::fmt;

/// One step in a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A named object member.
    Field(String),
    /// A position in an array.
    Index(usize),
}

/// A location inside a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// The document root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Path consisting of a single named member.
    pub fn of(name: &str) -> Self {
        Self::root().field(name)
    }

    /// Extend with a named member.
    pub fn field(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Field(name.to_string()));
        Self { segments }
    }

    /// Extend with an array index.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    /// Re-root this path under `prefix`.
    pub fn prefixed(&self, prefix: &FieldPath) -> Self {
        let mut segments = prefix.segments.clone();
        segments.extend(self.segments.iter().cloned());
        Self { segments }
    }

    /// Convert an RFC 6901 JSON Pointer (as produced by schema validators)
    /// into a field path. Escapes `~1` and `~0` are decoded; segments made
    /// only of ASCII digits become array indices.
    pub fn from_json_pointer(pointer: &str) -> Self {
        let segments = pointer
            .split('/')
            .skip(1)
            .map(|raw| {
                let decoded = raw.replace("~1", "/").replace("~0", "~");
                match decoded.parse::<usize>() {
                    Ok(i) if !decoded.is_empty() && decoded.bytes().all(|b| b.is_ascii_digit()) => {
                        Segment::Index(i)
                    }
                    _ => Segment::Field(decoded),
                }
            })
            .collect();
        Self { segments }
    }

    /// Whether this is the document root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The individual segments, outermost first.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("(root)");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => f.write_str(name)?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}
