//! Search constraints and the library-specification grammar.
//!
//! A [`ConstraintSet`] maps metadata field names to per-field conditions,
//! combined conjunctively by [`super::SpectrumLibrary::search`]. The same
//! conditions can be written as a compact spec string:
//!
//! ```text
//! spec       = name [ "[" constraint { "," constraint } "]" ]
//! constraint = key "=" literal               equality
//!            | literal "<" key "<" literal   open range
//! literal    = number | bare-string
//! ```
//!
//! so `turbo_grid[Teff=5000,0.1<e_bv<0.5]` names the library `turbo_grid`
//! and asks for entries with `Teff` equal to 5000 and `e_bv` strictly
//! between 0.1 and 0.5. Literals parse as integers first, then reals, and
//! fall back to strings. Keys may contain brackets (`[Fe/H]` is a valid
//! field name); only the outermost bracket pair delimits the constraint
//! list. When the same key appears twice the later constraint wins. A
//! parsed [`LibrarySpec`] displays in the same grammar, with constraints
//! in field order.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::library::{LibraryEntry, LibraryError, SpectrumLibrary};
use crate::metadata::{MetadataValue, ValueKind};

/// A condition on one metadata field.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// The field's value equals the given value.
    Equals(MetadataValue),
    /// The field's value lies strictly between the bounds (open interval).
    Between(MetadataValue, MetadataValue),
}

impl Constraint {
    /// Whether this constraint can match values of a field declared `kind`.
    ///
    /// Range bounds of mixed kinds can never match anything.
    pub(crate) fn matches_kind(&self, kind: ValueKind) -> bool {
        match self {
            Constraint::Equals(value) => value.kind() == kind,
            Constraint::Between(lo, hi) => lo.kind() == hi.kind() && lo.kind() == kind,
        }
    }
}

/// A set of per-field constraints, anded together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    constraints: BTreeMap<String, Constraint>,
}

impl ConstraintSet {
    /// An empty set; it matches every entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality constraint, consuming and returning the set.
    pub fn equals(mut self, field: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.constraints
            .insert(field.into(), Constraint::Equals(value.into()));
        self
    }

    /// Add an open-range constraint, consuming and returning the set.
    pub fn between(
        mut self,
        field: impl Into<String>,
        lo: impl Into<MetadataValue>,
        hi: impl Into<MetadataValue>,
    ) -> Self {
        self.constraints
            .insert(field.into(), Constraint::Between(lo.into(), hi.into()));
        self
    }

    /// Set the constraint for `field`, replacing any previous one.
    pub fn insert(&mut self, field: impl Into<String>, constraint: Constraint) {
        self.constraints.insert(field.into(), constraint);
    }

    /// Overlay `other` on this set; `other` wins on shared fields.
    pub fn merge(&mut self, other: &ConstraintSet) {
        for (field, constraint) in other.iter() {
            self.constraints.insert(field.clone(), constraint.clone());
        }
    }

    /// The constraint on `field`, if any.
    pub fn get(&self, field: &str) -> Option<&Constraint> {
        self.constraints.get(field)
    }

    /// Number of constrained fields.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Whether the set is empty (matches everything).
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Iterate over `(field, constraint)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Constraint)> {
        self.constraints.iter()
    }
}

/// A parsed library specification: a name plus search constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct LibrarySpec {
    /// The library's directory name under the workspace.
    pub name: String,
    /// Constraints from the bracketed list, empty when none was given.
    pub constraints: ConstraintSet,
}

impl fmt::Display for LibrarySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.constraints.is_empty() {
            return Ok(());
        }
        f.write_str("[")?;
        for (i, (field, constraint)) in self.constraints.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match constraint {
                Constraint::Equals(value) => write!(f, "{field}={value}")?,
                Constraint::Between(lo, hi) => write!(f, "{lo}<{field}<{hi}")?,
            }
        }
        f.write_str("]")
    }
}

/// Parse a library-specification string.
///
/// Anything that does not match the grammar fails with
/// [`LibraryError::BadLibrarySpec`] naming the offending part.
pub fn parse_library_spec(spec: &str) -> Result<LibrarySpec, LibraryError> {
    let bad = |reason: String| LibraryError::BadLibrarySpec {
        spec: spec.to_string(),
        reason,
    };

    let trimmed = spec.trim();
    let (name, constraint_src) = match trimmed.find('[') {
        None => (trimmed, None),
        Some(open) => {
            if !trimmed.ends_with(']') {
                return Err(bad("expected closing ']' at the end".to_string()));
            }
            (
                &trimmed[..open],
                Some(&trimmed[open + 1..trimmed.len() - 1]),
            )
        }
    };

    if name.is_empty() {
        return Err(bad("library name is empty".to_string()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(bad(format!(
            "library name {name:?} must not contain path separators"
        )));
    }

    let mut constraints = ConstraintSet::new();
    if let Some(src) = constraint_src {
        if src.trim().is_empty() {
            return Err(bad("empty constraint list".to_string()));
        }
        for token in src.split(',') {
            let token = token.trim();
            let (field, constraint) = parse_constraint(token).map_err(&bad)?;
            constraints.insert(field, constraint);
        }
    }

    Ok(LibrarySpec {
        name: name.to_string(),
        constraints,
    })
}

fn parse_constraint(token: &str) -> Result<(String, Constraint), String> {
    if token.is_empty() {
        return Err("empty constraint".to_string());
    }
    if token.contains('>') {
        return Err(format!("{token:?}: ranges are written lo<key<hi"));
    }

    let angle_parts: Vec<&str> = token.split('<').collect();
    match angle_parts.len() {
        1 => {
            let Some((key, literal)) = token.split_once('=') else {
                return Err(format!("{token:?} is neither key=value nor lo<key<hi"));
            };
            let (key, literal) = (key.trim(), literal.trim());
            if key.is_empty() {
                return Err(format!("{token:?}: empty key"));
            }
            if literal.is_empty() {
                return Err(format!("{token:?}: empty value"));
            }
            if literal.contains('=') {
                return Err(format!("{token:?}: more than one '='"));
            }
            Ok((key.to_string(), Constraint::Equals(MetadataValue::parse(literal))))
        }
        3 => {
            let (lo, key, hi) = (
                angle_parts[0].trim(),
                angle_parts[1].trim(),
                angle_parts[2].trim(),
            );
            if key.is_empty() {
                return Err(format!("{token:?}: empty key"));
            }
            if key.contains('=') || lo.contains('=') || hi.contains('=') {
                return Err(format!("{token:?}: '=' inside a range"));
            }
            if lo.is_empty() || hi.is_empty() {
                return Err(format!("{token:?}: missing range bound"));
            }
            Ok((
                key.to_string(),
                Constraint::Between(MetadataValue::parse(lo), MetadataValue::parse(hi)),
            ))
        }
        _ => Err(format!("{token:?}: a range has exactly two '<'")),
    }
}

/// Parse `spec`, open the named library under `workspace` read-only and
/// run the search.
///
/// `extra_constraints` are overlaid on the parsed ones (extra wins on
/// shared fields). Returns the open library together with the matching
/// entries so callers can go on to load payloads or metadata.
pub fn open_and_search(
    spec: &str,
    workspace: &Path,
    extra_constraints: Option<&ConstraintSet>,
) -> Result<(SpectrumLibrary, Vec<LibraryEntry>), LibraryError> {
    let parsed = parse_library_spec(spec)?;
    let mut constraints = parsed.constraints;
    if let Some(extra) = extra_constraints {
        constraints.merge(extra);
    }
    let library = SpectrumLibrary::open_read_only(workspace.join(&parsed.name))?;
    let entries = library.search(&constraints)?;
    Ok((library, entries))
}
