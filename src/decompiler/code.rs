use serde::{Deserialize, Serialize};

/// What an annotation says about its range of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationKind {
    /// The text was produced from the instruction at `offset`
    Offset { offset: u64 },
}

/// A tagged byte range `[start, end)` of decompiled text.
///
/// Ranges are taken as reported by the backend and are not checked against
/// the text they annotate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeAnnotation {
    pub start: usize,
    pub end: usize,
    #[serde(flatten)]
    pub kind: AnnotationKind,
}

impl CodeAnnotation {
    #[must_use]
    pub fn offset(start: usize, end: usize, offset: u64) -> Self {
        Self {
            start,
            end,
            kind: AnnotationKind::Offset { offset },
        }
    }

    #[must_use]
    pub fn contains(&self, position: usize) -> bool {
        (self.start..self.end).contains(&position)
    }
}

/// Decompiled source text plus its annotations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecompiledCode {
    pub code: String,
    pub annotations: Vec<CodeAnnotation>,
}

impl DecompiledCode {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            annotations: Vec::new(),
        }
    }

    /// A result that only carries a message for the user
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message)
    }

    pub fn add_annotation(&mut self, annotation: CodeAnnotation) {
        self.annotations.push(annotation);
    }

    /// Annotations that point at `offset`
    pub fn annotations_at(&self, offset: u64) -> impl Iterator<Item = &CodeAnnotation> {
        self.annotations.iter().filter(move |annotation| {
            matches!(annotation.kind, AnnotationKind::Offset { offset: o } if o == offset)
        })
    }

    /// First annotation whose range covers the text `position`
    #[must_use]
    pub fn annotation_for_position(&self, position: usize) -> Option<&CodeAnnotation> {
        self.annotations
            .iter()
            .find(|annotation| annotation.contains(position))
    }
}
