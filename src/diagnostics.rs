//! Structured diagnostics emitted while compiling a template.
//!
//! Every rejected attribute, dropped element, or malformed URI is recorded as
//! a [`Diagnostic`] in a caller-supplied [`MessageQueue`]. Compilation always
//! produces best-effort safe output; callers inspect
//! [`MessageQueue::max_severity`] to decide whether the result is acceptable.

use std::fmt;

/// A location in an input source, used for diagnostics and for the metadata
/// passed to the uncaught-exception hook of script blocks.
///
/// Document nodes have a line only when the extractor recorded one with
/// [`ExtractedContent::set_position`](crate::ExtractedContent::set_position);
/// otherwise diagnostics name the document source with line 0.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FilePosition {
    /// Identifies the input, typically a URI or file path.
    pub source: String,
    /// 1-based line number, or 0 when unknown.
    pub line: u32,
}

impl FilePosition {
    /// Create a position at `line` of `source`.
    pub fn new(source: impl Into<String>, line: u32) -> Self {
        Self {
            source: source.into(),
            line,
        }
    }

    /// A position within `source` whose line is not known.
    pub fn in_source(source: impl Into<String>) -> Self {
        Self::new(source, 0)
    }

    pub fn unknown() -> Self {
        Self::default()
    }
}

impl fmt::Display for FilePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.source.is_empty(), self.line) {
            (true, _) => f.write_str("<unknown>"),
            (false, 0) => f.write_str(&self.source),
            (false, line) => write!(f, "{}:{}", self.source, line),
        }
    }
}

/// Severity of a diagnostic, ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Lint,
    Warning,
    Error,
    /// Aborts the affected unit.
    FatalError,
}

/// The kinds of problem the compiler reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A URI attribute could not be parsed or was refused by the URI policy.
    MalformedUri,
    /// An element not allowed by the whitelist was dropped.
    DisallowedElement,
    /// An attribute not allowed on its element was dropped.
    DisallowedAttribute,
    /// An attribute value failed the whitelist's value criterion.
    BadAttributeValue,
    /// An identifier-valued attribute contained an illegal or reserved name.
    IllegalName,
    /// A required attribute was absent and no safe value is known.
    MissingAttribute,
    /// An extracted script or style body was missing or unusable.
    UnsafeInlineContent,
    /// The same identifier was declared twice.
    DuplicateIdentifier,
}

impl DiagnosticKind {
    /// The severity this kind is reported at unless a caller overrides it.
    pub fn default_severity(self) -> Severity {
        match self {
            DiagnosticKind::DisallowedElement
            | DiagnosticKind::DisallowedAttribute
            | DiagnosticKind::BadAttributeValue
            | DiagnosticKind::MalformedUri
            | DiagnosticKind::UnsafeInlineContent => Severity::Warning,
            DiagnosticKind::IllegalName | DiagnosticKind::MissingAttribute => Severity::Error,
            DiagnosticKind::DuplicateIdentifier => Severity::FatalError,
        }
    }
}

/// A single structured diagnostic record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub position: FilePosition,
    pub params: Vec<String>,
}

impl Diagnostic {
    /// Create a diagnostic at the kind's default severity.
    pub fn new(kind: DiagnosticKind, position: FilePosition, params: Vec<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            position,
            params,
        }
    }

    /// Override the severity implied by the kind.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?} at {}", self.severity, self.kind, self.position)?;
        if !self.params.is_empty() {
            write!(f, ": {}", self.params.join(", "))?;
        }
        Ok(())
    }
}

/// An append-only sink for diagnostics.
///
/// Each recorded diagnostic is also mirrored to `tracing` at a matching level.
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: Vec<Diagnostic>,
}

impl MessageQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `diagnostic` and log it at its severity.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Lint => tracing::debug!("{diagnostic}"),
            Severity::Warning => tracing::warn!("{diagnostic}"),
            Severity::Error | Severity::FatalError => tracing::error!("{diagnostic}"),
        }
        self.messages.push(diagnostic);
    }

    /// Shorthand for recording a diagnostic at its kind's default severity.
    pub fn report(&mut self, kind: DiagnosticKind, position: &FilePosition, params: Vec<String>) {
        self.add(Diagnostic::new(kind, position.clone(), params));
    }

    /// Every diagnostic, in the order recorded.
    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    /// The most severe level recorded so far, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.messages.iter().map(|m| m.severity).max()
    }

    /// True if any recorded diagnostic is at least as severe as `level`.
    pub fn has_message_at_level(&self, level: Severity) -> bool {
        self.messages.iter().any(|m| m.severity >= level)
    }

    /// Diagnostics of one kind.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter().filter(move |m| m.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_severity_tracks_worst_message() {
        let mut mq = MessageQueue::new();
        assert_eq!(mq.max_severity(), None);

        let pos = FilePosition::new("test.html", 3);
        mq.report(DiagnosticKind::BadAttributeValue, &pos, vec!["x".into()]);
        assert_eq!(mq.max_severity(), Some(Severity::Warning));
        assert!(!mq.has_message_at_level(Severity::Error));

        mq.report(DiagnosticKind::DuplicateIdentifier, &pos, vec!["a".into()]);
        assert_eq!(mq.max_severity(), Some(Severity::FatalError));
        assert!(mq.has_message_at_level(Severity::Error));
        assert_eq!(mq.len(), 2);
    }

    #[test]
    fn severity_override() {
        let d = Diagnostic::new(
            DiagnosticKind::IllegalName,
            FilePosition::unknown(),
            vec!["bad__".into()],
        )
        .with_severity(Severity::Warning);
        assert_eq!(d.severity, Severity::Warning);
    }

    #[test]
    fn display_includes_position_and_params() {
        let d = Diagnostic::new(
            DiagnosticKind::MalformedUri,
            FilePosition::new("page.html", 12),
            vec!["http://[".into()],
        );
        assert_eq!(d.to_string(), "Warning MalformedUri at page.html:12: http://[");
    }

    #[test]
    fn of_kind_filters() {
        let mut mq = MessageQueue::new();
        let pos = FilePosition::unknown();
        mq.report(DiagnosticKind::IllegalName, &pos, vec![]);
        mq.report(DiagnosticKind::MalformedUri, &pos, vec![]);
        mq.report(DiagnosticKind::IllegalName, &pos, vec![]);
        assert_eq!(mq.of_kind(DiagnosticKind::IllegalName).count(), 2);
        assert_eq!(FilePosition::unknown().to_string(), "<unknown>");
    }
}
