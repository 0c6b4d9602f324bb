//! Warning and error collection for importers and populators.
//!
//! Most feeder problems are recoverable: an unknown device type becomes a
//! closed switch, an unknown configuration key is ignored, a load without a
//! class gets one inferred. Those decisions are recorded here so the CLI can
//! print them after the run instead of aborting.
//!
//! # Example
//!
//! ```
//! use fdr_core::diagnostics::{Diagnostics, Severity};
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning("config", "unknown key 'avg_hose' ignored");
//! diag.add_error_with_entity("device", "no equipment for regulator", "REG_12");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.error_count(), 1);
//! assert_eq!(diag.summary(), "1 warning, 1 error");
//! ```

use serde::Serialize;

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Recovered with a default or substitution
    Warning,
    /// The element was dropped
    Error,
}

/// One issue raised while importing or populating a feeder
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Grouping key such as "device", "config", "phase", "solar"
    pub category: String,
    pub message: String,
    /// Row number in a CSV table, when the issue came from one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    /// Object or device name the issue refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl DiagnosticIssue {
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            row: None,
            entity: None,
        }
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }
        if let Some(row) = self.row {
            write!(f, " at row {}", row)?;
        }
        Ok(())
    }
}

/// Collection of diagnostic issues for one import or population pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DiagnosticIssue) {
        tracing::debug!(%issue, "diagnostic");
        self.issues.push(issue);
    }

    // =========================================================================
    // Warning Methods
    // =========================================================================

    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.add(DiagnosticIssue::new(Severity::Warning, category, message));
    }

    /// Add a warning tied to a CSV row
    pub fn add_warning_at_row(&mut self, category: &str, message: &str, row: usize) {
        self.add(DiagnosticIssue::new(Severity::Warning, category, message).with_row(row));
    }

    pub fn add_warning_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.add(DiagnosticIssue::new(Severity::Warning, category, message).with_entity(entity));
    }

    // =========================================================================
    // Error Methods
    // =========================================================================

    pub fn add_error(&mut self, category: &str, message: &str) {
        self.add(DiagnosticIssue::new(Severity::Error, category, message));
    }

    pub fn add_error_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.add(DiagnosticIssue::new(Severity::Error, category, message).with_entity(entity));
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Issues in one category, in the order they were raised
    pub fn issues_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    /// "No issues", "2 warnings", "1 warning, 3 errors"
    pub fn summary(&self) -> String {
        fn plural(n: usize, word: &str) -> String {
            format!("{} {}{}", n, word, if n == 1 { "" } else { "s" })
        }
        match (self.warning_count(), self.error_count()) {
            (0, 0) => "No issues".to_string(),
            (w, 0) => plural(w, "warning"),
            (0, e) => plural(e, "error"),
            (w, e) => format!("{}, {}", plural(w, "warning"), plural(e, "error")),
        }
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

// ============================================================================
// GIS Import Counters
// ============================================================================

/// Element counts reported by the GIS importer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportStats {
    pub nodes: usize,
    pub links: usize,
    pub configurations: usize,
    pub loads: usize,
    pub capacitors: usize,
    /// Link devices that were split out of a line section
    pub split_devices: usize,
    /// Section pairs that shared both endpoints
    pub parallel_links: usize,
    /// Nodes dropped because the source could not reach them
    pub islanded_nodes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_pluralizes() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.summary(), "No issues");
        diag.add_warning("phase", "dropped S from branching node");
        diag.add_warning("phase", "added N to wye link");
        assert_eq!(diag.summary(), "2 warnings");
        diag.add_error("device", "bad row");
        assert_eq!(diag.summary(), "2 warnings, 1 error");
    }

    #[test]
    fn issue_display_includes_entity_and_row() {
        let issue = DiagnosticIssue::new(Severity::Warning, "device", "unknown type 'Gizmo'")
            .with_entity("D42")
            .with_row(7);
        assert_eq!(
            issue.to_string(),
            "[warning:device] unknown type 'Gizmo' (D42) at row 7"
        );
    }

    #[test]
    fn filter_by_category_and_merge() {
        let mut a = Diagnostics::new();
        a.add_warning("config", "unknown key");
        let mut b = Diagnostics::new();
        b.add_warning_with_entity("solar", "capacity left over", "feeder");
        b.add_error_with_entity("device", "missing equipment", "F1");
        a.merge(b);
        assert_eq!(a.issues_by_category("solar").count(), 1);
        assert!(a.has_errors());
        assert_eq!(a.errors().next().map(|i| i.entity.as_deref()), Some(Some("F1")));
    }
}
