//! Standards validation seam.
//!
//! Rule content lives outside this crate. The drawing manager only calls a
//! [`Validator`] after each committed point and stores what it returns.

use crate::centerline::Centerline;
use serde::{Deserialize, Serialize};

/// Severity of a validation warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningSeverity {
    Info,
    #[default]
    Warning,
    Error,
}

/// A single finding reported by a validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationWarning {
    /// Stable rule code, e.g. `"min-radius"`.
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub severity: WarningSeverity,
    /// Index of the offending point, when the rule is point-specific.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_index: Option<usize>,
}

impl ValidationWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity: WarningSeverity::Warning,
            point_index: None,
        }
    }

    pub fn with_severity(mut self, severity: WarningSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn at_point(mut self, index: usize) -> Self {
        self.point_index = Some(index);
        self
    }
}

/// Outcome of validating a centerline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_compliant: bool,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    /// A compliant report with no warnings.
    pub fn compliant() -> Self {
        Self {
            is_compliant: true,
            warnings: Vec::new(),
        }
    }
}

/// A standards checker (SMACNA-style) the drawing manager consults.
pub trait Validator {
    fn validate(&self, centerline: &Centerline) -> ValidationReport;
}

/// Validator that accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl Validator for NoopValidator {
    fn validate(&self, _centerline: &Centerline) -> ValidationReport {
        ValidationReport::compliant()
    }
}

impl<F> Validator for F
where
    F: Fn(&Centerline) -> ValidationReport,
{
    fn validate(&self, centerline: &Centerline) -> ValidationReport {
        self(centerline)
    }
}
