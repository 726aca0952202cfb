use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "questiontype", rename_all = "snake_case")]
pub(crate) enum QuestionType {
    MultipleChoice,
    TrueFalse,
    OpenEnded,
}

impl QuestionType {
    /// Objective questions are auto-gradable against a flagged-correct option.
    pub(crate) fn is_objective(self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::TrueFalse)
    }
}

/// Derived grading dimension of a submission; never stored, always computed
/// from the persisted answer rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum GradingProgress {
    Ungraded,
    PartiallyGraded,
    FullyGraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum GradingFilter {
    All,
    Graded,
    Ungraded,
}

impl Default for GradingFilter {
    fn default() -> Self {
        GradingFilter::All
    }
}
