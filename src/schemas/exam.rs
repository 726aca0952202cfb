use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Exam, Question, QuestionOption};
use crate::db::types::QuestionType;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: i32,
    #[serde(default, deserialize_with = "deserialize_option_offset_datetime_flexible")]
    pub(crate) start_date: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "deserialize_option_offset_datetime_flexible")]
    pub(crate) end_date: Option<OffsetDateTime>,
    #[serde(default = "default_true")]
    pub(crate) allow_review: bool,
    #[serde(default = "default_true")]
    pub(crate) visible_to_all: bool,
    #[serde(default)]
    pub(crate) assigned_student_ids: Vec<String>,
    #[validate(length(min = 1, message = "an exam needs at least one question"))]
    pub(crate) questions: Vec<QuestionCreate>,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct QuestionCreate {
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionType,
    pub(crate) points: i32,
    #[serde(default)]
    pub(crate) options: Vec<OptionCreate>,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct OptionCreate {
    pub(crate) option_text: String,
    #[serde(default)]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamUpdate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: i32,
    #[serde(default, deserialize_with = "deserialize_option_offset_datetime_flexible")]
    pub(crate) start_date: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "deserialize_option_offset_datetime_flexible")]
    pub(crate) end_date: Option<OffsetDateTime>,
    pub(crate) is_active: bool,
    pub(crate) allow_review: bool,
    pub(crate) visible_to_all: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignmentsUpdate {
    pub(crate) student_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OptionResponse {
    pub(crate) id: String,
    pub(crate) option_text: String,
    pub(crate) option_order: i32,
    /// Present for graders only; stripped from the student view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) is_correct: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionType,
    pub(crate) points: i32,
    pub(crate) order_index: i32,
    pub(crate) options: Vec<OptionResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) duration_minutes: i32,
    pub(crate) start_date: Option<String>,
    pub(crate) end_date: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) allow_review: bool,
    pub(crate) visible_to_all: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) questions: Option<Vec<QuestionResponse>>,
}

/// Exam card on the student dashboard, annotated with the caller's attempt
/// state.
#[derive(Debug, Serialize)]
pub(crate) struct AvailableExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) duration_minutes: i32,
    pub(crate) start_date: Option<String>,
    pub(crate) end_date: Option<String>,
    pub(crate) question_count: i64,
    pub(crate) attempt_state: AttemptState,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum AttemptState {
    NotStarted,
    InProgress,
    Submitted,
}

pub(crate) fn exam_to_response(
    exam: Exam,
    questions: Option<Vec<QuestionResponse>>,
) -> ExamResponse {
    ExamResponse {
        id: exam.id,
        title: exam.title,
        description: exam.description,
        duration_minutes: exam.duration_minutes,
        start_date: exam.start_date.map(format_primitive),
        end_date: exam.end_date.map(format_primitive),
        is_active: exam.is_active,
        allow_review: exam.allow_review,
        visible_to_all: exam.visible_to_all,
        created_by: exam.created_by,
        created_at: format_primitive(exam.created_at),
        questions,
    }
}

pub(crate) fn question_to_response(
    question: Question,
    options: Vec<QuestionOption>,
    include_correctness: bool,
) -> QuestionResponse {
    QuestionResponse {
        id: question.id,
        question_text: question.question_text,
        question_type: question.question_type,
        points: question.points,
        order_index: question.order_index,
        options: options
            .into_iter()
            .map(|option| OptionResponse {
                id: option.id,
                option_text: option.option_text,
                option_order: option.option_order,
                is_correct: include_correctness.then_some(option.is_correct),
            })
            .collect(),
    }
}

fn default_true() -> bool {
    true
}

fn parse_offset_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    // datetime-local inputs often arrive without a timezone.
    if raw.len() == 16 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}:00Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if raw.len() == 19 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value.assume_utc());
    }

    None
}

fn deserialize_option_offset_datetime_flexible<'de, D>(
    deserializer: D,
) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(value) => parse_offset_datetime_flexible(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {value}")))
            .map(Some),
        None => Ok(None),
    }
}
