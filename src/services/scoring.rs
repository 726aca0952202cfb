use std::collections::{HashMap, HashSet};

use sqlx::PgPool;

use crate::core::time::primitive_now_utc;
use crate::db::models::{Answer, Question, QuestionOption};
use crate::repositories;
use crate::services::ExamFlowError;

/// Outcome of scoring a single objective answer; open-ended answers stay
/// pending and produce no update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ObjectiveResult {
    pub(crate) answer_id: String,
    pub(crate) is_correct: bool,
    pub(crate) points_earned: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScoreSummary {
    pub(crate) total_score: i32,
    pub(crate) max_score: i32,
    pub(crate) percentage: f64,
    pub(crate) is_graded: bool,
}

/// Scores one finalized attempt. Objective answers earn the full question
/// points iff the selected option carries the correct flag; an unanswered
/// or unknown selection counts as incorrect. Open-ended answers keep
/// whatever manual grade they already have and stay pending otherwise, so
/// re-running the pass never clobbers a grader's work.
pub(crate) fn score_answers(
    questions: &[Question],
    options: &[QuestionOption],
    answers: &[Answer],
) -> (Vec<ObjectiveResult>, ScoreSummary) {
    let correct_by_question: HashMap<&str, &str> = options
        .iter()
        .filter(|option| option.is_correct)
        .map(|option| (option.question_id.as_str(), option.id.as_str()))
        .collect();
    let question_by_id: HashMap<&str, &Question> =
        questions.iter().map(|question| (question.id.as_str(), question)).collect();

    let mut results = Vec::new();
    let mut total_score: i64 = 0;
    let mut pending = false;
    let mut answered: HashSet<&str> = HashSet::new();

    for answer in answers {
        let Some(question) = question_by_id.get(answer.question_id.as_str()) else {
            continue;
        };
        answered.insert(question.id.as_str());

        if question.question_type.is_objective() {
            let correct = match (&answer.selected_option_id, correct_by_question.get(question.id.as_str())) {
                (Some(selected), Some(correct_id)) => selected == correct_id,
                _ => false,
            };
            let points = if correct { question.points } else { 0 };
            total_score += points as i64;
            results.push(ObjectiveResult {
                answer_id: answer.id.clone(),
                is_correct: correct,
                points_earned: points,
            });
        } else {
            match answer.points_earned {
                Some(points) => total_score += points as i64,
                None => pending = true,
            }
        }
    }

    // A question with no answer row at all also keeps the attempt pending
    // when it needs a manual grade; objective gaps simply score zero.
    for question in questions {
        if !answered.contains(question.id.as_str()) && !question.question_type.is_objective() {
            pending = true;
        }
    }

    let max_score: i64 = questions.iter().map(|question| question.points as i64).sum();
    let percentage =
        if max_score > 0 { total_score as f64 / max_score as f64 * 100.0 } else { 0.0 };

    (
        results,
        ScoreSummary {
            total_score: total_score as i32,
            max_score: max_score as i32,
            percentage,
            is_graded: !pending,
        },
    )
}

/// Loads a finalized attempt, materializes answer rows for untouched
/// questions, applies the objective auto-scores and persists the aggregate.
/// Idempotent: re-running with the same rows produces the same state, and
/// manually graded open-ended scores survive untouched.
pub(crate) async fn auto_grade_submission(
    pool: &PgPool,
    submission_id: &str,
) -> Result<ScoreSummary, ExamFlowError> {
    let submission = repositories::submissions::find_by_id(pool, submission_id)
        .await?
        .ok_or(ExamFlowError::NotFound("submission"))?;

    let questions = repositories::questions::list_by_exam(pool, &submission.exam_id).await?;
    let options = repositories::questions::list_options_by_exam(pool, &submission.exam_id).await?;

    let now = primitive_now_utc();
    let existing = repositories::answers::list_by_submission(pool, submission_id).await?;
    let existing_ids: HashSet<&str> =
        existing.iter().map(|answer| answer.question_id.as_str()).collect();
    for question in &questions {
        if !existing_ids.contains(question.id.as_str()) {
            repositories::answers::insert_placeholder(pool, submission_id, &question.id, now)
                .await?;
        }
    }

    let answers = repositories::answers::list_by_submission(pool, submission_id).await?;
    let (results, summary) = score_answers(&questions, &options, &answers);

    for result in &results {
        repositories::answers::apply_auto_score(
            pool,
            &result.answer_id,
            result.is_correct,
            result.points_earned,
            now,
        )
        .await?;
    }

    repositories::submissions::update_totals(
        pool,
        submission_id,
        summary.total_score,
        summary.max_score,
        summary.percentage,
        summary.is_graded,
        now,
    )
    .await?;

    tracing::debug!(
        submission_id,
        total_score = summary.total_score,
        max_score = summary.max_score,
        is_graded = summary.is_graded,
        "Auto-scored submission"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::QuestionType;
    use time::macros::datetime;

    fn question(id: &str, kind: QuestionType, points: i32, order: i32) -> Question {
        let now = datetime!(2025-06-01 10:00);
        Question {
            id: id.to_string(),
            exam_id: "exam-1".to_string(),
            question_text: format!("question {id}"),
            question_type: kind,
            points,
            order_index: order,
            created_at: now,
            updated_at: now,
        }
    }

    fn option(id: &str, question_id: &str, correct: bool, order: i32) -> QuestionOption {
        QuestionOption {
            id: id.to_string(),
            question_id: question_id.to_string(),
            option_text: format!("option {id}"),
            is_correct: correct,
            option_order: order,
            created_at: datetime!(2025-06-01 10:00),
        }
    }

    fn answer(id: &str, question_id: &str, selected: Option<&str>) -> Answer {
        let now = datetime!(2025-06-01 10:05);
        Answer {
            id: id.to_string(),
            submission_id: "sub-1".to_string(),
            question_id: question_id.to_string(),
            answer_text: None,
            selected_option_id: selected.map(|s| s.to_string()),
            is_correct: None,
            points_earned: None,
            feedback: None,
            is_graded: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn wrong_option_scores_zero_right_option_scores_full() {
        let questions = vec![question("q1", QuestionType::MultipleChoice, 4, 0)];
        let options = vec![
            option("a", "q1", true, 0),
            option("b", "q1", false, 1),
            option("c", "q1", false, 2),
            option("d", "q1", false, 3),
        ];

        let (results, _) = score_answers(&questions, &options, &[answer("ans", "q1", Some("b"))]);
        assert_eq!(results[0].points_earned, 0);
        assert!(!results[0].is_correct);

        let (results, summary) =
            score_answers(&questions, &options, &[answer("ans", "q1", Some("a"))]);
        assert_eq!(results[0].points_earned, 4);
        assert!(results[0].is_correct);
        assert_eq!(summary.total_score, 4);
        assert!(summary.is_graded);
    }

    #[test]
    fn unanswered_objective_counts_as_incorrect() {
        let questions = vec![question("q1", QuestionType::TrueFalse, 2, 0)];
        let options = vec![option("t", "q1", true, 0), option("f", "q1", false, 1)];

        let (results, summary) = score_answers(&questions, &options, &[answer("ans", "q1", None)]);
        assert!(!results[0].is_correct);
        assert_eq!(summary.total_score, 0);
        assert!(summary.is_graded);
    }

    #[test]
    fn open_ended_stays_pending_until_manually_graded() {
        let questions = vec![
            question("q1", QuestionType::MultipleChoice, 2, 0),
            question("q2", QuestionType::MultipleChoice, 3, 1),
            question("q3", QuestionType::MultipleChoice, 5, 2),
            question("q4", QuestionType::OpenEnded, 10, 3),
        ];
        let options = vec![
            option("q1a", "q1", true, 0),
            option("q1b", "q1", false, 1),
            option("q2a", "q2", true, 0),
            option("q2b", "q2", false, 1),
            option("q3a", "q3", true, 0),
            option("q3b", "q3", false, 1),
        ];
        let answers = vec![
            answer("a1", "q1", Some("q1a")),
            answer("a2", "q2", Some("q2a")),
            answer("a3", "q3", Some("q3a")),
            answer("a4", "q4", None),
        ];

        let (_, summary) = score_answers(&questions, &options, &answers);
        assert_eq!(summary.total_score, 10);
        assert_eq!(summary.max_score, 20);
        assert!(!summary.is_graded);

        // The grader assigns 7 points to the open-ended answer and the
        // aggregate is recomputed from the persisted rows.
        let mut graded = answers;
        graded[3].points_earned = Some(7);
        graded[3].is_graded = true;

        let (_, summary) = score_answers(&questions, &options, &graded);
        assert_eq!(summary.total_score, 17);
        assert_eq!(summary.max_score, 20);
        assert!((summary.percentage - 85.0).abs() < f64::EPSILON);
        assert!(summary.is_graded);
    }

    #[test]
    fn rescoring_preserves_manual_open_ended_grade() {
        let questions = vec![
            question("q1", QuestionType::TrueFalse, 2, 0),
            question("q2", QuestionType::OpenEnded, 8, 1),
        ];
        let options = vec![option("t", "q1", true, 0), option("f", "q1", false, 1)];
        let mut answers = vec![answer("a1", "q1", Some("t")), answer("a2", "q2", None)];
        answers[1].points_earned = Some(5);
        answers[1].is_graded = true;

        let (results, first) = score_answers(&questions, &options, &answers);
        let (_, second) = score_answers(&questions, &options, &answers);

        assert_eq!(results.len(), 1, "only the objective answer is rescored");
        assert_eq!(first, second);
        assert_eq!(first.total_score, 7);
        assert!(first.is_graded);
    }

    #[test]
    fn missing_open_ended_row_keeps_attempt_pending() {
        let questions = vec![
            question("q1", QuestionType::TrueFalse, 2, 0),
            question("q2", QuestionType::OpenEnded, 8, 1),
        ];
        let options = vec![option("t", "q1", true, 0), option("f", "q1", false, 1)];
        let answers = vec![answer("a1", "q1", Some("t"))];

        let (_, summary) = score_answers(&questions, &options, &answers);
        assert_eq!(summary.total_score, 2);
        assert!(!summary.is_graded);
    }

    #[test]
    fn empty_exam_scores_zero_percentage() {
        let (_, summary) = score_answers(&[], &[], &[]);
        assert_eq!(summary.max_score, 0);
        assert_eq!(summary.percentage, 0.0);
        assert!(summary.is_graded);
    }
}
