//! Auto-grading rules for choice questions and score aggregation.
//!
//! Everything here is pure: the current time is injected by the caller so
//! window checks are deterministic under test, and no storage types leak in.

use std::collections::HashSet;

use time::PrimitiveDateTime;

use crate::db::types::QuestionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GradedAnswer {
    pub(crate) is_correct: bool,
    pub(crate) points_earned: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScoreSummary {
    pub(crate) score: i32,
    pub(crate) total_marks: i32,
    pub(crate) percentage: f64,
    pub(crate) is_passed: bool,
}

/// Grades one answer against the question's correct-option texts.
///
/// Single choice: exactly one selection whose text is among the correct
/// options. Multiple choice: the selected set must equal the correct set,
/// no omissions and no extras. Comparison is by option text, matching the
/// original wire contract; options sharing identical text are therefore
/// indistinguishable here.
pub(crate) fn grade_answer(
    question_type: QuestionType,
    points: i32,
    correct_texts: &[String],
    selected: &[String],
) -> GradedAnswer {
    let is_correct = match question_type {
        QuestionType::SingleChoice => {
            selected.len() == 1 && correct_texts.contains(&selected[0])
        }
        QuestionType::MultipleChoice => {
            let selected_set: HashSet<&str> = selected.iter().map(String::as_str).collect();
            let correct_set: HashSet<&str> = correct_texts.iter().map(String::as_str).collect();
            !correct_set.is_empty() && selected_set == correct_set
        }
    };

    GradedAnswer { is_correct, points_earned: if is_correct { points } else { 0 } }
}

/// Aggregates graded answers into the submission's final score.
///
/// `total_marks` is recomputed from the answers actually present, so
/// questions the student never submitted reduce the denominator. Not the
/// same quantity as the exam's static total_marks.
pub(crate) fn aggregate(
    graded: &[(i32, GradedAnswer)],
    pass_percentage: i32,
) -> ScoreSummary {
    let total_marks: i32 = graded.iter().map(|(points, _)| points).sum();
    let score: i32 = graded.iter().map(|(_, answer)| answer.points_earned).sum();

    let percentage =
        if total_marks > 0 { f64::from(score) / f64::from(total_marks) * 100.0 } else { 0.0 };

    ScoreSummary { score, total_marks, percentage, is_passed: percentage >= f64::from(pass_percentage) }
}

/// Inclusive window check; `now` is always the evaluation-time clock,
/// injected by the caller.
pub(crate) fn is_within_window(
    start_time: PrimitiveDateTime,
    end_time: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> bool {
    start_time <= now && now <= end_time
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Month, PrimitiveDateTime, Time};

    fn dt(hour: u8, minute: u8) -> PrimitiveDateTime {
        let date = Date::from_calendar_date(2025, Month::June, 1).unwrap();
        PrimitiveDateTime::new(date, Time::from_hms(hour, minute, 0).unwrap())
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn single_choice_correct_selection_earns_points() {
        let graded = grade_answer(QuestionType::SingleChoice, 3, &texts(&["4"]), &texts(&["4"]));
        assert_eq!(graded, GradedAnswer { is_correct: true, points_earned: 3 });
    }

    #[test]
    fn single_choice_wrong_selection_earns_zero() {
        let graded = grade_answer(QuestionType::SingleChoice, 3, &texts(&["4"]), &texts(&["5"]));
        assert_eq!(graded, GradedAnswer { is_correct: false, points_earned: 0 });
    }

    #[test]
    fn single_choice_empty_selection_is_incorrect() {
        let graded = grade_answer(QuestionType::SingleChoice, 1, &texts(&["4"]), &[]);
        assert!(!graded.is_correct);
    }

    #[test]
    fn single_choice_multiple_selections_is_incorrect() {
        let graded =
            grade_answer(QuestionType::SingleChoice, 1, &texts(&["4"]), &texts(&["4", "5"]));
        assert!(!graded.is_correct);
        assert_eq!(graded.points_earned, 0);
    }

    #[test]
    fn multiple_choice_exact_set_is_correct() {
        let graded = grade_answer(
            QuestionType::MultipleChoice,
            2,
            &texts(&["a", "b"]),
            &texts(&["b", "a"]),
        );
        assert_eq!(graded, GradedAnswer { is_correct: true, points_earned: 2 });
    }

    #[test]
    fn multiple_choice_subset_is_incorrect() {
        let graded =
            grade_answer(QuestionType::MultipleChoice, 2, &texts(&["a", "b"]), &texts(&["a"]));
        assert!(!graded.is_correct);
    }

    #[test]
    fn multiple_choice_superset_is_incorrect() {
        let graded = grade_answer(
            QuestionType::MultipleChoice,
            2,
            &texts(&["a", "b"]),
            &texts(&["a", "b", "c"]),
        );
        assert!(!graded.is_correct);
    }

    #[test]
    fn multiple_choice_disjoint_set_is_incorrect() {
        let graded = grade_answer(
            QuestionType::MultipleChoice,
            2,
            &texts(&["a", "b"]),
            &texts(&["c", "d"]),
        );
        assert!(!graded.is_correct);
    }

    #[test]
    fn multiple_choice_empty_selection_is_incorrect() {
        let graded = grade_answer(QuestionType::MultipleChoice, 2, &texts(&["a", "b"]), &[]);
        assert!(!graded.is_correct);
    }

    #[test]
    fn aggregate_partial_credit_scenario() {
        // pass_percentage=60, two 1-point single-choice questions; one right.
        let q1 = grade_answer(QuestionType::SingleChoice, 1, &texts(&["4"]), &texts(&["4"]));
        let q2 = grade_answer(QuestionType::SingleChoice, 1, &texts(&["H2O"]), &texts(&["CO2"]));
        let summary = aggregate(&[(1, q1), (1, q2)], 60);

        assert_eq!(summary.score, 1);
        assert_eq!(summary.total_marks, 2);
        assert_eq!(summary.percentage, 50.0);
        assert!(!summary.is_passed);
    }

    #[test]
    fn aggregate_full_marks_scenario() {
        let q1 = grade_answer(QuestionType::SingleChoice, 1, &texts(&["4"]), &texts(&["4"]));
        let q2 = grade_answer(QuestionType::SingleChoice, 1, &texts(&["H2O"]), &texts(&["H2O"]));
        let summary = aggregate(&[(1, q1), (1, q2)], 60);

        assert_eq!(summary.score, 2);
        assert_eq!(summary.total_marks, 2);
        assert_eq!(summary.percentage, 100.0);
        assert!(summary.is_passed);
    }

    #[test]
    fn aggregate_pass_boundary_is_inclusive() {
        let right = GradedAnswer { is_correct: true, points_earned: 1 };
        let wrong = GradedAnswer { is_correct: false, points_earned: 0 };
        let summary = aggregate(&[(1, right), (1, wrong)], 50);

        assert_eq!(summary.percentage, 50.0);
        assert!(summary.is_passed);
    }

    #[test]
    fn aggregate_no_answers_yields_zero_percentage() {
        let summary = aggregate(&[], 60);
        assert_eq!(summary.score, 0);
        assert_eq!(summary.total_marks, 0);
        assert_eq!(summary.percentage, 0.0);
        assert!(!summary.is_passed);
    }

    #[test]
    fn aggregate_zero_pass_percentage_always_passes() {
        let summary = aggregate(&[], 0);
        assert!(summary.is_passed);
    }

    #[test]
    fn aggregate_score_stays_within_bounds() {
        let right = GradedAnswer { is_correct: true, points_earned: 5 };
        let wrong = GradedAnswer { is_correct: false, points_earned: 0 };
        let summary = aggregate(&[(5, right), (3, wrong), (2, wrong)], 100);

        assert!(summary.score >= 0 && summary.score <= summary.total_marks);
        assert!(summary.percentage >= 0.0 && summary.percentage <= 100.0);
    }

    #[test]
    fn window_is_inclusive_at_both_ends() {
        let start = dt(10, 0);
        let end = dt(12, 0);

        assert!(is_within_window(start, end, start));
        assert!(is_within_window(start, end, end));
        assert!(is_within_window(start, end, dt(11, 0)));
    }

    #[test]
    fn window_rejects_outside_times() {
        let start = dt(10, 0);
        let end = dt(12, 0);

        assert!(!is_within_window(start, end, dt(9, 59)));
        assert!(!is_within_window(start, end, dt(12, 1)));
    }
}
