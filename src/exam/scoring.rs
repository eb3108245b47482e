// src/exam/scoring.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::PASS_THRESHOLD_PERCENTAGE;

/// One question as the grader sees it.
#[derive(Debug, Clone)]
pub struct KeyedQuestion {
    pub question_id: i64,
    pub correct_option: String,
    pub option_ids: Vec<String>,
}

/// Ordered answer key for an exam paper.
#[derive(Debug, Clone, Default)]
pub struct AnswerKey {
    entries: Vec<KeyedQuestion>,
}

impl AnswerKey {
    pub fn new(entries: Vec<KeyedQuestion>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[KeyedQuestion] {
        &self.entries
    }

    pub fn get(&self, question_id: i64) -> Option<&KeyedQuestion> {
        self.entries.iter().find(|q| q.question_id == question_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Correct,
    Incorrect,
    Unanswered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionMark {
    pub question_id: i64,
    pub selected: Option<String>,
    pub correct_option: String,
    pub mark: Mark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub correct_count: usize,
    pub total_questions: usize,
    pub percentage: f64,
    pub passed: bool,
    pub breakdown: Vec<QuestionMark>,
}

/// Grades recorded selections against the key.
///
/// Unanswered questions count as incorrect; selections for questions outside the key are
/// ignored.
pub fn score(key: &AnswerKey, answers: &BTreeMap<i64, String>) -> ScoreSummary {
    let breakdown: Vec<QuestionMark> = key
        .entries()
        .iter()
        .map(|q| {
            let selected = answers.get(&q.question_id).cloned();
            let mark = match &selected {
                None => Mark::Unanswered,
                Some(choice) if choice == &q.correct_option => Mark::Correct,
                Some(_) => Mark::Incorrect,
            };
            QuestionMark {
                question_id: q.question_id,
                selected,
                correct_option: q.correct_option.clone(),
                mark,
            }
        })
        .collect();

    let total_questions = breakdown.len();
    let correct_count = breakdown.iter().filter(|m| m.mark == Mark::Correct).count();
    let percentage = percentage_of(correct_count, total_questions);

    ScoreSummary {
        correct_count,
        total_questions,
        percentage,
        passed: percentage > PASS_THRESHOLD_PERCENTAGE,
        breakdown,
    }
}

pub fn percentage_of(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (correct as f64 / total as f64) * 100.0
}
