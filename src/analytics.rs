//! Survey response aggregation
//!
//! Pure read-side computation of descriptive statistics over a survey's
//! collected responses: per-question answer distributions, response and
//! completion rates, and rating means. Never mutates responses; a cached
//! snapshot of the output is always re-derivable from the raw rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RegistryError;

/// A survey question definition.
///
/// The variant carries the type-specific shape, so the aggregator never
/// branches on free-form type strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// Question type with type-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    Textarea,
    MultipleChoice { options: Vec<String> },
    Checkbox { options: Vec<String> },
    Rating {
        #[serde(default = "default_rating_scale")]
        scale: u8,
    },
}

fn default_rating_scale() -> u8 {
    5
}

impl QuestionKind {
    /// Type name as it appears in stats output
    pub fn name(&self) -> &'static str {
        match self {
            QuestionKind::Text => "text",
            QuestionKind::Textarea => "textarea",
            QuestionKind::MultipleChoice { .. } => "multiple_choice",
            QuestionKind::Checkbox { .. } => "checkbox",
            QuestionKind::Rating { .. } => "rating",
        }
    }
}

/// Validate a question list at survey creation time
pub fn validate_questions(questions: &[Question]) -> Result<(), RegistryError> {
    if questions.is_empty() {
        return Err(RegistryError::InvalidInput(
            "survey needs at least one question".into(),
        ));
    }

    let mut seen = std::collections::BTreeSet::new();
    for q in questions {
        if q.id.is_empty() {
            return Err(RegistryError::InvalidInput(
                "question id is required".into(),
            ));
        }
        if !seen.insert(q.id.as_str()) {
            return Err(RegistryError::InvalidInput(format!(
                "duplicate question id: {}",
                q.id
            )));
        }
        if q.prompt.is_empty() {
            return Err(RegistryError::InvalidInput(format!(
                "question {} has an empty prompt",
                q.id
            )));
        }

        match &q.kind {
            QuestionKind::MultipleChoice { options } | QuestionKind::Checkbox { options } => {
                if options.is_empty() {
                    return Err(RegistryError::InvalidInput(format!(
                        "question {} needs at least one option",
                        q.id
                    )));
                }
            }
            QuestionKind::Rating { scale } => {
                if *scale == 0 {
                    return Err(RegistryError::InvalidInput(format!(
                        "question {} has a zero rating scale",
                        q.id
                    )));
                }
            }
            QuestionKind::Text | QuestionKind::Textarea => {}
        }
    }

    Ok(())
}

/// Reject answer maps that reference question ids the survey does not define
pub fn validate_answers(
    questions: &[Question],
    answers: &serde_json::Map<String, Value>,
) -> Result<(), RegistryError> {
    for key in answers.keys() {
        if !questions.iter().any(|q| q.id == *key) {
            return Err(RegistryError::InvalidInput(format!(
                "answer references unknown question: {}",
                key
            )));
        }
    }
    Ok(())
}

/// A response is complete when every required question has a non-empty answer
pub fn is_complete(questions: &[Question], answers: &serde_json::Map<String, Value>) -> bool {
    questions
        .iter()
        .filter(|q| q.required)
        .all(|q| answers.get(&q.id).map(is_answered).unwrap_or(false))
}

/// One response's contribution to the aggregate
#[derive(Debug, Clone)]
pub struct ResponseInput {
    pub answers: serde_json::Map<String, Value>,
    pub is_complete: bool,
    pub completion_time_secs: Option<f64>,
}

/// Per-question statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionStats {
    pub question_id: String,
    pub prompt: String,
    pub question_type: String,
    pub answered_count: u64,
    /// answered_count / total_responses x 100
    pub response_rate: f64,
    /// Frequency per observed value; empty for free-text questions
    #[serde(default)]
    pub distribution: BTreeMap<String, u64>,
    /// Arithmetic mean of parseable rating values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_common_answer: Option<String>,
}

/// Survey-level statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyAnalytics {
    pub total_responses: u64,
    pub total_complete_responses: u64,
    /// total_responses / invited x 100; 0.0 when invitations are unknown
    pub response_rate: f64,
    /// complete / total x 100; 0.0 when there are no responses
    pub completion_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_completion_time_secs: Option<f64>,
    pub questions: Vec<QuestionStats>,
}

/// Compute survey analytics over a snapshot of responses.
///
/// Deterministic for a given response sequence; the most-common-answer
/// tie-break (first value encountered) is stable but not contractual.
pub fn aggregate(
    questions: &[Question],
    responses: &[ResponseInput],
    invited: Option<u64>,
) -> SurveyAnalytics {
    let total = responses.len() as u64;
    let complete = responses.iter().filter(|r| r.is_complete).count() as u64;

    let response_rate = match invited {
        Some(n) if n > 0 => round2(total as f64 / n as f64 * 100.0),
        _ => 0.0,
    };

    let completion_rate = if total > 0 {
        round2(complete as f64 / total as f64 * 100.0)
    } else {
        0.0
    };

    let times: Vec<f64> = responses
        .iter()
        .filter_map(|r| r.completion_time_secs)
        .collect();
    let avg_completion_time_secs = if times.is_empty() {
        None
    } else {
        Some(round2(times.iter().sum::<f64>() / times.len() as f64))
    };

    let question_stats = questions
        .iter()
        .map(|q| aggregate_question(q, responses, total))
        .collect();

    SurveyAnalytics {
        total_responses: total,
        total_complete_responses: complete,
        response_rate,
        completion_rate,
        avg_completion_time_secs,
        questions: question_stats,
    }
}

fn aggregate_question(
    question: &Question,
    responses: &[ResponseInput],
    total: u64,
) -> QuestionStats {
    let mut answered_count = 0u64;
    let mut counter = Counter::new();
    let mut rating_values: Vec<f64> = Vec::new();

    for response in responses {
        let Some(value) = response.answers.get(&question.id) else {
            continue;
        };
        if !is_answered(value) {
            continue;
        }
        answered_count += 1;

        match &question.kind {
            QuestionKind::Text | QuestionKind::Textarea => {}
            QuestionKind::MultipleChoice { .. } => {
                if let Some(key) = scalar_key(value) {
                    counter.add(key);
                }
            }
            QuestionKind::Rating { .. } => {
                if let Some(key) = scalar_key(value) {
                    if let Ok(parsed) = key.trim().parse::<f64>() {
                        rating_values.push(parsed);
                    }
                    counter.add(key);
                }
            }
            QuestionKind::Checkbox { .. } => {
                for key in selected_options(value) {
                    counter.add(key);
                }
            }
        }
    }

    let response_rate = if total > 0 {
        round2(answered_count as f64 / total as f64 * 100.0)
    } else {
        0.0
    };

    let average = if rating_values.is_empty() {
        None
    } else {
        Some(round2(
            rating_values.iter().sum::<f64>() / rating_values.len() as f64,
        ))
    };

    let most_common_answer = counter.most_common();

    QuestionStats {
        question_id: question.id.clone(),
        prompt: question.prompt.clone(),
        question_type: question.kind.name().to_string(),
        answered_count,
        response_rate,
        distribution: counter.into_counts(),
        average,
        most_common_answer,
    }
}

/// Non-empty answer check: null, empty strings and empty lists are unanswered
fn is_answered(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// Literal value as a distribution key; non-scalar values have none
fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Flatten a checkbox answer into individual selected options.
///
/// Accepts a list of values or a comma-separated string fallback.
fn selected_options(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_key).collect(),
        Value::String(s) => s
            .split(',')
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .map(|part| part.to_string())
            .collect(),
        other => scalar_key(other).into_iter().collect(),
    }
}

/// Frequency counter that remembers first-encounter order for tie-breaks
struct Counter {
    counts: BTreeMap<String, u64>,
    order: Vec<String>,
}

impl Counter {
    fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    fn add(&mut self, key: String) {
        if !self.counts.contains_key(&key) {
            self.order.push(key.clone());
        }
        *self.counts.entry(key).or_insert(0) += 1;
    }

    /// Highest count; ties resolve to the first value encountered
    fn most_common(&self) -> Option<String> {
        let mut best: Option<(&String, u64)> = None;
        for key in &self.order {
            let count = self.counts[key];
            if best.map(|(_, c)| count > c).unwrap_or(true) {
                best = Some((key, count));
            }
        }
        best.map(|(key, _)| key.clone())
    }

    fn into_counts(self) -> BTreeMap<String, u64> {
        self.counts
    }
}

/// Round half away from zero to two decimals
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn questions() -> Vec<Question> {
        vec![
            Question {
                id: "q_rating".into(),
                prompt: "How satisfied are you?".into(),
                required: true,
                kind: QuestionKind::Rating { scale: 5 },
            },
            Question {
                id: "q_choice".into(),
                prompt: "Preferred clinic day".into(),
                required: false,
                kind: QuestionKind::MultipleChoice {
                    options: vec!["Friday".into(), "Saturday".into()],
                },
            },
            Question {
                id: "q_check".into(),
                prompt: "Services used".into(),
                required: false,
                kind: QuestionKind::Checkbox {
                    options: vec!["A".into(), "B".into(), "C".into()],
                },
            },
            Question {
                id: "q_text".into(),
                prompt: "Anything else?".into(),
                required: false,
                kind: QuestionKind::Textarea,
            },
        ]
    }

    fn response(answers: Value, complete: bool, time: Option<f64>) -> ResponseInput {
        ResponseInput {
            answers: answers.as_object().cloned().unwrap_or_default(),
            is_complete: complete,
            completion_time_secs: time,
        }
    }

    #[test]
    fn test_rating_distribution_and_mean() {
        let responses = vec![
            response(json!({"q_rating": "5"}), true, None),
            response(json!({"q_rating": "5"}), true, None),
            response(json!({"q_rating": "3"}), true, None),
        ];

        let stats = aggregate(&questions(), &responses, None);
        let rating = &stats.questions[0];

        assert_eq!(rating.answered_count, 3);
        assert_eq!(rating.distribution.get("5"), Some(&2));
        assert_eq!(rating.distribution.get("3"), Some(&1));
        assert_eq!(rating.average, Some(4.33));
        assert_eq!(rating.most_common_answer.as_deref(), Some("5"));
    }

    #[test]
    fn test_unparseable_rating_excluded_from_mean() {
        let responses = vec![
            response(json!({"q_rating": "4"}), true, None),
            response(json!({"q_rating": "great"}), true, None),
        ];

        let stats = aggregate(&questions(), &responses, None);
        let rating = &stats.questions[0];

        // "great" still counts in the distribution, just not the mean
        assert_eq!(rating.answered_count, 2);
        assert_eq!(rating.distribution.get("great"), Some(&1));
        assert_eq!(rating.average, Some(4.0));
    }

    #[test]
    fn test_no_parseable_ratings_means_no_average() {
        let responses = vec![response(json!({"q_rating": "meh"}), true, None)];
        let stats = aggregate(&questions(), &responses, None);
        assert_eq!(stats.questions[0].average, None);
    }

    #[test]
    fn test_numeric_rating_values_accepted() {
        let responses = vec![
            response(json!({"q_rating": 4}), true, None),
            response(json!({"q_rating": 2}), true, None),
        ];
        let stats = aggregate(&questions(), &responses, None);
        let rating = &stats.questions[0];

        assert_eq!(rating.distribution.get("4"), Some(&1));
        assert_eq!(rating.average, Some(3.0));
    }

    #[test]
    fn test_checkbox_flattening_with_comma_fallback() {
        let responses = vec![
            response(json!({"q_check": ["A", "B"]}), true, None),
            response(json!({"q_check": ["B"]}), true, None),
            response(json!({"q_check": "A, C"}), true, None),
        ];

        let stats = aggregate(&questions(), &responses, None);
        let check = &stats.questions[2];

        assert_eq!(check.answered_count, 3);
        assert_eq!(check.distribution.get("A"), Some(&2));
        assert_eq!(check.distribution.get("B"), Some(&2));
        assert_eq!(check.distribution.get("C"), Some(&1));
    }

    #[test]
    fn test_text_questions_count_without_distribution() {
        let responses = vec![
            response(json!({"q_text": "all good"}), true, None),
            response(json!({"q_text": ""}), true, None),
            response(json!({}), true, None),
        ];

        let stats = aggregate(&questions(), &responses, None);
        let text = &stats.questions[3];

        assert_eq!(text.answered_count, 1);
        assert!(text.distribution.is_empty());
        assert_eq!(text.most_common_answer, None);
    }

    #[test]
    fn test_survey_level_rates() {
        let responses = vec![
            response(json!({"q_rating": "5"}), true, Some(60.0)),
            response(json!({"q_rating": "4"}), true, Some(120.0)),
            response(json!({"q_rating": "3"}), true, None),
            response(json!({}), false, None),
        ];

        let stats = aggregate(&questions(), &responses, Some(10));

        assert_eq!(stats.total_responses, 4);
        assert_eq!(stats.total_complete_responses, 3);
        assert_eq!(stats.response_rate, 40.0);
        assert_eq!(stats.completion_rate, 75.0);
        assert_eq!(stats.avg_completion_time_secs, Some(90.0));
    }

    #[test]
    fn test_unknown_invitations_give_zero_response_rate() {
        let responses = vec![response(json!({"q_rating": "5"}), true, None)];

        assert_eq!(aggregate(&questions(), &responses, None).response_rate, 0.0);
        assert_eq!(
            aggregate(&questions(), &responses, Some(0)).response_rate,
            0.0
        );
    }

    #[test]
    fn test_empty_response_set() {
        let stats = aggregate(&questions(), &[], Some(10));

        assert_eq!(stats.total_responses, 0);
        assert_eq!(stats.completion_rate, 0.0);
        assert_eq!(stats.avg_completion_time_secs, None);
        assert_eq!(stats.questions[0].response_rate, 0.0);
    }

    #[test]
    fn test_recompute_is_identical() {
        let responses = vec![
            response(json!({"q_rating": "5", "q_check": ["A"]}), true, Some(30.0)),
            response(json!({"q_rating": "2", "q_check": "B, C"}), false, None),
        ];

        let first = aggregate(&questions(), &responses, Some(7));
        let second = aggregate(&questions(), &responses, Some(7));

        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[test]
    fn test_most_common_tie_goes_to_first_encountered() {
        let responses = vec![
            response(json!({"q_choice": "Saturday"}), true, None),
            response(json!({"q_choice": "Friday"}), true, None),
        ];

        let stats = aggregate(&questions(), &responses, None);
        assert_eq!(
            stats.questions[1].most_common_answer.as_deref(),
            Some("Saturday")
        );
    }

    #[test]
    fn test_validate_questions_rejects_duplicates_and_empty_options() {
        let dup = vec![
            Question {
                id: "q1".into(),
                prompt: "a".into(),
                required: false,
                kind: QuestionKind::Text,
            },
            Question {
                id: "q1".into(),
                prompt: "b".into(),
                required: false,
                kind: QuestionKind::Text,
            },
        ];
        assert!(validate_questions(&dup).is_err());

        let no_options = vec![Question {
            id: "q1".into(),
            prompt: "pick one".into(),
            required: false,
            kind: QuestionKind::MultipleChoice { options: vec![] },
        }];
        assert!(validate_questions(&no_options).is_err());

        assert!(validate_questions(&[]).is_err());
        assert!(validate_questions(&questions()).is_ok());
    }

    #[test]
    fn test_validate_answers_rejects_unknown_question() {
        let answers = json!({"q_rating": "5", "q_bogus": "x"});
        let err = validate_answers(&questions(), answers.as_object().unwrap());
        assert!(err.is_err());

        let ok = json!({"q_rating": "5"});
        assert!(validate_answers(&questions(), ok.as_object().unwrap()).is_ok());
    }

    #[test]
    fn test_is_complete_requires_required_answers() {
        let qs = questions();

        let full = json!({"q_rating": "4"});
        assert!(is_complete(&qs, full.as_object().unwrap()));

        let empty = json!({"q_rating": ""});
        assert!(!is_complete(&qs, empty.as_object().unwrap()));

        let missing = json!({"q_text": "hello"});
        assert!(!is_complete(&qs, missing.as_object().unwrap()));
    }

    #[test]
    fn test_question_kind_serialization_shape() {
        let q: Question = serde_json::from_value(json!({
            "id": "q1",
            "prompt": "Pick",
            "required": true,
            "type": "multiple_choice",
            "options": ["x", "y"]
        }))
        .unwrap();

        assert_eq!(q.kind.name(), "multiple_choice");
        let back = serde_json::to_value(&q).unwrap();
        assert_eq!(back["type"], "multiple_choice");
        assert_eq!(back["options"][1], "y");
    }
}
