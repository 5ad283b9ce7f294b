//! Survey service - lifecycle, response submission, analytics
//!
//! Submission enforces the survey's availability window, role targeting
//! and the one-response-per-respondent invariant. Analytics snapshots
//! are cached per survey in a hot map and invalidated on submission;
//! they are derived data, always recomputable from the raw responses.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::analytics::{self, Question, ResponseInput, SurveyAnalytics};
use crate::db::{surveys, RegistryDb};
use crate::error::RegistryError;
use crate::visibility::{self, Access, Principal, Role};

use super::events::{EventBus, RegistryEvent};

/// A submitted answer set
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponseInput {
    pub answers: serde_json::Map<String, Value>,
    #[serde(default)]
    pub completion_time_secs: Option<f64>,
}

/// Cached analytics with its provenance
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSnapshot {
    pub survey_id: String,
    pub computed_at: String,
    /// Invitation count the rates were computed against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited: Option<u64>,
    #[serde(flatten)]
    pub analytics: SurveyAnalytics,
}

struct CacheEntry {
    snapshot: AnalyticsSnapshot,
    computed_at: DateTime<Utc>,
}

/// Survey service for business logic
pub struct SurveyService {
    db: Arc<RegistryDb>,
    events: Arc<EventBus>,
    cache: DashMap<String, CacheEntry>,
    cache_ttl_secs: u64,
}

impl SurveyService {
    /// Create a new survey service
    pub fn new(db: Arc<RegistryDb>, events: Arc<EventBus>, cache_ttl_secs: u64) -> Self {
        Self {
            db,
            events,
            cache: DashMap::new(),
            cache_ttl_secs,
        }
    }

    // =========================================================================
    // Survey lifecycle
    // =========================================================================

    /// Create a survey owned by the principal
    pub fn create(
        &self,
        principal: &Principal,
        input: surveys::CreateSurveyInput,
    ) -> Result<surveys::SurveyRow, RegistryError> {
        if principal.is_anonymous() {
            return Err(RegistryError::Auth("authentication required".into()));
        }

        if input.title.is_empty() {
            return Err(RegistryError::InvalidInput("title is required".into()));
        }

        analytics::validate_questions(&input.questions)?;

        if let Some(role) = &input.target_role {
            if Role::parse(role) == Role::Other && role != "other" {
                return Err(RegistryError::InvalidInput(format!(
                    "unknown target role: {}",
                    role
                )));
            }
        }

        for (label, stamp) in [("opens_at", &input.opens_at), ("closes_at", &input.closes_at)] {
            if let Some(s) = stamp {
                DateTime::parse_from_rfc3339(s).map_err(|e| {
                    RegistryError::InvalidInput(format!("{} is not RFC 3339: {}", label, e))
                })?;
            }
        }

        let questions_json = serde_json::to_string(&input.questions)?;

        let result = self.db.with_conn_mut(|conn| {
            surveys::create_survey(conn, &principal.id, &questions_json, &input)
        })?;

        self.events.emit(RegistryEvent::SurveyCreated {
            id: result.id.clone(),
            title: result.title.clone(),
        });

        Ok(result)
    }

    /// Get a survey the principal may read (hidden surveys read as absent)
    pub fn get(&self, principal: &Principal, id: &str) -> Result<surveys::SurveyRow, RegistryError> {
        let row = self
            .db
            .with_conn(|conn| surveys::get_survey(conn, id))?
            .ok_or_else(|| RegistryError::NotFound(format!("survey not found: {}", id)))?;

        if !visibility::allows(principal, &row.head(), Access::Read) {
            return Err(RegistryError::NotFound(format!("survey not found: {}", id)));
        }

        Ok(row)
    }

    /// List surveys visible to the principal
    pub fn list(
        &self,
        principal: &Principal,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<surveys::SurveyRow>, RegistryError> {
        let scope = visibility::scope(principal, Access::Read);
        self.db
            .with_conn(|conn| surveys::list_surveys(conn, &scope, limit, offset))
    }

    /// Update the invitation count used for response-rate computation
    pub fn set_invited_count(
        &self,
        principal: &Principal,
        id: &str,
        invited_count: Option<i64>,
    ) -> Result<surveys::SurveyRow, RegistryError> {
        let survey = self.get(principal, id)?;
        self.require_write(principal, &survey)?;

        let result = self
            .db
            .with_conn_mut(|conn| surveys::set_invited_count(conn, id, invited_count))?;

        self.cache.remove(id);

        Ok(result)
    }

    // =========================================================================
    // Response submission
    // =========================================================================

    /// Submit a response for a survey.
    ///
    /// Checks, in order: survey visibility, availability window, role
    /// targeting, answer validity. Completeness is computed here from
    /// the required-question coverage; the per-respondent uniqueness
    /// invariant is enforced by the store inside its write transaction.
    pub fn submit_response(
        &self,
        principal: &Principal,
        survey_id: &str,
        input: SubmitResponseInput,
    ) -> Result<surveys::ResponseRow, RegistryError> {
        let survey = self.get(principal, survey_id)?;
        let now = Utc::now();

        if let Some(opens_at) = &survey.opens_at {
            let opens = DateTime::parse_from_rfc3339(opens_at)
                .map_err(|e| RegistryError::Internal(format!("stored opens_at invalid: {}", e)))?;
            if now < opens {
                return Err(RegistryError::InvalidInput("survey is not open yet".into()));
            }
        }
        if let Some(closes_at) = &survey.closes_at {
            let closes = DateTime::parse_from_rfc3339(closes_at)
                .map_err(|e| RegistryError::Internal(format!("stored closes_at invalid: {}", e)))?;
            if now > closes {
                return Err(RegistryError::InvalidInput("survey has closed".into()));
            }
        }

        if let Some(target) = &survey.target_role {
            let target_role = Role::parse(target);
            if principal.role != target_role && principal.role != Role::Admin {
                return Err(RegistryError::PermissionDenied(format!(
                    "survey targets role {}",
                    target
                )));
            }
        }

        let respondent_id = if survey.is_anonymous {
            None
        } else {
            if principal.is_anonymous() {
                return Err(RegistryError::Auth("authentication required".into()));
            }
            Some(principal.id.clone())
        };

        let questions = self.parse_questions(&survey)?;
        analytics::validate_answers(&questions, &input.answers)?;
        let is_complete = analytics::is_complete(&questions, &input.answers);

        let answers_json = serde_json::to_string(&input.answers)?;

        let row = self.db.with_conn_mut(|conn| {
            surveys::create_response(
                conn,
                surveys::CreateResponseInput {
                    survey_id: survey.id.clone(),
                    respondent_id,
                    answers_json,
                    is_complete,
                    completion_time_secs: input.completion_time_secs,
                    enforce_unique: !survey.allow_multiple_responses,
                },
            )
        })?;

        // The cached snapshot is stale the moment a response lands
        self.cache.remove(survey_id);

        self.events.emit(RegistryEvent::ResponseSubmitted {
            survey_id: survey.id.clone(),
            response_id: row.id.clone(),
            is_complete,
        });

        Ok(row)
    }

    /// List raw responses; restricted to principals who may write the survey
    pub fn list_responses(
        &self,
        principal: &Principal,
        survey_id: &str,
    ) -> Result<Vec<surveys::ResponseRow>, RegistryError> {
        let survey = self.get(principal, survey_id)?;
        self.require_write(principal, &survey)?;

        self.db
            .with_conn(|conn| surveys::list_responses(conn, survey_id))
    }

    // =========================================================================
    // Analytics
    // =========================================================================

    /// Compute (or serve cached) analytics for a survey.
    ///
    /// `invited_override` replaces the survey's stored invitation count
    /// for this computation. Restricted to principals who may write the
    /// survey.
    pub fn analytics(
        &self,
        principal: &Principal,
        survey_id: &str,
        invited_override: Option<u64>,
    ) -> Result<AnalyticsSnapshot, RegistryError> {
        let survey = self.get(principal, survey_id)?;
        self.require_write(principal, &survey)?;

        let invited = invited_override.or(survey.invited_count.map(|n| n.max(0) as u64));

        if let Some(entry) = self.cache.get(survey_id) {
            let age = Utc::now().signed_duration_since(entry.computed_at);
            if entry.snapshot.invited == invited && age.num_seconds() < self.cache_ttl_secs as i64 {
                debug!(survey = %survey_id, "Serving cached analytics snapshot");
                return Ok(entry.snapshot.clone());
            }
        }

        let questions = self.parse_questions(&survey)?;
        let responses = self
            .db
            .with_conn(|conn| surveys::list_responses(conn, survey_id))?;

        let inputs: Vec<ResponseInput> = responses
            .iter()
            .map(|r| {
                let answers = serde_json::from_str::<serde_json::Map<String, Value>>(&r.answers_json)
                    .unwrap_or_default();
                ResponseInput {
                    answers,
                    is_complete: r.is_complete,
                    completion_time_secs: r.completion_time_secs,
                }
            })
            .collect();

        let computed_at = Utc::now();
        let analytics = analytics::aggregate(&questions, &inputs, invited);

        self.events.emit(RegistryEvent::AnalyticsComputed {
            survey_id: survey_id.to_string(),
            total_responses: analytics.total_responses,
        });

        let snapshot = AnalyticsSnapshot {
            survey_id: survey_id.to_string(),
            computed_at: computed_at.to_rfc3339(),
            invited,
            analytics,
        };

        self.cache.insert(
            survey_id.to_string(),
            CacheEntry {
                snapshot: snapshot.clone(),
                computed_at,
            },
        );

        Ok(snapshot)
    }

    /// Flat CSV export of the per-question distributions
    pub fn analytics_csv(
        &self,
        principal: &Principal,
        survey_id: &str,
        invited_override: Option<u64>,
    ) -> Result<String, RegistryError> {
        let snapshot = self.analytics(principal, survey_id, invited_override)?;

        let mut out = String::from("question_id,prompt,type,answered_count,response_rate,answer,count\n");
        for q in &snapshot.analytics.questions {
            if q.distribution.is_empty() {
                out.push_str(&format!(
                    "{},{},{},{},{},,\n",
                    csv_escape(&q.question_id),
                    csv_escape(&q.prompt),
                    q.question_type,
                    q.answered_count,
                    q.response_rate,
                ));
            } else {
                for (answer, count) in &q.distribution {
                    out.push_str(&format!(
                        "{},{},{},{},{},{},{}\n",
                        csv_escape(&q.question_id),
                        csv_escape(&q.prompt),
                        q.question_type,
                        q.answered_count,
                        q.response_rate,
                        csv_escape(answer),
                        count,
                    ));
                }
            }
        }

        Ok(out)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn parse_questions(&self, survey: &surveys::SurveyRow) -> Result<Vec<Question>, RegistryError> {
        serde_json::from_str(&survey.questions_json)
            .map_err(|e| RegistryError::Internal(format!("stored questions invalid: {}", e)))
    }

    fn require_write(
        &self,
        principal: &Principal,
        survey: &surveys::SurveyRow,
    ) -> Result<(), RegistryError> {
        if !visibility::allows(principal, &survey.head(), Access::Write) {
            return Err(RegistryError::PermissionDenied(
                "not allowed to manage this survey".into(),
            ));
        }
        Ok(())
    }
}

/// Quote a CSV field when it contains a delimiter, quote or newline
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
