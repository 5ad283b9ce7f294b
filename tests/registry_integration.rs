//! Integration tests for the registry service layer
//!
//! These run the full directory -> visibility -> store pipeline over an
//! in-memory database: principals are registered and resolved (with
//! managed units derived from unit staffing), then content, surveys and
//! petitions flow through the services exactly as HTTP handlers drive
//! them.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use sehhat_registry::analytics::{Question, QuestionKind};
use sehhat_registry::db::{content, principals, surveys, units};
use sehhat_registry::services::{Services, SubmitResponseInput};
use sehhat_registry::{Principal, RegistryDb, RegistryError, Role};

/// Build services over a fresh in-memory database with a seeded admin
fn setup() -> (Services, Principal) {
    let db = Arc::new(RegistryDb::open_in_memory().unwrap());
    let services = Services::new(db);

    services.directory.bootstrap_admin("root").unwrap();
    let admin = services.directory.resolve(Some("root")).unwrap();
    assert_eq!(admin.role, Role::Admin);

    (services, admin)
}

/// Register a principal and resolve it into the resolver shape
fn register(services: &Services, admin: &Principal, id: &str, role: &str) -> Principal {
    services
        .directory
        .create_principal(
            admin,
            principals::CreatePrincipalInput {
                id: id.to_string(),
                display_name: id.to_string(),
                role: role.to_string(),
            },
        )
        .unwrap();
    services.directory.resolve(Some(id)).unwrap()
}

fn create_unit(services: &Services, admin: &Principal, id: &str, aamil: Option<&str>) {
    services
        .directory
        .create_unit(
            admin,
            units::CreateUnitInput {
                id: id.to_string(),
                name: format!("Moze {}", id),
                aamil_id: aamil.map(|a| a.to_string()),
                coordinator_id: None,
            },
        )
        .unwrap();
}

fn photo(title: &str, unit: Option<&str>, public: bool) -> content::CreateContentInput {
    content::CreateContentInput {
        id: None,
        kind: "photo".into(),
        title: title.into(),
        body: None,
        unit_id: unit.map(|u| u.to_string()),
        parent_id: None,
        is_public: public,
    }
}

fn rating_survey(title: &str) -> surveys::CreateSurveyInput {
    surveys::CreateSurveyInput {
        id: None,
        title: title.into(),
        description: None,
        questions: vec![Question {
            id: "q1".into(),
            prompt: "Rate the clinic".into(),
            required: true,
            kind: QuestionKind::Rating { scale: 5 },
        }],
        target_role: None,
        opens_at: None,
        closes_at: None,
        is_anonymous: false,
        allow_multiple_responses: false,
        invited_count: None,
        unit_id: None,
        is_public: true,
    }
}

fn answers(value: serde_json::Value) -> SubmitResponseInput {
    SubmitResponseInput {
        answers: value.as_object().cloned().unwrap_or_default(),
        completion_time_secs: None,
    }
}

/// Full role-by-role visibility matrix over content owned across units
#[test]
fn test_visibility_matrix_across_roles() {
    let (services, admin) = setup();

    let aamil = register(&services, &admin, "aamil-1", "aamil");
    let student = register(&services, &admin, "student-1", "student");
    let doctor = register(&services, &admin, "doctor-1", "doctor");

    create_unit(&services, &admin, "moze-1", Some("aamil-1"));

    // Staffing changed after registration: re-resolve to pick it up
    let aamil = services.directory.resolve(Some(&aamil.id)).unwrap();
    assert!(aamil.managed_units.contains("moze-1"));

    services
        .content
        .create(&student, photo("public photo", Some("moze-1"), true))
        .unwrap();
    services
        .content
        .create(&student, photo("private photo", Some("moze-1"), false))
        .unwrap();
    services
        .content
        .create(&doctor, photo("unitless private", None, false))
        .unwrap();

    let q = content::ContentQuery::default();

    // Admin sees public and private content of every unit
    assert_eq!(services.content.list(&admin, &q).unwrap().len(), 3);
    // Unit aamil sees the unit's items plus anything public
    assert_eq!(services.content.list(&aamil, &q).unwrap().len(), 2);
    // Owner sees their own plus public
    assert_eq!(services.content.list(&student, &q).unwrap().len(), 2);
    // Doctor sees their own plus public
    assert_eq!(services.content.list(&doctor, &q).unwrap().len(), 2);
    // Anonymous sees only public
    assert_eq!(
        services
            .content
            .list(&Principal::anonymous(), &q)
            .unwrap()
            .len(),
        1
    );
}

/// Restaffing a unit moves management visibility with it
#[test]
fn test_restaffing_moves_visibility() {
    let (services, admin) = setup();

    register(&services, &admin, "aamil-1", "aamil");
    register(&services, &admin, "aamil-2", "aamil");
    let owner = register(&services, &admin, "student-1", "student");

    create_unit(&services, &admin, "moze-1", Some("aamil-1"));

    let row = services
        .content
        .create(&owner, photo("unit item", Some("moze-1"), false))
        .unwrap();

    let first = services.directory.resolve(Some("aamil-1")).unwrap();
    assert!(services.content.get(&first, &row.id).is_ok());

    services
        .directory
        .assign_staff(&admin, "moze-1", Some("aamil-2"), None)
        .unwrap();

    // Old aamil lost the unit, new one gained it
    let first = services.directory.resolve(Some("aamil-1")).unwrap();
    let second = services.directory.resolve(Some("aamil-2")).unwrap();
    assert!(matches!(
        services.content.get(&first, &row.id),
        Err(RegistryError::NotFound(_))
    ));
    assert!(services.content.get(&second, &row.id).is_ok());
}

/// Spec scenario: duplicate response conflicts, different respondent succeeds
#[test]
fn test_single_response_invariant() {
    let (services, admin) = setup();

    let owner = register(&services, &admin, "aamil-1", "aamil");
    let r1 = register(&services, &admin, "student-1", "student");
    let r2 = register(&services, &admin, "student-2", "student");

    let survey = services.survey.create(&owner, rating_survey("Feedback")).unwrap();

    services
        .survey
        .submit_response(&r1, &survey.id, answers(json!({"q1": "5"})))
        .unwrap();

    let dup = services
        .survey
        .submit_response(&r1, &survey.id, answers(json!({"q1": "4"})));
    assert!(matches!(dup, Err(RegistryError::Conflict(_))));

    services
        .survey
        .submit_response(&r2, &survey.id, answers(json!({"q1": "3"})))
        .unwrap();
}

/// Spec scenario: 10 invitations, 4 responses (3 complete), rating 5/5/3
#[test]
fn test_analytics_fixture_numbers() {
    let (services, admin) = setup();

    let owner = register(&services, &admin, "aamil-1", "aamil");

    let mut input = rating_survey("Feedback");
    input.allow_multiple_responses = true;
    input.invited_count = Some(10);
    let survey = services.survey.create(&owner, input).unwrap();

    let respondent = register(&services, &admin, "student-1", "student");
    for value in ["5", "5", "3"] {
        services
            .survey
            .submit_response(&respondent, &survey.id, answers(json!({"q1": value})))
            .unwrap();
    }
    // Incomplete fourth response: required question left empty
    services
        .survey
        .submit_response(&respondent, &survey.id, answers(json!({"q1": ""})))
        .unwrap();

    let snapshot = services.survey.analytics(&owner, &survey.id, None).unwrap();
    let stats = &snapshot.analytics;

    assert_eq!(stats.total_responses, 4);
    assert_eq!(stats.total_complete_responses, 3);
    assert_eq!(stats.response_rate, 40.0);
    assert_eq!(stats.completion_rate, 75.0);

    let q = &stats.questions[0];
    assert_eq!(q.distribution.get("5"), Some(&2));
    assert_eq!(q.distribution.get("3"), Some(&1));
    assert_eq!(q.average, Some(4.33));
    assert_eq!(q.most_common_answer.as_deref(), Some("5"));

    // Recompute over the same rows: identical numbers
    let again = services.survey.analytics(&owner, &survey.id, None).unwrap();
    assert_eq!(
        serde_json::to_value(&again.analytics).unwrap(),
        serde_json::to_value(stats).unwrap()
    );
}

/// Spec scenario: checkbox answers flatten lists and comma-strings
#[test]
fn test_checkbox_flattening_end_to_end() {
    let (services, admin) = setup();

    let owner = register(&services, &admin, "aamil-1", "aamil");

    let mut input = rating_survey("Services");
    input.questions = vec![Question {
        id: "q1".into(),
        prompt: "Services used".into(),
        required: false,
        kind: QuestionKind::Checkbox {
            options: vec!["A".into(), "B".into(), "C".into()],
        },
    }];
    input.allow_multiple_responses = true;
    let survey = services.survey.create(&owner, input).unwrap();

    let respondent = register(&services, &admin, "student-1", "student");
    for value in [json!(["A", "B"]), json!(["B"]), json!("A, C")] {
        services
            .survey
            .submit_response(&respondent, &survey.id, answers(json!({ "q1": value })))
            .unwrap();
    }

    let snapshot = services.survey.analytics(&owner, &survey.id, None).unwrap();
    let dist = &snapshot.analytics.questions[0].distribution;

    assert_eq!(dist.get("A"), Some(&2));
    assert_eq!(dist.get("B"), Some(&2));
    assert_eq!(dist.get("C"), Some(&1));
}

/// Petitions stay within petitioner/staff/admin reach
#[test]
fn test_petition_flow() {
    let (services, admin) = setup();

    register(&services, &admin, "aamil-1", "aamil");
    let petitioner = register(&services, &admin, "student-1", "student");
    let stranger = register(&services, &admin, "student-2", "student");

    create_unit(&services, &admin, "moze-1", Some("aamil-1"));
    let aamil = services.directory.resolve(Some("aamil-1")).unwrap();

    let row = services
        .petition
        .create(
            &petitioner,
            sehhat_registry::db::petitions::CreatePetitionInput {
                id: None,
                subject: "Assistance request".into(),
                body: "Details".into(),
                unit_id: Some("moze-1".into()),
            },
        )
        .unwrap();

    assert_eq!(services.petition.list(&stranger, 100, 0).unwrap().len(), 0);
    assert_eq!(services.petition.list(&admin, 100, 0).unwrap().len(), 1);

    let reviewed = services.petition.set_status(&aamil, &row.id, "in_review").unwrap();
    assert_eq!(reviewed.status, "in_review");

    assert!(matches!(
        services.petition.set_status(&stranger, &row.id, "resolved"),
        Err(RegistryError::NotFound(_))
    ));
}

/// Deactivated principals stop resolving; their content stays in place
#[test]
fn test_deactivation_blocks_resolution() {
    let (services, admin) = setup();

    let user = register(&services, &admin, "student-1", "student");
    services
        .content
        .create(&user, photo("kept", None, true))
        .unwrap();

    services.directory.set_active(&admin, "student-1", false).unwrap();

    assert!(matches!(
        services.directory.resolve(Some("student-1")),
        Err(RegistryError::Auth(_))
    ));

    let q = content::ContentQuery::default();
    assert_eq!(services.content.list(&admin, &q).unwrap().len(), 1);
}

/// Rows survive a close/reopen cycle on disk
#[test]
fn test_on_disk_persistence() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("registry.db");

    {
        let db = Arc::new(RegistryDb::open(&db_path).unwrap());
        let services = Services::new(db);
        services.directory.bootstrap_admin("root").unwrap();
        let admin = services.directory.resolve(Some("root")).unwrap();
        let user = register(&services, &admin, "student-1", "student");
        services
            .content
            .create(&user, photo("durable", None, true))
            .unwrap();
    }

    let db = Arc::new(RegistryDb::open(&db_path).unwrap());
    let services = Services::new(db.clone());
    let admin = services.directory.resolve(Some("root")).unwrap();

    let q = content::ContentQuery::default();
    let rows = services.content.list(&admin, &q).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "durable");

    let stats = db.stats().unwrap();
    assert_eq!(stats.principal_count, 2);
    assert_eq!(stats.content_count, 1);
}
