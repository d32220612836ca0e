use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use nova_portal::assessment::{AssessmentAnalysis, AssessmentData};
use nova_portal::auth::AuthTokens;
use nova_portal::build_router;
use nova_portal::content::{
    ContentGenerator, CourseBrief, CourseOutline, LearnerProfile, ModuleOutline, Recommendations,
    UnavailableGenerator,
};
use nova_portal::db::Database;
use nova_portal::error::LlmError;
use nova_portal::AppState;

const TOKEN: &str = "test-token";
const OTHER_TOKEN: &str = "other-token";
const GENERATE_URI: &str = "/api/v1/courses/generate";
const ROLES_URI: &str = "/api/v1/auth/roles";

/// Returns a fixed two-module course; recommendations always fail
struct FixedCourseGenerator;

#[async_trait]
impl ContentGenerator for FixedCourseGenerator {
    async fn generate_recommendations(
        &self,
        _: &AssessmentData,
        _: &AssessmentAnalysis,
    ) -> Result<Recommendations, LlmError> {
        Err(LlmError::EmptyResponse)
    }

    async fn generate_course(
        &self,
        brief: &CourseBrief,
        _: &LearnerProfile,
    ) -> Result<CourseOutline, LlmError> {
        Ok(CourseOutline {
            title: format!("{} essentials", brief.subject),
            description: "A short course".to_string(),
            modules: vec![
                ModuleOutline {
                    title: "Warm up".to_string(),
                    content: "Basics".to_string(),
                    duration_minutes: 20,
                    activities: vec!["Quiz".to_string()],
                },
                ModuleOutline {
                    title: "Practice".to_string(),
                    content: "Exercises".to_string(),
                    duration_minutes: 40,
                    activities: vec![],
                },
            ],
        })
    }
}

fn setup(content: Arc<dyn ContentGenerator>) -> (Router, Arc<AppState>) {
    let db = Database::open_in_memory().unwrap();
    let mut tokens = HashMap::new();
    tokens.insert(TOKEN.to_string(), "learner-1".to_string());
    tokens.insert(OTHER_TOKEN.to_string(), "learner-2".to_string());
    let state = AppState::new(db, content, AuthTokens::new(&tokens));
    (build_router(state.clone()), state)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    call_as(app, TOKEN, method, uri, body).await
}

async fn call_as(
    app: &Router,
    token: &str,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value =
        if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

fn course_request(subject: &str, difficulty: i64) -> Value {
    json!({
        "subjectId": subject,
        "educationLevelId": "o-level",
        "contentType": "lesson",
        "difficulty": difficulty,
        "timeAllocation": 60,
        "learningObjectives": ["Solve linear equations", "Graph a line"]
    })
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let (app, _) = setup(Arc::new(UnavailableGenerator));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_api_rejects_missing_and_unknown_tokens() {
    let (app, _) = setup(Arc::new(UnavailableGenerator));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/v1/subjects").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/subjects")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reference_data() {
    let (app, _) = setup(Arc::new(UnavailableGenerator));

    let (status, subjects) = call(&app, Method::GET, "/api/v1/subjects", None).await;
    assert_eq!(status, StatusCode::OK);
    let maths = subjects
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["id"] == "mathematics")
        .unwrap();
    assert!(maths["topics"].as_array().unwrap().iter().any(|t| t["name"] == "Linear Equations"));

    let (status, levels) = call(&app, Method::GET, "/api/v1/education-levels", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(levels
        .as_array()
        .unwrap()
        .iter()
        .any(|l| l["id"] == "o-level" && l["name"] == "O-Level"));
}

#[tokio::test]
async fn test_generate_course_stores_modules_and_awards_xp() {
    let (app, state) = setup(Arc::new(FixedCourseGenerator));

    let (status, body) =
        call(&app, Method::POST, GENERATE_URI, Some(course_request("mathematics", 5))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generation"]["status"], "model");
    assert_eq!(body["course"]["title"], "Mathematics essentials");
    assert_eq!(body["modules"].as_array().unwrap().len(), 2);
    assert_eq!(body["xpAwarded"], 50);

    let ledger = state.db.xp_transactions("learner-1").unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].amount, 50);
    assert_eq!(ledger[0].category, "course");

    let course_id = body["course"]["id"].as_str().unwrap();
    assert_eq!(state.db.get_course_modules(course_id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_generate_course_falls_back_without_model() {
    let (app, _) = setup(Arc::new(UnavailableGenerator));

    let (status, body) =
        call(&app, Method::POST, GENERATE_URI, Some(course_request("mathematics", 3))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generation"]["status"], "fallback");
    assert!(!body["modules"].as_array().unwrap().is_empty());
    assert_eq!(body["course"]["generationStatus"], "fallback");
}

#[tokio::test]
async fn test_generate_course_validation() {
    let (app, state) = setup(Arc::new(FixedCourseGenerator));

    let (status, _) =
        call(&app, Method::POST, GENERATE_URI, Some(course_request("alchemy", 5))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) =
        call(&app, Method::POST, GENERATE_URI, Some(course_request("mathematics", 0))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("difficulty"));

    let mut request = course_request("mathematics", 5);
    request["learningObjectives"] = json!(["  "]);
    let (status, _) = call(&app, Method::POST, GENERATE_URI, Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was awarded for rejected requests
    assert!(state.db.xp_transactions("learner-1").unwrap().is_empty());
}

#[tokio::test]
async fn test_role_management() {
    let (app, _) = setup(Arc::new(UnavailableGenerator));

    let (status, roles) = call(&app, Method::GET, ROLES_URI, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roles, json!({ "roles": ["student"], "active": "student" }));

    let (status, _) = call(&app, Method::PUT, ROLES_URI, Some(json!({ "role": "teacher" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, roles) =
        call(&app, Method::POST, ROLES_URI, Some(json!({ "role": "teacher" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roles["roles"], json!(["student", "teacher"]));

    let (_, roles) = call(&app, Method::PUT, ROLES_URI, Some(json!({ "role": "teacher" }))).await;
    assert_eq!(roles["active"], "teacher");

    let (status, _) = call(&app, Method::DELETE, "/api/v1/auth/roles/student", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, roles) = call(&app, Method::DELETE, "/api/v1/auth/roles/teacher", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roles, json!({ "roles": ["student"], "active": "student" }));
}

#[tokio::test]
async fn test_analyze_awards_assessment_xp() {
    let (app, state) = setup(Arc::new(UnavailableGenerator));

    let data = json!({
        "basicInfo": { "role": "Student" },
        "technicalInterests": ["programming"],
        "cognitiveScores": { "analytical": 85, "logical": 85, "verbal": 45, "spatial": 85 },
        "goals": { "careerGoals": "Build software", "timelineMonths": 6 }
    });
    let (status, body) = call(&app, Method::POST, "/api/v1/assessment/analyze", Some(data)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recommendations"]["status"], "fallback");
    assert!(!body["recommendations"]["value"]["careers"].as_array().unwrap().is_empty());

    let roadmap_id = body["roadmapId"].as_str().unwrap();
    assert!(state.db.count_roadmap_milestones(roadmap_id).unwrap() > 0);
    assert_eq!(state.db.count_assessments("learner-1").unwrap(), 1);

    let ledger = state.db.xp_transactions("learner-1").unwrap();
    assert_eq!(ledger[0].amount, 100);
    assert_eq!(ledger[0].category, "assessment");
    assert!(ledger.iter().any(|t| t.reason == "achievement:first-steps"));
    assert!(ledger.iter().any(|t| t.reason == "achievement:goal-setter"));
}

#[tokio::test]
async fn test_nova_session_walkthrough() {
    let (app, state) = setup(Arc::new(UnavailableGenerator));

    let (status, started) = call(&app, Method::POST, "/api/v1/assessment/sessions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["phase"]["phase"], "welcome");
    assert!(started["response"]["message"].as_str().unwrap().contains("Nova"));
    let session_id = started["sessionId"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/assessment/sessions/{session_id}/messages");

    let (_, reply) = call(&app, Method::POST, &uri, Some(json!({ "message": "ready" }))).await;
    assert_eq!(reply["gamification"], Value::Null);

    let (_, reply) = call(&app, Method::POST, &uri, Some(json!({ "message": "Student" }))).await;
    assert_eq!(reply["response"]["xpReward"], 10);
    assert_eq!(reply["response"]["achievement"], "First Steps");

    let answers = [
        "Beginner",
        "O-Level",
        "Harare",
        "programming, data analysis and design",
        "$8",
        "1",
        "Quick",
        "12",
        "Agree",
        "Strongly agree",
        "Agree",
        "Neutral",
        "Disagree",
        "Hands-on",
    ];
    for answer in answers {
        let (status, reply) =
            call(&app, Method::POST, &uri, Some(json!({ "message": answer }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["completed"], false);
    }

    let goal = json!({ "message": "I want to become a data scientist" });
    let (_, reply) = call(&app, Method::POST, &uri, Some(goal)).await;
    assert_eq!(reply["completed"], true);
    assert_eq!(reply["phase"]["phase"], "results");

    let (status, _) =
        call(&app, Method::POST, &uri, Some(json!({ "message": "hello again" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let session_uri = format!("/api/v1/assessment/sessions/{session_id}");
    let (status, session) = call(&app, Method::GET, &session_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["completed"], true);
    assert_eq!(session["inferredTraits"].as_array().unwrap().len(), 5);

    let profile = state.db.load_gamification("learner-1").unwrap();
    assert!(profile.is_unlocked("assessment-complete"));
    assert!(profile.is_unlocked("goal-setter"));

    let (status, view) = call(&app, Method::GET, "/api/v1/gamification/profile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["achievements"].as_array().unwrap().len(), 10);
    assert_eq!(view["maxLevel"], 15);
    assert_eq!(view["unlockedCount"], profile.unlocked_count());
    assert_eq!(view["profile"]["totalXp"], profile.total_xp);
}

#[tokio::test]
async fn test_sessions_are_scoped_to_their_owner() {
    let (app, state) = setup(Arc::new(UnavailableGenerator));

    let (_, started) = call(&app, Method::POST, "/api/v1/assessment/sessions", None).await;
    let session_id = started["sessionId"].as_str().unwrap().to_string();
    let session_uri = format!("/api/v1/assessment/sessions/{session_id}");
    let messages_uri = format!("{session_uri}/messages");

    let (status, _) = call_as(&app, OTHER_TOKEN, Method::GET, &session_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let message = json!({ "message": "ready" });
    let (status, _) = call_as(&app, OTHER_TOKEN, Method::POST, &messages_uri, Some(message)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The owner's session is untouched by the other user's attempts
    let (status, session) = call(&app, Method::GET, &session_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["version"], 0);
    assert!(session["context"]["history"].as_array().unwrap().is_empty());
    assert!(state.db.xp_transactions("learner-2").unwrap().is_empty());

    let missing = "/api/v1/assessment/sessions/not-a-session";
    let (status, _) = call(&app, Method::GET, missing, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_analyze_caps_roadmap_timeline() {
    let (app, _) = setup(Arc::new(UnavailableGenerator));

    let data = json!({
        "technicalInterests": ["programming"],
        "goals": { "careerGoals": "Build software", "timelineMonths": u32::MAX }
    });
    let (status, body) = call(&app, Method::POST, "/api/v1/assessment/analyze", Some(data)).await;
    assert_eq!(status, StatusCode::OK);
    let months: Vec<u64> = body["roadmap"]["milestones"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["targetMonth"].as_u64().unwrap())
        .collect();
    assert!(!months.is_empty());
    assert!(months.iter().all(|m| *m <= 120));
}
