use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use actix_web::{
    http::{header, Method, StatusCode},
    test, App,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use ticket_booking_service::{
    db::memory::MemoryStore,
    models::Role,
    service::{
        auth::TokenIssuer,
        notification::{
            DeliveryError, Dispatcher, DispatcherConfig, DispatcherHandle, Job, Notifier,
        },
        security::{cors, security_headers},
    },
    AppState,
};

#[derive(Default)]
struct RecordingNotifier {
    jobs: Mutex<Vec<Job>>,
}

impl RecordingNotifier {
    fn job_names(&self) -> Vec<&'static str> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .map(|job| job.task.job_name())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, job: &Job) -> Result<(), DeliveryError> {
        self.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }
}

fn state() -> (AppState, Arc<RecordingNotifier>, DispatcherHandle) {
    let notifier = Arc::new(RecordingNotifier::default());
    let (dispatcher, handle) = Dispatcher::start(
        notifier.clone(),
        DispatcherConfig {
            retry_backoff: Duration::from_millis(1),
            ..DispatcherConfig::default()
        },
    );
    let state = AppState::new(
        MemoryStore::new(),
        Arc::new(dispatcher),
        TokenIssuer::new(b"integration-secret", Duration::from_secs(3600)),
    );
    (state, notifier, handle)
}

macro_rules! app {
    ($state:expr) => {{
        let state = $state.clone();
        test::init_service(App::new().configure(move |cfg| state.configure(cfg))).await
    }};
}

/// Sends a request and returns the status with the body parsed as JSON.
macro_rules! call {
    ($app:expr, $req:expr) => {{
        let resp = test::call_service(&$app, $req.to_request()).await;
        let status = resp.status();
        let body = test::read_body(resp).await;
        let json: Value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }};
}

macro_rules! register_and_login {
    ($app:expr, $email:expr, $role:expr) => {{
        let (status, _) = call!(
            $app,
            test::TestRequest::post()
                .uri("/api/auth/register")
                .set_json(json!({ "email": $email, "password": "password123", "role": $role }))
        );
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = call!(
            $app,
            test::TestRequest::post()
                .uri("/api/auth/login")
                .set_json(json!({ "email": $email, "password": "password123" }))
        );
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }};
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

fn event_body(total: i64) -> Value {
    json!({
        "title": "Tech Conference 2026",
        "description": "The best tech conference ever.",
        "date": "2026-11-01T18:00:00Z",
        "location": "Virtual",
        "totalTickets": total
    })
}

#[actix_rt::test]
async fn end_to_end_booking_update_and_cancellation() {
    let (state, notifier, handle) = state();
    let app = app!(state);

    let org = register_and_login!(app, "org@example.com", "ORGANIZER");
    let cust = register_and_login!(app, "cust@example.com", "CUSTOMER");

    let (status, event) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/events")
            .insert_header(bearer(&org))
            .set_json(event_body(100))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(event["availableTickets"], 100);
    let event_id = event["id"].as_str().unwrap().to_string();

    let (status, booking) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/bookings")
            .insert_header(bearer(&cust))
            .set_json(json!({ "eventId": event_id, "ticketsCount": 2 }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["ticketsCount"], 2);
    assert_eq!(booking["event"]["availableTickets"], 98);

    let (_, events) = call!(app, test::TestRequest::get().uri("/api/events"));
    assert_eq!(events[0]["availableTickets"], 98);
    assert_eq!(events[0]["organizer"]["email"], "org@example.com");

    let (status, updated) = call!(
        app,
        test::TestRequest::put()
            .uri(&format!("/api/events/{event_id}"))
            .insert_header(bearer(&org))
            .set_json(json!({ "title": "Tech Conference 2026 - UPDATED" }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Tech Conference 2026 - UPDATED");
    assert_eq!(updated["availableTickets"], 98);

    let (status, _) = call!(
        app,
        test::TestRequest::delete()
            .uri(&format!("/api/events/{event_id}"))
            .insert_header(bearer(&org))
    );
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, events) = call!(app, test::TestRequest::get().uri("/api/events"));
    assert_eq!(events, json!([]));
    let (status, _) = call!(
        app,
        test::TestRequest::get().uri(&format!("/api/events/{event_id}"))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, mine) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/bookings/my-bookings")
            .insert_header(bearer(&cust))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["event"], Value::Null);

    handle.shutdown().await;
    assert_eq!(
        notifier.job_names(),
        vec!["booking-confirmation", "event-update", "event-cancellation"]
    );
}

#[actix_rt::test]
async fn register_rejects_duplicates_and_bad_input() {
    let (state, _, handle) = state();
    let app = app!(state);
    register_and_login!(app, "dup@example.com", "CUSTOMER");

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({ "email": "dup@example.com", "password": "x", "role": "CUSTOMER" }))
    );
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "User already exists");

    let (status, _) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({ "email": "new@example.com", "password": "x", "role": "ADMIN" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/auth/register")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
    handle.shutdown().await;
}

#[actix_rt::test]
async fn login_failures_share_one_response() {
    let (state, _, handle) = state();
    let app = app!(state);
    register_and_login!(app, "c@example.com", "CUSTOMER");

    let wrong_password = call!(
        app,
        test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": "c@example.com", "password": "wrong" }))
    );
    let unknown_email = call!(
        app,
        test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": "nobody@example.com", "password": "password123" }))
    );
    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_email);
    handle.shutdown().await;
}

#[actix_rt::test]
async fn protected_routes_require_valid_token_and_role() {
    let (state, _, handle) = state();
    let app = app!(state);
    let cust = register_and_login!(app, "c@example.com", "CUSTOMER");

    let (status, _) = call!(
        app,
        test::TestRequest::post().uri("/api/events").set_json(event_body(10))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/events")
            .insert_header(bearer("not-a-token"))
            .set_json(event_body(10))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/events")
            .insert_header(bearer(&cust))
            .set_json(event_body(10))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call!(app, test::TestRequest::get().uri("/api/bookings/my-bookings"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    handle.shutdown().await;
}

#[actix_rt::test]
async fn other_organizers_cannot_touch_an_event() {
    let (state, notifier, handle) = state();
    let app = app!(state);
    let owner = register_and_login!(app, "owner@example.com", "ORGANIZER");
    let rival = register_and_login!(app, "rival@example.com", "ORGANIZER");

    let (_, event) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/events")
            .insert_header(bearer(&owner))
            .set_json(event_body(10))
    );
    let uri = format!("/api/events/{}", event["id"].as_str().unwrap());

    let (status, _) = call!(
        app,
        test::TestRequest::put()
            .uri(&uri)
            .insert_header(bearer(&rival))
            .set_json(json!({ "totalTickets": 500 }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call!(
        app,
        test::TestRequest::delete().uri(&uri).insert_header(bearer(&rival))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call!(
        app,
        test::TestRequest::put()
            .uri("/api/events/not-a-uuid")
            .insert_header(bearer(&owner))
            .set_json(json!({ "title": "x" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    handle.shutdown().await;
    assert!(notifier.job_names().is_empty());
}

#[actix_rt::test]
async fn shrinking_total_below_booked_tickets_is_rejected() {
    let (state, _, handle) = state();
    let app = app!(state);
    let org = register_and_login!(app, "org@example.com", "ORGANIZER");
    let cust = register_and_login!(app, "cust@example.com", "CUSTOMER");

    let (_, event) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/events")
            .insert_header(bearer(&org))
            .set_json(event_body(10))
    );
    let event_id = event["id"].as_str().unwrap().to_string();
    call!(
        app,
        test::TestRequest::post()
            .uri("/api/bookings")
            .insert_header(bearer(&cust))
            .set_json(json!({ "eventId": event_id, "ticketsCount": 6 }))
    );

    let uri = format!("/api/events/{event_id}");
    let (status, _) = call!(
        app,
        test::TestRequest::put()
            .uri(&uri)
            .insert_header(bearer(&org))
            .set_json(json!({ "totalTickets": 5 }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = call!(
        app,
        test::TestRequest::put()
            .uri(&uri)
            .insert_header(bearer(&org))
            .set_json(json!({ "totalTickets": 8 }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["totalTickets"], 8);
    assert_eq!(updated["availableTickets"], 2);
    handle.shutdown().await;
}

#[actix_rt::test]
async fn booking_validation_and_shortage() {
    let (state, notifier, handle) = state();
    let app = app!(state);
    let org = register_and_login!(app, "org@example.com", "ORGANIZER");
    let cust = register_and_login!(app, "cust@example.com", "CUSTOMER");
    let (_, event) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/events")
            .insert_header(bearer(&org))
            .set_json(event_body(3))
    );
    let event_id = event["id"].as_str().unwrap().to_string();

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/bookings")
            .insert_header(bearer(&cust))
            .set_json(json!({ "eventId": event_id, "ticketsCount": 0 }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Tickets count must be positive");

    let (status, _) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/bookings")
            .insert_header(bearer(&cust))
            .set_json(json!({ "ticketsCount": 1 }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/bookings")
            .insert_header(bearer(&cust))
            .set_json(json!({ "eventId": event_id, "ticketsCount": 4 }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Not enough tickets available");

    let (status, _) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/bookings")
            .insert_header(bearer(&cust))
            .set_json(json!({
                "eventId": "00000000-0000-0000-0000-000000000000",
                "ticketsCount": 1
            }))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);

    handle.shutdown().await;
    assert!(notifier.job_names().is_empty());
}

#[actix_rt::test]
async fn concurrent_bookings_over_http_never_oversell() {
    let (state, notifier, handle) = state();
    let app = app!(state);
    let org = register_and_login!(app, "org@example.com", "ORGANIZER");
    let cust = register_and_login!(app, "cust@example.com", "CUSTOMER");
    let (_, event) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/events")
            .insert_header(bearer(&org))
            .set_json(event_body(10))
    );
    let event_id = event["id"].as_str().unwrap().to_string();

    let requests = (0..12).map(|_| {
        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/bookings")
                .insert_header(bearer(&cust))
                .set_json(json!({ "eventId": event_id, "ticketsCount": 3 }))
                .to_request(),
        )
    });
    let statuses: Vec<StatusCode> = futures::future::join_all(requests)
        .await
        .iter()
        .map(|resp| resp.status())
        .collect();

    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let rejected = statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count();
    assert_eq!(created, 3);
    assert_eq!(rejected, 9);

    let (_, found) = call!(
        app,
        test::TestRequest::get().uri(&format!("/api/events/{event_id}"))
    );
    assert_eq!(found["availableTickets"], 1);

    handle.shutdown().await;
    assert_eq!(notifier.job_names().len(), 3);
}

#[actix_rt::test]
async fn unknown_routes_answer_json_not_found() {
    let (state, _, handle) = state();
    let app = app!(state);
    let (status, body) = call!(app, test::TestRequest::get().uri("/api/nope"));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route not found");

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    handle.shutdown().await;
}

#[actix_rt::test]
async fn tokens_of_vanished_users_cannot_create_records() {
    let (state, notifier, handle) = state();
    let app = app!(state);
    // Same secret as `state()`, for a user this store has never seen.
    let issuer = TokenIssuer::new(b"integration-secret", Duration::from_secs(3600));
    let ghost = issuer.issue(Uuid::new_v4(), Role::Organizer).unwrap();

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/events")
            .insert_header(bearer(&ghost))
            .set_json(event_body(10))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User no longer exists");

    let (status, events) = call!(app, test::TestRequest::get().uri("/api/events"));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(events, json!([]));

    handle.shutdown().await;
    assert!(notifier.job_names().is_empty());
}

#[actix_rt::test]
async fn responses_carry_cors_and_security_headers() {
    let (state, _, handle) = state();
    let app = {
        let state = state.clone();
        test::init_service(
            App::new()
                .wrap(security_headers())
                .wrap(cors(&[]))
                .configure(move |cfg| state.configure(cfg)),
        )
        .await
    };

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/events")
            .insert_header((header::ORIGIN, "http://frontend.test"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://frontend.test"
    );
    assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "SAMEORIGIN");

    let preflight = test::call_service(
        &app,
        test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/api/bookings")
            .insert_header((header::ORIGIN, "http://frontend.test"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "POST"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization"))
            .to_request(),
    )
    .await;
    assert_eq!(preflight.status(), StatusCode::OK);
    assert!(preflight
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    handle.shutdown().await;
}
