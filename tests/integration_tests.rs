use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::Engine;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use busbook::config::AppConfig;
use busbook::db::{self, queries, SqliteStore};
use busbook::ledger::{Ledger, LedgerError, NewBooking, NewPassenger};
use busbook::models::{BookingSnapshot, Gender, Money, Schedule, User};
use busbook::services::auth;
use busbook::services::notify::Notifier;
use busbook::services::payments::signature::stripe_signature_header;
use busbook::services::payments::{PaymentGateway, PaymentIntent};
use busbook::state::AppState;

const WEBHOOK_SECRET: &str = "whsec_test";

// ── Mock Providers ──

#[derive(Default)]
struct MockNotifier {
    confirmed: AtomicUsize,
    proofs: AtomicUsize,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn payment_confirmed(&self, _booking: &BookingSnapshot) -> anyhow::Result<()> {
        self.confirmed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn proof_received(&self, _booking: &BookingSnapshot) -> anyhow::Result<()> {
        self.proofs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockGateway {
    intents: Arc<Mutex<Vec<(i64, String)>>>,
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_intent(
        &self,
        amount: Money,
        booking_id: &str,
        _user_id: &str,
    ) -> anyhow::Result<PaymentIntent> {
        self.intents
            .lock()
            .unwrap()
            .push((amount.cents(), booking_id.to_string()));
        Ok(PaymentIntent {
            payment_intent_id: "pi_test".to_string(),
            client_secret: "pi_test_secret".to_string(),
        })
    }
}

// ── Helpers ──

struct Harness {
    state: Arc<AppState>,
    notifier: Arc<MockNotifier>,
    intents: Arc<Mutex<Vec<(i64, String)>>>,
    _uploads: tempfile::TempDir,
}

impl Harness {
    fn app(&self) -> Router {
        busbook::app(self.state.clone())
    }
}

fn test_config(upload_dir: &str) -> AppConfig {
    AppConfig {
        port: 5000,
        database_url: ":memory:".to_string(),
        jwt_secret: "test-secret".to_string(),
        jwt_ttl_hours: 1,
        stripe_secret_key: "".to_string(),
        stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
        payment_currency: "zar".to_string(),
        smtp_host: "".to_string(),
        smtp_port: 465,
        smtp_user: "".to_string(),
        smtp_pass: "".to_string(),
        smtp_from: "".to_string(),
        upload_dir: upload_dir.to_string(),
        max_proof_bytes: 1024,
        cancellation_window_hours: 24,
        fare_rate_luxury: 2.5,
        fare_rate_semi_luxury: 2.0,
        fare_rate_standard: 1.5,
        cancel_on_payment_failure: true,
        notify_timeout_secs: 1,
        cors_origins: vec![],
        seed_demo_data: true,
    }
}

fn harness() -> Harness {
    let uploads = tempfile::tempdir().unwrap();
    let config = test_config(uploads.path().to_str().unwrap());

    let conn = db::init_db(":memory:").unwrap();
    db::migrations::seed_demo_data(&conn).unwrap();
    let conn = Arc::new(Mutex::new(conn));

    let notifier = Arc::new(MockNotifier::default());
    let intents = Arc::new(Mutex::new(vec![]));
    let ledger = Ledger::new(
        Arc::new(SqliteStore::new(conn.clone())),
        notifier.clone(),
        config.ledger_policy(),
    );

    let state = Arc::new(AppState {
        db: conn,
        config,
        ledger,
        payments: Box::new(MockGateway {
            intents: intents.clone(),
        }),
        notifier: notifier.clone(),
    });

    Harness {
        state,
        notifier,
        intents,
        _uploads: uploads,
    }
}

/// Inserts a user directly and returns a token for it.
fn seed_user(h: &Harness, id: &str, email: &str) -> String {
    let user = User {
        id: id.to_string(),
        first_name: "Sizwe".to_string(),
        last_name: "Mahlangu".to_string(),
        age: 40,
        email: email.to_string(),
        phone: "0821112222".to_string(),
        password_hash: "unused".to_string(),
        next_of_kin_name: "Zanele Mahlangu".to_string(),
        next_of_kin_phone: "0823334444".to_string(),
        registered_at: Utc::now(),
    };
    let db = h.state.db.lock().unwrap();
    assert!(queries::insert_user(&db, &user).unwrap());
    auth::issue_token("test-secret", id, 1).unwrap()
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn passenger(seat: u32) -> Value {
    json!({
        "first_name": "Sizwe",
        "last_name": "Mahlangu",
        "age": 40,
        "gender": "M",
        "seat_id": format!("bus-std-01-seat-{seat}"),
    })
}

fn booking_body(schedule_id: &str, seats: &[u32], total: f64) -> Value {
    json!({
        "bus_id": "bus-std-01",
        "schedule_id": schedule_id,
        "passengers": seats.iter().map(|s| passenger(*s)).collect::<Vec<_>>(),
        "total_fare": total,
    })
}

fn seats_available(h: &Harness, schedule_id: &str) -> i64 {
    let db = h.state.db.lock().unwrap();
    queries::get_schedule_detail(&db, schedule_id)
        .unwrap()
        .unwrap()
        .schedule
        .seats_available
}

fn departure_date(h: &Harness, schedule_id: &str) -> String {
    let db = h.state.db.lock().unwrap();
    queries::get_schedule_detail(&db, schedule_id)
        .unwrap()
        .unwrap()
        .schedule
        .departure_at
        .format("%Y-%m-%d")
        .to_string()
}

fn webhook_request(kind: &str, booking_id: &str, secret: &str) -> Request<Body> {
    let payload = json!({
        "id": "evt_1",
        "type": kind,
        "data": {"object": {"id": "pi_123", "metadata": {"booking_id": booking_id}}},
    })
    .to_string();
    let header = stripe_signature_header(secret, Utc::now().timestamp(), payload.as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .header("Content-Type", "application/json")
        .header("Stripe-Signature", header)
        .body(Body::from(payload))
        .unwrap()
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let h = harness();
    let (status, json) = send(h.app(), request("GET", "/api/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "OK");
    assert_eq!(json["database"], "connected");
}

// ── Accounts ──

#[tokio::test]
async fn test_register_login_profile() {
    let h = harness();
    let form = json!({
        "first_name": "Precious",
        "last_name": "Ndlovu",
        "age": 27,
        "email": "Precious@Example.com",
        "phone": "0825556666",
        "password": "hunter22",
        "next_of_kin_name": "Mpho Ndlovu",
        "next_of_kin_phone": "0827778888",
    });

    let (status, json) = send(h.app(), request("POST", "/api/auth/register", None, Some(form.clone()))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["user"]["email"], "precious@example.com");
    assert!(json["user"].get("password_hash").is_none());

    let mut shouting = form.clone();
    shouting["email"] = json!("PRECIOUS@EXAMPLE.COM");
    let (status, _) = send(h.app(), request("POST", "/api/auth/register", None, Some(shouting))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let login = json!({"email": " precious@example.COM ", "password": "hunter22"});
    let (status, json) = send(h.app(), request("POST", "/api/auth/login", None, Some(login))).await;
    assert_eq!(status, StatusCode::OK);
    let token = json["token"].as_str().unwrap().to_string();

    let (status, json) = send(h.app(), request("GET", "/api/users/profile", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["first_name"], "Precious");

    let wrong = json!({"email": "precious@example.com", "password": "nope"});
    let (status, json) = send(h.app(), request("POST", "/api/auth/login", None, Some(wrong))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "invalid email or password");
}

#[tokio::test]
async fn test_register_rejects_underage() {
    let h = harness();
    let form = json!({
        "first_name": "Kid",
        "last_name": "Ndlovu",
        "age": 15,
        "email": "kid@example.com",
        "phone": "0825556666",
        "password": "hunter22",
        "next_of_kin_name": "Mpho Ndlovu",
        "next_of_kin_phone": "0827778888",
    });
    let (status, _) = send(h.app(), request("POST", "/api/auth/register", None, Some(form))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let h = harness();
    for (method, uri) in [
        ("GET", "/api/users/profile"),
        ("GET", "/api/bookings"),
        ("GET", "/api/bookings/whatever"),
    ] {
        let (status, _) = send(h.app(), request(method, uri, Some("garbage"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

// ── Routes & Schedules ──

#[tokio::test]
async fn test_route_info_with_stops() {
    let h = harness();
    let body = json!({"from_location": "megacity", "to_location": "morena mall"});
    let (status, json) = send(h.app(), request("POST", "/api/routes/info", None, Some(body))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["distance_km"], 20.0);
    assert_eq!(json["stops"].as_array().unwrap().len(), 3);

    let missing = json!({"from_location": "Megacity", "to_location": "Atlantis"});
    let (status, _) = send(h.app(), request("POST", "/api/routes/info", None, Some(missing))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search_quotes_fares() {
    let h = harness();
    let body = json!({
        "from_location": "Megacity",
        "to_location": "Morena Mall",
        "journey_date": departure_date(&h, "sched-mm-std"),
        "passengers": 2,
    });
    let (status, json) = send(h.app(), request("POST", "/api/schedules/search", None, Some(body))).await;
    assert_eq!(status, StatusCode::OK);

    let offers = json.as_array().unwrap();
    assert_eq!(offers.len(), 3);
    assert_eq!(offers[0]["schedule_id"], "sched-mm-std");
    assert_eq!(offers[0]["fare"], 30.0);
    assert_eq!(offers[0]["total_fare"], 60.0);
    assert_eq!(offers[1]["fare"], 40.0);
    assert_eq!(offers[2]["fare"], 50.0);
}

#[tokio::test]
async fn test_search_edge_cases() {
    let h = harness();

    let unknown = json!({"from_location": "Nowhere", "to_location": "Morena Mall", "journey_date": "2030-01-01", "passengers": 1});
    let (status, json) = send(h.app(), request("POST", "/api/schedules/search", None, Some(unknown))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));

    let bad_date = json!({"from_location": "Megacity", "to_location": "Morena Mall", "journey_date": "01/01/2030", "passengers": 1});
    let (status, _) = send(h.app(), request("POST", "/api/schedules/search", None, Some(bad_date))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let nobody = json!({"from_location": "Megacity", "to_location": "Morena Mall", "journey_date": "2030-01-01", "passengers": 0});
    let (status, _) = send(h.app(), request("POST", "/api/schedules/search", None, Some(nobody))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let too_many = json!({
        "from_location": "Megacity",
        "to_location": "Morena Mall",
        "journey_date": departure_date(&h, "sched-mm-std"),
        "passengers": 9,
    });
    let (status, json) = send(h.app(), request("POST", "/api/schedules/search", None, Some(too_many))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));
}

#[tokio::test]
async fn test_seat_map_shows_claims() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");

    let (status, _) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-mm-std", &[3], 30.0))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(h.app(), request("GET", "/api/schedules/sched-mm-std/seats", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    let seats = json.as_array().unwrap();
    assert_eq!(seats.len(), 8);

    let third = seats.iter().find(|s| s["id"] == "bus-std-01-seat-3").unwrap();
    assert_eq!(third["claimed"], true);
    assert_eq!(third["bookable"], false);
    let first = seats.iter().find(|s| s["id"] == "bus-std-01-seat-1").unwrap();
    assert_eq!(first["bookable"], true);
}

// ── Bookings ──

#[tokio::test]
async fn test_two_passenger_booking_totals_sixty() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");

    let (status, json) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-mm-std", &[1, 2], 60.0))),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["total_fare"], 60.0);
    assert_eq!(json["status"], "Pending");
    assert_eq!(json["payment_status"], "Pending");
    assert_eq!(json["passengers"][1]["seat_number"], "1B");
    assert_eq!(seats_available(&h, "sched-mm-std"), 6);

    let (status, json) = send(h.app(), request("GET", "/api/bookings/active", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["from_location"], "Megacity");

    let (_, json) = send(h.app(), request("GET", "/api/bookings/past", Some(&token), None)).await;
    assert_eq!(json, json!([]));
}

#[tokio::test]
async fn test_declared_fare_must_match() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");

    let (status, json) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-mm-std", &[1, 2], 30.0))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("fare mismatch"));
    assert_eq!(seats_available(&h, "sched-mm-std"), 8);
}

#[tokio::test]
async fn test_overlapping_booking_conflicts() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");

    let (status, _) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-mm-std", &[4, 5], 60.0))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-mm-std", &[5, 6], 60.0))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(seats_available(&h, "sched-mm-std"), 6);

    // same seats on another schedule of the same bus are free
    let other = json!({
        "bus_id": "bus-std-01",
        "schedule_id": "sched-ms-std",
        "passengers": [passenger(5)],
        "total_fare": 63.75,
    });
    let (status, _) = send(h.app(), request("POST", "/api/bookings", Some(&token), Some(other))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[test]
fn test_concurrent_overlapping_bookings_one_wins() {
    let h = harness();
    seed_user(&h, "user-1", "sizwe@example.com");

    let results: Vec<Result<_, LedgerError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = &h.state.ledger;
                scope.spawn(move || {
                    // every request wants seat 7 plus one seat of its own
                    let other = if i % 2 == 0 { 8 } else { 6 };
                    ledger.create_booking(NewBooking {
                        user_id: "user-1".to_string(),
                        bus_id: "bus-std-01".to_string(),
                        schedule_id: "sched-mm-std".to_string(),
                        passengers: [7, other]
                            .into_iter()
                            .map(|seat| NewPassenger {
                                first_name: "Sizwe".to_string(),
                                last_name: "Mahlangu".to_string(),
                                age: 40,
                                gender: Gender::M,
                                seat_id: format!("bus-std-01-seat-{seat}"),
                            })
                            .collect(),
                        declared_fare: Money::from_cents(6000),
                    })
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    let won = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(won, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, LedgerError::SeatUnavailable(_))));
    assert_eq!(seats_available(&h, "sched-mm-std"), 6);
}

#[tokio::test]
async fn test_foreign_seat_rejected_without_side_effects() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");

    let mut body = booking_body("sched-mm-std", &[1, 2], 60.0);
    body["passengers"][1]["seat_id"] = json!("bus-lux-01-seat-2");

    let (status, json) = send(h.app(), request("POST", "/api/bookings", Some(&token), Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("bus-lux-01-seat-2"));

    assert_eq!(seats_available(&h, "sched-mm-std"), 8);
    let db = h.state.db.lock().unwrap();
    assert!(queries::get_claimed_seat_ids(&db, "sched-mm-std").unwrap().is_empty());
    let count: i64 = db
        .query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_cancel_then_rebook_and_double_cancel() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");
    let other_token = seed_user(&h, "user-2", "other@example.com");

    let (_, booking) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-mm-std", &[1], 30.0))),
    )
    .await;
    let id = booking["id"].as_str().unwrap().to_string();

    let (status, _) = send(h.app(), request("POST", &format!("/api/bookings/{id}/cancel"), Some(&other_token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(h.app(), request("POST", &format!("/api/bookings/{id}/cancel"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Cancelled");
    assert_eq!(seats_available(&h, "sched-mm-std"), 8);

    let (status, json) = send(h.app(), request("POST", &format!("/api/bookings/{id}/cancel"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "booking is already cancelled");

    let (status, _) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&other_token), Some(booking_body("sched-mm-std", &[1], 30.0))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_cancel_inside_window_rejected() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");
    {
        let db = h.state.db.lock().unwrap();
        queries::insert_schedule(
            &db,
            &Schedule {
                id: "sched-soon".to_string(),
                route_id: "route-megacity-morena".to_string(),
                bus_id: "bus-std-01".to_string(),
                departure_at: Utc::now() + Duration::hours(23),
                arrival_time: "23:59".to_string(),
                seats_available: 8,
            },
        )
        .unwrap();
    }

    let (status, booking) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-soon", &[1], 30.0))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = booking["id"].as_str().unwrap();

    let (status, _) = send(h.app(), request("POST", &format!("/api/bookings/{id}/cancel"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(seats_available(&h, "sched-soon"), 7);
}

#[tokio::test]
async fn test_booking_hidden_from_other_users() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");
    let other_token = seed_user(&h, "user-2", "other@example.com");

    let (_, booking) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-mm-std", &[2], 30.0))),
    )
    .await;
    let uri = format!("/api/bookings/{}", booking["id"].as_str().unwrap());

    let (status, _) = send(h.app(), request("GET", &uri, Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(h.app(), request("GET", &uri, Some(&other_token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Payments ──

#[tokio::test]
async fn test_repeat_webhook_confirms_once() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");

    let (_, booking) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-mm-std", &[1, 2], 60.0))),
    )
    .await;
    let id = booking["id"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let (status, json) = send(h.app(), webhook_request("payment_intent.succeeded", &id, WEBHOOK_SECRET)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["received"], true);
    }

    let (_, json) = send(h.app(), request("GET", &format!("/api/bookings/{id}"), Some(&token), None)).await;
    assert_eq!(json["status"], "Confirmed");
    assert_eq!(json["payment_status"], "Completed");
    assert_eq!(json["payment_id"], "pi_123");
    assert_eq!(h.notifier.confirmed.load(Ordering::SeqCst), 1);

    let db = h.state.db.lock().unwrap();
    assert_eq!(queries::get_payment_events(&db, &id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_client_confirmation_is_idempotent() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");

    let (_, booking) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-mm-std", &[1, 2], 60.0))),
    )
    .await;
    let uri = format!("/api/bookings/{}/payment", booking["id"].as_str().unwrap());

    for _ in 0..2 {
        let body = json!({"status": "Completed", "payment_id": "pay_123"});
        let (status, json) = send(h.app(), request("POST", &uri, Some(&token), Some(body))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "Confirmed");
        assert_eq!(json["payment_status"], "Completed");
    }
    assert_eq!(h.notifier.confirmed.load(Ordering::SeqCst), 1);

    let body = json!({"status": "Failed", "payment_id": "pay_124"});
    let (status, _) = send(h.app(), request("POST", &uri, Some(&token), Some(body))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_webhook_signature_failures() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");

    let (_, booking) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-mm-std", &[1], 30.0))),
    )
    .await;
    let id = booking["id"].as_str().unwrap().to_string();

    let (status, _) = send(h.app(), webhook_request("payment_intent.succeeded", &id, "whsec_wrong")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unsigned = Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_1"}}}"#))
        .unwrap();
    let (status, _) = send(h.app(), unsigned).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = send(h.app(), request("GET", &format!("/api/bookings/{id}"), Some(&token), None)).await;
    assert_eq!(json["payment_status"], "Pending");
    assert_eq!(h.notifier.confirmed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_webhook_acknowledges_rejections() {
    let h = harness();

    let (status, _) = send(h.app(), webhook_request("payment_intent.succeeded", "no-such-booking", WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(h.app(), webhook_request("charge.refunded", "no-such-booking", WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_declined_attempt_then_success_confirms() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");

    let (_, booking) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-mm-std", &[1, 2], 60.0))),
    )
    .await;
    let id = booking["id"].as_str().unwrap().to_string();

    let (status, _) = send(h.app(), webhook_request("payment_intent.payment_failed", &id, WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(h.app(), request("GET", &format!("/api/bookings/{id}"), Some(&token), None)).await;
    assert_eq!(json["status"], "Pending");
    assert_eq!(json["payment_status"], "Failed");
    assert_eq!(seats_available(&h, "sched-mm-std"), 6);

    let (status, _) = send(h.app(), webhook_request("payment_intent.succeeded", &id, WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(h.app(), request("GET", &format!("/api/bookings/{id}"), Some(&token), None)).await;
    assert_eq!(json["status"], "Confirmed");
    assert_eq!(json["payment_status"], "Completed");
    assert_eq!(h.notifier.confirmed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_canceled_intent_releases_seats_and_logs_late_success() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");

    let (_, booking) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-mm-std", &[1, 2], 60.0))),
    )
    .await;
    let id = booking["id"].as_str().unwrap().to_string();
    assert_eq!(seats_available(&h, "sched-mm-std"), 6);

    let (status, _) = send(h.app(), webhook_request("payment_intent.canceled", &id, WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(h.app(), request("GET", &format!("/api/bookings/{id}"), Some(&token), None)).await;
    assert_eq!(json["status"], "Cancelled");
    assert_eq!(json["payment_status"], "Failed");
    assert_eq!(seats_available(&h, "sched-mm-std"), 8);

    let (status, _) = send(h.app(), webhook_request("payment_intent.succeeded", &id, WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.notifier.confirmed.load(Ordering::SeqCst), 0);

    let (_, json) = send(h.app(), request("GET", &format!("/api/bookings/{id}"), Some(&token), None)).await;
    assert_eq!(json["status"], "Cancelled");

    let db = h.state.db.lock().unwrap();
    let events = queries::get_payment_events(&db, &id).unwrap();
    let late = events.last().unwrap();
    assert_eq!(late.status.as_str(), "Completed");
    assert_eq!(late.reference.as_deref(), Some("pi_123"));
}

#[tokio::test]
async fn test_client_failure_report_inside_window_keeps_booking() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");
    let other_token = seed_user(&h, "user-2", "other@example.com");
    {
        let db = h.state.db.lock().unwrap();
        queries::insert_schedule(
            &db,
            &Schedule {
                id: "sched-soon".to_string(),
                route_id: "route-megacity-morena".to_string(),
                bus_id: "bus-std-01".to_string(),
                departure_at: Utc::now() + Duration::hours(2),
                arrival_time: "23:59".to_string(),
                seats_available: 8,
            },
        )
        .unwrap();
    }

    let (_, booking) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-soon", &[1], 30.0))),
    )
    .await;
    let id = booking["id"].as_str().unwrap().to_string();

    let (status, _) = send(h.app(), request("POST", &format!("/api/bookings/{id}/cancel"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let body = json!({"status": "Failed"});
    let (status, json) = send(
        h.app(),
        request("POST", &format!("/api/bookings/{id}/payment"), Some(&token), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Pending");
    assert_eq!(json["payment_status"], "Failed");
    assert_eq!(seats_available(&h, "sched-soon"), 7);

    let (status, _) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&other_token), Some(booking_body("sched-soon", &[1], 30.0))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_create_intent_uses_server_total() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");

    let (_, booking) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-mm-std", &[1, 2], 60.0))),
    )
    .await;
    let id = booking["id"].as_str().unwrap().to_string();

    let (status, json) = send(
        h.app(),
        request("POST", "/api/payments/create-intent", Some(&token), Some(json!({"booking_id": id}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["client_secret"], "pi_test_secret");
    assert_eq!(h.intents.lock().unwrap().as_slice(), &[(6000, id.clone())]);

    send(h.app(), webhook_request("payment_intent.succeeded", &id, WEBHOOK_SECRET)).await;
    let (status, _) = send(
        h.app(),
        request("POST", "/api/payments/create-intent", Some(&token), Some(json!({"booking_id": id}))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_upload_proof() {
    let h = harness();
    let token = seed_user(&h, "user-1", "sizwe@example.com");

    let (_, booking) = send(
        h.app(),
        request("POST", "/api/bookings", Some(&token), Some(booking_body("sched-mm-std", &[1], 30.0))),
    )
    .await;
    let id = booking["id"].as_str().unwrap().to_string();
    let png = base64::engine::general_purpose::STANDARD.encode(b"\x89PNG\r\n\x1a\nfake");

    let body = json!({"booking_id": id, "filename": "slip.png", "content_type": "image/png", "data": png});
    let (status, json) = send(h.app(), request("POST", "/api/payments/upload-proof", Some(&token), Some(body))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(json["filename"].as_str().unwrap().starts_with("payment-proof-"));
    assert_eq!(h.notifier.proofs.load(Ordering::SeqCst), 1);
    {
        let db = h.state.db.lock().unwrap();
        assert_eq!(queries::get_payment_proofs(&db, &id).unwrap().len(), 1);
    }

    let body = json!({"booking_id": id, "filename": "slip.gif", "content_type": "image/gif", "data": png});
    let (status, _) = send(h.app(), request("POST", "/api/payments/upload-proof", Some(&token), Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let big = base64::engine::general_purpose::STANDARD.encode(vec![0u8; 2048]);
    let body = json!({"booking_id": id, "filename": "slip.pdf", "content_type": "application/pdf", "data": big});
    let (status, _) = send(h.app(), request("POST", "/api/payments/upload-proof", Some(&token), Some(body))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
