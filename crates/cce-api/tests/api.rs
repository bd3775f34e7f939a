/// End-to-end tests: drive the full router against an in-memory database.
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use cce_api::auth::AppStateInner;
use cce_api::routes::router;
use cce_db::{Database, Store};

const ADMIN_EMAIL: &str = "admin@example.edu";
const PASSWORD: &str = "correct-horse";

#[derive(Clone)]
struct TestApp {
    app: Router,
    store: Store,
}

impl TestApp {
    fn new() -> Self {
        Self::with_feed_limit(50)
    }

    fn with_feed_limit(feed_limit: u32) -> Self {
        let store = Store::new(Database::open_in_memory().unwrap(), feed_limit);
        let app = router(Arc::new(AppStateInner {
            store: store.clone(),
            jwt_secret: "test-secret".into(),
            admin_email: Some(ADMIN_EMAIL.into()),
        }));
        Self { app, store }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    /// Signs up and returns (token, user id).
    async fn signup(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({
                    "email": email,
                    "password": PASSWORD,
                    "formal_name": "Formal Name",
                    "preferred_name": email.split('@').next().unwrap(),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn submit(&self, token: &str) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/posts",
            Some(token),
            Some(json!({ "service_experience": experience() })),
        )
        .await
    }

    async fn delete_user(&self, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, "/admin/delete-user", Some(token), Some(body))
            .await
    }

    async fn set_phase(&self, admin: &str, user_id: &str, phase: u8) {
        let (status, _) = self
            .call(
                Method::PUT,
                &format!("/admin/users/{}/phase", user_id),
                Some(admin),
                Some(json!({ "phase": phase })),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}

fn experience() -> Value {
    let attributes: Vec<Value> = ["speed", "price", "courtesy", "accuracy", "ambience", "choice"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            json!({
                "id": uuid::Uuid::new_v4(),
                "name": name,
                "user_ranking": 6 - i,
                "performance_rating": 70,
            })
        })
        .collect();

    json!({
        "organization": {
            "organization_name": "Campus Bookstore",
            "organization_type": "retail",
            "service_type": "checkout",
            "service_date": "2026-09-14",
        },
        "attributes": attributes,
        "variability": [
            { "kind": "arrival", "present": true, "description": "semester rush", "strategy": "more tills" }
        ],
        "narrative": "The line barely moved.",
        "lesson": "Match capacity to arrival peaks.",
    })
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let t = TestApp::new();
    let (status, body) = t.call(Method::GET, "/posts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");

    let (status, _) = t.call(Method::GET, "/posts", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_login_and_profile() {
    let t = TestApp::new();
    let (token, _) = t.signup("Ana@Example.edu").await;

    let (status, me) = t.call(Method::GET, "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ana@example.edu");
    assert_eq!(me["phase"], 1);
    assert_eq!(me["is_admin"], false);

    let (status, _) = t
        .call(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({ "email": "ana@example.edu", "password": PASSWORD, "formal_name": "Ana" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ana@example.edu", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = t
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ANA@example.edu", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let (status, me) = t
        .call(Method::PATCH, "/me", Some(&token), Some(json!({ "preferred_name": "Annie" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["preferred_name"], "Annie");
    assert_eq!(me["formal_name"], "Formal Name");
}

#[tokio::test]
async fn configured_email_becomes_admin() {
    let t = TestApp::new();
    let (token, _) = t.signup(ADMIN_EMAIL).await;
    let (_, me) = t.call(Method::GET, "/me", Some(&token), None).await;
    assert_eq!(me["is_admin"], true);
}

#[tokio::test]
async fn password_reset_flow() {
    let t = TestApp::new();
    t.signup("reset@example.edu").await;

    let (status, _) = t
        .call(Method::POST, "/auth/reset", None, Some(json!({ "email": "nobody@example.edu" })))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = t
        .call(Method::POST, "/auth/reset", None, Some(json!({ "email": "reset@example.edu" })))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let token = t
        .store
        .account_by_email("reset@example.edu")
        .and_then(|a| a.reset_token)
        .unwrap();
    let (status, _) = t
        .call(
            Method::POST,
            "/auth/reset/confirm",
            None,
            Some(json!({ "token": token, "password": "brand-new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Token is single-use.
    let (status, _) = t
        .call(
            Method::POST,
            "/auth/reset/confirm",
            None,
            Some(json!({ "token": token, "password": "another-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "reset@example.edu", "password": "brand-new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn post_limit_is_enforced_before_any_write() {
    let t = TestApp::new();
    let (token, user_id) = t.signup("a@example.edu").await;

    let (status, post) = t.submit(&token).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["phase"], 1);
    assert_eq!(post["category"], "retail");
    assert_eq!(post["service_experience"]["attributes"][0]["user_ranking"], 1);

    let (status, _) = t.submit(&token).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = t.submit(&token).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "failed-precondition");

    let count = t.store.user_post_count(user_id.parse().unwrap());
    assert_eq!(count, Some(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_respect_post_limit() {
    let t = TestApp::new();
    let (student, student_id) = t.signup("eager@example.edu").await;

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let t = t.clone();
            let student = student.clone();
            tokio::spawn(async move { t.submit(&student).await.0 })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        let status = handle.await.unwrap();
        if status == StatusCode::CREATED {
            created += 1;
        } else {
            assert_eq!(status, StatusCode::CONFLICT);
        }
    }

    assert_eq!(created, 2);
    assert_eq!(t.store.user_post_count(student_id.parse().unwrap()), Some(2));
}

#[tokio::test]
async fn incomplete_reports_are_rejected_server_side() {
    let t = TestApp::new();
    let (token, _) = t.signup("b@example.edu").await;

    let mut exp = experience();
    exp["attributes"].as_array_mut().unwrap().pop();
    let (status, body) = t
        .call(Method::POST, "/posts", Some(&token), Some(json!({ "service_experience": exp })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid-argument");

    let mut exp = experience();
    exp["lesson"] = json!("   ");
    let (status, _) = t
        .call(Method::POST, "/posts", Some(&token), Some(json!({ "service_experience": exp })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn phase_gates_feed_creation_and_editing() {
    let t = TestApp::new();
    let (admin, _) = t.signup(ADMIN_EMAIL).await;
    let (alice, alice_id) = t.signup("alice@example.edu").await;
    let (bob, bob_id) = t.signup("bob@example.edu").await;

    let (_, alice_post) = t.submit(&alice).await;
    t.submit(&bob).await;
    let alice_post_id = alice_post["id"].as_str().unwrap().to_string();

    // Phase 1: only your own posts.
    let (_, feed) = t.call(Method::GET, "/posts", Some(&alice), None).await;
    let feed = feed.as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["author_id"], alice_id.as_str());

    let (status, _) = t
        .call(Method::GET, &format!("/posts/{}", alice_post_id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Bulk move everyone to phase 2.
    let (status, result) = t
        .call(Method::POST, "/admin/phase", Some(&admin), Some(json!({ "phase": 2 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["succeeded"], 2);
    assert_eq!(result["failed"], 0);

    let (_, feed) = t.call(Method::GET, "/posts", Some(&bob), None).await;
    assert_eq!(feed.as_array().unwrap().len(), 2);

    // Phase 2 students can neither create nor edit.
    let (status, _) = t.submit(&bob).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .call(
            Method::PUT,
            &format!("/posts/{}", alice_post_id),
            Some(&alice),
            Some(json!({ "service_experience": experience() })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Admin stays unrestricted and sees everything.
    let (_, admin_feed) = t.call(Method::GET, "/admin/posts", Some(&admin), None).await;
    assert_eq!(admin_feed.as_array().unwrap().len(), 2);

    t.set_phase(&admin, &bob_id, 1).await;
    let (_, feed) = t.call(Method::GET, "/posts", Some(&bob), None).await;
    assert_eq!(feed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn phase_one_feed_is_not_crowded_out_by_the_cap() {
    let t = TestApp::with_feed_limit(1);
    let (admin, _) = t.signup(ADMIN_EMAIL).await;
    let (early, _) = t.signup("early@example.edu").await;
    let (late, _) = t.signup("late@example.edu").await;

    let (_, own) = t.submit(&early).await;
    t.submit(&late).await;

    let (status, feed) = t.call(Method::GET, "/posts", Some(&early), None).await;
    assert_eq!(status, StatusCode::OK);
    let feed = feed.as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["id"], own["id"]);

    // Everyone else still reads the capped feed.
    let (_, admin_feed) = t.call(Method::GET, "/posts", Some(&admin), None).await;
    assert_eq!(admin_feed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn author_can_edit_during_phase_one() {
    let t = TestApp::new();
    let (token, _) = t.signup("editor@example.edu").await;
    let (_, post) = t.submit(&token).await;

    let mut exp = experience();
    exp["narrative"] = json!("Second visit went better.");
    let (status, updated) = t
        .call(
            Method::PUT,
            &format!("/posts/{}", post["id"].as_str().unwrap()),
            Some(&token),
            Some(json!({ "service_experience": exp })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["content"], "Second visit went better.");
}

#[tokio::test]
async fn highlight_toggle_round_trips_with_mirror_comment() {
    let t = TestApp::new();
    let (admin, _) = t.signup(ADMIN_EMAIL).await;
    let (author, _) = t.signup("author@example.edu").await;
    let (peer, _) = t.signup("peer@example.edu").await;
    let (_, post) = t.submit(&author).await;
    let post_uri = format!("/posts/{}", post["id"].as_str().unwrap());

    // Phase 1 peers can't see it yet.
    let (status, _) = t
        .call(
            Method::POST,
            &format!("{}/highlights", post_uri),
            Some(&peer),
            Some(json!({ "reason": "clear lesson" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    t.call(Method::POST, "/admin/phase", Some(&admin), Some(json!({ "phase": 2 })))
        .await;

    let (status, _) = t
        .call(
            Method::POST,
            &format!("{}/comments", post_uri),
            Some(&peer),
            Some(json!({ "content": "Same at my bank." })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, before) = t.call(Method::GET, &post_uri, Some(&peer), None).await;

    let (status, toggled) = t
        .call(
            Method::POST,
            &format!("{}/highlights", post_uri),
            Some(&peer),
            Some(json!({ "reason": "clear lesson" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggled["highlighted"], true);

    let (_, during) = t.call(Method::GET, &post_uri, Some(&peer), None).await;
    assert_eq!(during["highlights"].as_array().unwrap().len(), 1);
    let mirrors: Vec<&Value> = during["comments"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|c| c["content"].as_str().unwrap().starts_with("Highlighted: "))
        .collect();
    assert_eq!(mirrors.len(), 1);
    assert_eq!(mirrors[0]["content"], "Highlighted: clear lesson");

    let (_, toggled) = t
        .call(
            Method::POST,
            &format!("{}/highlights", post_uri),
            Some(&peer),
            Some(json!({ "reason": "" })),
        )
        .await;
    assert_eq!(toggled["highlighted"], false);

    let (_, after) = t.call(Method::GET, &post_uri, Some(&peer), None).await;
    assert_eq!(after["highlights"], before["highlights"]);
    assert_eq!(after["comments"], before["comments"]);

    let (status, _) = t
        .call(
            Method::POST,
            &format!("{}/highlights", post_uri),
            Some(&peer),
            Some(json!({ "reason": "  " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_user_guards_and_cascade() {
    let t = TestApp::new();
    let (admin, admin_id) = t.signup(ADMIN_EMAIL).await;
    let (student, student_id) = t.signup("student@example.edu").await;
    let (_other_admin, other_admin_id) = t.signup("second-admin@example.edu").await;
    t.submit(&student).await;
    t.submit(&student).await;

    let (status, _) = t
        .call(
            Method::PUT,
            &format!("/admin/users/{}/admin", other_admin_id),
            Some(&admin),
            Some(json!({ "is_admin": true })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = t.delete_user(&student, json!({ "user_id": admin_id })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "permission-denied");

    let (status, body) = t.delete_user(&admin, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid-argument");
    assert_eq!(body["message"], "user_id is required");

    let (status, _) = t.delete_user(&admin, json!({ "user_id": admin_id })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.delete_user(&admin, json!({ "user_id": other_admin_id })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, users) = t.call(Method::GET, "/admin/users", Some(&admin), None).await;
    assert_eq!(users.as_array().unwrap().len(), 3);

    let (status, body) = t.delete_user(&admin, json!({ "user_id": student_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["deleted_posts"], 2);

    assert!(t.store.get_user(student_id.parse().unwrap()).is_none());
    assert!(t.store.account_by_email("student@example.edu").is_none());
    assert!(t.store.all_posts().is_empty());

    // The deleted student's token no longer maps to a profile.
    let (status, _) = t.call(Method::GET, "/me", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delete_user_posts_keeps_the_profile() {
    let t = TestApp::new();
    let (admin, _) = t.signup(ADMIN_EMAIL).await;
    let (student, student_id) = t.signup("keep@example.edu").await;
    t.submit(&student).await;

    let (status, body) = t
        .call(
            Method::POST,
            "/admin/delete-user-posts",
            Some(&admin),
            Some(json!({ "user_id": student_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_posts"], 1);
    assert!(t.store.get_user(student_id.parse().unwrap()).is_some());

    // Students can also clear their own posts.
    t.submit(&student).await;
    let (status, body) = t.call(Method::DELETE, "/posts/mine", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_posts"], 1);
}

#[tokio::test]
async fn delete_all_data_leaves_admins_and_identities() {
    let t = TestApp::new();
    let (admin, admin_id) = t.signup(ADMIN_EMAIL).await;
    let (s1, _) = t.signup("s1@example.edu").await;
    let (s2, _) = t.signup("s2@example.edu").await;
    t.submit(&s1).await;
    t.submit(&s1).await;
    t.submit(&s2).await;
    assert_eq!(t.store.all_posts().len(), 3);

    let (status, _) = t
        .call(Method::POST, "/admin/delete-all", Some(&admin), Some(json!({ "confirm": "yes" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(t.store.all_posts().len(), 3);

    let (status, body) = t
        .call(
            Method::POST,
            "/admin/delete-all",
            Some(&admin),
            Some(json!({ "confirm": "DELETE ALL DATA" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_posts"], 3);
    assert_eq!(body["deleted_users"], 2);

    assert!(t.store.all_posts().is_empty());
    let users = t.store.all_users();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id.to_string(), admin_id);

    for email in [ADMIN_EMAIL, "s1@example.edu", "s2@example.edu"] {
        assert!(t.store.account_by_email(email).is_some());
    }

    // Phantom identities authenticate but are refused for lack of a profile.
    let (status, body) = t
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "s1@example.edu", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "permission-denied");
}

#[tokio::test]
async fn admin_routes_require_admin() {
    let t = TestApp::new();
    let (student, _) = t.signup("nosy@example.edu").await;

    for uri in ["/admin/users", "/admin/posts", "/admin/export.csv"] {
        let (status, body) = t.call(Method::GET, uri, Some(&student), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body["code"], "permission-denied");
    }
    let (status, _) = t
        .call(Method::POST, "/admin/phase", Some(&student), Some(json!({ "phase": 2 })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_edits_and_exports() {
    let t = TestApp::new();
    let (admin, _) = t.signup(ADMIN_EMAIL).await;
    let (student, _) = t.signup("csv@example.edu").await;
    let (_, post) = t.submit(&student).await;
    let post_id = post["id"].as_str().unwrap();

    let (status, edited) = t
        .call(
            Method::PUT,
            &format!("/admin/posts/{}", post_id),
            Some(&admin),
            Some(json!({ "category": "bookstore, campus" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["category"], "bookstore, campus");

    let (status, body) = t.call(Method::GET, "/admin/export.csv", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let csv = body.as_str().unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("csv@example.edu"));
    assert!(csv.contains("\"bookstore, campus\""));

    let (status, _) = t
        .call(Method::DELETE, &format!("/admin/posts/{}", post_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(t.store.all_posts().is_empty());
}
