// tests/staff_tests.rs

mod common;

use common::{TestApp, photos, spawn_app};
use serde_json::{Value, json};

/// Sits test `test_id` as a fresh student of course 1, answering with `choices`, and submits.
async fn sit_test(app: &TestApp, test_id: i64, choices: &[(i64, &str)]) -> i64 {
    let (user_id, token) = app.register_and_login("student", 1).await;

    let session: Value = app
        .post(&format!("/api/exams/{}/sessions", test_id), &token, json!({}))
        .await
        .json()
        .await
        .unwrap();
    let id = session["session_id"].as_str().unwrap().to_string();

    app.post(&format!("/api/exams/sessions/{}/verification", id), &token, photos())
        .await;
    for (question, option) in choices {
        app.put(
            &format!("/api/exams/sessions/{}/answers", id),
            &token,
            json!({ "question_id": question, "option_id": option }),
        )
        .await;
    }
    let submitted = app
        .post(&format!("/api/exams/sessions/{}/submit", id), &token, json!({}))
        .await;
    assert_eq!(submitted.status().as_u16(), 200);

    user_id
}

#[tokio::test]
async fn lecturer_reports_cover_only_their_modules() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (lecturer_id, lecturer) = app.register_and_login("lecturer", 1).await;

    // Assign GEN100 to the lecturer.
    let assigned = app
        .put("/api/admin/modules/1", &admin, json!({ "lecturer_id": lecturer_id }))
        .await;
    assert_eq!(assigned.status().as_u16(), 200);

    sit_test(&app, 1, &[(1, "c"), (2, "b"), (3, "b"), (4, "b"), (5, "b")]).await;
    sit_test(&app, 1, &[(1, "a")]).await;

    let reports: Value = app.get("/api/lecturer/reports", &lecturer).await.json().await.unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["module_code"], "GEN100");
    assert_eq!(reports[0]["submissions"], 2);
    assert_eq!(reports[0]["highest_score"], 100.0);
    assert_eq!(reports[0]["lowest_score"], 0.0);
    assert_eq!(reports[0]["average_score"], 50.0);
    assert_eq!(reports[0]["pass_rate"], 50.0);

    let results: Value = app
        .get("/api/lecturer/tests/1/results", &lecturer)
        .await
        .json()
        .await
        .unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["score_percentage"], 100.0);
    assert_eq!(results[0]["student_name"], "Thandi Nkosi");
    assert_eq!(results[0]["completion"], "submitted");
    assert_eq!(results[1]["passed"], false);

    // Test 2 belongs to a module the lecturer does not teach.
    let foreign = app.get("/api/lecturer/tests/2/results", &lecturer).await;
    assert_eq!(foreign.status().as_u16(), 404);

    // Admins see every test.
    let all: Value = app.get("/api/lecturer/reports", &admin).await.json().await.unwrap();
    assert_eq!(all.as_array().unwrap().len(), 4);
    let untaken = all
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["test_id"] == 2)
        .unwrap();
    assert_eq!(untaken["submissions"], 0);
    assert!(untaken["average_score"].is_null());
}

#[tokio::test]
async fn admin_manages_users() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let created = app
        .post(
            "/api/admin/users",
            &admin,
            json!({
                "name": "Sipho",
                "surname": "Dlamini",
                "email": "sipho@portal.test",
                "password": "Lectur3r!pw",
                "role": "lecturer",
                "course_id": 1
            }),
        )
        .await;
    assert_eq!(created.status().as_u16(), 201);
    let id = created.json::<Value>().await.unwrap()["id"].as_i64().unwrap();

    let duplicate = app
        .post(
            "/api/admin/users",
            &admin,
            json!({
                "name": "Sipho",
                "surname": "Dlamini",
                "email": "sipho@portal.test",
                "password": "Lectur3r!pw",
                "role": "lecturer"
            }),
        )
        .await;
    assert_eq!(duplicate.status().as_u16(), 409);

    // Admin-created accounts can sign in straight away.
    assert_eq!(app.login("sipho@portal.test", "Lectur3r!pw").await.status().as_u16(), 200);

    let updated = app
        .put(
            &format!("/api/admin/users/{}", id),
            &admin,
            json!({ "role": "student", "surname": "Mokoena" }),
        )
        .await;
    assert_eq!(updated.status().as_u16(), 200);

    let users: Value = app.get("/api/admin/users", &admin).await.json().await.unwrap();
    let sipho = users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["id"] == id)
        .unwrap();
    assert_eq!(sipho["role"], "student");
    assert_eq!(sipho["surname"], "Mokoena");
    assert!(sipho.get("password").is_none());

    let missing = app
        .put("/api/admin/users/9999", &admin, json!({ "name": "Nobody" }))
        .await;
    assert_eq!(missing.status().as_u16(), 404);

    // The admin is the first user created.
    assert_eq!(app.delete("/api/admin/users/1", &admin).await.status().as_u16(), 400);
    assert_eq!(
        app.delete(&format!("/api/admin/users/{}", id), &admin)
            .await
            .status()
            .as_u16(),
        204
    );
    assert_eq!(
        app.delete(&format!("/api/admin/users/{}", id), &admin)
            .await
            .status()
            .as_u16(),
        404
    );
}

#[tokio::test]
async fn admin_manages_catalogue() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let module = app
        .post(
            "/api/admin/modules",
            &admin,
            json!({
                "code": "cs404",
                "name": "Distributed Systems",
                "credits": 20,
                "description": "<p>Consensus</p><script>alert(1)</script>",
                "course_id": 1
            }),
        )
        .await;
    assert_eq!(module.status().as_u16(), 201);
    let module: Value = module.json().await.unwrap();
    assert_eq!(module["code"], "CS404");
    assert_eq!(module["description"], "<p>Consensus</p>");
    let module_id = module["id"].as_i64().unwrap();

    let duplicate = app
        .post(
            "/api/admin/modules",
            &admin,
            json!({ "code": "CS404", "name": "Again", "credits": 10, "course_id": 1 }),
        )
        .await;
    assert_eq!(duplicate.status().as_u16(), 409);

    let bad_credits = app
        .put(&format!("/api/admin/modules/{}", module_id), &admin, json!({ "credits": 0 }))
        .await;
    assert_eq!(bad_credits.status().as_u16(), 400);

    let test = app
        .post(
            &format!("/api/admin/modules/{}/tests", module_id),
            &admin,
            json!({
                "name": "Consensus Quiz",
                "duration_secs": 600,
                "due_date": "2031-01-31T12:00:00Z"
            }),
        )
        .await;
    assert_eq!(test.status().as_u16(), 201);
    let test_id = test.json::<Value>().await.unwrap()["id"].as_i64().unwrap();

    let options = json!([{ "id": "a", "text": "Paxos" }, { "id": "b", "text": "Bubble sort" }]);
    let question = app
        .post(
            &format!("/api/admin/tests/{}/questions", test_id),
            &admin,
            json!({ "content": "Which is a consensus protocol?", "options": options, "answer": "a" }),
        )
        .await;
    assert_eq!(question.status().as_u16(), 201);
    let question_id = question.json::<Value>().await.unwrap()["id"].as_i64().unwrap();

    let wrong_answer = app
        .post(
            &format!("/api/admin/tests/{}/questions", test_id),
            &admin,
            json!({ "content": "Pick one", "options": options, "answer": "z" }),
        )
        .await;
    assert_eq!(wrong_answer.status().as_u16(), 400);

    let dangling = app
        .put(
            &format!("/api/admin/questions/{}", question_id),
            &admin,
            json!({ "answer": "c" }),
        )
        .await;
    assert_eq!(dangling.status().as_u16(), 400);

    let edited = app
        .put(
            &format!("/api/admin/questions/{}", question_id),
            &admin,
            json!({ "answer": "b" }),
        )
        .await;
    assert_eq!(edited.status().as_u16(), 200);

    let questions: Value = app
        .get(&format!("/api/admin/tests/{}/questions", test_id), &admin)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(questions[0]["answer"], "b");
    assert_eq!(questions[0]["position"], 1);

    let stats: Value = app.get("/api/admin/stats", &admin).await.json().await.unwrap();
    assert_eq!(stats["admins"], 1);
    assert_eq!(stats["modules"], 6);
    assert_eq!(stats["tests"], 5);
    assert_eq!(stats["results"], 0);

    assert_eq!(
        app.delete(&format!("/api/admin/questions/{}", question_id), &admin)
            .await
            .status()
            .as_u16(),
        204
    );
    assert_eq!(
        app.delete(&format!("/api/admin/tests/{}", test_id), &admin)
            .await
            .status()
            .as_u16(),
        204
    );
    assert_eq!(
        app.delete(&format!("/api/admin/modules/{}", module_id), &admin)
            .await
            .status()
            .as_u16(),
        204
    );
    assert_eq!(
        app.delete(&format!("/api/admin/modules/{}", module_id), &admin)
            .await
            .status()
            .as_u16(),
        404
    );
}
