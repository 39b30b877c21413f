// tests/catalog_tests.rs

mod common;

use chrono::Datelike;
use common::{TestApp, spawn_app};
use serde_json::{Value, json};

async fn seed_taxonomies(app: &TestApp, admin: &str) {
    for (path, name, slug) in [
        ("/categories", "Films", "films"),
        ("/categories", "Books", "books"),
        ("/genres", "Drama", "drama"),
        ("/genres", "Sci-Fi", "sci-fi"),
    ] {
        let response = app
            .post_json(path, Some(admin), json!({ "name": name, "slug": slug }))
            .await;
        assert_eq!(response.status().as_u16(), 201, "{} {}", path, slug);
    }
}

#[tokio::test]
async fn catalog_reads_are_public_and_writes_admin_only() {
    let app = spawn_app().await;
    let user = app.register("reader").await;
    let moderator = app.register_with_role("keeper", "moderator").await;

    for path in ["/categories", "/genres", "/titles"] {
        assert_eq!(app.get(path, None).await.status().as_u16(), 200, "GET {}", path);

        let body = json!({ "name": "X", "slug": "x", "year": 2000, "genre": [] });
        assert_eq!(
            app.post_json(path, None, body.clone()).await.status().as_u16(),
            401,
            "anonymous POST {}",
            path
        );
        assert_eq!(
            app.post_json(path, Some(&user), body.clone()).await.status().as_u16(),
            403,
            "user POST {}",
            path
        );
        assert_eq!(
            app.post_json(path, Some(&moderator), body).await.status().as_u16(),
            403,
            "moderator POST {}",
            path
        );
    }
}

#[tokio::test]
async fn taxonomy_create_list_search_and_delete() {
    let app = spawn_app().await;
    let admin = app.register_with_role("root", "admin").await;
    seed_taxonomies(&app, &admin).await;

    let categories: Value = app.get("/categories", None).await.json().await.unwrap();
    assert_eq!(
        categories,
        json!([{ "name": "Films", "slug": "films" }, { "name": "Books", "slug": "books" }])
    );

    let genres: Value = app.get("/genres?search=dra", None).await.json().await.unwrap();
    assert_eq!(genres, json!([{ "name": "Drama", "slug": "drama" }]));

    // Slugs are unique and restricted.
    let response = app
        .post_json("/genres", Some(&admin), json!({ "name": "Again", "slug": "drama" }))
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["fields"]["slug"].is_array());

    let response = app
        .post_json("/genres", Some(&admin), json!({ "name": "Bad", "slug": "no spaces" }))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    assert_eq!(app.delete("/genres/drama", Some(&admin)).await.status().as_u16(), 204);
    assert_eq!(app.delete("/genres/drama", Some(&admin)).await.status().as_u16(), 404);
    assert_eq!(app.delete("/categories/books", None).await.status().as_u16(), 401);
}

#[tokio::test]
async fn title_write_uses_slugs_and_read_nests_objects() {
    let app = spawn_app().await;
    let admin = app.register_with_role("root", "admin").await;
    seed_taxonomies(&app, &admin).await;

    let response = app
        .post_json(
            "/titles",
            Some(&admin),
            json!({
                "name": "Stalker",
                "year": 1979,
                "description": "Into the Zone",
                "category": "films",
                "genre": ["drama", "sci-fi"]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["category"], "films");
    assert_eq!(created["genre"], json!(["drama", "sci-fi"]));
    let id = created["id"].as_i64().unwrap();

    let title: Value = app
        .get(&format!("/titles/{}", id), None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(title["name"], "Stalker");
    assert_eq!(title["category"], json!({ "name": "Films", "slug": "films" }));
    assert_eq!(
        title["genre"],
        json!([{ "name": "Drama", "slug": "drama" }, { "name": "Sci-Fi", "slug": "sci-fi" }])
    );
    assert!(title["rating"].is_null());

    assert_eq!(app.get("/titles/999", None).await.status().as_u16(), 404);
}

#[tokio::test]
async fn title_validation() {
    let app = spawn_app().await;
    let admin = app.register_with_role("root", "admin").await;
    seed_taxonomies(&app, &admin).await;

    let next_year = i64::from(chrono::Utc::now().year()) + 1;
    let response = app
        .post_json(
            "/titles",
            Some(&admin),
            json!({ "name": "Tomorrow", "year": next_year, "genre": [] }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["fields"]["year"].is_array());

    let response = app
        .post_json(
            "/titles",
            Some(&admin),
            json!({ "name": "Lost", "year": 2000, "genre": ["polka"] }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["fields"]["genre"].is_array());

    let response = app
        .post_json(
            "/titles",
            Some(&admin),
            json!({ "name": "Lost", "year": 2000, "category": "games", "genre": [] }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM titles")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn title_filters() {
    let app = spawn_app().await;
    let admin = app.register_with_role("root", "admin").await;
    seed_taxonomies(&app, &admin).await;

    for (name, year, category, genre) in [
        ("Stalker", 1979, "films", vec!["sci-fi", "drama"]),
        ("Solaris", 1961, "books", vec!["sci-fi"]),
        ("Mirror", 1975, "films", vec!["drama"]),
    ] {
        let response = app
            .post_json(
                "/titles",
                Some(&admin),
                json!({ "name": name, "year": year, "category": category, "genre": genre }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
    }

    let names = |body: Value| -> Vec<String> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect()
    };

    let all: Value = app.get("/titles", None).await.json().await.unwrap();
    assert_eq!(names(all), ["Stalker", "Solaris", "Mirror"]);

    let films: Value = app.get("/titles?category=films", None).await.json().await.unwrap();
    assert_eq!(names(films), ["Stalker", "Mirror"]);

    let scifi: Value = app.get("/titles?genre=sci-fi", None).await.json().await.unwrap();
    assert_eq!(names(scifi), ["Stalker", "Solaris"]);

    let by_year: Value = app.get("/titles?year=1975", None).await.json().await.unwrap();
    assert_eq!(names(by_year), ["Mirror"]);

    let by_name: Value = app.get("/titles?name=sol", None).await.json().await.unwrap();
    assert_eq!(names(by_name), ["Solaris"]);

    let combined: Value = app
        .get("/titles?category=films&genre=drama&year=1979", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(names(combined), ["Stalker"]);
}

#[tokio::test]
async fn title_patch_replaces_genres_and_clears_category() {
    let app = spawn_app().await;
    let admin = app.register_with_role("root", "admin").await;
    seed_taxonomies(&app, &admin).await;

    let response = app
        .post_json(
            "/titles",
            Some(&admin),
            json!({ "name": "Stalker", "year": 1979, "category": "films", "genre": ["drama"] }),
        )
        .await;
    let id = response.json::<Value>().await.unwrap()["id"].as_i64().unwrap();
    let path = format!("/titles/{}", id);

    let response = app
        .patch_json(&path, Some(&admin), json!({ "genre": ["sci-fi"], "year": 1980 }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["genre"], json!(["sci-fi"]));
    assert_eq!(body["year"], 1980);
    assert_eq!(body["category"], "films");
    assert_eq!(body["name"], "Stalker");

    let response = app
        .patch_json(&path, Some(&admin), json!({ "category": null }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body["category"].is_null());
    assert_eq!(body["genre"], json!(["sci-fi"]));

    let response = app
        .patch_json("/titles/999", Some(&admin), json!({ "name": "Nothing" }))
        .await;
    assert_eq!(response.status().as_u16(), 404);

    // No full replacement.
    let response = app
        .client
        .put(app.url(&path))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Stalker", "year": 1979, "genre": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 405);
}

#[tokio::test]
async fn deleting_a_category_keeps_its_titles() {
    let app = spawn_app().await;
    let admin = app.register_with_role("root", "admin").await;
    seed_taxonomies(&app, &admin).await;

    let response = app
        .post_json(
            "/titles",
            Some(&admin),
            json!({ "name": "Stalker", "year": 1979, "category": "films", "genre": ["drama"] }),
        )
        .await;
    let id = response.json::<Value>().await.unwrap()["id"].as_i64().unwrap();

    assert_eq!(app.delete("/categories/films", Some(&admin)).await.status().as_u16(), 204);
    assert_eq!(app.delete("/genres/drama", Some(&admin)).await.status().as_u16(), 204);

    let title: Value = app
        .get(&format!("/titles/{}", id), None)
        .await
        .json()
        .await
        .unwrap();
    assert!(title["category"].is_null());
    assert_eq!(title["genre"], json!([]));
}

#[tokio::test]
async fn deleting_a_title_removes_reviews_and_comments() {
    let app = spawn_app().await;
    let admin = app.register_with_role("root", "admin").await;
    let reader = app.register("reader").await;
    let title_id = app.create_title(&admin, "Stalker").await;
    let review_id = app.create_review(&reader, title_id, 8).await;
    let response = app
        .post_json(
            &format!("/titles/{}/reviews/{}/comments", title_id, review_id),
            Some(&reader),
            json!({ "text": "Agreed" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let path = format!("/titles/{}", title_id);
    assert_eq!(app.delete(&path, Some(&reader)).await.status().as_u16(), 403);
    assert_eq!(app.delete(&path, Some(&admin)).await.status().as_u16(), 204);
    assert_eq!(app.get(&path, None).await.status().as_u16(), 404);

    let (reviews, comments): (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM reviews), (SELECT COUNT(*) FROM comments)",
    )
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!((reviews, comments), (0, 0));
}

#[tokio::test]
async fn catalog_search_matches_wildcards_literally() {
    let app = spawn_app().await;
    let admin = app.register_with_role("root", "admin").await;
    for (name, slug) in [("Drama", "drama"), ("Sci_Fi", "sci_fi")] {
        let response = app
            .post_json("/genres", Some(&admin), json!({ "name": name, "slug": slug }))
            .await;
        assert_eq!(response.status().as_u16(), 201);
    }
    app.create_title(&admin, "100% Wolf").await;
    app.create_title(&admin, "1000 Years").await;

    let genres: Value = app.get("/genres?search=%25", None).await.json().await.unwrap();
    assert_eq!(genres, json!([]));

    let genres: Value = app.get("/genres?search=_", None).await.json().await.unwrap();
    assert_eq!(genres, json!([{ "name": "Sci_Fi", "slug": "sci_fi" }]));

    let titles: Value = app.get("/titles?name=100%25", None).await.json().await.unwrap();
    let titles = titles.as_array().unwrap();
    assert_eq!(titles.len(), 1);
    assert_eq!(titles[0]["name"], "100% Wolf");
}

#[tokio::test]
async fn title_patch_can_clear_description() {
    let app = spawn_app().await;
    let admin = app.register_with_role("root", "admin").await;

    let response = app
        .post_json(
            "/titles",
            Some(&admin),
            json!({ "name": "Stalker", "year": 1979, "description": "Into the Zone", "genre": [] }),
        )
        .await;
    let id = response.json::<Value>().await.unwrap()["id"].as_i64().unwrap();
    let path = format!("/titles/{}", id);

    let response = app
        .patch_json(&path, Some(&admin), json!({ "name": "Сталкер" }))
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["description"], "Into the Zone");

    let response = app
        .patch_json(&path, Some(&admin), json!({ "description": null }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body["description"].is_null());
    assert_eq!(body["name"], "Сталкер");
}

#[tokio::test]
async fn large_catalog_lists_with_genres() {
    let app = spawn_app().await;
    let admin = app.register_with_role("root", "admin").await;
    let response = app
        .post_json("/genres", Some(&admin), json!({ "name": "Drama", "slug": "drama" }))
        .await;
    assert_eq!(response.status().as_u16(), 201);

    // More titles than SQLite accepts bound parameters in one statement.
    sqlx::query(
        "INSERT INTO titles (name, year) \
         WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 33000) \
         SELECT 'Title ' || n, 2000 FROM seq",
    )
    .execute(&app.pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO genre_title (title_id, genre_id) \
         SELECT MAX(t.id), g.id FROM titles t, genres g WHERE g.slug = 'drama'",
    )
    .execute(&app.pool)
    .await
    .unwrap();

    let response = app.get("/titles", None).await;
    assert_eq!(response.status().as_u16(), 200);
    let titles: Value = response.json().await.unwrap();
    let titles = titles.as_array().unwrap();
    assert_eq!(titles.len(), 33000);
    assert_eq!(titles[32999]["name"], "Title 33000");
    assert_eq!(titles[32999]["genre"], json!([{ "name": "Drama", "slug": "drama" }]));
    assert_eq!(titles[0]["genre"], json!([]));
}
