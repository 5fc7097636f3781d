#[macro_use]
mod common;

use actix_web::http::{header, StatusCode};
use actix_web::test;
use chrono::Duration;
use serde_json::Value;

use common::{location, setup};
use jubair_boot_house::feedback::FeedbackService;
use jubair_boot_house::models::ContactForm;
use jubair_boot_house::session::now;

const BOUNDARY: &str = "----jubairboundary";

struct Upload<'a> {
    name: &'a str,
    file_name: &'a str,
    bytes: &'a [u8],
}

fn multipart(fields: &[(&str, &str)], files: &[Upload]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for file in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, file.name, file.file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

fn product_fields<'a>(name: &'a str, status_key: &'a str, status: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("name", name),
        ("description", "Hand stitched"),
        ("price", "120.5"),
        ("category", "Formal"),
        (status_key, status),
        ("gender", "Male"),
        ("sizes", "9"),
        ("sizes", "10"),
    ]
}

#[actix_web::test]
async fn catalog_search_falls_back_and_counts_hits() {
    let env = setup();
    let loafer = env.insert_product("Penny Loafer", "Formal", None);
    let runner = env.insert_product("Trail Runner", "Sports", None);
    let app = test_app!(env);

    let req = test::TestRequest::get().uri("/products/?search=penny+loafer").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["products"].as_array().unwrap().len(), 1);
    assert_eq!(body["products"][0]["id"], loafer);
    assert_eq!(body["products"][0]["sizes"][1], "9");
    assert_eq!(body["categories"], serde_json::json!(["Formal", "Sports"]));

    // no full match, but one token hits
    let req = test::TestRequest::get().uri("/products/?search=trail-boots").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["products"][0]["id"], runner);

    // nothing matches at all: newest first
    let req = test::TestRequest::get().uri("/products/?search=xyz").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let ids: Vec<i64> = body["products"].as_array().unwrap().iter().map(|p| p["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![runner as i64, loafer as i64]);

    let stats = env.analytics.load_search_stats();
    assert_eq!(stats.get(&loafer.to_string()), Some(&2));
    assert_eq!(stats.get(&runner.to_string()), Some(&2));

    // browsing without search text is not counted
    let req = test::TestRequest::get().uri("/products/?category=Sports").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["products"].as_array().unwrap().len(), 1);
    assert_eq!(env.analytics.load_search_stats().get(&runner.to_string()), Some(&2));
}

#[actix_web::test]
async fn product_detail_with_related() {
    let env = setup();
    let main = env.insert_product("Oxford", "Formal", None);
    for i in 0..5 {
        env.insert_product(&format!("Derby {}", i), "Formal", None);
    }
    env.insert_product("Flip Flop", "Sandals", None);
    let app = test_app!(env);

    let req = test::TestRequest::get().uri(&format!("/products/{}", main)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["product"]["name"], "Oxford");
    let related = body["related_products"].as_array().unwrap();
    assert_eq!(related.len(), 4);
    assert!(related.iter().all(|p| p["category"] == "Formal" && p["id"] != main));

    let req = test::TestRequest::get().uri("/products/4242").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn dashboard_reports_totals() {
    let env = setup();
    env.insert_product("Oxford", "Formal", None);
    env.insert_product("Sprinter", "Sports", None);
    let admin = env.admin_cookie().await;
    let app = test_app!(env);

    let req = test::TestRequest::post()
        .uri("/products/admin/update-status/2")
        .cookie(admin.clone())
        .set_form([("status", "Out of Stock")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/products/admin/dashboard");

    let req = test::TestRequest::post()
        .uri("/products/admin/update-status/2")
        .cookie(admin.clone())
        .set_form([("status", "Sold")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/products/admin/dashboard?show_add=true")
        .cookie(admin)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total_products"], 2);
    assert_eq!(body["available_products"], 1);
    assert_eq!(body["out_of_stock"], 1);
    assert_eq!(body["category_stats"]["Sports"], 1);
    assert_eq!(body["show_add"], true);
    assert_eq!(body["statuses"], serde_json::json!(["Available", "Out of Stock"]));
}

#[actix_web::test]
async fn add_product_stores_uploads() {
    let env = setup();
    let admin = env.admin_cookie().await;
    let app = test_app!(env);

    let (content_type, body) = multipart(
        &product_fields("Monk Strap", "status", "Available"),
        &[
            Upload { name: "images", file_name: "front.png", bytes: b"png-bytes" },
            Upload { name: "images", file_name: "", bytes: b"" },
        ],
    );
    let req = test::TestRequest::post()
        .uri("/products/admin/add")
        .cookie(admin.clone())
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/products/admin/dashboard");

    let req = test::TestRequest::get().uri("/products/1").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let product = &body["product"];
    assert_eq!(product["name"], "Monk Strap");
    assert_eq!(product["gender"], "Male");
    assert_eq!(product["price"], 120.5);
    assert_eq!(product["sizes"], serde_json::json!(["9", "10"]));

    let images = product["images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    let web_path = images[0].as_str().unwrap();
    assert!(web_path.starts_with("/static/uploads/") && web_path.ends_with(".png"));
    let stored = env.uploads.path_for(web_path).unwrap();
    assert_eq!(std::fs::read(stored).unwrap(), b"png-bytes");
}

#[actix_web::test]
async fn add_product_rejects_bad_input_without_leftovers() {
    let env = setup();
    let admin = env.admin_cookie().await;
    let app = test_app!(env);

    let mut fields = product_fields("Monk Strap", "status", "Available");
    fields[2] = ("price", "-3");
    let (content_type, body) = multipart(&fields, &[]);
    let req = test::TestRequest::post()
        .uri("/products/admin/add")
        .cookie(admin.clone())
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let big = vec![7u8; 2048];
    let (content_type, body) = multipart(
        &product_fields("Monk Strap", "status", "Available"),
        &[Upload { name: "images", file_name: "huge.jpg", bytes: &big }],
    );
    let req = test::TestRequest::post()
        .uri("/products/admin/add")
        .cookie(admin)
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get().uri("/products/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["products"].as_array().unwrap().is_empty());
    let leftovers = std::fs::read_dir(env.uploads.dir()).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[actix_web::test]
async fn edit_product_removes_then_appends_images() {
    let env = setup();
    let old_a = env.uploads.save_bytes(b"a", Some("a.jpg")).unwrap();
    let old_b = env.uploads.save_bytes(b"b", Some("b.jpg")).unwrap();
    let images = serde_json::to_string(&[&old_a, &old_b]).unwrap();
    let id = env.insert_product("Chelsea", "Boots", Some(&images));
    let admin = env.admin_cookie().await;
    let app = test_app!(env);

    let remove = format!("{}, /static/uploads/not-there.jpg", old_a);
    let mut fields = product_fields("Chelsea Boot", "product_status", "Out of Stock");
    fields.retain(|(k, _)| *k != "gender");
    fields[3] = ("category", "Boots");
    fields.push(("images_to_remove", &remove));
    let (content_type, body) = multipart(
        &fields,
        &[Upload { name: "images", file_name: "c.webp", bytes: b"c" }],
    );
    let req = test::TestRequest::post()
        .uri(&format!("/products/admin/edit/{}", id))
        .cookie(admin.clone())
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let req = test::TestRequest::get().uri(&format!("/products/{}", id)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let product = &body["product"];
    assert_eq!(product["name"], "Chelsea Boot");
    assert_eq!(product["status"], "Out of Stock");
    let images = product["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0], old_b.as_str());
    assert!(images[1].as_str().unwrap().ends_with(".webp"));
    assert!(!env.uploads.path_for(&old_a).unwrap().exists());
    assert!(env.uploads.path_for(&old_b).unwrap().exists());

    let (content_type, body) = multipart(&product_fields("Ghost", "status", "Available"), &[]);
    let req = test::TestRequest::post()
        .uri("/products/admin/edit/999")
        .cookie(admin.clone())
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // A missing product wins over invalid fields
    let mut bad = product_fields("Ghost", "status", "Available");
    bad.retain(|(key, _)| *key != "price");
    bad.push(("price", "-3"));
    let (content_type, body) = multipart(&bad, &[]);
    let req = test::TestRequest::post()
        .uri("/products/admin/edit/999")
        .cookie(admin)
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn remove_image_and_delete_product() {
    let env = setup();
    let kept = env.uploads.save_bytes(b"k", Some("k.jpg")).unwrap();
    let dropped = env.uploads.save_bytes(b"d", Some("d.jpg")).unwrap();
    let images = serde_json::to_string(&[&kept, &dropped]).unwrap();
    let id = env.insert_product("Desert Boot", "Boots", Some(&images));
    let admin = env.admin_cookie().await;
    let app = test_app!(env);

    let uri = format!("/products/admin/remove-image/{}?image_path={}", id, dropped);
    let req = test::TestRequest::delete().uri(&uri).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::delete().uri(&uri).cookie(admin.clone()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["remaining_images"], 1);
    assert!(!env.uploads.path_for(&dropped).unwrap().exists());

    let req = test::TestRequest::delete().uri(&uri).cookie(admin.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete()
        .uri(&format!("/products/admin/delete/{}", id))
        .cookie(admin.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!env.uploads.path_for(&kept).unwrap().exists());

    let req = test::TestRequest::delete()
        .uri(&format!("/products/admin/delete/{}", id))
        .cookie(admin)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn analytics_ranks_by_searches_then_favourites() {
    let env = setup();
    let a = env.insert_product("Alpha", "Casual", None);
    let b = env.insert_product("Bravo", "Casual", None);
    let user_id = env.insert_user("Fan", "fan@example.com");
    let admin = env.admin_cookie().await;
    let user = env.user_cookie(user_id, "fan@example.com").await;
    env.analytics.increment_search_counts(&[a, b]);
    let app = test_app!(env);

    let req = test::TestRequest::post()
        .uri(&format!("/auth/user/favourites/add/{}", b))
        .cookie(user)
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get()
        .uri("/products/admin/analytics")
        .cookie(admin)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["rows"][0]["id"], b);
    assert_eq!(body["rows"][0]["favourites"], 1);
    assert_eq!(body["rows"][1]["id"], a);
    assert_eq!(body["chart_labels"], serde_json::json!(["Bravo", "Alpha"]));
    assert_eq!(body["chart_data"], serde_json::json!([1, 1]));
}

#[actix_web::test]
async fn contact_and_feedback_admin() {
    let env = setup();
    {
        let mut conn = env.pool.get().unwrap();
        let stale = ContactForm {
            first_name: "Old".to_string(),
            email: "old@example.com".to_string(),
            message: "stale".to_string(),
            ..ContactForm::default()
        };
        FeedbackService::submit_with(&mut conn, &stale, now() - Duration::days(40)).unwrap();
    }
    let admin = env.admin_cookie().await;
    let app = test_app!(env);

    let req = test::TestRequest::post()
        .uri("/contact")
        .set_form([
            ("firstName", "Nadia"),
            ("lastName", "Islam"),
            ("email", "nadia@example.com"),
            ("phone", "01700"),
            ("subject", "Order"),
            ("message", "Where is my parcel?"),
        ])
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);

    let req = test::TestRequest::get().uri("/admin/feedback").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/auth/login");

    let req = test::TestRequest::get().uri("/admin/feedback").cookie(admin.clone()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total"], 2);
    let newest = &body["feedback"][0];
    assert_eq!(newest["name"], "Nadia Islam");
    assert_eq!(newest["message"], "Subject: Order\nPhone: 01700\n\nMessage:\nWhere is my parcel?");
    let newest_id = newest["id"].as_i64().unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/admin/feedback/{}", newest_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::delete()
        .uri("/admin/feedback/clear-old")
        .cookie(admin.clone())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["deleted_count"], 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/admin/feedback/{}", newest_id))
        .cookie(admin.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri(&format!("/admin/feedback/{}", newest_id))
        .cookie(admin)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn legacy_paths_redirect() {
    let env = setup();
    let app = test_app!(env);

    for (from, to) in [
        ("/catalog", "/products/"),
        ("/admin/dashboard", "/products/admin/dashboard"),
        ("/admin/users", "/auth/admin/users"),
    ] {
        let req = test::TestRequest::get().uri(from).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), to);
    }

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
}
