mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{data, spawn_app};

fn names(nodes: &Value) -> Vec<String> {
    nodes
        .as_array()
        .map(|a| a.iter().filter_map(|n| n["name"].as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn find<'a>(nodes: &'a Value, name: &str) -> Option<&'a Value> {
    nodes.as_array()?.iter().find(|n| n["name"] == name)
}

#[tokio::test]
async fn reader_sees_only_granted_menus() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;
    let reader = server.reader_token(&admin, "reader").await?;

    let menus = data(server.get("/menus/user", &reader).send().await?, StatusCode::OK).await?;
    assert_eq!(names(&menus), vec!["Dashboard", "Asset management", "Map", "Statistics"]);

    let assets = find(&menus, "Asset management").cloned().unwrap_or_default();
    assert_eq!(names(&assets["children"]), vec!["Assets", "Buildings", "Floors", "Rooms"]);
    Ok(())
}

#[tokio::test]
async fn admin_sees_the_whole_menu_tree() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;

    let visible = data(server.get("/menus/user", &admin).send().await?, StatusCode::OK).await?;
    let full = data(server.get("/menus/tree", &admin).send().await?, StatusCode::OK).await?;
    assert_eq!(visible, full);

    let system = find(&visible, "System management").cloned().unwrap_or_default();
    assert_eq!(
        names(&system["children"]),
        vec!["Users", "Roles", "Organizations", "Menus", "Logs"]
    );
    Ok(())
}

#[tokio::test]
async fn disabled_menus_drop_out_of_the_user_tree() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;
    let reader = server.reader_token(&admin, "reader").await?;

    let flat = data(server.get("/menus", &admin).send().await?, StatusCode::OK).await?;
    let map_id = find(&flat, "Map").and_then(|m| m["id"].as_i64()).unwrap_or_default();

    let res = server
        .put(&format!("/menus/{}", map_id), &admin, json!({ "status": "disabled" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let menus = data(server.get("/menus/user", &reader).send().await?, StatusCode::OK).await?;
    assert!(!names(&menus).contains(&"Map".to_string()));

    // The flat admin listing still has it
    let flat = data(server.get("/menus", &admin).send().await?, StatusCode::OK).await?;
    assert_eq!(find(&flat, "Map").map(|m| m["status"].clone()), Some(json!("disabled")));
    Ok(())
}

#[tokio::test]
async fn menu_details_round_trip_through_the_api() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;

    let created = data(
        server
            .post(
                "/menus",
                &admin,
                json!({ "name": "Reports", "code": "reports", "path": "/reports", "icon": "FileOutlined", "sort_order": 8 }),
            )
            .send()
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    assert_eq!(created["path"], "/reports");
    assert_eq!(created["kind"], "menu");

    let id = created["id"].as_i64().unwrap_or_default();
    let updated = data(
        server.put(&format!("/menus/{}", id), &admin, json!({ "icon": null })).send().await?,
        StatusCode::OK,
    )
    .await?;
    assert!(updated.get("icon").is_none());
    assert_eq!(updated["path"], "/reports");

    let res = server
        .post("/menus", &admin, json!({ "name": "Again", "code": "reports" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn mutating_requests_are_recorded_in_the_operation_log() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;

    let res = server.post("/organizations", &admin, json!({ "name": "Logged" })).send().await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    // Reads are not recorded
    server.get("/organizations", &admin).send().await?;

    let logs = data(
        server.get("/logs/operations?module=organizations", &admin).send().await?,
        StatusCode::OK,
    )
    .await?;
    let items = logs["items"].as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["method"], "POST");
    assert_eq!(items[0]["path"], "/api/v1/organizations");
    assert_eq!(items[0]["status_code"], 201);
    assert_eq!(items[0]["username"], "admin");
    Ok(())
}
