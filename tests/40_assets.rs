mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{data, spawn_app, TestServer};

struct Chain {
    asset: i64,
    building: i64,
    floor: i64,
}

async fn create(server: &TestServer, token: &str, path: &str, body: Value) -> Result<Value> {
    data(server.post(path, token, body).send().await?, StatusCode::CREATED).await
}

async fn build_chain(server: &TestServer, token: &str) -> Result<Chain> {
    let asset = create(
        server,
        token,
        "/assets",
        json!({ "code": "A-001", "name": "Riverside Park", "total_area": 5000.0, "rentable_area": 4200.0,
                "longitude": 121.47, "latitude": 31.23, "tags": ["office"] }),
    )
    .await?;
    let asset = asset["id"].as_i64().unwrap_or_default();

    let building = create(
        server,
        token,
        "/buildings",
        json!({ "asset_id": asset, "code": "B1", "name": "Tower 1", "floor_count": 3, "total_area": 3000.0 }),
    )
    .await?;
    let building = building["id"].as_i64().unwrap_or_default();

    let floor = create(server, token, "/floors", json!({ "building_id": building, "floor_number": 3, "area": 900.0 })).await?;
    assert_eq!(floor["name"], "3F");
    let floor = floor["id"].as_i64().unwrap_or_default();

    for (number, status) in [("301", "occupied"), ("302", "vacant"), ("303", "occupied")] {
        create(
            server,
            token,
            "/rooms",
            json!({ "floor_id": floor, "room_number": number, "area": 120.0, "status": status }),
        )
        .await?;
    }

    Ok(Chain { asset, building, floor })
}

#[tokio::test]
async fn admin_builds_the_full_asset_chain() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;
    let chain = build_chain(&server, &admin).await?;

    let buildings = data(
        server.get(&format!("/buildings?asset_id={}", chain.asset), &admin).send().await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(buildings["total"], 1);

    let rooms = data(
        server
            .get(&format!("/rooms?floor_id={}&status=occupied", chain.floor), &admin)
            .send()
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(rooms["total"], 2);

    let page = data(
        server.get(&format!("/rooms?floor_id={}&page=2&size=2", chain.floor), &admin).send().await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(page["total"], 3);
    assert_eq!(page["items"].as_array().map(Vec::len), Some(1));

    let stats = data(server.get("/statistics/assets", &admin).send().await?, StatusCode::OK).await?;
    assert_eq!(stats["asset_count"], 1);
    assert_eq!(stats["building_count"], 1);
    assert_eq!(stats["floor_count"], 1);
    assert_eq!(stats["room_count"], 3);
    assert_eq!(stats["rooms_by_status"]["occupied"], 2);
    Ok(())
}

#[tokio::test]
async fn parents_cannot_be_deleted_while_children_exist() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;
    let chain = build_chain(&server, &admin).await?;

    let res = server.delete(&format!("/assets/{}", chain.asset), &admin).send().await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let res = server.delete(&format!("/buildings/{}", chain.building), &admin).send().await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let res = server.delete(&format!("/floors/{}", chain.floor), &admin).send().await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Asset still readable after the refused delete
    let res = server.get(&format!("/assets/{}", chain.asset), &admin).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn invalid_asset_input_is_rejected() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;

    let res = server
        .post("/assets", &admin, json!({ "code": "X", "name": "X", "total_area": 10.0, "rentable_area": 20.0 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .post("/assets", &admin, json!({ "code": "Y", "name": "Y", "latitude": 91.0 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .post("/buildings", &admin, json!({ "asset_id": 404, "code": "B", "name": "B" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    create(&server, &admin, "/assets", json!({ "code": "Z", "name": "Z" })).await?;
    let res = server.post("/assets", &admin, json!({ "code": "Z", "name": "Other" })).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn readers_can_browse_but_not_change_assets() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;
    let chain = build_chain(&server, &admin).await?;
    let reader = server.reader_token(&admin, "reader").await?;

    let res = server.get("/assets", &reader).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let res = server.get(&format!("/buildings/{}", chain.building), &reader).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.post("/assets", &reader, json!({ "code": "R", "name": "R" })).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = server
        .put(&format!("/assets/{}", chain.asset), &reader, json!({ "name": "Renamed" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = server.delete(&format!("/floors/{}", chain.floor), &reader).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Audit trail is admin-only
    let res = server.get("/logs/operations", &reader).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn asset_patch_distinguishes_null_from_absent() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;
    let chain = build_chain(&server, &admin).await?;

    let updated = data(
        server
            .put(&format!("/assets/{}", chain.asset), &admin, json!({ "longitude": null, "name": "Riverside" }))
            .send()
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert!(updated["longitude"].is_null());
    assert_eq!(updated["latitude"], 31.23);
    assert_eq!(updated["name"], "Riverside");
    assert_eq!(updated["code"], "A-001");
    Ok(())
}
