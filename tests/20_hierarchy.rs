mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{data, spawn_app, TestServer};

async fn create_org(server: &TestServer, token: &str, body: Value) -> Result<Value> {
    data(server.post("/organizations", token, body).send().await?, StatusCode::CREATED).await
}

#[tokio::test]
async fn organization_tree_nests_children_in_order() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;

    let hq = create_org(&server, &admin, json!({ "name": "HQ", "code": "HQ" })).await?;
    let hq_id = hq["id"].as_i64().unwrap_or_default();
    assert_eq!(hq["level"], 1);

    create_org(&server, &admin, json!({ "name": "Sales", "parent_id": hq_id, "sort_order": 2 })).await?;
    let ops = create_org(
        &server,
        &admin,
        json!({ "name": "Operations", "parent_id": hq_id, "sort_order": 1, "leader": "Kim", "unknown": 1 }),
    )
    .await?;
    assert_eq!(ops["level"], 2);

    let tree = data(server.get("/organizations/tree", &admin).send().await?, StatusCode::OK).await?;
    let roots = tree.as_array().cloned().unwrap_or_default();
    assert_eq!(roots.len(), 1);
    let children: Vec<&str> = roots[0]["children"]
        .as_array()
        .map(|c| c.iter().filter_map(|n| n["name"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(children, vec!["Operations", "Sales"]);

    let flat = data(server.get("/organizations", &admin).send().await?, StatusCode::OK).await?;
    assert_eq!(flat.as_array().map(Vec::len), Some(3));
    Ok(())
}

#[tokio::test]
async fn moves_that_would_create_a_cycle_are_rejected() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;

    let a = create_org(&server, &admin, json!({ "name": "A" })).await?;
    let a_id = a["id"].as_i64().unwrap_or_default();
    let b = create_org(&server, &admin, json!({ "name": "B", "parent_id": a_id })).await?;
    let b_id = b["id"].as_i64().unwrap_or_default();

    let res = server
        .put(&format!("/organizations/{}", a_id), &admin, json!({ "parent_id": b_id }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .put(&format!("/organizations/{}", a_id), &admin, json!({ "parent_id": a_id }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Promoting B to a root re-derives its level
    let moved = data(
        server
            .put(&format!("/organizations/{}", b_id), &admin, json!({ "parent_id": null }))
            .send()
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(moved["level"], 1);
    assert!(moved["parent_id"].is_null());
    Ok(())
}

#[tokio::test]
async fn deleting_a_referenced_organization_is_a_conflict() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;

    let parent = create_org(&server, &admin, json!({ "name": "Parent" })).await?;
    let parent_id = parent["id"].as_i64().unwrap_or_default();
    let child = create_org(&server, &admin, json!({ "name": "Child", "parent_id": parent_id })).await?;
    let child_id = child["id"].as_i64().unwrap_or_default();

    let res = server.delete(&format!("/organizations/{}", parent_id), &admin).send().await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "REFERENTIAL_INTEGRITY");

    let res = server
        .post("/users", &admin, json!({ "username": "staff", "password": "secret1", "organization_id": child_id }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = server.delete(&format!("/organizations/{}", child_id), &admin).send().await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = server.get(&format!("/organizations/{}", child_id), &admin).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn unknown_parent_and_bad_ids_are_client_errors() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;

    let res = server.post("/organizations", &admin, json!({ "name": "Orphan", "parent_id": 999 })).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server.get("/organizations/999", &admin).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server.get("/organizations/abc", &admin).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn guards_separate_authentication_from_authorization() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;
    let reader = server.reader_token(&admin, "reader").await?;

    // Missing permission code
    assert_eq!(server.get("/organizations", &reader).send().await?.status(), StatusCode::FORBIDDEN);
    assert_eq!(server.get("/users", &reader).send().await?.status(), StatusCode::FORBIDDEN);

    // Role-gated writes
    let res = server.post("/menus", &reader, json!({ "name": "Mine", "code": "mine" })).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "FORBIDDEN");

    let res = server.post("/permissions", &admin, json!({ "name": "Export", "code": "asset:export", "permission_type": "button" })).send().await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn role_permission_changes_apply_without_new_tokens() -> Result<()> {
    let server = spawn_app().await?;
    let admin = server.admin_token().await?;

    let permissions = data(server.get("/permissions", &admin).send().await?, StatusCode::OK).await?;
    let org_list = permissions
        .as_array()
        .and_then(|p| p.iter().find(|n| n["code"] == "org:list"))
        .and_then(|n| n["id"].as_i64())
        .unwrap_or_default();

    let role = data(
        server.post("/roles", &admin, json!({ "code": "auditor", "name": "Auditor" })).send().await?,
        StatusCode::CREATED,
    )
    .await?;
    let role_id = role["id"].as_i64().unwrap_or_default();

    let res = server
        .post("/users", &admin, json!({ "username": "aud", "password": "secret1", "role_ids": [role_id] }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let token = server.login("aud", "secret1").await?;

    assert_eq!(server.get("/organizations", &token).send().await?.status(), StatusCode::FORBIDDEN);

    let res = server
        .put(&format!("/roles/{}/permissions", role_id), &admin, json!({ "permission_ids": [org_list] }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(server.get("/organizations", &token).send().await?.status(), StatusCode::OK);

    // A role in use cannot be deleted
    let res = server.delete(&format!("/roles/{}", role_id), &admin).send().await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    Ok(())
}
