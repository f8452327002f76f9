use uuid::Uuid;
use warden_storage::{
    AddMemberParams, BaseRole, CreateRoleParams, OverrideRow, ResourceType, RoleId, Store,
    StoreError, UpdateRoleFields, UserId, WorkspaceId,
};
use warden_store_sqlite::SqliteStore;

fn role_params(ws: &WorkspaceId, creator: &UserId, name: &str) -> CreateRoleParams {
    CreateRoleParams {
        workspace_id: ws.clone(),
        name: name.to_string(),
        display_name: name.to_string(),
        description: None,
        color: None,
        base_role: Some(BaseRole::Developer),
        template_id: None,
        created_by: creator.clone(),
    }
}

#[tokio::test]
async fn role_lifecycle() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let ws = WorkspaceId(Uuid::now_v7());
    let creator = UserId(Uuid::now_v7());

    let role = s
        .create_role(&role_params(&ws, &creator, "qa-lead"), 20)
        .await
        .unwrap();
    assert_eq!(role.name, "qa-lead");
    assert_eq!(role.priority, 0);
    assert!(role.is_active);
    assert_eq!(role.base_role, Some(BaseRole::Developer));

    let fetched = s.get_role(&role.id).await.unwrap();
    assert_eq!(fetched.name, "qa-lead");
    assert_eq!(fetched.workspace_id, ws);

    // Second role gets the next priority slot.
    let second = s
        .create_role(&role_params(&ws, &creator, "contractor"), 20)
        .await
        .unwrap();
    assert_eq!(second.priority, 1);

    let listed = s.list_roles(&ws).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "qa-lead");
    assert_eq!(listed[1].name, "contractor");

    let names = s.list_role_names(&ws).await.unwrap();
    assert!(names.contains(&"qa-lead".to_string()));
    assert!(names.contains(&"contractor".to_string()));

    s.delete_role(&second.id).await.unwrap();
    assert_eq!(s.count_roles(&ws).await.unwrap(), 1);
}

#[tokio::test]
async fn duplicate_name_is_already_exists() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let ws = WorkspaceId(Uuid::now_v7());
    let creator = UserId(Uuid::now_v7());

    s.create_role(&role_params(&ws, &creator, "qa-lead"), 20)
        .await
        .unwrap();
    let err = s
        .create_role(&role_params(&ws, &creator, "qa-lead"), 20)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));

    // Same name in a different workspace is fine.
    let other_ws = WorkspaceId(Uuid::now_v7());
    s.create_role(&role_params(&other_ws, &creator, "qa-lead"), 20)
        .await
        .unwrap();
}

#[tokio::test]
async fn role_count_gate() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let ws = WorkspaceId(Uuid::now_v7());
    let creator = UserId(Uuid::now_v7());

    for i in 0..3 {
        s.create_role(&role_params(&ws, &creator, &format!("role-{i}")), 3)
            .await
            .unwrap();
    }
    let err = s
        .create_role(&role_params(&ws, &creator, "one-too-many"), 3)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::LimitExceeded));
    assert_eq!(s.count_roles(&ws).await.unwrap(), 3);
}

#[tokio::test]
async fn update_patches_only_provided_fields() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let ws = WorkspaceId(Uuid::now_v7());
    let creator = UserId(Uuid::now_v7());

    let role = s
        .create_role(&role_params(&ws, &creator, "qa-lead"), 20)
        .await
        .unwrap();

    let updated = s
        .update_role(
            &role.id,
            &UpdateRoleFields {
                display_name: Some("QA Lead".to_string()),
                base_role: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "qa-lead");
    assert_eq!(updated.display_name, "QA Lead");
    assert_eq!(updated.base_role, None);
    assert!(updated.is_active);

    let fetched = s.get_role(&role.id).await.unwrap();
    assert_eq!(fetched.display_name, "QA Lead");
    assert_eq!(fetched.base_role, None);
}

#[tokio::test]
async fn update_to_taken_name_conflicts() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let ws = WorkspaceId(Uuid::now_v7());
    let creator = UserId(Uuid::now_v7());

    s.create_role(&role_params(&ws, &creator, "qa-lead"), 20)
        .await
        .unwrap();
    let other = s
        .create_role(&role_params(&ws, &creator, "contractor"), 20)
        .await
        .unwrap();

    let err = s
        .update_role(
            &other.id,
            &UpdateRoleFields {
                name: Some("qa-lead".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));
}

#[tokio::test]
async fn clone_copies_overrides_atomically() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let ws = WorkspaceId(Uuid::now_v7());
    let creator = UserId(Uuid::now_v7());

    let source = s
        .create_role(&role_params(&ws, &creator, "qa-lead"), 20)
        .await
        .unwrap();
    s.upsert_overrides(
        &source.id,
        &[
            OverrideRow::new(ResourceType::Secrets, "reveal", true),
            OverrideRow::new(ResourceType::Deployments, "rollback", false),
        ],
    )
    .await
    .unwrap();

    let copy = s
        .clone_role(&source.id, &role_params(&ws, &creator, "qa-lead-copy"), 20)
        .await
        .unwrap();
    let copied = s.list_overrides(&copy.id).await.unwrap();
    assert_eq!(copied.len(), 2);
    assert!(copied
        .iter()
        .any(|o| o.resource == ResourceType::Secrets && o.permission == "reveal" && o.granted));

    // Cloning a missing source is NotFound and burns no role slot.
    let err = s
        .clone_role(
            &RoleId(Uuid::now_v7()),
            &role_params(&ws, &creator, "ghost"),
            20,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
    assert_eq!(s.count_roles(&ws).await.unwrap(), 2);
}

#[tokio::test]
async fn clone_respects_count_gate() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let ws = WorkspaceId(Uuid::now_v7());
    let creator = UserId(Uuid::now_v7());

    let source = s
        .create_role(&role_params(&ws, &creator, "qa-lead"), 1)
        .await
        .unwrap();
    let err = s
        .clone_role(&source.id, &role_params(&ws, &creator, "qa-lead-copy"), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::LimitExceeded));
}

#[tokio::test]
async fn reorder_sets_positional_priorities() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let ws = WorkspaceId(Uuid::now_v7());
    let creator = UserId(Uuid::now_v7());

    let a = s
        .create_role(&role_params(&ws, &creator, "a"), 20)
        .await
        .unwrap();
    let b = s
        .create_role(&role_params(&ws, &creator, "b"), 20)
        .await
        .unwrap();
    let c = s
        .create_role(&role_params(&ws, &creator, "c"), 20)
        .await
        .unwrap();

    s.reorder_roles(&ws, &[c.id.clone(), a.id.clone(), b.id.clone()])
        .await
        .unwrap();
    let listed = s.list_roles(&ws).await.unwrap();
    assert_eq!(
        listed.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        vec!["c", "a", "b"]
    );

    // A role id from another workspace aborts the batch and keeps the
    // previous ordering.
    let other_ws = WorkspaceId(Uuid::now_v7());
    let foreign = s
        .create_role(&role_params(&other_ws, &creator, "foreign"), 20)
        .await
        .unwrap();
    let err = s
        .reorder_roles(&ws, &[a.id.clone(), foreign.id.clone(), b.id.clone()])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
    let listed = s.list_roles(&ws).await.unwrap();
    assert_eq!(
        listed.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        vec!["c", "a", "b"]
    );
}

#[tokio::test]
async fn override_upsert_and_reset() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let ws = WorkspaceId(Uuid::now_v7());
    let creator = UserId(Uuid::now_v7());
    let role = s
        .create_role(&role_params(&ws, &creator, "qa-lead"), 20)
        .await
        .unwrap();

    assert!(s
        .get_override(&role.id, ResourceType::Secrets, "reveal")
        .await
        .unwrap()
        .is_none());

    s.upsert_override(&role.id, &OverrideRow::new(ResourceType::Secrets, "reveal", true))
        .await
        .unwrap();
    let row = s
        .get_override(&role.id, ResourceType::Secrets, "reveal")
        .await
        .unwrap()
        .unwrap();
    assert!(row.granted);

    // Upsert flips in place instead of inserting a second row.
    s.upsert_override(&role.id, &OverrideRow::new(ResourceType::Secrets, "reveal", false))
        .await
        .unwrap();
    let row = s
        .get_override(&role.id, ResourceType::Secrets, "reveal")
        .await
        .unwrap()
        .unwrap();
    assert!(!row.granted);
    assert_eq!(s.list_overrides(&role.id).await.unwrap().len(), 1);

    s.upsert_overrides(
        &role.id,
        &[
            OverrideRow::new(ResourceType::Projects, "delete", false),
            OverrideRow::new(ResourceType::Projects, "edit", true),
            OverrideRow::new(ResourceType::Agents, "execute", true),
        ],
    )
    .await
    .unwrap();
    assert_eq!(s.list_overrides(&role.id).await.unwrap().len(), 4);
    assert_eq!(
        s.list_resource_overrides(&role.id, ResourceType::Projects)
            .await
            .unwrap()
            .len(),
        2
    );

    // Scoped delete removes only that resource's rows.
    let deleted = s
        .delete_overrides(&role.id, Some(ResourceType::Projects))
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(s.list_overrides(&role.id).await.unwrap().len(), 2);

    let deleted = s.delete_overrides(&role.id, None).await.unwrap();
    assert_eq!(deleted, 2);
    assert!(s.list_overrides(&role.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn replace_overrides_is_wholesale() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let ws = WorkspaceId(Uuid::now_v7());
    let creator = UserId(Uuid::now_v7());
    let role = s
        .create_role(&role_params(&ws, &creator, "qa-lead"), 20)
        .await
        .unwrap();

    s.upsert_overrides(
        &role.id,
        &[
            OverrideRow::new(ResourceType::Secrets, "reveal", true),
            OverrideRow::new(ResourceType::Agents, "execute", true),
        ],
    )
    .await
    .unwrap();

    s.replace_overrides(
        &role.id,
        &[OverrideRow::new(ResourceType::Stories, "assign", true)],
    )
    .await
    .unwrap();

    let rows = s.list_overrides(&role.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].resource, ResourceType::Stories);
    assert_eq!(rows[0].permission, "assign");
}

#[tokio::test]
async fn membership_reads_and_counts() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let ws = WorkspaceId(Uuid::now_v7());
    let creator = UserId(Uuid::now_v7());
    let role = s
        .create_role(&role_params(&ws, &creator, "qa-lead"), 20)
        .await
        .unwrap();

    let alice = UserId(Uuid::now_v7());
    let bob = UserId(Uuid::now_v7());
    let carol = UserId(Uuid::now_v7());

    s.add_member(&AddMemberParams {
        workspace_id: ws.clone(),
        user_id: alice.clone(),
        system_role: BaseRole::Owner,
        custom_role_id: None,
    })
    .await
    .unwrap();
    s.add_member(&AddMemberParams {
        workspace_id: ws.clone(),
        user_id: bob.clone(),
        system_role: BaseRole::Developer,
        custom_role_id: Some(role.id.clone()),
    })
    .await
    .unwrap();
    s.add_member(&AddMemberParams {
        workspace_id: ws.clone(),
        user_id: carol.clone(),
        system_role: BaseRole::Viewer,
        custom_role_id: None,
    })
    .await
    .unwrap();

    let member = s.get_member(&ws, &bob).await.unwrap();
    assert_eq!(member.system_role, BaseRole::Developer);
    assert_eq!(member.custom_role_id, Some(role.id.clone()));

    assert_eq!(s.count_role_members(&role.id).await.unwrap(), 1);
    let holders = s.list_role_members(&role.id).await.unwrap();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].user_id, bob);

    assert_eq!(
        s.count_system_role_members(&ws, BaseRole::Owner).await.unwrap(),
        1
    );
    assert_eq!(
        s.count_system_role_members(&ws, BaseRole::Viewer).await.unwrap(),
        1
    );
    // Bob holds a custom role, so he doesn't count toward developer.
    assert_eq!(
        s.count_system_role_members(&ws, BaseRole::Developer)
            .await
            .unwrap(),
        0
    );

    let err = s.get_member(&ws, &UserId(Uuid::now_v7())).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}
