#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use warden_audit::MemoryAudit;
use warden_cache_memory::MemoryCache;
use warden_core::Warden;
use warden_storage::{
    AddMemberParams, BaseRole, CreateRoleParams, RoleId, Store, UserId, WorkspaceId,
};
use warden_store_sqlite::SqliteStore;

pub struct TestEnv {
    pub warden: Warden,
    pub store: Arc<SqliteStore>,
    pub cache: Arc<MemoryCache>,
    pub audit: Arc<MemoryAudit>,
    pub workspace: WorkspaceId,
    pub actor: UserId,
}

pub async fn setup() -> TestEnv {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let cache = Arc::new(MemoryCache::new());
    let audit = Arc::new(MemoryAudit::new());
    let warden = Warden::new(
        store.clone(),
        cache.clone(),
        audit.clone(),
        audit.clone(),
    );
    TestEnv {
        warden,
        store,
        cache,
        audit,
        workspace: WorkspaceId(Uuid::now_v7()),
        actor: UserId(Uuid::now_v7()),
    }
}

pub fn role_params(ws: &WorkspaceId, creator: &UserId, name: &str) -> CreateRoleParams {
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

pub async fn seed_member(
    store: &SqliteStore,
    ws: &WorkspaceId,
    system_role: BaseRole,
    custom_role_id: Option<RoleId>,
) -> UserId {
    let user = UserId(Uuid::now_v7());
    store
        .add_member(&AddMemberParams {
            workspace_id: ws.clone(),
            user_id: user.clone(),
            system_role,
            custom_role_id,
        })
        .await
        .unwrap();
    user
}

/// Wait for a spawned side effect to land, polling instead of guessing
/// at a fixed sleep.
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 1s");
}
