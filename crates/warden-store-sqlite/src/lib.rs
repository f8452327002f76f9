//! SQLite implementation of the warden [`Store`] trait.
//!
//! Uses a single-connection pool so the count-gated inserts and multi-row
//! mutations serialize; every such operation still runs inside an explicit
//! transaction so a failure rolls back all of its writes.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;
use warden_storage::{
    AddMemberParams, BaseRole, CreateRoleParams, OverrideRow, PermissionOverride, ResourceType,
    Role, RoleId, Store, StoreError, UpdateRoleFields, UserId, WorkspaceId, WorkspaceMember,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

/// Role row tuple as selected by `ROLE_COLUMNS`.
type RoleRow = (
    String,         // id
    String,         // workspace_id
    String,         // name
    String,         // display_name
    Option<String>, // description
    Option<String>, // color
    Option<String>, // base_role
    i64,            // is_active
    i64,            // priority
    Option<String>, // template_id
    String,         // created_by
    i64,            // created_at
    i64,            // updated_at
);

const ROLE_COLUMNS: &str = "id,workspace_id,name,display_name,description,color,base_role,\
                            is_active,priority,template_id,created_by,created_at,updated_at";

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn role_from_row(row: RoleRow) -> Result<Role, StoreError> {
    let (
        id,
        workspace_id,
        name,
        display_name,
        description,
        color,
        base_role,
        is_active,
        priority,
        template_id,
        created_by,
        created_at,
        updated_at,
    ) = row;
    let base_role = match base_role {
        Some(s) => Some(
            s.parse::<BaseRole>()
                .map_err(|e| StoreError::Backend(e.to_string()))?,
        ),
        None => None,
    };
    Ok(Role {
        id: RoleId(parse_uuid(&id)?),
        workspace_id: WorkspaceId(parse_uuid(&workspace_id)?),
        name,
        display_name,
        description,
        color,
        base_role,
        is_active: is_active != 0,
        priority,
        template_id,
        created_by: UserId(parse_uuid(&created_by)?),
        created_at: ts(created_at),
        updated_at: ts(updated_at),
    })
}

fn override_from_row(
    row: (String, String, String, i64, i64, i64),
) -> Result<PermissionOverride, StoreError> {
    let (role_id, resource, permission, granted, created_at, updated_at) = row;
    Ok(PermissionOverride {
        role_id: RoleId(parse_uuid(&role_id)?),
        resource: resource
            .parse::<ResourceType>()
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        permission,
        granted: granted != 0,
        created_at: ts(created_at),
        updated_at: ts(updated_at),
    })
}

fn member_from_row(
    row: (String, String, String, Option<String>, i64),
) -> Result<WorkspaceMember, StoreError> {
    let (workspace_id, user_id, system_role, custom_role_id, created_at) = row;
    let custom_role_id = match custom_role_id {
        Some(s) => Some(RoleId(parse_uuid(&s)?)),
        None => None,
    };
    Ok(WorkspaceMember {
        workspace_id: WorkspaceId(parse_uuid(&workspace_id)?),
        user_id: UserId(parse_uuid(&user_id)?),
        system_role: system_role
            .parse::<BaseRole>()
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        custom_role_id,
        created_at: ts(created_at),
    })
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────────────── Roles ──────────────────────────────────────────

    async fn create_role(
        &self,
        params: &CreateRoleParams,
        max_roles: u32,
    ) -> Result<Role, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let role = insert_role(&mut tx, params, max_roles).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(role)
    }

    async fn clone_role(
        &self,
        source: &RoleId,
        params: &CreateRoleParams,
        max_roles: u32,
    ) -> Result<Role, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        // Source must exist before we burn a slot for the copy.
        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM roles WHERE id=?")
            .bind(source.0.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if exists.is_none() {
            return Err(StoreError::NotFound);
        }

        let role = insert_role(&mut tx, params, max_roles).await?;

        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO permission_overrides(role_id,resource_type,permission,granted,created_at,updated_at)
             SELECT ?,resource_type,permission,granted,?,?
             FROM permission_overrides WHERE role_id=?",
        )
        .bind(role.id.0.to_string())
        .bind(now)
        .bind(now)
        .bind(source.0.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(role)
    }

    async fn get_role(&self, role_id: &RoleId) -> Result<Role, StoreError> {
        let row: Option<RoleRow> =
            sqlx::query_as(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id=?"))
                .bind(role_id.0.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        match row {
            Some(row) => role_from_row(row),
            None => Err(StoreError::NotFound),
        }
    }

    async fn list_roles(&self, workspace_id: &WorkspaceId) -> Result<Vec<Role>, StoreError> {
        let rows: Vec<RoleRow> = sqlx::query_as(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE workspace_id=? ORDER BY priority,name"
        ))
        .bind(workspace_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(role_from_row).collect()
    }

    async fn list_role_names(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM roles WHERE workspace_id=?")
            .bind(workspace_id.0.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn update_role(
        &self,
        role_id: &RoleId,
        fields: &UpdateRoleFields,
    ) -> Result<Role, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let row: Option<RoleRow> =
            sqlx::query_as(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id=?"))
                .bind(role_id.0.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut role = match row {
            Some(row) => role_from_row(row)?,
            None => return Err(StoreError::NotFound),
        };

        if let Some(name) = &fields.name {
            role.name = name.clone();
        }
        if let Some(display_name) = &fields.display_name {
            role.display_name = display_name.clone();
        }
        if let Some(description) = &fields.description {
            role.description = Some(description.clone());
        }
        if let Some(color) = &fields.color {
            role.color = Some(color.clone());
        }
        if let Some(base_role) = fields.base_role {
            role.base_role = base_role;
        }
        if let Some(is_active) = fields.is_active {
            role.is_active = is_active;
        }
        role.updated_at = Utc::now();

        sqlx::query(
            "UPDATE roles SET name=?,display_name=?,description=?,color=?,base_role=?,\
             is_active=?,updated_at=? WHERE id=?",
        )
        .bind(&role.name)
        .bind(&role.display_name)
        .bind(&role.description)
        .bind(&role.color)
        .bind(role.base_role.map(|b| b.as_str()))
        .bind(role.is_active as i64)
        .bind(role.updated_at.timestamp())
        .bind(role.id.0.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let s = e.to_string();
            if s.contains("UNIQUE") {
                StoreError::AlreadyExists
            } else {
                StoreError::Backend(s)
            }
        })?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(role)
    }

    async fn delete_role(&self, role_id: &RoleId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query("DELETE FROM permission_overrides WHERE role_id=?")
            .bind(role_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let result = sqlx::query("DELETE FROM roles WHERE id=?")
            .bind(role_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn reorder_roles(
        &self,
        workspace_id: &WorkspaceId,
        ordered: &[RoleId],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let now = Utc::now().timestamp();
        for (index, role_id) in ordered.iter().enumerate() {
            let result =
                sqlx::query("UPDATE roles SET priority=?,updated_at=? WHERE id=? AND workspace_id=?")
                    .bind(index as i64)
                    .bind(now)
                    .bind(role_id.0.to_string())
                    .bind(workspace_id.0.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
            // Unknown role or role from another workspace aborts the whole batch.
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn count_roles(&self, workspace_id: &WorkspaceId) -> Result<u32, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM roles WHERE workspace_id=?")
            .bind(workspace_id.0.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(count as u32)
    }

    // ─────────────────────────────────── Overrides ────────────────────────────────────────

    async fn get_override(
        &self,
        role_id: &RoleId,
        resource: ResourceType,
        permission: &str,
    ) -> Result<Option<PermissionOverride>, StoreError> {
        let row: Option<(String, String, String, i64, i64, i64)> = sqlx::query_as(
            "SELECT role_id,resource_type,permission,granted,created_at,updated_at
             FROM permission_overrides WHERE role_id=? AND resource_type=? AND permission=?",
        )
        .bind(role_id.0.to_string())
        .bind(resource.as_str())
        .bind(permission)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(override_from_row).transpose()
    }

    async fn list_overrides(
        &self,
        role_id: &RoleId,
    ) -> Result<Vec<PermissionOverride>, StoreError> {
        let rows: Vec<(String, String, String, i64, i64, i64)> = sqlx::query_as(
            "SELECT role_id,resource_type,permission,granted,created_at,updated_at
             FROM permission_overrides WHERE role_id=? ORDER BY resource_type,permission",
        )
        .bind(role_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(override_from_row).collect()
    }

    async fn list_resource_overrides(
        &self,
        role_id: &RoleId,
        resource: ResourceType,
    ) -> Result<Vec<PermissionOverride>, StoreError> {
        let rows: Vec<(String, String, String, i64, i64, i64)> = sqlx::query_as(
            "SELECT role_id,resource_type,permission,granted,created_at,updated_at
             FROM permission_overrides WHERE role_id=? AND resource_type=? ORDER BY permission",
        )
        .bind(role_id.0.to_string())
        .bind(resource.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(override_from_row).collect()
    }

    async fn upsert_override(
        &self,
        role_id: &RoleId,
        row: &OverrideRow,
    ) -> Result<(), StoreError> {
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO permission_overrides(role_id,resource_type,permission,granted,created_at,updated_at)
             VALUES(?,?,?,?,?,?)
             ON CONFLICT(role_id,resource_type,permission)
             DO UPDATE SET granted=excluded.granted,
                           updated_at=excluded.updated_at",
        )
        .bind(role_id.0.to_string())
        .bind(row.resource.as_str())
        .bind(&row.permission)
        .bind(row.granted as i64)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn upsert_overrides(
        &self,
        role_id: &RoleId,
        rows: &[OverrideRow],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let now = Utc::now().timestamp();
        for row in rows {
            sqlx::query(
                "INSERT INTO permission_overrides(role_id,resource_type,permission,granted,created_at,updated_at)
                 VALUES(?,?,?,?,?,?)
                 ON CONFLICT(role_id,resource_type,permission)
                 DO UPDATE SET granted=excluded.granted,
                               updated_at=excluded.updated_at",
            )
            .bind(role_id.0.to_string())
            .bind(row.resource.as_str())
            .bind(&row.permission)
            .bind(row.granted as i64)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn delete_overrides(
        &self,
        role_id: &RoleId,
        resource: Option<ResourceType>,
    ) -> Result<u64, StoreError> {
        let result = match resource {
            Some(resource) => {
                sqlx::query("DELETE FROM permission_overrides WHERE role_id=? AND resource_type=?")
                    .bind(role_id.0.to_string())
                    .bind(resource.as_str())
                    .execute(&self.pool)
                    .await
            }
            None => sqlx::query("DELETE FROM permission_overrides WHERE role_id=?")
                .bind(role_id.0.to_string())
                .execute(&self.pool)
                .await,
        }
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn replace_overrides(
        &self,
        role_id: &RoleId,
        rows: &[OverrideRow],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query("DELETE FROM permission_overrides WHERE role_id=?")
            .bind(role_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let now = Utc::now().timestamp();
        for row in rows {
            sqlx::query(
                "INSERT INTO permission_overrides(role_id,resource_type,permission,granted,created_at,updated_at)
                 VALUES(?,?,?,?,?,?)",
            )
            .bind(role_id.0.to_string())
            .bind(row.resource.as_str())
            .bind(&row.permission)
            .bind(row.granted as i64)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    // ─────────────────────────────────── Membership ───────────────────────────────────────

    async fn get_member(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
    ) -> Result<WorkspaceMember, StoreError> {
        let row: Option<(String, String, String, Option<String>, i64)> = sqlx::query_as(
            "SELECT workspace_id,user_id,system_role,custom_role_id,created_at
             FROM workspace_members WHERE workspace_id=? AND user_id=?",
        )
        .bind(workspace_id.0.to_string())
        .bind(user_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        match row {
            Some(row) => member_from_row(row),
            None => Err(StoreError::NotFound),
        }
    }

    async fn add_member(&self, params: &AddMemberParams) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO workspace_members(workspace_id,user_id,system_role,custom_role_id,created_at)
             VALUES(?,?,?,?,?)",
        )
        .bind(params.workspace_id.0.to_string())
        .bind(params.user_id.0.to_string())
        .bind(params.system_role.as_str())
        .bind(params.custom_role_id.as_ref().map(|r| r.0.to_string()))
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let s = e.to_string();
            if s.contains("UNIQUE") {
                StoreError::AlreadyExists
            } else {
                StoreError::Backend(s)
            }
        })?;
        Ok(())
    }

    async fn count_role_members(&self, role_id: &RoleId) -> Result<u32, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM workspace_members WHERE custom_role_id=?")
                .bind(role_id.0.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(count as u32)
    }

    async fn list_role_members(
        &self,
        role_id: &RoleId,
    ) -> Result<Vec<WorkspaceMember>, StoreError> {
        let rows: Vec<(String, String, String, Option<String>, i64)> = sqlx::query_as(
            "SELECT workspace_id,user_id,system_role,custom_role_id,created_at
             FROM workspace_members WHERE custom_role_id=? ORDER BY created_at",
        )
        .bind(role_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(member_from_row).collect()
    }

    async fn count_system_role_members(
        &self,
        workspace_id: &WorkspaceId,
        base: BaseRole,
    ) -> Result<u32, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM workspace_members
             WHERE workspace_id=? AND system_role=? AND custom_role_id IS NULL",
        )
        .bind(workspace_id.0.to_string())
        .bind(base.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(count as u32)
    }
}

/// Count-gated insert shared by create and clone. Runs inside the
/// caller's transaction so the count check and the insert are atomic.
async fn insert_role(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    params: &CreateRoleParams,
    max_roles: u32,
) -> Result<Role, StoreError> {
    let ws = params.workspace_id.0.to_string();

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM roles WHERE workspace_id=?")
        .bind(&ws)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    if count >= max_roles as i64 {
        return Err(StoreError::LimitExceeded);
    }

    let (max_priority,): (Option<i64>,) =
        sqlx::query_as("SELECT MAX(priority) FROM roles WHERE workspace_id=?")
            .bind(&ws)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
    let priority = max_priority.map(|p| p + 1).unwrap_or(0);

    let id = Uuid::now_v7();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO roles(id,workspace_id,name,display_name,description,color,base_role,\
         is_active,priority,template_id,created_by,created_at,updated_at)
         VALUES(?,?,?,?,?,?,?,?,?,?,?,?,?)",
    )
    .bind(id.to_string())
    .bind(&ws)
    .bind(&params.name)
    .bind(&params.display_name)
    .bind(&params.description)
    .bind(&params.color)
    .bind(params.base_role.map(|b| b.as_str()))
    .bind(1i64)
    .bind(priority)
    .bind(&params.template_id)
    .bind(params.created_by.0.to_string())
    .bind(now.timestamp())
    .bind(now.timestamp())
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        let s = e.to_string();
        if s.contains("UNIQUE") {
            StoreError::AlreadyExists
        } else {
            StoreError::Backend(s)
        }
    })?;

    Ok(Role {
        id: RoleId(id),
        workspace_id: params.workspace_id.clone(),
        name: params.name.clone(),
        display_name: params.display_name.clone(),
        description: params.description.clone(),
        color: params.color.clone(),
        base_role: params.base_role,
        is_active: true,
        priority,
        template_id: params.template_id.clone(),
        created_by: params.created_by.clone(),
        created_at: now,
        updated_at: now,
    })
}
