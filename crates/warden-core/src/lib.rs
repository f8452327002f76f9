//! Permission-resolution engine for multi-tenant workspaces.
//!
//! Custom roles layer over four system base roles; explicit per-resource
//! overrides beat inherited base-role defaults, and everything else
//! denies. A read-through TTL cache fronts the point check, and role
//! templates bootstrap common role shapes by persisting only their diff
//! against inheritance.
//!
//! The transport layer (HTTP/gRPC) lives outside this workspace; it
//! consumes the services bundled in [`Warden`].

pub mod cache;
pub mod catalog;
pub mod defaults;
pub mod error;
pub mod matrix;
pub mod roles;
pub mod templates;

use std::sync::Arc;

use warden_audit::{AuditSink, PermissionAudit};
use warden_cache::CacheBackend;
use warden_storage::Store;

pub use cache::{Invalidator, PermissionCache, CACHE_TTL_SECONDS};
pub use error::Error;
pub use matrix::{Effective, MatrixEngine, PermissionChange, PermissionMap, ResourceAction};
pub use roles::{
    RoleInfo, RoleList, RoleRef, RoleService, RoleWithMembers, SystemRoleInfo, MAX_CUSTOM_ROLES,
    RESERVED_ROLE_NAMES,
};
pub use templates::{
    get_template, list_templates, template_overrides, CreateFromTemplateParams, RoleTemplate,
    TemplateService,
};

/// The wired engine: role store, matrix engine, template registry, and
/// permission cache sharing one storage backend and one cache backend.
pub struct Warden {
    pub roles: RoleService,
    pub matrix: Arc<MatrixEngine>,
    pub templates: TemplateService,
    pub cache: PermissionCache,
    pub invalidator: Invalidator,
}

impl Warden {
    pub fn new(
        store: Arc<dyn Store>,
        cache_backend: Arc<dyn CacheBackend>,
        audit: Arc<dyn AuditSink>,
        perm_audit: Arc<dyn PermissionAudit>,
    ) -> Self {
        let invalidator = Invalidator::new(Arc::clone(&cache_backend));
        let matrix = Arc::new(MatrixEngine::new(
            Arc::clone(&store),
            Arc::clone(&perm_audit),
            invalidator.clone(),
        ));
        let roles = RoleService::new(Arc::clone(&store), Arc::clone(&audit), invalidator.clone());
        let templates = TemplateService::new(store, audit, perm_audit, invalidator.clone());
        let cache = PermissionCache::new(cache_backend, Arc::clone(&matrix));
        Self {
            roles,
            matrix,
            templates,
            cache,
            invalidator,
        }
    }
}
