/// Owner checks and capability sets
///
/// Authorization happens in two steps, both before any storage access:
///
/// 1. **Identity**: the owner id in the request path must equal the
///    authenticated user id. There are no overrides.
/// 2. **Capability**: the caller must hold the capability the operation
///    needs (`tasks:read`, `tasks:create`, `tasks:update`, `tasks:delete`).
///
/// Capabilities come from a [`CapabilityProvider`]. The default,
/// [`StaticCapabilities`], grants every authenticated user the full set; a
/// policy engine can be plugged in without touching callers.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tasknest_shared::auth::authorization::{AuthorizationGuard, Capability, StaticCapabilities};
/// use tasknest_shared::auth::middleware::AuthContext;
/// use uuid::Uuid;
///
/// let guard = AuthorizationGuard::new(Arc::new(StaticCapabilities::default()));
/// let ctx = AuthContext::new(Uuid::new_v4(), "a@x.com", guard.default_set(), "token");
///
/// assert!(guard.authorize(&ctx, &ctx.user_id.to_string()).is_ok());
/// assert!(guard.authorize(&ctx, &Uuid::new_v4().to_string()).is_err());
/// assert!(guard.require(&ctx, Capability::TasksDelete).is_ok());
/// ```

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::user::User;

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Path owner differs from the authenticated user
    #[error("Not authorized to access resources of another user")]
    OwnerMismatch,

    /// Caller lacks the capability the operation needs
    #[error("Missing required capability: {0}")]
    MissingCapability(Capability),
}

/// Operation-level permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    TasksRead,
    TasksCreate,
    TasksUpdate,
    TasksDelete,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::TasksRead,
        Capability::TasksCreate,
        Capability::TasksUpdate,
        Capability::TasksDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::TasksRead => "tasks:read",
            Capability::TasksCreate => "tasks:create",
            Capability::TasksUpdate => "tasks:update",
            Capability::TasksDelete => "tasks:delete",
        }
    }

    /// Parses the `resource:action` form
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of capabilities held by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn all() -> Self {
        Self(Capability::ALL.into_iter().collect())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Source of capabilities for an authenticated user
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    async fn capabilities_for(&self, user: &User) -> CapabilitySet;
}

/// Grants the same fixed set to every user
#[derive(Debug, Clone)]
pub struct StaticCapabilities {
    granted: CapabilitySet,
}

impl StaticCapabilities {
    pub fn new(granted: CapabilitySet) -> Self {
        Self { granted }
    }
}

impl Default for StaticCapabilities {
    fn default() -> Self {
        Self::new(CapabilitySet::all())
    }
}

#[async_trait]
impl CapabilityProvider for StaticCapabilities {
    async fn capabilities_for(&self, _user: &User) -> CapabilitySet {
        self.granted.clone()
    }
}

/// Decides allow/deny before any task operation runs
#[derive(Clone)]
pub struct AuthorizationGuard {
    provider: Arc<dyn CapabilityProvider>,
    default_set: CapabilitySet,
}

impl AuthorizationGuard {
    pub fn new(provider: Arc<dyn CapabilityProvider>) -> Self {
        Self {
            provider,
            default_set: CapabilitySet::all(),
        }
    }

    /// Full capability set, for contexts built outside the provider
    pub fn default_set(&self) -> CapabilitySet {
        self.default_set.clone()
    }

    /// Capabilities the provider grants `user`
    pub async fn capabilities_for(&self, user: &User) -> CapabilitySet {
        self.provider.capabilities_for(user).await
    }

    /// Identity check: `requested_owner` must name the authenticated user
    ///
    /// The comparison is on the normalised UUID form, so case and
    /// surrounding whitespace do not matter. Anything that is not a UUID
    /// cannot be the caller and is denied.
    pub fn authorize(&self, ctx: &AuthContext, requested_owner: &str) -> Result<(), AuthzError> {
        match Uuid::parse_str(requested_owner.trim()) {
            Ok(owner) if owner == ctx.user_id => Ok(()),
            _ => Err(AuthzError::OwnerMismatch),
        }
    }

    /// Capability check
    pub fn require(&self, ctx: &AuthContext, capability: Capability) -> Result<(), AuthzError> {
        if ctx.capabilities.contains(capability) {
            Ok(())
        } else {
            Err(AuthzError::MissingCapability(capability))
        }
    }
}
