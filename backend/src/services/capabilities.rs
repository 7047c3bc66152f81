use uuid::Uuid;

use crate::errors::AppError;
use crate::middleware::auth::Claims;
use crate::models::user::Role;

/// The authenticated caller, as supplied by the JWT middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn from_claims(claims: &Claims) -> Result<Self, AppError> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user ID in token".to_string()))?;
        Ok(Self::new(user_id, claims.role))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SubmitActivity,
    ModifyActivity,
    ViewActivity,
    DecideActivity,
    ViewDashboard,
    ManagePortfolio,
    ViewSheet,
    ManageCategories,
    PostJob,
    ManageJob,
    ViewJobs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Any,
    OwnedBy(Uuid),
}

impl Resource {
    fn is_owned_by(self, user_id: Uuid) -> bool {
        matches!(self, Resource::OwnedBy(owner) if owner == user_id)
    }
}

pub fn can(actor: &Actor, action: Action, resource: Resource) -> bool {
    use Action::*;

    match actor.role {
        Role::Student => match action {
            SubmitActivity | ViewDashboard | ViewJobs => true,
            ModifyActivity | ViewActivity | ManagePortfolio | ViewSheet => {
                resource.is_owned_by(actor.user_id)
            }
            DecideActivity | ManageCategories | PostJob | ManageJob => false,
        },
        Role::Faculty => matches!(action, DecideActivity | ViewActivity | ViewDashboard | ViewJobs),
        // Edits stay with the owning student, even for admins.
        Role::Admin => !matches!(action, SubmitActivity | ModifyActivity),
        Role::Recruiter => match action {
            PostJob | ViewJobs => true,
            ManageJob => resource.is_owned_by(actor.user_id),
            _ => false,
        },
    }
}

/// Capability gate used by services before touching the store
pub fn require(actor: &Actor, action: Action, resource: Resource) -> Result<(), AppError> {
    if can(actor, action, resource) {
        Ok(())
    } else {
        log::warn!(
            "Permission denied: {} {} attempted {:?} on {:?}",
            actor.role.as_str(),
            actor.user_id,
            action,
            resource
        );
        Err(AppError::forbidden(format!(
            "A {} account cannot perform this action",
            actor.role.as_str()
        )))
    }
}
