use uuid::Uuid;

/*
Roles as resolved by the identity provider:
user_roles.id 1 owner, 2 veterinarian.
Administrators authenticate through a separate admin account table.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Veterinarian,
    Administrator,
}

impl Role {
    pub fn from_user_role_id(id: i64) -> Option<Role> {
        match id {
            1 => Some(Role::Owner),
            2 => Some(Role::Veterinarian),
            _ => None,
        }
    }

    pub fn is_staff(self) -> bool {
        matches!(self, Role::Veterinarian | Role::Administrator)
    }
}

/// Caller identity as already resolved from a bearer credential. The core
/// trusts it and never re-derives it.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }
}
