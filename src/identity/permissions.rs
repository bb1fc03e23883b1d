use super::UserProfile;

/// Permission keys the backend grants through roles.
pub mod keys {
    pub const ROLES_READ: &str = "roles:read";
    pub const ROLES_CREATE: &str = "roles:create";
    pub const ROLES_UPDATE: &str = "roles:update";
    pub const ROLES_DELETE: &str = "roles:delete";
    pub const USERS_READ: &str = "users:read";
    pub const USERS_ASSIGN_ROLE: &str = "users:assign-role";
    pub const USERS_DELETE: &str = "users:delete";
}

/// What the back-office lets the current user do. The backend still enforces
/// every rule; these flags only decide what a host offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminCapabilities {
    pub view_console: bool,
    pub view_roles: bool,
    pub create_role: bool,
    pub update_role: bool,
    pub delete_role: bool,
    pub view_users: bool,
    pub assign_roles: bool,
    pub delete_users: bool,
}

impl AdminCapabilities {
    pub fn for_user(user: Option<&UserProfile>) -> Self {
        let Some(u) = user else { return Self::default(); };
        let view_roles = u.has_permission(keys::ROLES_READ);
        Self {
            view_console: view_roles,
            view_roles,
            create_role: u.has_permission(keys::ROLES_CREATE),
            update_role: u.has_permission(keys::ROLES_UPDATE),
            delete_role: u.has_permission(keys::ROLES_DELETE),
            view_users: u.has_permission(keys::USERS_READ),
            assign_roles: u.has_permission(keys::USERS_ASSIGN_ROLE),
            delete_users: u.has_permission(keys::USERS_DELETE),
        }
    }

    /// The permission key list is needed both to read roles and to edit them.
    pub fn can_list_permissions(&self) -> bool {
        self.view_roles || self.update_role
    }
}
