use serde::{Deserialize, Serialize};

use super::Gateway;
use crate::error::{ClientError, ClientResult};
use crate::gateway::{segment, ApiRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePermission {
    pub permission_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<RolePermission>,
}

impl Role {
    pub fn permission_keys(&self) -> Vec<&str> {
        self.permissions.iter().map(|p| p.permission_key.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: Vec<UserRole>,
}

impl AdminUser {
    pub fn role_ids(&self) -> Vec<&str> {
        self.roles.iter().map(|r| r.role.id.as_str()).collect()
    }
}

#[derive(Serialize)]
struct NewRole<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct PermissionSet<'a> {
    permissions: &'a [String],
}

#[derive(Serialize)]
struct RoleSet<'a> {
    roles: &'a [String],
}

/// Role and user administration. Authorization is the backend's; a 403 comes back as `Forbidden`.
pub struct AdminApi {
    gateway: Gateway,
}

impl AdminApi {
    pub fn new(gateway: Gateway) -> Self { Self { gateway } }

    pub async fn list_roles(&self) -> ClientResult<Vec<Role>> {
        self.gateway.send_json(ApiRequest::get("/roles")).await
    }

    /// Every permission key the backend knows.
    pub async fn list_permissions(&self) -> ClientResult<Vec<String>> {
        self.gateway.send_json(ApiRequest::get("/roles/permissions")).await
    }

    pub async fn create_role(&self, name: &str) -> ClientResult<Role> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::invalid("role name is required"));
        }
        self.gateway.send_json(ApiRequest::post("/roles").json(&NewRole { name })?).await
    }

    pub async fn delete_role(&self, role_id: &str) -> ClientResult<()> {
        self.gateway.send(ApiRequest::delete(format!("/roles/{}", segment(role_id)))).await?;
        Ok(())
    }

    /// Replace the role's permission set.
    pub async fn set_role_permissions(&self, role_id: &str, keys: &[String]) -> ClientResult<()> {
        let req = ApiRequest::patch(format!("/roles/{}/permissions", segment(role_id))).json(&PermissionSet { permissions: keys })?;
        self.gateway.send(req).await?;
        Ok(())
    }

    pub async fn list_users(&self) -> ClientResult<Vec<AdminUser>> {
        self.gateway.send_json(ApiRequest::get("/users")).await
    }

    /// Replace the user's roles.
    pub async fn set_user_roles(&self, user_id: &str, role_ids: &[String]) -> ClientResult<()> {
        let req = ApiRequest::patch(format!("/users/{}/roles", segment(user_id))).json(&RoleSet { roles: role_ids })?;
        self.gateway.send(req).await?;
        Ok(())
    }

    pub async fn delete_user(&self, user_id: &str) -> ClientResult<()> {
        self.gateway.send(ApiRequest::delete(format!("/users/{}", segment(user_id)))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_role_and_user_shapes() {
        let role: Role = serde_json::from_value(json!({
            "id": "r1", "name": "editor",
            "permissions": [{"permissionKey": "roles:read"}, {"permissionKey": "users:read"}]
        }))
        .unwrap();
        assert_eq!(role.permission_keys(), vec!["roles:read", "users:read"]);

        let user: AdminUser = serde_json::from_value(json!({
            "id": "u1", "fullName": "Ayse Yilmaz", "email": "a@b.c",
            "roles": [{"role": {"id": "r1", "name": "editor"}}]
        }))
        .unwrap();
        assert_eq!(user.role_ids(), vec!["r1"]);
    }
}
