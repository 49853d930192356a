//! Identity operations over the single-table store.
//!
//! Each create writes the entity row and its guard rows in one atomic
//! transaction; each delete removes them the same way.

use crate::client::IdentityStoreClient;
use crate::error::TxError;
use crate::keys::{
    policy_id_gsi, policy_primary_key, role_id_gsi, role_primary_key, tenant_grant_id_gsi,
    tenant_grant_primary_key, tenant_grant_reverse_gsi, tenant_name_gsi, tenant_primary_key,
    user_primary_key,
};
use crate::row::{Attributes, EntityRow, GuardRow, GuardedAttribute};
use crate::tx::{TxCheck, WriteTransaction};

#[derive(Debug, Clone, PartialEq)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub preferred_username: Option<String>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub id: String,
    pub scope: String,
    pub name: String,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TenantGrant {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub attributes: Attributes,
}

/// Metadata of a Cedar policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRecord {
    pub id: String,
    pub name: String,
    pub attributes: Attributes,
}

impl Tenant {
    #[must_use]
    pub fn entity_row(&self) -> EntityRow {
        EntityRow::new(tenant_primary_key(&self.id))
            .with_index(tenant_name_gsi(&self.name))
            .with_attributes(&self.attributes)
            .with_attribute("id", self.id.as_str())
            .with_attribute("name", self.name.as_str())
    }

    #[must_use]
    pub fn guard_rows(&self) -> Vec<GuardRow> {
        vec![GuardRow::new(
            GuardedAttribute::TenantName,
            self.name.as_str(),
            self.id.as_str(),
        )]
    }
}

impl User {
    #[must_use]
    pub fn entity_row(&self) -> EntityRow {
        let mut row = EntityRow::new(user_primary_key(&self.id))
            .with_attributes(&self.attributes)
            .with_attribute("id", self.id.as_str());
        for (attribute, value) in self.guarded_values() {
            row = row.with_attribute(attribute.as_str(), value);
        }
        row
    }

    /// One guard row per present unique attribute.
    #[must_use]
    pub fn guard_rows(&self) -> Vec<GuardRow> {
        self.guarded_values()
            .into_iter()
            .map(|(attribute, value)| GuardRow::new(attribute, value, self.id.as_str()))
            .collect()
    }

    fn guarded_values(&self) -> Vec<(GuardedAttribute, &str)> {
        [
            (GuardedAttribute::UserEmail, self.email.as_deref()),
            (GuardedAttribute::UserPhone, self.phone.as_deref()),
            (
                GuardedAttribute::UserPreferredUsername,
                self.preferred_username.as_deref(),
            ),
        ]
        .into_iter()
        .filter_map(|(attribute, value)| value.map(|v| (attribute, v)))
        .collect()
    }
}

impl Role {
    #[must_use]
    pub fn entity_row(&self) -> EntityRow {
        EntityRow::new(role_primary_key(&self.scope, &self.name))
            .with_index(role_id_gsi(&self.id))
            .with_attributes(&self.attributes)
            .with_attribute("id", self.id.as_str())
            .with_attribute("scope", self.scope.as_str())
            .with_attribute("name", self.name.as_str())
    }
}

impl TenantGrant {
    #[must_use]
    pub fn entity_row(&self) -> EntityRow {
        EntityRow::new(tenant_grant_primary_key(&self.tenant_id, &self.user_id))
            .with_index(tenant_grant_reverse_gsi(&self.user_id, &self.tenant_id))
            .with_index(tenant_grant_id_gsi(&self.id))
            .with_attributes(&self.attributes)
            .with_attribute("id", self.id.as_str())
            .with_attribute("tenantId", self.tenant_id.as_str())
            .with_attribute("userId", self.user_id.as_str())
    }
}

impl PolicyRecord {
    #[must_use]
    pub fn entity_row(&self) -> EntityRow {
        EntityRow::new(policy_primary_key(&self.name))
            .with_index(policy_id_gsi(&self.id))
            .with_attributes(&self.attributes)
            .with_attribute("id", self.id.as_str())
            .with_attribute("name", self.name.as_str())
    }
}

fn create_with_guards(entity: EntityRow, guards: Vec<GuardRow>) -> WriteTransaction {
    guards
        .into_iter()
        .fold(WriteTransaction::new().put(entity), WriteTransaction::put)
}

fn delete_with_guards(entity: &EntityRow, guards: &[GuardRow]) -> WriteTransaction {
    guards.iter().fold(
        WriteTransaction::new().delete(entity.key.clone()),
        |tx, guard| tx.delete(guard.key()),
    )
}

/// Creates a tenant together with its name guard.
///
/// # Errors
///
/// `Conflict` when the tenant id or name is already taken.
pub async fn create_tenant<C>(client: &C, tenant: &Tenant) -> Result<(), TxError>
where
    C: IdentityStoreClient + ?Sized,
{
    create_with_guards(tenant.entity_row(), tenant.guard_rows())
        .execute(client)
        .await
}

/// # Errors
///
/// `Conflict` when the tenant row or its name guard is missing.
pub async fn delete_tenant<C>(client: &C, tenant: &Tenant) -> Result<(), TxError>
where
    C: IdentityStoreClient + ?Sized,
{
    delete_with_guards(&tenant.entity_row(), &tenant.guard_rows())
        .execute(client)
        .await
}

/// Creates a user with guards for email, phone and preferred username.
///
/// # Errors
///
/// `Conflict` when the user id or any guarded attribute is already taken.
pub async fn create_user<C>(client: &C, user: &User) -> Result<(), TxError>
where
    C: IdentityStoreClient + ?Sized,
{
    create_with_guards(user.entity_row(), user.guard_rows())
        .execute(client)
        .await
}

/// Replaces a user's row and swaps guard rows of changed unique attributes.
///
/// # Errors
///
/// - `InvalidArgument` when `current` and `updated` differ in id
/// - `Conflict` when the user is missing or a new unique value is taken
pub async fn update_user<C>(client: &C, current: &User, updated: &User) -> Result<(), TxError>
where
    C: IdentityStoreClient + ?Sized,
{
    if current.id != updated.id {
        return Err(TxError::invalid_argument(format!(
            "cannot change user id from '{}' to '{}'",
            current.id, updated.id
        )));
    }

    let old_guards = current.guard_rows();
    let new_guards = updated.guard_rows();

    let mut tx = WriteTransaction::new().replace(updated.entity_row());
    for guard in old_guards.iter().filter(|g| !new_guards.contains(g)) {
        tx = tx.delete(guard.key());
    }
    for guard in new_guards.into_iter().filter(|g| !old_guards.contains(g)) {
        tx = tx.put(guard);
    }
    tx.execute(client).await
}

/// # Errors
///
/// `Conflict` when the user row or any of its guards is missing.
pub async fn delete_user<C>(client: &C, user: &User) -> Result<(), TxError>
where
    C: IdentityStoreClient + ?Sized,
{
    delete_with_guards(&user.entity_row(), &user.guard_rows())
        .execute(client)
        .await
}

/// Creates a role; (scope, name) is unique by construction of the key.
///
/// # Errors
///
/// `Conflict` when a role with the same scope and name exists.
pub async fn create_role<C>(client: &C, role: &Role) -> Result<(), TxError>
where
    C: IdentityStoreClient + ?Sized,
{
    WriteTransaction::new()
        .put(role.entity_row())
        .execute(client)
        .await
}

/// # Errors
///
/// `Conflict` when the role does not exist.
pub async fn delete_role<C>(client: &C, role: &Role) -> Result<(), TxError>
where
    C: IdentityStoreClient + ?Sized,
{
    WriteTransaction::new()
        .delete(role.entity_row().key)
        .execute(client)
        .await
}

/// Grants a user membership in a tenant. Both must already exist.
///
/// # Errors
///
/// `Conflict` when the grant exists or the tenant or user is missing.
pub async fn create_tenant_grant<C>(client: &C, grant: &TenantGrant) -> Result<(), TxError>
where
    C: IdentityStoreClient + ?Sized,
{
    WriteTransaction::new()
        .put(grant.entity_row())
        .check(TxCheck::exists(tenant_primary_key(&grant.tenant_id)))
        .check(TxCheck::exists(user_primary_key(&grant.user_id)))
        .execute(client)
        .await
}

/// # Errors
///
/// `Conflict` when the grant does not exist.
pub async fn delete_tenant_grant<C>(client: &C, grant: &TenantGrant) -> Result<(), TxError>
where
    C: IdentityStoreClient + ?Sized,
{
    WriteTransaction::new()
        .delete(grant.entity_row().key)
        .execute(client)
        .await
}

/// # Errors
///
/// `Conflict` when a policy with the same name exists.
pub async fn create_policy_record<C>(client: &C, policy: &PolicyRecord) -> Result<(), TxError>
where
    C: IdentityStoreClient + ?Sized,
{
    WriteTransaction::new()
        .put(policy.entity_row())
        .execute(client)
        .await
}

/// # Errors
///
/// `Conflict` when the policy record does not exist.
pub async fn delete_policy_record<C>(client: &C, policy: &PolicyRecord) -> Result<(), TxError>
where
    C: IdentityStoreClient + ?Sized,
{
    WriteTransaction::new()
        .delete(policy.entity_row().key)
        .execute(client)
        .await
}
