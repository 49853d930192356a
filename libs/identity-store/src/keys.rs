//! Key encoding for the single-table identity store.
//!
//! Every function here is pure: the same logical identifier always yields the
//! same key. Conditional writes and reverse lookups depend on that.

use std::fmt;

/// Partition key attribute name.
pub const PK: &str = "PK";
/// Sort key attribute name.
pub const SK: &str = "SK";
/// GSI1 partition key attribute name.
pub const GSI1_PK: &str = "GSI1PK";
/// GSI1 sort key attribute name.
pub const GSI1_SK: &str = "GSI1SK";
/// GSI2 partition key attribute name.
pub const GSI2_PK: &str = "GSI2PK";
/// GSI2 sort key attribute name.
pub const GSI2_SK: &str = "GSI2SK";

/// Attribute names reserved for keys; row attributes never override them.
pub const KEY_ATTRIBUTES: [&str; 6] = [PK, SK, GSI1_PK, GSI1_SK, GSI2_PK, GSI2_SK];

/// Key tags used as the `<TAG>#` prefix of every key value.
pub mod tag {
    pub const TENANT: &str = "TENANT";
    pub const TENANT_NAME: &str = "TENANT_NAME";
    pub const USER: &str = "USER";
    pub const USER_EMAIL: &str = "USER_EMAIL";
    pub const USER_PHONE: &str = "USER_PHONE";
    pub const USER_PREFERRED_USERNAME: &str = "USER_PREFERREDUSERNAME";
    pub const ROLE: &str = "ROLE";
    pub const ROLE_SCOPE: &str = "ROLE_SCOPE";
    pub const ROLE_NAME: &str = "ROLE_NAME";
    pub const TENANT_GRANT: &str = "TENANT_GRANT";
    pub const POLICY: &str = "POLICY";
    pub const POLICY_NAME: &str = "POLICY_NAME";
    pub const GLOBAL: &str = "GLOBAL";
}

/// Number of identifier characters kept by [`PrimaryKey::preview`].
const PREVIEW_CHARS: usize = 4;

/// Primary key of a physical row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimaryKey {
    pub pk: String,
    pub sk: String,
}

impl PrimaryKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Key whose sort key repeats the partition key.
    pub fn same(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            sk: value.clone(),
            pk: value,
        }
    }

    /// Log-safe rendering: key tags are kept, identifiers are truncated.
    #[must_use]
    pub fn preview(&self) -> String {
        format!("{}|{}", preview_value(&self.pk), preview_value(&self.sk))
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pk, self.sk)
    }
}

fn preview_value(value: &str) -> String {
    match value.split_once('#') {
        Some((tag, id)) if id.chars().count() > PREVIEW_CHARS => {
            let head: String = id.chars().take(PREVIEW_CHARS).collect();
            format!("{tag}#{head}...")
        }
        _ => value.to_owned(),
    }
}

/// Secondary indexes of the identity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SecondaryIndex {
    Gsi1,
    Gsi2,
}

impl SecondaryIndex {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gsi1 => "GSI1",
            Self::Gsi2 => "GSI2",
        }
    }

    #[must_use]
    pub const fn pk_attribute(self) -> &'static str {
        match self {
            Self::Gsi1 => GSI1_PK,
            Self::Gsi2 => GSI2_PK,
        }
    }

    #[must_use]
    pub const fn sk_attribute(self) -> &'static str {
        match self {
            Self::Gsi1 => GSI1_SK,
            Self::Gsi2 => GSI2_SK,
        }
    }
}

/// Key of a row within one secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub index: SecondaryIndex,
    pub pk: String,
    pub sk: String,
}

impl IndexKey {
    pub fn new(index: SecondaryIndex, pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            index,
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    fn same(index: SecondaryIndex, value: String) -> Self {
        Self {
            index,
            sk: value.clone(),
            pk: value,
        }
    }
}

fn tagged(tag: &str, id: &str) -> String {
    format!("{tag}#{id}")
}

// Tenants

#[must_use]
pub fn tenant_pk(tenant_id: &str) -> String {
    tagged(tag::TENANT, tenant_id)
}

#[must_use]
pub fn tenant_sk(tenant_id: &str) -> String {
    tagged(tag::TENANT, tenant_id)
}

#[must_use]
pub fn tenant_primary_key(tenant_id: &str) -> PrimaryKey {
    PrimaryKey::new(tenant_pk(tenant_id), tenant_sk(tenant_id))
}

/// GSI1 lookup of a tenant by name.
#[must_use]
pub fn tenant_name_gsi(name: &str) -> IndexKey {
    IndexKey::same(SecondaryIndex::Gsi1, tagged(tag::TENANT_NAME, name))
}

/// Guard row key enforcing tenant name uniqueness.
#[must_use]
pub fn tenant_name_guard_key(name: &str) -> PrimaryKey {
    PrimaryKey::same(tagged(tag::TENANT_NAME, name))
}

// Users

#[must_use]
pub fn user_pk(user_id: &str) -> String {
    tagged(tag::USER, user_id)
}

#[must_use]
pub fn user_sk(user_id: &str) -> String {
    tagged(tag::USER, user_id)
}

#[must_use]
pub fn user_primary_key(user_id: &str) -> PrimaryKey {
    PrimaryKey::new(user_pk(user_id), user_sk(user_id))
}

#[must_use]
pub fn user_email_pk(email: &str) -> String {
    tagged(tag::USER_EMAIL, email)
}

#[must_use]
pub fn user_phone_pk(phone: &str) -> String {
    tagged(tag::USER_PHONE, phone)
}

#[must_use]
pub fn user_preferred_username_pk(username: &str) -> String {
    tagged(tag::USER_PREFERRED_USERNAME, username)
}

// Roles

#[must_use]
pub fn role_scope_pk(scope: &str) -> String {
    tagged(tag::ROLE_SCOPE, scope)
}

#[must_use]
pub fn role_name_sk(name: &str) -> String {
    tagged(tag::ROLE_NAME, name)
}

#[must_use]
pub fn role_primary_key(scope: &str, name: &str) -> PrimaryKey {
    PrimaryKey::new(role_scope_pk(scope), role_name_sk(name))
}

/// GSI1 lookup of a role by id.
#[must_use]
pub fn role_id_gsi(role_id: &str) -> IndexKey {
    IndexKey::same(SecondaryIndex::Gsi1, tagged(tag::ROLE, role_id))
}

// Tenant grants (user <-> tenant membership)

#[must_use]
pub fn tenant_grant_pk(tenant_id: &str) -> String {
    tenant_pk(tenant_id)
}

#[must_use]
pub fn tenant_grant_sk(user_id: &str) -> String {
    user_sk(user_id)
}

#[must_use]
pub fn tenant_grant_primary_key(tenant_id: &str, user_id: &str) -> PrimaryKey {
    PrimaryKey::new(tenant_grant_pk(tenant_id), tenant_grant_sk(user_id))
}

/// GSI1 reverse lookup (user -> tenants).
#[must_use]
pub fn tenant_grant_reverse_gsi(user_id: &str, tenant_id: &str) -> IndexKey {
    IndexKey::new(SecondaryIndex::Gsi1, user_pk(user_id), tenant_pk(tenant_id))
}

/// GSI2 lookup of a grant by id.
#[must_use]
pub fn tenant_grant_id_gsi(grant_id: &str) -> IndexKey {
    IndexKey::same(SecondaryIndex::Gsi2, tagged(tag::TENANT_GRANT, grant_id))
}

// Policy metadata

#[must_use]
pub fn policy_pk() -> &'static str {
    tag::GLOBAL
}

#[must_use]
pub fn policy_name_sk(name: &str) -> String {
    tagged(tag::POLICY_NAME, name)
}

#[must_use]
pub fn policy_primary_key(name: &str) -> PrimaryKey {
    PrimaryKey::new(policy_pk(), policy_name_sk(name))
}

/// GSI1 lookup of a policy by id.
#[must_use]
pub fn policy_id_gsi(policy_id: &str) -> IndexKey {
    IndexKey::same(SecondaryIndex::Gsi1, tagged(tag::POLICY, policy_id))
}
