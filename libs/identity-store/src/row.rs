//! Physical rows of the identity table.
//!
//! A logical entity is stored as one [`EntityRow`] plus zero or more
//! [`GuardRow`]s. Guard rows carry no data; they exist so that a
//! "not exists" condition on a unique attribute can be checked in the same
//! atomic write as the entity row that owns it.

use serde_json::{Map, Value};

use crate::keys::{
    IndexKey, KEY_ATTRIBUTES, PK, PrimaryKey, SK, tenant_name_guard_key, user_email_pk,
    user_phone_pk, user_preferred_username_pk,
};

/// Free-form, non-key row attributes.
pub type Attributes = Map<String, Value>;

/// Attribute naming the guarded attribute on a guard row.
pub const GUARD_FOR_ATTRIBUTE: &str = "guardFor";
/// Attribute naming the owning entity id on a guard row.
pub const OWNER_ID_ATTRIBUTE: &str = "ownerId";

/// Data-bearing row of a logical entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    pub key: PrimaryKey,
    pub indexes: Vec<IndexKey>,
    pub attributes: Attributes,
}

impl EntityRow {
    #[must_use]
    pub fn new(key: PrimaryKey) -> Self {
        Self {
            key,
            indexes: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: IndexKey) -> Self {
        self.indexes.push(index);
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: &Attributes) -> Self {
        self.attributes
            .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Full item as written to the store. Key attributes always win over
    /// same-named entries in `attributes`.
    #[must_use]
    pub fn item(&self) -> Attributes {
        let mut item: Attributes = self
            .attributes
            .iter()
            .filter(|(name, _)| !KEY_ATTRIBUTES.contains(&name.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        item.insert(PK.to_owned(), Value::String(self.key.pk.clone()));
        item.insert(SK.to_owned(), Value::String(self.key.sk.clone()));
        for index in &self.indexes {
            item.insert(
                index.index.pk_attribute().to_owned(),
                Value::String(index.pk.clone()),
            );
            item.insert(
                index.index.sk_attribute().to_owned(),
                Value::String(index.sk.clone()),
            );
        }
        item
    }
}

/// Attribute whose uniqueness a guard row enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardedAttribute {
    TenantName,
    UserEmail,
    UserPhone,
    UserPreferredUsername,
}

impl GuardedAttribute {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TenantName => "tenantName",
            Self::UserEmail => "email",
            Self::UserPhone => "phone",
            Self::UserPreferredUsername => "preferredUsername",
        }
    }

    /// Guard row key for the given attribute value.
    #[must_use]
    pub fn key(self, value: &str) -> PrimaryKey {
        match self {
            Self::TenantName => tenant_name_guard_key(value),
            Self::UserEmail => PrimaryKey::same(user_email_pk(value)),
            Self::UserPhone => PrimaryKey::same(user_phone_pk(value)),
            Self::UserPreferredUsername => PrimaryKey::same(user_preferred_username_pk(value)),
        }
    }
}

/// Uniqueness guard for one attribute value of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRow {
    pub attribute: GuardedAttribute,
    pub value: String,
    pub owner_id: String,
}

impl GuardRow {
    pub fn new(
        attribute: GuardedAttribute,
        value: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            attribute,
            value: value.into(),
            owner_id: owner_id.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> PrimaryKey {
        self.attribute.key(&self.value)
    }

    #[must_use]
    pub fn item(&self) -> Attributes {
        let key = self.key();
        let mut item = Attributes::new();
        item.insert(PK.to_owned(), Value::String(key.pk));
        item.insert(SK.to_owned(), Value::String(key.sk));
        item.insert(
            GUARD_FOR_ATTRIBUTE.to_owned(),
            Value::String(self.attribute.as_str().to_owned()),
        );
        item.insert(
            OWNER_ID_ATTRIBUTE.to_owned(),
            Value::String(self.owner_id.clone()),
        );
        item
    }
}

/// A physical row: either an entity or a uniqueness guard.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Entity(EntityRow),
    Guard(GuardRow),
}

impl Row {
    #[must_use]
    pub fn key(&self) -> PrimaryKey {
        match self {
            Self::Entity(row) => row.key.clone(),
            Self::Guard(row) => row.key(),
        }
    }

    #[must_use]
    pub fn item(&self) -> Attributes {
        match self {
            Self::Entity(row) => row.item(),
            Self::Guard(row) => row.item(),
        }
    }

    #[must_use]
    pub const fn is_guard(&self) -> bool {
        matches!(self, Self::Guard(_))
    }
}

impl From<EntityRow> for Row {
    fn from(row: EntityRow) -> Self {
        Self::Entity(row)
    }
}

impl From<GuardRow> for Row {
    fn from(row: GuardRow) -> Self {
        Self::Guard(row)
    }
}
