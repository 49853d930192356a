#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Black-box tests of identity operations against the in-memory store.

use identity_store::keys::{
    tenant_grant_primary_key, tenant_name_guard_key, tenant_primary_key, user_primary_key,
};
use identity_store::ops::{self, PolicyRecord, Role, Tenant, TenantGrant, User};
use identity_store::{
    Attributes, GuardedAttribute, InMemoryIdentityStore, StoreError, TxCheck, TxError,
    WriteTransaction, write_transaction,
};

fn tenant(id: &str, name: &str) -> Tenant {
    Tenant {
        id: id.to_owned(),
        name: name.to_owned(),
        attributes: Attributes::new(),
    }
}

fn user(id: &str, email: &str) -> User {
    User {
        id: id.to_owned(),
        email: Some(email.to_owned()),
        preferred_username: Some(format!("{id}-name")),
        ..User::default()
    }
}

#[tokio::test]
async fn create_tenant_writes_entity_and_guard_rows() {
    let store = InMemoryIdentityStore::new();
    ops::create_tenant(&store, &tenant("t1", "Acme")).await.unwrap();

    assert!(store.contains(&tenant_primary_key("t1")));
    assert!(store.contains(&tenant_name_guard_key("Acme")));
    assert_eq!(store.len(), 2);

    let row = store.get(&tenant_primary_key("t1")).unwrap();
    assert_eq!(row["GSI1PK"], "TENANT_NAME#Acme");
    assert_eq!(row["name"], "Acme");
}

#[tokio::test]
async fn duplicate_tenant_name_is_a_conflict_and_writes_nothing() {
    let store = InMemoryIdentityStore::new();
    ops::create_tenant(&store, &tenant("t1", "Acme")).await.unwrap();

    let err = ops::create_tenant(&store, &tenant("t2", "Acme"))
        .await
        .unwrap_err();

    assert!(err.is_conflict(), "unexpected error: {err}");
    assert!(!store.contains(&tenant_primary_key("t2")));
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn duplicate_user_email_is_a_conflict() {
    let store = InMemoryIdentityStore::new();
    ops::create_user(&store, &user("u1", "a@example.com"))
        .await
        .unwrap();
    assert_eq!(store.len(), 3);

    let err = ops::create_user(&store, &user("u2", "a@example.com"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(!store.contains(&user_primary_key("u2")));
}

#[tokio::test]
async fn update_user_swaps_changed_guards() {
    let store = InMemoryIdentityStore::new();
    let current = user("u1", "old@example.com");
    ops::create_user(&store, &current).await.unwrap();

    let updated = User {
        email: Some("new@example.com".to_owned()),
        ..current.clone()
    };
    ops::update_user(&store, &current, &updated).await.unwrap();

    assert!(!store.contains(&GuardedAttribute::UserEmail.key("old@example.com")));
    assert!(store.contains(&GuardedAttribute::UserEmail.key("new@example.com")));
    assert!(store.contains(&GuardedAttribute::UserPreferredUsername.key("u1-name")));
    assert_eq!(
        store.get(&user_primary_key("u1")).unwrap()["email"],
        "new@example.com"
    );

    // A second user may now claim the released email.
    ops::create_user(&store, &user("u2", "old@example.com"))
        .await
        .unwrap();
}

#[tokio::test]
async fn update_user_rejects_id_change() {
    let store = InMemoryIdentityStore::new();
    let err = ops::update_user(&store, &user("u1", "a@x.io"), &user("u2", "a@x.io"))
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::InvalidArgument(_)));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn tenant_grant_requires_existing_tenant_and_user() {
    let store = InMemoryIdentityStore::new();
    let grant = TenantGrant {
        id: "g1".to_owned(),
        tenant_id: "t1".to_owned(),
        user_id: "u1".to_owned(),
        attributes: Attributes::new(),
    };

    let err = ops::create_tenant_grant(&store, &grant).await.unwrap_err();
    assert!(err.is_conflict());

    ops::create_tenant(&store, &tenant("t1", "Acme")).await.unwrap();
    ops::create_user(&store, &user("u1", "a@example.com"))
        .await
        .unwrap();
    ops::create_tenant_grant(&store, &grant).await.unwrap();

    let row = store.get(&tenant_grant_primary_key("t1", "u1")).unwrap();
    assert_eq!(row["GSI1PK"], "USER#u1");
    assert_eq!(row["GSI1SK"], "TENANT#t1");
    assert_eq!(row["GSI2PK"], "TENANT_GRANT#g1");

    ops::delete_tenant_grant(&store, &grant).await.unwrap();
    assert!(!store.contains(&tenant_grant_primary_key("t1", "u1")));
}

#[tokio::test]
async fn delete_removes_entity_and_guards_atomically() {
    let store = InMemoryIdentityStore::new();
    let u = user("u1", "a@example.com");
    ops::create_user(&store, &u).await.unwrap();
    ops::delete_user(&store, &u).await.unwrap();
    assert!(store.is_empty());

    // Deleting again fails as a whole.
    assert!(ops::delete_user(&store, &u).await.unwrap_err().is_conflict());
}

#[tokio::test]
async fn roles_and_policy_records_are_unique_by_key() {
    let store = InMemoryIdentityStore::new();
    let role = Role {
        id: "r1".to_owned(),
        scope: "global".to_owned(),
        name: "admin".to_owned(),
        attributes: Attributes::new(),
    };
    ops::create_role(&store, &role).await.unwrap();
    let clash = Role {
        id: "r2".to_owned(),
        ..role.clone()
    };
    assert!(ops::create_role(&store, &clash).await.unwrap_err().is_conflict());
    ops::delete_role(&store, &role).await.unwrap();

    let policy = PolicyRecord {
        id: "p1".to_owned(),
        name: "deny-all".to_owned(),
        attributes: Attributes::new(),
    };
    ops::create_policy_record(&store, &policy).await.unwrap();
    assert!(
        ops::create_policy_record(&store, &policy)
            .await
            .unwrap_err()
            .is_conflict()
    );
    ops::delete_policy_record(&store, &policy).await.unwrap();
    assert!(store.is_empty());
}

#[tokio::test]
async fn write_transaction_requires_puts_or_checks() {
    let store = InMemoryIdentityStore::new();
    let err = write_transaction(&store, Vec::new(), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::InvalidArgument(_)));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn throttling_is_classified_retryable() {
    let store = InMemoryIdentityStore::new();
    store.inject_failure(StoreError::service(
        "ProvisionedThroughputExceededException",
        "slow down",
    ));

    let err = WriteTransaction::new()
        .put(tenant("t1", "Acme").entity_row())
        .check(TxCheck::not_exists(tenant_name_guard_key("Acme")))
        .execute(&store)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(store.is_empty());
}

#[tokio::test]
async fn transport_failure_is_op_error() {
    let store = InMemoryIdentityStore::new();
    store.inject_failure(StoreError::transport("connection reset"));

    let err = ops::create_tenant(&store, &tenant("t1", "Acme"))
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::Op(_)));
}
