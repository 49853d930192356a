//! DynamoDB implementation of [`IdentityStoreClient`].

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{
    AttributeValue, ConditionCheck, Delete, Put, TransactWriteItem,
};
use serde_json::Value;

use crate::client::{Condition, IdentityStoreClient, TransactItem};
use crate::error::StoreError;
use crate::keys::{PK, PrimaryKey, SK};
use crate::row::Attributes;

/// Condition expression for "no row at (PK, SK)".
pub const NOT_EXISTS_EXPRESSION: &str = "attribute_not_exists(PK) AND attribute_not_exists(SK)";
/// Condition expression for "a row exists at (PK, SK)".
pub const EXISTS_EXPRESSION: &str = "attribute_exists(PK) AND attribute_exists(SK)";

/// Identity store client bound to one DynamoDB table.
#[derive(Debug, Clone)]
pub struct DynamoIdentityStore {
    client: Client,
    table_name: String,
}

impl DynamoIdentityStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn build(&self, item: TransactItem) -> Result<TransactWriteItem, StoreError> {
        let entry = match item {
            TransactItem::Put {
                item, condition, ..
            } => {
                let put = Put::builder()
                    .table_name(&self.table_name)
                    .set_item(Some(to_item(&item)))
                    .condition_expression(expression(condition))
                    .build()
                    .map_err(|e| StoreError::transport(e.to_string()))?;
                TransactWriteItem::builder().put(put).build()
            }
            TransactItem::ConditionCheck { key, condition } => {
                let check = ConditionCheck::builder()
                    .table_name(&self.table_name)
                    .set_key(Some(key_item(&key)))
                    .condition_expression(expression(condition))
                    .build()
                    .map_err(|e| StoreError::transport(e.to_string()))?;
                TransactWriteItem::builder().condition_check(check).build()
            }
            TransactItem::Delete { key, condition } => {
                let delete = Delete::builder()
                    .table_name(&self.table_name)
                    .set_key(Some(key_item(&key)))
                    .set_condition_expression(condition.map(|c| expression(c).to_owned()))
                    .build()
                    .map_err(|e| StoreError::transport(e.to_string()))?;
                TransactWriteItem::builder().delete(delete).build()
            }
        };
        Ok(entry)
    }
}

const fn expression(condition: Condition) -> &'static str {
    match condition {
        Condition::NotExists => NOT_EXISTS_EXPRESSION,
        Condition::Exists => EXISTS_EXPRESSION,
    }
}

fn key_item(key: &PrimaryKey) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (PK.to_owned(), AttributeValue::S(key.pk.clone())),
        (SK.to_owned(), AttributeValue::S(key.sk.clone())),
    ])
}

fn to_item(item: &Attributes) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_attribute_value(value)))
        .collect()
}

/// Converts a JSON value into the store's attribute representation.
#[must_use]
pub fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute_value).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute_value(v)))
                .collect(),
        ),
    }
}

fn to_store_error<R>(err: &SdkError<TransactWriteItemsError, R>) -> StoreError
where
    R: std::fmt::Debug,
{
    let mut store_err = StoreError::new(
        err.code().map(str::to_owned),
        DisplayErrorContext(err).to_string(),
    );
    if let Some(TransactWriteItemsError::TransactionCanceledException(cancelled)) =
        err.as_service_error()
    {
        store_err = store_err.with_cancellation_reasons(
            cancelled
                .cancellation_reasons()
                .iter()
                .map(|reason| reason.code().map(str::to_owned))
                .collect(),
        );
    }
    store_err
}

#[async_trait]
impl IdentityStoreClient for DynamoIdentityStore {
    async fn transact_write(&self, items: Vec<TransactItem>) -> Result<(), StoreError> {
        let entries = items
            .into_iter()
            .map(|item| self.build(item))
            .collect::<Result<Vec<_>, _>>()?;

        self.client
            .transact_write_items()
            .set_transact_items(Some(entries))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| to_store_error(&e))
    }
}
