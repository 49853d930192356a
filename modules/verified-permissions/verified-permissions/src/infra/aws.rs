//! Amazon Verified Permissions adapter.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_verifiedpermissions::Client;
use aws_sdk_verifiedpermissions::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_verifiedpermissions::types::{
    ActionIdentifier, AttributeValue, ContextDefinition, EntityIdentifier, PolicyDefinition,
    PolicyDefinitionItem, SchemaDefinition, StaticPolicyDefinition,
};
use serde_json::Value;
use verified_permissions_sdk::{
    AuthorizationClient, AuthorizationRequest, AuthorizationResponse, EntityRef, NewStaticPolicy,
    PolicyClient, PolicyStoreError, PolicySummary, SchemaClient,
};

use crate::domain::region::partition_for_region;

const NOT_FOUND_CODE: &str = "ResourceNotFoundException";
const THROTTLING_CODES: [&str; 2] = ["ThrottlingException", "TooManyRequestsException"];

/// Loads the shared SDK configuration, pinned to `region` when given.
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_owned()));
    }
    let config = loader.load().await;
    if let Some(region) = config.region() {
        tracing::info!(
            region = %region,
            partition = %partition_for_region(region.as_ref()),
            "AWS configuration loaded"
        );
    } else {
        tracing::warn!("AWS configuration has no region");
    }
    config
}

/// Policy store client backed by the Verified Permissions API.
#[derive(Debug, Clone)]
pub struct AwsPolicyStoreClient {
    client: Client,
}

impl AwsPolicyStoreClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn from_conf(config: &SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

#[async_trait]
impl SchemaClient for AwsPolicyStoreClient {
    async fn get_schema(&self, policy_store_id: &str) -> Result<Option<String>, PolicyStoreError> {
        match self
            .client
            .get_schema()
            .policy_store_id(policy_store_id)
            .send()
            .await
        {
            Ok(output) => Ok(Some(output.schema().to_owned())),
            Err(err) if err.code() == Some(NOT_FOUND_CODE) => Ok(None),
            Err(err) => Err(map_sdk_error("GetSchema", &err)),
        }
    }

    async fn put_schema(
        &self,
        policy_store_id: &str,
        cedar_json: &str,
    ) -> Result<(), PolicyStoreError> {
        self.client
            .put_schema()
            .policy_store_id(policy_store_id)
            .definition(SchemaDefinition::CedarJson(cedar_json.to_owned()))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| map_sdk_error("PutSchema", &e))
    }
}

#[async_trait]
impl PolicyClient for AwsPolicyStoreClient {
    async fn list_policies(
        &self,
        policy_store_id: &str,
    ) -> Result<Vec<PolicySummary>, PolicyStoreError> {
        let mut policies = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .list_policies()
                .policy_store_id(policy_store_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| map_sdk_error("ListPolicies", &e))?;

            policies.extend(output.policies().iter().map(|item| {
                let description = match item.definition() {
                    Some(PolicyDefinitionItem::Static(definition)) => {
                        definition.description().map(str::to_owned)
                    }
                    _ => None,
                };
                PolicySummary {
                    policy_id: item.policy_id().to_owned(),
                    description,
                }
            }));

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_owned()),
                _ => break,
            }
        }
        Ok(policies)
    }

    async fn create_policy(
        &self,
        policy_store_id: &str,
        policy: NewStaticPolicy,
    ) -> Result<String, PolicyStoreError> {
        let definition = StaticPolicyDefinition::builder()
            .statement(policy.statement)
            .set_description(policy.description)
            .build()
            .map_err(|e| PolicyStoreError::transport("CreatePolicy", e.to_string()))?;

        let output = self
            .client
            .create_policy()
            .policy_store_id(policy_store_id)
            .definition(PolicyDefinition::Static(definition))
            .send()
            .await
            .map_err(|e| map_sdk_error("CreatePolicy", &e))?;
        Ok(output.policy_id().to_owned())
    }

    async fn delete_policy(
        &self,
        policy_store_id: &str,
        policy_id: &str,
    ) -> Result<(), PolicyStoreError> {
        self.client
            .delete_policy()
            .policy_store_id(policy_store_id)
            .policy_id(policy_id)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| map_sdk_error("DeletePolicy", &e))
    }
}

#[async_trait]
impl AuthorizationClient for AwsPolicyStoreClient {
    async fn is_authorized(
        &self,
        policy_store_id: &str,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationResponse, PolicyStoreError> {
        const OPERATION: &str = "IsAuthorized";
        let build_error = |e: aws_sdk_verifiedpermissions::error::BuildError| {
            PolicyStoreError::transport(OPERATION, e.to_string())
        };

        let action = ActionIdentifier::builder()
            .action_type(&request.action.action_type)
            .action_id(&request.action.action_id)
            .build()
            .map_err(build_error)?;

        let mut call = self
            .client
            .is_authorized()
            .policy_store_id(policy_store_id)
            .principal(entity_identifier(&request.principal).map_err(build_error)?)
            .action(action)
            .resource(entity_identifier(&request.resource).map_err(build_error)?);
        if !request.context.is_empty() {
            call = call.context(ContextDefinition::ContextMap(to_context_map(&request.context)));
        }

        let output = call
            .send()
            .await
            .map_err(|e| map_sdk_error(OPERATION, &e))?;

        Ok(AuthorizationResponse {
            decision: output.decision().as_str().to_owned(),
            determining_policies: output
                .determining_policies()
                .iter()
                .map(|p| p.policy_id().to_owned())
                .collect(),
            errors: output
                .errors()
                .iter()
                .map(|e| e.error_description().to_owned())
                .collect(),
        })
    }
}

fn entity_identifier(
    entity: &EntityRef,
) -> Result<EntityIdentifier, aws_sdk_verifiedpermissions::error::BuildError> {
    EntityIdentifier::builder()
        .entity_type(&entity.entity_type)
        .entity_id(&entity.entity_id)
        .build()
}

fn to_context_map(context: &BTreeMap<String, Value>) -> HashMap<String, AttributeValue> {
    context
        .iter()
        .map(|(k, v)| (k.clone(), to_attribute_value(v)))
        .collect()
}

/// Maps a JSON context value to a Cedar attribute value.
///
/// Integers become `Long`; values without a Cedar counterpart (null, floats)
/// are sent as their JSON text.
#[must_use]
pub fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Bool(b) => AttributeValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Long(i),
            None => AttributeValue::String(n.to_string()),
        },
        Value::String(s) => AttributeValue::String(s.clone()),
        Value::Array(values) => AttributeValue::Set(values.iter().map(to_attribute_value).collect()),
        Value::Object(map) => AttributeValue::Record(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute_value(v)))
                .collect(),
        ),
        Value::Null => AttributeValue::String(value.to_string()),
    }
}

fn map_sdk_error<E, R>(operation: &'static str, err: &SdkError<E, R>) -> PolicyStoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: fmt::Debug,
{
    let message = err
        .message()
        .map_or_else(|| DisplayErrorContext(err).to_string(), str::to_owned);
    classify(operation, err.code(), message)
}

fn classify(operation: &'static str, code: Option<&str>, message: String) -> PolicyStoreError {
    match code {
        Some(NOT_FOUND_CODE) => PolicyStoreError::not_found(operation, message),
        Some(code) if THROTTLING_CODES.contains(&code) => {
            PolicyStoreError::throttled(operation, code, message)
        }
        Some(code) => PolicyStoreError::service(operation, code, message),
        None => PolicyStoreError::transport(operation, message),
    }
}
