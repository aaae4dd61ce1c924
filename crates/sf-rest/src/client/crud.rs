//! Single-record create, update, upsert and delete.

use serde_json::Value;
use tracing::instrument;

use forcelink_client::security::{soql, url as url_security};
use forcelink_client::{Record, Row};

use super::SalesforceRestClient;
use crate::collections::CollectionResult;
use crate::error::{Error, Result};
use crate::sobject::DmlResult;

impl SalesforceRestClient {
    /// Create one record.
    #[instrument(skip(self, record))]
    pub async fn insert_one<T: Row>(&self, object: &str, record: &T) -> Result<DmlResult> {
        check_object(object)?;
        let body = Value::Object(record.to_record().to_json_object());

        let created: CollectionResult = self
            .client
            .post_json(&format!("sobjects/{object}"), &body)
            .await?;
        Ok(created.into_dml_result(0))
    }

    /// Update one record by its `Id`.
    #[instrument(skip(self, record))]
    pub async fn update_one<T: Row>(&self, object: &str, record: &T) -> Result<DmlResult> {
        check_object(object)?;
        let mut record = record.to_record();
        let id = take_id(&mut record)?;

        let request = self
            .client
            .patch(&format!("sobjects/{object}/{id}"))
            .json_value(Value::Object(record.to_json_object()));
        self.client.execute(request).await?;
        Ok(DmlResult::succeeded(0, Some(id)))
    }

    /// Insert or update one record keyed by an external id field.
    ///
    /// `created` tells which of the two happened.
    #[instrument(skip(self, record))]
    pub async fn upsert_one<T: Row>(
        &self,
        object: &str,
        external_id_field: &str,
        record: &T,
    ) -> Result<DmlResult> {
        check_object(object)?;
        if !soql::is_safe_sobject_name(external_id_field) {
            return Err(Error::validation(format!(
                "invalid external id field: {external_id_field}"
            )));
        }

        let mut record = record.to_record();
        let key = match record.remove(external_id_field) {
            Some(value) if !value.is_null() && !value.to_text().is_empty() => value.to_text(),
            _ => {
                return Err(Error::validation(format!(
                    "record has no value for external id field {external_id_field}"
                )))
            }
        };
        let known_id = record.remove("Id").and_then(|id| id.as_str().map(str::to_string));

        let request = self
            .client
            .patch(&format!(
                "sobjects/{object}/{external_id_field}/{}",
                url_security::encode_param(&key)
            ))
            .json_value(Value::Object(record.to_json_object()));
        let response = self.client.execute(request).await?;
        let created = response.status() == 201;

        // 204 carries no body; 200 and 201 describe the record.
        let body: Value = response.json().await?;
        let mut result = match body {
            Value::Object(_) => serde_json::from_value::<CollectionResult>(body)?.into_dml_result(0),
            _ => DmlResult::succeeded(0, known_id),
        };
        result.created.get_or_insert(created);
        Ok(result)
    }

    /// Delete one record by its `Id`.
    #[instrument(skip(self, record))]
    pub async fn delete_one<T: Row>(&self, object: &str, record: &T) -> Result<DmlResult> {
        check_object(object)?;
        let id = take_id(&mut record.to_record())?;

        self.client
            .execute(self.client.delete(&format!("sobjects/{object}/{id}")))
            .await?;
        Ok(DmlResult::succeeded(0, Some(id)))
    }
}

fn check_object(object: &str) -> Result<()> {
    if soql::is_safe_sobject_name(object) {
        Ok(())
    } else {
        Err(Error::validation(format!("invalid sObject name: {object}")))
    }
}

/// Remove and return the record's `Id`, which must be a Salesforce id.
fn take_id(record: &mut Record) -> Result<String> {
    match record.remove("Id") {
        Some(value) => match value.as_str() {
            Some(id) if url_security::is_valid_salesforce_id(id) => Ok(id.to_string()),
            _ => Err(Error::validation(format!(
                "invalid record Id: {}",
                value.to_text()
            ))),
        },
        None => Err(Error::validation("record has no Id")),
    }
}
