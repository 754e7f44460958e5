use std::collections::BTreeMap;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_ssm::Client;
use aws_sdk_ssm::error::DisplayErrorContext;
use ingest_config::Secret;
use tracing::debug;

use crate::credentials::{CredentialProvider, Credentials};
use crate::error::{ErrorKind, IngestResult};
use crate::{bail, ingest_error};

/// Credential provider reading JSON documents from AWS SSM Parameter Store.
///
/// Every parameter holds a JSON object whose scalar values become the
/// credential fields. Secure strings are decrypted on read.
#[derive(Debug, Clone)]
pub struct SsmCredentialProvider {
    client: Client,
}

impl SsmCredentialProvider {
    /// Builds a provider from the default AWS configuration chain.
    pub async fn new(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;

        Self {
            client: Client::new(&config),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl CredentialProvider for SsmCredentialProvider {
    async fn get(&self, key: &str) -> IngestResult<Credentials> {
        debug!(key, "reading credentials from parameter store");

        let output = match self
            .client
            .get_parameter()
            .name(key)
            .with_decryption(true)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let service_error = err.into_service_error();
                if service_error.is_parameter_not_found() {
                    bail!(
                        ErrorKind::MissingCredentials,
                        "No credentials stored under key",
                        key
                    );
                }

                bail!(
                    ErrorKind::ConfigError,
                    "Failed to read credentials from parameter store",
                    format!("{key}: {}", DisplayErrorContext(&service_error))
                );
            }
        };

        let Some(value) = output.parameter().and_then(|parameter| parameter.value()) else {
            bail!(
                ErrorKind::MissingCredentials,
                "Parameter has no value",
                key
            );
        };

        parse_credentials(value).map_err(|err| {
            ingest_error!(
                ErrorKind::ConfigError,
                "Parameter value is not a credentials document",
                format!("{key}: {err}")
            )
        })
    }
}

/// Parses a JSON object of scalars into credentials.
///
/// Numbers and booleans are kept as their text, nulls are skipped.
pub fn parse_credentials(document: &str) -> IngestResult<Credentials> {
    let fields: BTreeMap<String, serde_json::Value> = serde_json::from_str(document)?;

    let mut values = BTreeMap::new();
    for (name, value) in fields {
        let text = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(text) => text,
            serde_json::Value::Bool(_) | serde_json::Value::Number(_) => value.to_string(),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => bail!(
                ErrorKind::InvalidData,
                "Credential field is not a scalar",
                name
            ),
        };
        values.insert(name, Secret::new(text));
    }

    Ok(Credentials::new(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalar_documents() {
        let credentials =
            parse_credentials(r#"{"host": "db", "port": 5432, "password": "p", "note": null}"#)
                .unwrap();

        assert_eq!(credentials.get("host"), Some("db"));
        assert_eq!(credentials.get("port"), Some("5432"));
        assert_eq!(credentials.get("note"), None);
        assert_eq!(credentials.len(), 3);
    }

    #[test]
    fn rejects_nested_values() {
        let err = parse_credentials(r#"{"hosts": ["a", "b"]}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_non_objects() {
        let err = parse_credentials("[1, 2]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeserializationError);
    }
}
