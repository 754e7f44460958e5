use std::collections::BTreeMap;
use std::future::Future;

use ingest_config::Secret;
use ingest_config::shared::TableJobSpec;

use crate::error::{ErrorKind, IngestResult};
use crate::ingest_error;

/// A named set of secret values, e.g. a base url and a token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    values: BTreeMap<String, Secret>,
}

impl Credentials {
    pub fn new(values: BTreeMap<String, Secret>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(Secret::expose)
    }

    /// Returns the value of `name` or a [`ErrorKind::MissingCredentials`] error.
    pub fn require(&self, name: &str) -> IngestResult<&str> {
        self.get(name).ok_or_else(|| {
            ingest_error!(
                ErrorKind::MissingCredentials,
                "Credential field is missing",
                format!("field `{name}` is not set")
            )
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Credentials
where
    K: Into<String>,
    V: Into<Secret>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Secret store lookup by key.
pub trait CredentialProvider {
    /// Returns the credentials stored under `key`.
    ///
    /// An absent key fails with [`ErrorKind::MissingCredentials`].
    fn get(&self, key: &str) -> impl Future<Output = IngestResult<Credentials>> + Send;
}

/// Key of the source credentials: `/{env}/{source platform}`.
pub fn source_credentials_key(spec: &TableJobSpec) -> String {
    format!("/{}/{}", spec.environment, spec.source.platform)
}

/// Key of the target credentials: `/{env}/{target platform}/{database}/{schema}`.
pub fn target_credentials_key(spec: &TableJobSpec) -> String {
    format!(
        "/{}/{}/{}/{}",
        spec.environment, spec.target.platform, spec.target.database, spec.target.schema
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_config::shared::{LoadType, SourceSpec, TargetSpec};

    #[test]
    fn require_reports_missing_fields() {
        let credentials: Credentials = [("token", "abc")].into_iter().collect();

        assert_eq!(credentials.require("token").unwrap(), "abc");
        let err = credentials.require("base_url").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredentials);
        assert!(err.detail().unwrap().contains("base_url"));
    }

    #[test]
    fn keys_follow_the_store_layout() {
        let spec = TableJobSpec {
            alias: "users".to_owned(),
            environment: "prod".to_owned(),
            source: SourceSpec {
                platform: "crm".to_owned(),
                table: "users".to_owned(),
                endpoint: None,
            },
            target: TargetSpec {
                platform: "warehouse".to_owned(),
                database: "raw".to_owned(),
                schema: "crm".to_owned(),
                table: "users".to_owned(),
            },
            load_type: LoadType::FullLoad,
            soft_delete: false,
        };

        assert_eq!(source_credentials_key(&spec), "/prod/crm");
        assert_eq!(target_credentials_key(&spec), "/prod/warehouse/raw/crm");
    }
}
