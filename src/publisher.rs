use crate::config::Config;
use crate::error::Error;
use chrono::NaiveDate;
use log::info;
use object_store::gcp::{GcpCredential, GoogleCloudStorage, GoogleCloudStorageBuilder};
use object_store::path::Path as ObjectPath;
use object_store::{
    Attribute, Attributes, ObjectStore, PutOptions, PutPayload, StaticCredentialProvider,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Destination partition of a published file: report category and availability date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionKey {
    pub category: String,
    pub date: NaiveDate,
}

impl PartitionKey {
    pub fn new(category: impl Into<String>, date: NaiveDate) -> Self {
        PartitionKey {
            category: category.into(),
            date,
        }
    }

    /// Hive-style partition segment, `dt=YYYY-MM-DD`.
    pub fn partition(&self) -> String {
        format!("dt={}", self.date.format("%Y-%m-%d"))
    }
}

/// `<prefix>/<category>/dt=<date>/<file_name>`; an empty prefix is omitted.
pub fn object_path(prefix: &str, key: &PartitionKey, file_name: &str) -> String {
    let partition = key.partition();
    [prefix.trim_matches('/'), key.category.as_str(), partition.as_str(), file_name]
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_name_of(local_path: &Path) -> Result<String, Error> {
    local_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::NoData {
            message: format!("{} has no file name", local_path.display()),
        })
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait StoragePublisher: Send + Sync + 'static {
    /// Uploads a local file into its partition, keeping the file name.
    /// # Arguments
    /// * `key` - The category and availability date of the file.
    /// * `local_path` - The staged file to upload.
    /// # Returns
    /// A Result containing either the object path written or an Error.
    async fn publish(&self, key: &PartitionKey, local_path: &Path) -> Result<String, Error>;
}

/// Chooses the local publisher when an output directory is configured, the bucket otherwise.
pub fn publisher_from_config(config: &Config) -> Result<Box<dyn StoragePublisher>, Error> {
    if let Some(root) = &config.local_output_dir {
        return Ok(Box::new(LocalPublisher::new(root, &config.storage_prefix)));
    }
    Ok(Box::new(GcsPublisher::new(config)?))
}

pub struct LocalPublisher {
    root: PathBuf,
    prefix: String,
}

impl LocalPublisher {
    pub fn new(root: &Path, prefix: &str) -> Self {
        LocalPublisher {
            root: root.to_path_buf(),
            prefix: prefix.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl StoragePublisher for LocalPublisher {
    async fn publish(&self, key: &PartitionKey, local_path: &Path) -> Result<String, Error> {
        let object = object_path(&self.prefix, key, &file_name_of(local_path)?);
        let target = self.root.join(&object);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &target).await?;

        info!("published {} to {}", local_path.display(), target.display());
        Ok(object)
    }
}

#[derive(Deserialize)]
struct CredentialsKind {
    #[serde(rename = "type")]
    kind: String,
}

/// Client settings for the configured bucket.
///
/// `--storage-token` wins over any key file. A `service_account` key is used as such, any
/// other file is read as application default credentials (e.g. `authorized_user`). Without
/// either, the default credentials chain is used, ending at the metadata server.
fn gcs_builder(config: &Config) -> Result<GoogleCloudStorageBuilder, Error> {
    let bucket = config.bucket.as_deref().ok_or_else(|| Error::Credentials {
        message: "set --bucket or --local-output-dir".to_string(),
    })?;
    let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(bucket);

    if let Some(path) = &config.storage_credentials {
        let credentials: CredentialsKind = serde_json::from_str(&fs::read_to_string(path)?)?;
        let path = path.to_string_lossy().into_owned();
        builder = match credentials.kind.as_str() {
            "service_account" => builder.with_service_account_path(path),
            _ => builder.with_application_credentials(path),
        };
    }

    if let Some(token) = &config.storage_token {
        builder = builder.with_credentials(Arc::new(StaticCredentialProvider::new(
            GcpCredential {
                bearer: token.clone(),
            },
        )));
    }

    Ok(builder)
}

pub struct GcsPublisher {
    store: GoogleCloudStorage,
    bucket: String,
    prefix: String,
}

impl GcsPublisher {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let store = gcs_builder(config)?.build()?;
        Ok(Self::with_store(store, config))
    }

    fn with_store(store: GoogleCloudStorage, config: &Config) -> Self {
        GcsPublisher {
            store,
            bucket: config.bucket.clone().unwrap_or_default(),
            prefix: config.storage_prefix.to_string(),
        }
    }
}

fn content_type(file_name: &str) -> &'static str {
    if file_name.to_lowercase().ends_with(".csv") {
        "text/csv"
    } else {
        "application/octet-stream"
    }
}

#[async_trait::async_trait]
impl StoragePublisher for GcsPublisher {
    async fn publish(&self, key: &PartitionKey, local_path: &Path) -> Result<String, Error> {
        let file_name = file_name_of(local_path)?;
        let object = object_path(&self.prefix, key, &file_name);

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type(&file_name).into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        let body = tokio::fs::read(local_path).await?;
        self.store
            .put_opts(&ObjectPath::from(object.as_str()), PutPayload::from(body), options)
            .await?;

        info!("uploaded {} to gs://{}/{}", local_path.display(), self.bucket, object);
        Ok(object)
    }
}
