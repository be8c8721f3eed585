use crate::error::Error;
use clap::{Args as ClapArgs, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

const DEFAULT_API_URL: &str = "https://advertising-api.amazon.com";
const DEFAULT_AUTH_URL: &str = "https://api.amazon.com/auth/o2/token";
const DEFAULT_MARKETPLACE_ID: &str = "ATVPDKIKX0DER";
const DEFAULT_COMPANY: &str = "bayer";
const DEFAULT_STORAGE_PREFIX: &str = "amazon_media/bvp";
const DOWNLOAD_DIR: &str = "./download";
const PREPARED_DIR: &str = "./prepared";
const IDENTIFIER_COLUMNS: usize = 11;

/// What to do with an archive entry whose name matches none of the known report files.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnmatchedFilePolicy {
    #[default]
    Ignore,
    Fail,
}

/// What to do when a workbook lacks one of the expected sheets.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingSheetPolicy {
    #[default]
    Fail,
    Skip,
}

#[derive(ClapArgs, Clone, Debug)]
pub struct Config {
    #[arg(long, default_value = DEFAULT_API_URL, env = "ADS_API_URL")]
    pub(crate) api_url: String,

    #[arg(long, default_value = DEFAULT_AUTH_URL, env = "ADS_AUTH_URL")]
    pub(crate) auth_url: String,

    #[arg(long, env = "ADS_CLIENT_ID")]
    pub(crate) client_id: Option<String>,

    #[arg(long, env = "ADS_CLIENT_SECRET", hide_env_values = true)]
    pub(crate) client_secret: Option<String>,

    #[arg(long, env = "ADS_REFRESH_TOKEN", hide_env_values = true)]
    pub(crate) refresh_token: Option<String>,

    #[arg(long, env = "ADS_CREDENTIALS_FILE")]
    pub(crate) credentials_file: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_COMPANY, env = "ADS_COMPANY")]
    pub(crate) company: String,

    #[arg(long, env = "ADS_MANAGER_ACCOUNT_ID")]
    pub(crate) manager_account_id: Option<String>,

    #[arg(long, default_value = DEFAULT_MARKETPLACE_ID, env = "ADS_MARKETPLACE_ID")]
    pub(crate) marketplace_id: String,

    #[arg(long, default_value = DOWNLOAD_DIR, env = "DOWNLOAD_DIR")]
    pub(crate) download_dir: PathBuf,

    #[arg(long, default_value = PREPARED_DIR, env = "PREPARED_DIR")]
    pub(crate) prepared_dir: PathBuf,

    #[arg(long, env = "GCS_BUCKET")]
    pub(crate) bucket: Option<String>,

    #[arg(long, default_value = DEFAULT_STORAGE_PREFIX, env = "GCS_STORAGE_PREFIX")]
    pub(crate) storage_prefix: String,

    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub(crate) storage_credentials: Option<PathBuf>,

    #[arg(long, env = "GCS_ACCESS_TOKEN", hide_env_values = true)]
    pub(crate) storage_token: Option<String>,

    /// Publish into this directory instead of the bucket, keeping the partition layout.
    #[arg(long, env = "LOCAL_OUTPUT_DIR")]
    pub(crate) local_output_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = UnmatchedFilePolicy::Ignore, env = "ON_UNMATCHED_FILE")]
    pub(crate) on_unmatched_file: UnmatchedFilePolicy,

    #[arg(long, value_enum, default_value_t = MissingSheetPolicy::Fail, env = "ON_MISSING_SHEET")]
    pub(crate) on_missing_sheet: MissingSheetPolicy,

    #[arg(long, default_value_t = IDENTIFIER_COLUMNS, env = "IDENTIFIER_COLUMNS")]
    pub(crate) identifier_columns: usize,
}

/// Login-with-Amazon client credentials for one company.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OAuthCredentials {
    #[serde(rename = "CLIENT_ID")]
    pub client_id: String,
    #[serde(rename = "CLIENT_SECRET")]
    pub client_secret: String,
    #[serde(rename = "REFRESH_TOKEN")]
    pub refresh_token: String,
}

#[derive(Deserialize)]
struct CompanyCredentials {
    company: String,
    #[serde(flatten)]
    credentials: OAuthCredentials,
}

impl Config {
    /// Resolves the OAuth triple, preferring explicit flags over the credentials file.
    pub fn oauth_credentials(&self) -> Result<OAuthCredentials, Error> {
        if let (Some(client_id), Some(client_secret), Some(refresh_token)) =
            (&self.client_id, &self.client_secret, &self.refresh_token)
        {
            return Ok(OAuthCredentials {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                refresh_token: refresh_token.clone(),
            });
        }

        let path = self.credentials_file.as_ref().ok_or_else(|| Error::Credentials {
            message: "set --client-id, --client-secret and --refresh-token or --credentials-file"
                .to_string(),
        })?;

        let entries: Vec<CompanyCredentials> = serde_json::from_str(&fs::read_to_string(path)?)?;

        entries
            .into_iter()
            .find(|entry| entry.company == self.company)
            .map(|entry| entry.credentials)
            .ok_or_else(|| Error::Credentials {
                message: format!(
                    "company '{}' not found in {}",
                    self.company,
                    path.display()
                ),
            })
    }
}

#[cfg(test)]
impl Config {
    pub(crate) fn for_tests(download_dir: PathBuf, prepared_dir: PathBuf) -> Self {
        Config {
            api_url: String::from("https://api.example.com"),
            auth_url: String::from("https://auth.example.com/token"),
            client_id: Some(String::from("client")),
            client_secret: Some(String::from("secret")),
            refresh_token: Some(String::from("Atzr|refresh")),
            credentials_file: None,
            company: String::from(DEFAULT_COMPANY),
            manager_account_id: Some(String::from("amzn1.ads1.ma1.test")),
            marketplace_id: String::from(DEFAULT_MARKETPLACE_ID),
            download_dir,
            prepared_dir,
            bucket: None,
            storage_prefix: String::from(DEFAULT_STORAGE_PREFIX),
            storage_credentials: None,
            storage_token: None,
            local_output_dir: None,
            on_unmatched_file: UnmatchedFilePolicy::Ignore,
            on_missing_sheet: MissingSheetPolicy::Fail,
            identifier_columns: IDENTIFIER_COLUMNS,
        }
    }
}
