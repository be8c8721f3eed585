use crate::api_client::{AdsApi, ApiClient, ReportDescriptor};
use crate::archive;
use crate::auth::{TokenClient, TokenProvider};
use crate::classify::{classify_entry, classify_file, ArchiveEntry, FileFormat};
use crate::config::{Config, MissingSheetPolicy, OAuthCredentials, UnmatchedFilePolicy};
use crate::data::{self, PERIOD_COLUMN};
use crate::downloader::download_file;
use crate::error::Error;
use crate::publisher::{publisher_from_config, PartitionKey, StoragePublisher};
use crate::spreadsheet::{read_sheet, sheet_category, REPORT_SHEETS};
use chrono::NaiveDate;
use datafusion::prelude::SessionContext;
use log::{error, info, warn};
use reqwest::Client;
use std::fs;
use std::path::{Path, PathBuf};

/// Fetches every available report, reshapes it and publishes the results.
///
/// # Returns
/// The object paths written, in publication order.
pub async fn run(config: &Config) -> Result<Vec<String>, Error> {
    let credentials = config.oauth_credentials()?;
    let tokens = TokenClient::new(config);
    let api = ApiClient::new(config, &credentials.client_id)?;
    let publisher = publisher_from_config(config)?;

    run_with(config, &credentials, &tokens, &api, publisher.as_ref()).await
}

/// Runs one full pass with the given collaborators.
///
/// Reports are processed one after the other and the first failure stops the pass. Both
/// scratch directories are emptied at the end whatever the outcome.
pub async fn run_with(
    config: &Config,
    credentials: &OAuthCredentials,
    tokens: &dyn TokenProvider,
    api: &dyn AdsApi,
    publisher: &dyn StoragePublisher,
) -> Result<Vec<String>, Error> {
    let result = process_available_reports(config, credentials, tokens, api, publisher).await;

    clear_dir(&config.download_dir);
    clear_dir(&config.prepared_dir);

    result
}

async fn process_available_reports(
    config: &Config,
    credentials: &OAuthCredentials,
    tokens: &dyn TokenProvider,
    api: &dyn AdsApi,
    publisher: &dyn StoragePublisher,
) -> Result<Vec<String>, Error> {
    fs::create_dir_all(&config.download_dir)?;
    fs::create_dir_all(&config.prepared_dir)?;

    let access_token = tokens.refresh_access_token(credentials).await?;
    let reports = api.fetch_report_metadata(&access_token).await?;

    let processor = ReportProcessor::new(config, publisher);
    let mut published = Vec::new();
    for report in &reports {
        info!(
            "processing {} report for {} indexed {}",
            report.report_type, report.advertiser_id, report.index_date
        );
        let objects = processor
            .process_report(api, &access_token, report)
            .await
            .inspect_err(|err| {
                error!(
                    "{} report for {} indexed {} failed: {}",
                    report.report_type, report.advertiser_id, report.index_date, err
                )
            })?;
        published.extend(objects);
    }

    info!(
        "published {} file(s) from {} report(s)",
        published.len(),
        reports.len()
    );
    Ok(published)
}

/// Lists the available reports without downloading anything.
pub async fn list_reports(config: &Config) -> Result<Vec<ReportDescriptor>, Error> {
    let credentials = config.oauth_credentials()?;
    let api = ApiClient::new(config, &credentials.client_id)?;
    let access_token = TokenClient::new(config)
        .refresh_access_token(&credentials)
        .await?;
    api.fetch_report_metadata(&access_token).await
}

/// Trades a consent-page authorization code for a long-lived refresh token.
pub async fn authorize(config: &Config, code: &str, redirect_uri: &str) -> Result<String, Error> {
    let (client_id, client_secret) = match (&config.client_id, &config.client_secret) {
        (Some(client_id), Some(client_secret)) => (client_id.clone(), client_secret.clone()),
        _ => {
            let credentials = config.oauth_credentials()?;
            (credentials.client_id, credentials.client_secret)
        }
    };

    TokenClient::new(config)
        .exchange_authorization_code(code, redirect_uri, &client_id, &client_secret)
        .await
}

/// Reshapes a local CSV file: splits `period_column` when given, melts otherwise.
pub async fn reshape_file(
    input: &Path,
    output: &Path,
    identifier_columns: usize,
    period_column: Option<&str>,
) -> Result<(), Error> {
    let ctx = data::session_context();
    let df = data::read_csv(&ctx, input).await?;
    let reshaped = match period_column {
        Some(column) => data::split_period_column(&ctx, df, column).await?,
        None => data::melt(&ctx, df, identifier_columns).await?,
    };
    data::write_csv(reshaped, output).await
}

/// Downloads, classifies, reshapes and publishes single reports.
pub struct ReportProcessor<'a> {
    config: &'a Config,
    publisher: &'a dyn StoragePublisher,
    http: Client,
    ctx: SessionContext,
}

impl<'a> ReportProcessor<'a> {
    pub fn new(config: &'a Config, publisher: &'a dyn StoragePublisher) -> Self {
        ReportProcessor {
            config,
            publisher,
            http: Client::new(),
            ctx: data::session_context(),
        }
    }

    pub async fn process_report(
        &self,
        api: &dyn AdsApi,
        access_token: &str,
        report: &ReportDescriptor,
    ) -> Result<Vec<String>, Error> {
        let date = report.availability_date()?;
        let link = api.fetch_download_link(access_token, report).await?;
        let downloaded = download_file(&self.http, &link, &self.config.download_dir).await?;

        self.process_file(report, date, &downloaded).await
    }

    /// Handles a downloaded file according to its format.
    pub async fn process_file(
        &self,
        report: &ReportDescriptor,
        date: NaiveDate,
        path: &Path,
    ) -> Result<Vec<String>, Error> {
        match classify_file(path) {
            FileFormat::Spreadsheet => self.process_spreadsheet(path, date).await,
            FileFormat::Archive => {
                let files = archive::unpack(path, &self.config.download_dir)?;
                fs::remove_file(path)?;
                self.process_archive(&files, report, date).await
            }
            FileFormat::PassThrough => {
                info!("{} needs no reshaping", path.display());
                let key = PartitionKey::new(report.report_type.category(), date);
                Ok(vec![self.publisher.publish(&key, path).await?])
            }
        }
    }

    async fn process_spreadsheet(&self, path: &Path, date: NaiveDate) -> Result<Vec<String>, Error> {
        let mut published = Vec::with_capacity(REPORT_SHEETS.len());

        for sheet in REPORT_SHEETS {
            let df = match read_sheet(&self.ctx, path, sheet) {
                Ok(df) => df,
                Err(err @ Error::MissingSheet { .. })
                    if self.config.on_missing_sheet == MissingSheetPolicy::Skip =>
                {
                    warn!("{}, skipping", err);
                    continue;
                }
                Err(err) => return Err(err),
            };

            let category = sheet_category(sheet);
            let melted = data::melt(&self.ctx, df, self.config.identifier_columns).await?;
            let prepared = self.prepared_path(&format!("{}.csv", category));
            data::write_csv(melted, &prepared).await?;

            let key = PartitionKey::new(category, date);
            published.push(self.publisher.publish(&key, &prepared).await?);
        }

        Ok(published)
    }

    async fn process_archive(
        &self,
        files: &[PathBuf],
        report: &ReportDescriptor,
        date: NaiveDate,
    ) -> Result<Vec<String>, Error> {
        let mut published = Vec::with_capacity(files.len());

        for file in files {
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let entry =
                classify_entry(&file_name, &report.advertiser_id, &report.index_date, date);

            let Some(category) = entry.category() else {
                match self.config.on_unmatched_file {
                    UnmatchedFilePolicy::Ignore => {
                        warn!("ignoring unexpected archive entry {}", file_name);
                        continue;
                    }
                    UnmatchedFilePolicy::Fail => return Err(Error::UnexpectedFile { file_name }),
                }
            };
            let key = PartitionKey::new(category, date);

            let staged = match (entry, entry.prepared_file_name()) {
                (ArchiveEntry::Grain, Some(prepared_name)) => {
                    let df = data::read_csv(&self.ctx, file).await?;
                    let split = data::split_period_column(&self.ctx, df, PERIOD_COLUMN).await?;
                    let prepared = self.prepared_path(prepared_name);
                    data::write_csv(split, &prepared).await?;
                    prepared
                }
                (ArchiveEntry::Metrics, Some(prepared_name)) => {
                    let df = data::read_csv(&self.ctx, file).await?;
                    let melted =
                        data::melt(&self.ctx, df, self.config.identifier_columns).await?;
                    let prepared = self.prepared_path(prepared_name);
                    data::write_csv(melted, &prepared).await?;
                    prepared
                }
                _ => file.clone(),
            };

            published.push(self.publisher.publish(&key, &staged).await?);
        }

        Ok(published)
    }

    fn prepared_path(&self, file_name: &str) -> PathBuf {
        self.config.prepared_dir.join(file_name)
    }
}

/// Removes everything inside `dir`. Failures are logged, never returned.
pub fn clear_dir(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("cannot list {} for cleanup: {}", dir.display(), err);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if let Err(err) = removed {
            error!("failed to delete {}: {}", path.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::{MockAdsApi, ReportType};
    use crate::archive::tests::write_zip;
    use crate::auth::MockTokenProvider;
    use crate::publisher::{LocalPublisher, MockStoragePublisher};
    use crate::spreadsheet::tests::write_xlsx;
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const IDENTIFIERS: [&str; 11] = [
        "Advertiser",
        "Marketplace",
        "Category",
        "Subcategory",
        "Brand",
        "Parent ASIN",
        "ASIN",
        "Title",
        "Manufacturer",
        "Segment",
        "Metric",
    ];

    fn june_second() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()
    }

    fn descriptor(report_type: ReportType) -> ReportDescriptor {
        ReportDescriptor {
            advertiser_id: "BAYER_US".to_string(),
            index_date: "2024-06-02".to_string(),
            obfuscated_marketplace_id: "ATVPDKIKX0DER".to_string(),
            report_type,
        }
    }

    fn wide_rows() -> Vec<Vec<String>> {
        let mut header: Vec<String> = IDENTIFIERS.iter().map(|s| s.to_string()).collect();
        header.push("Week: 2024-05-26".to_string());
        header.push("Week: 2024-06-02".to_string());

        let mut rows = vec![header];
        for (asin, first, second) in [("B01", "0.25", "0.5"), ("B02", "3", "4")] {
            let mut row: Vec<String> = IDENTIFIERS.iter().map(|s| format!("{} value", s)).collect();
            row[6] = asin.to_string();
            row.push(first.to_string());
            row.push(second.to_string());
            rows.push(row);
        }
        rows
    }

    fn wide_csv() -> String {
        wide_rows()
            .iter()
            .map(|row| row.join(","))
            .collect::<Vec<_>>()
            .join("\n")
            + "\n"
    }

    fn write_report_workbook(path: &Path, sheets: &[&str]) {
        let rows = wide_rows();
        let borrowed: Vec<Vec<&str>> = rows
            .iter()
            .map(|row| row.iter().map(String::as_str).collect())
            .collect();
        let sheets: Vec<(&str, Vec<Vec<&str>>)> = sheets
            .iter()
            .map(|sheet| (*sheet, borrowed.clone()))
            .collect();
        write_xlsx(path, &sheets);
    }

    fn report_archive_entries(wide: &str) -> Vec<(&'static str, String)> {
        vec![
            ("BAYER_US ASIN Hierarchy.csv", "asin,parent\nB01,P1\n".to_string()),
            (
                "BAYER_US 2024-06-02 ASIN Movement Report.csv",
                "asin,rank\nB01,4\n".to_string(),
            ),
            (
                "BAYER_US 2024-06-02 ASIN Grain Report.csv",
                "asin,period,glance_views\nB01,Week: 2024-06-02,5\nB02,Week: 2024-05-26,8\n"
                    .to_string(),
            ),
            ("metrics.csv", wide.to_string()),
            ("unexpected.csv", "x\n1\n".to_string()),
        ]
    }

    fn write_report_archive(path: &Path) {
        let entries = report_archive_entries(&wide_csv());
        let borrowed: Vec<(&str, &str)> = entries
            .iter()
            .map(|(name, contents)| (*name, contents.as_str()))
            .collect();
        write_zip(path, &borrowed);
    }

    struct Workspace {
        temp_dir: TempDir,
        config: Config,
    }

    impl Workspace {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let config = Config::for_tests(
                temp_dir.path().join("download"),
                temp_dir.path().join("prepared"),
            );
            fs::create_dir_all(&config.download_dir).unwrap();
            fs::create_dir_all(&config.prepared_dir).unwrap();
            Workspace { temp_dir, config }
        }

        fn bucket(&self) -> PathBuf {
            self.temp_dir.path().join("bucket")
        }

        fn local_publisher(&self) -> LocalPublisher {
            LocalPublisher::new(&self.bucket(), &self.config.storage_prefix)
        }
    }

    /// Publisher mock recording the category of every call.
    fn recording_publisher() -> (MockStoragePublisher, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();
        let mut publisher = MockStoragePublisher::new();
        publisher.expect_publish().returning(move |key, path| {
            assert_eq!(key.date, june_second());
            assert!(path.exists(), "{} must exist when published", path.display());
            recorded.lock().unwrap().push(key.category.clone());
            Ok(format!("{}/{}", key.category, path.display()))
        });
        (publisher, calls)
    }

    #[tokio::test]
    async fn test_spreadsheet_sheets_are_melted_and_published() -> Result<(), Error> {
        let workspace = Workspace::new();
        let workbook = workspace.config.download_dir.join("report.xlsx");
        let mut sheets = REPORT_SHEETS.to_vec();
        sheets.push("Read Me");
        write_report_workbook(&workbook, &sheets);

        let publisher = workspace.local_publisher();
        let processor = ReportProcessor::new(&workspace.config, &publisher);
        let objects = processor
            .process_file(&descriptor(ReportType::Excel), june_second(), &workbook)
            .await?;

        assert_eq!(
            objects,
            vec![
                "amazon_media/bvp/category_sales_share/dt=2024-06-02/category_sales_share.csv",
                "amazon_media/bvp/gv_and_conversion/dt=2024-06-02/gv_and_conversion.csv",
                "amazon_media/bvp/share_of_voice/dt=2024-06-02/share_of_voice.csv",
                "amazon_media/bvp/subscribe_&_save/dt=2024-06-02/subscribe_&_save.csv",
            ]
        );

        let written = fs::read_to_string(workspace.bucket().join(&objects[2]))?;
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 1 + 2 * 2);
        assert!(lines[0].ends_with("Metric,Value,Period Identifier,Period Value"));
        assert!(lines[1].ends_with(",0.25,Week,2024-05-26"));
        assert!(lines[4].ends_with(",4,Week,2024-06-02"));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_sheet_fails_by_default() {
        let workspace = Workspace::new();
        let workbook = workspace.config.download_dir.join("report.xlsx");
        write_report_workbook(&workbook, &["Category Sales Share", "Share of Voice"]);

        let mut publisher = MockStoragePublisher::new();
        publisher.expect_publish().times(1).returning(|key, _| Ok(key.category.clone()));

        let processor = ReportProcessor::new(&workspace.config, &publisher);
        let result = processor
            .process_file(&descriptor(ReportType::Excel), june_second(), &workbook)
            .await;

        assert!(matches!(
            result.unwrap_err(),
            Error::MissingSheet { sheet, .. } if sheet == "GV and Conversion"
        ));
    }

    #[tokio::test]
    async fn test_missing_sheet_skipped_when_configured() -> Result<(), Error> {
        let mut workspace = Workspace::new();
        workspace.config.on_missing_sheet = MissingSheetPolicy::Skip;
        let workbook = workspace.config.download_dir.join("report.xlsx");
        write_report_workbook(&workbook, &["Category Sales Share", "Share of Voice"]);

        let (publisher, calls) = recording_publisher();
        let processor = ReportProcessor::new(&workspace.config, &publisher);
        processor
            .process_file(&descriptor(ReportType::Excel), june_second(), &workbook)
            .await?;

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["category_sales_share", "share_of_voice"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_archive_entries_dispatched_by_name() -> Result<(), Error> {
        let workspace = Workspace::new();
        let zip_path = workspace
            .config
            .download_dir
            .join("BAYER_US_Amazon-Brand-View-Pro_2024-06-02.zip");
        write_report_archive(&zip_path);

        let publisher = workspace.local_publisher();
        let processor = ReportProcessor::new(&workspace.config, &publisher);
        let objects = processor
            .process_file(&descriptor(ReportType::ZipAsin), june_second(), &zip_path)
            .await?;

        assert!(!zip_path.exists());
        assert_eq!(
            objects.iter().cloned().collect::<BTreeSet<_>>(),
            BTreeSet::from([
                "amazon_media/bvp/asin_hierarchy/dt=2024-06-02/BAYER_US ASIN Hierarchy.csv"
                    .to_string(),
                "amazon_media/bvp/asin_movement/dt=2024-06-02/BAYER_US 2024-06-02 ASIN Movement Report.csv"
                    .to_string(),
                "amazon_media/bvp/grain_report/dt=2024-06-02/asin_grain_report.csv".to_string(),
                "amazon_media/bvp/metrics/dt=2024-06-02/metrics.csv".to_string(),
            ])
        );

        let bucket = workspace.bucket();
        assert_eq!(
            fs::read_to_string(bucket.join(&objects[0]))?,
            "asin,parent\nB01,P1\n"
        );

        let grain = fs::read_to_string(
            bucket.join("amazon_media/bvp/grain_report/dt=2024-06-02/asin_grain_report.csv"),
        )?;
        assert_eq!(
            grain.lines().collect::<Vec<_>>(),
            vec![
                "asin,glance_views,Period Identifier,Period Value",
                "B01,5,Week,2024-06-02",
                "B02,8,Week,2024-05-26",
            ]
        );

        let metrics =
            fs::read_to_string(bucket.join("amazon_media/bvp/metrics/dt=2024-06-02/metrics.csv"))?;
        assert_eq!(metrics.lines().count(), 1 + 2 * 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_unexpected_archive_entry_fails_when_configured() {
        let mut workspace = Workspace::new();
        workspace.config.on_unmatched_file = UnmatchedFilePolicy::Fail;
        let zip_path = workspace.config.download_dir.join("brand.zip");
        write_zip(&zip_path, &[("unexpected.csv", "x\n1\n")]);

        let mut publisher = MockStoragePublisher::new();
        publisher.expect_publish().never();

        let processor = ReportProcessor::new(&workspace.config, &publisher);
        let result = processor
            .process_file(&descriptor(ReportType::ZipBrand), june_second(), &zip_path)
            .await;

        assert!(matches!(
            result.unwrap_err(),
            Error::UnexpectedFile { file_name } if file_name == "unexpected.csv"
        ));
    }

    #[tokio::test]
    async fn test_pass_through_file_published_unmodified() -> Result<(), Error> {
        let workspace = Workspace::new();
        let file = workspace.config.download_dir.join("notes.txt");
        fs::write(&file, "as delivered")?;

        let mut publisher = MockStoragePublisher::new();
        publisher
            .expect_publish()
            .withf(|key, path| key.category == "zip_brand" && path.ends_with("notes.txt"))
            .times(1)
            .returning(|_, _| Ok("zip_brand/dt=2024-06-02/notes.txt".to_string()));

        let processor = ReportProcessor::new(&workspace.config, &publisher);
        let objects = processor
            .process_file(&descriptor(ReportType::ZipBrand), june_second(), &file)
            .await?;

        assert_eq!(objects, vec!["zip_brand/dt=2024-06-02/notes.txt"]);
        assert_eq!(fs::read_to_string(&file)?, "as delivered");
        Ok(())
    }

    #[tokio::test]
    async fn test_run_downloads_publishes_and_cleans_up() -> Result<(), Error> {
        let server = MockServer::start().await;
        let zip_dir = TempDir::new()?;
        let zip_path = zip_dir.path().join("asin.zip");
        write_report_archive(&zip_path);
        Mock::given(method("GET"))
            .and(path("/reports/BAYER_US_Amazon-Brand-View-Pro_2024-06-02.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(fs::read(&zip_path)?))
            .mount(&server)
            .await;

        let workspace = Workspace::new();
        let credentials = workspace.config.oauth_credentials()?;

        let mut tokens = MockTokenProvider::new();
        tokens
            .expect_refresh_access_token()
            .times(1)
            .returning(|_| Ok("Atza|access".to_string()));

        let mut api = MockAdsApi::new();
        api.expect_fetch_report_metadata()
            .withf(|token| token == "Atza|access")
            .returning(|_| Ok(vec![descriptor(ReportType::ZipAsin)]));
        let link = format!(
            "{}/reports/BAYER_US_Amazon-Brand-View-Pro_2024-06-02.zip?X-Amz-Signature=1",
            server.uri()
        );
        api.expect_fetch_download_link()
            .times(1)
            .returning(move |_, _| Ok(link.clone()));

        let publisher = workspace.local_publisher();
        let objects = run_with(&workspace.config, &credentials, &tokens, &api, &publisher).await?;

        assert_eq!(objects.len(), 4);
        assert_eq!(fs::read_dir(&workspace.config.download_dir)?.count(), 0);
        assert_eq!(fs::read_dir(&workspace.config.prepared_dir)?.count(), 0);
        assert!(workspace
            .bucket()
            .join("amazon_media/bvp/metrics/dt=2024-06-02/metrics.csv")
            .exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_run_failure_still_cleans_up() {
        let workspace = Workspace::new();
        let stale = workspace.config.download_dir.join("stale.zip");
        fs::write(&stale, "left over").unwrap();
        fs::create_dir_all(workspace.config.prepared_dir.join("nested")).unwrap();
        let credentials = workspace.config.oauth_credentials().unwrap();

        let mut tokens = MockTokenProvider::new();
        tokens
            .expect_refresh_access_token()
            .returning(|_| Ok("Atza|access".to_string()));

        let mut api = MockAdsApi::new();
        api.expect_fetch_report_metadata().returning(|_| {
            Ok(vec![
                descriptor(ReportType::Excel),
                descriptor(ReportType::ZipBrand),
            ])
        });
        api.expect_fetch_download_link()
            .times(1)
            .returning(|_, _| Err(Error::InvalidDate { date: "x".to_string() }));

        let mut publisher = MockStoragePublisher::new();
        publisher.expect_publish().never();

        let result = run_with(&workspace.config, &credentials, &tokens, &api, &publisher).await;

        assert!(matches!(result.unwrap_err(), Error::InvalidDate { .. }));
        assert!(!stale.exists());
        assert_eq!(fs::read_dir(&workspace.config.prepared_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_reshape_file_melts_and_splits() -> Result<(), Error> {
        let temp_dir = TempDir::new()?;
        let wide = temp_dir.path().join("metrics.csv");
        fs::write(&wide, "Brand,W: 2024-01-01,W: 2024-01-08\nAspirin,1,2\n")?;
        let melted = temp_dir.path().join("long.csv");
        reshape_file(&wide, &melted, 1, None).await?;
        assert_eq!(fs::read_to_string(&melted)?.lines().count(), 3);

        let grain = temp_dir.path().join("grain.csv");
        fs::write(&grain, "asin,period\nB01,Month: 2024-05\n")?;
        let split = temp_dir.path().join("split.csv");
        reshape_file(&grain, &split, 11, Some(PERIOD_COLUMN)).await?;
        assert_eq!(
            fs::read_to_string(&split)?,
            "asin,Period Identifier,Period Value\nB01,Month,2024-05\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_archive_entries_with_unpadded_index_date() -> Result<(), Error> {
        let workspace = Workspace::new();
        let zip_path = workspace.config.download_dir.join("asin.zip");
        write_zip(
            &zip_path,
            &[
                ("BAYER_US 2024-3-17 ASIN Movement Report.csv", "asin,rank\nB01,4\n"),
                (
                    "BAYER_US 2024-3-17 ASIN Grain Report.csv",
                    "asin,period\nB01,Week: 2024-03-17\n",
                ),
            ],
        );

        let mut report = descriptor(ReportType::ZipAsin);
        report.index_date = "2024-3-17".to_string();
        let date = report.availability_date()?;

        let mut publisher = MockStoragePublisher::new();
        publisher
            .expect_publish()
            .times(2)
            .returning(|key, _| Ok(format!("{}/{}", key.category, key.partition())));

        let processor = ReportProcessor::new(&workspace.config, &publisher);
        let objects = processor.process_file(&report, date, &zip_path).await?;

        assert_eq!(
            objects,
            vec!["asin_movement/dt=2024-03-17", "grain_report/dt=2024-03-17"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_list_reports_requires_manager_account() {
        let workspace = Workspace::new();
        let mut config = workspace.config.clone();
        config.manager_account_id = None;

        assert!(matches!(
            list_reports(&config).await.unwrap_err(),
            Error::Credentials { .. }
        ));
    }

    #[test]
    fn test_clear_dir_removes_files_and_directories() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.csv"), "a").unwrap();
        fs::create_dir_all(temp_dir.path().join("inner").join("deeper")).unwrap();
        fs::write(temp_dir.path().join("inner").join("b.csv"), "b").unwrap();

        clear_dir(temp_dir.path());

        assert!(temp_dir.path().exists());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_clear_dir_missing_directory_is_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        clear_dir(&temp_dir.path().join("never-created"));
    }
}
