use crate::drive_service::drive_models::{FileList, LISTING_FIELDS};
use crate::drive_service::http_client::HttpClient;
use crate::projection::record::RemoteFileRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;

/// Folders first, then by name.
pub const DEFAULT_ORDER_BY: &str = "folder,name";
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Which part of the drive a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingScope {
    Root,
    Parent(String),
}

/// One listing request. `filter` is an already-built query expression ANDed
/// onto the scope clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    pub scope: ListingScope,
    pub filter: Option<String>,
    pub order_by: String,
    pub page_size: u32,
    pub page_token: Option<String>,
}

impl ListingRequest {
    pub fn new(scope: ListingScope) -> Self {
        Self {
            scope,
            filter: None,
            order_by: DEFAULT_ORDER_BY.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            page_token: None,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_page_token(mut self, page_token: Option<String>) -> Self {
        self.page_token = page_token;
        self
    }

    /// The `q` parameter: scope clause, trashed filter, then the caller's filter.
    pub fn query(&self) -> String {
        let scope = match &self.scope {
            ListingScope::Root => "'root' in parents".to_string(),
            ListingScope::Parent(id) => format!("'{}' in parents", id.replace('\'', "\\'")),
        };
        match &self.filter {
            Some(filter) => format!("{} and trashed = false and ({})", scope, filter),
            None => format!("{} and trashed = false", scope),
        }
    }
}

/// One page of converted records.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub records: Vec<RemoteFileRecord>,
    pub next_page_token: Option<String>,
    /// Raw entries that could not be converted into records.
    pub skipped: usize,
}

impl From<FileList> for ListingPage {
    fn from(list: FileList) -> Self {
        let mut records = Vec::with_capacity(list.files.len());
        let mut skipped = 0;
        for file in list.files {
            match RemoteFileRecord::try_from(file) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("⚠️ Skipping listing entry: {}", e);
                    skipped += 1;
                }
            }
        }
        Self {
            records,
            next_page_token: list.next_page_token,
            skipped,
        }
    }
}

/// Source of bearer tokens. Acquiring credentials is not this crate's job.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// A fixed token handed in from outside.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Trait defining the listing operations the projection consumes
#[async_trait]
pub trait DriveListingClient: Send + Sync {
    async fn list_page(&self, request: &ListingRequest) -> Result<ListingPage>;
}

/// Drive API client for file listings
pub struct DriveClient {
    http_client: HttpClient,
    auth: Arc<dyn AccessTokenProvider>,
}

impl DriveClient {
    pub fn new(auth: Arc<dyn AccessTokenProvider>) -> Self {
        Self::with_http_client(HttpClient::new(), auth)
    }

    pub fn with_http_client(http_client: HttpClient, auth: Arc<dyn AccessTokenProvider>) -> Self {
        Self { http_client, auth }
    }

    /// Get authorization header with valid token
    async fn auth_header(&self) -> Result<String> {
        let token = self
            .auth
            .access_token()
            .await
            .context("Failed to get access token")?;
        Ok(format!("Bearer {}", token))
    }

    /// Build the relative files-listing URL for a request
    pub fn build_list_url(request: &ListingRequest) -> String {
        let mut url = format!(
            "/drive/v3/files?q={}&fields={}&orderBy={}&pageSize={}",
            urlencoding::encode(&request.query()),
            urlencoding::encode(LISTING_FIELDS),
            urlencoding::encode(&request.order_by),
            request.page_size
        );
        if let Some(token) = &request.page_token {
            url.push_str("&pageToken=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }
}

#[async_trait]
impl DriveListingClient for DriveClient {
    async fn list_page(&self, request: &ListingRequest) -> Result<ListingPage> {
        let auth_header = self.auth_header().await?;
        let url = Self::build_list_url(request);

        let list: FileList = self
            .http_client
            .get(&url, &auth_header)
            .await
            .with_context(|| format!("Failed to list files for {:?}", request.scope))?;

        let page = ListingPage::from(list);
        debug!(
            "📄 Listed {} records ({} skipped) for {:?}",
            page.records.len(),
            page.skipped,
            request.scope
        );
        Ok(page)
    }
}

/// Follow continuation tokens and collect every record for `request`.
///
/// Stops early after `max_pages` pages when a cap is given.
pub async fn list_all_pages(
    client: &dyn DriveListingClient,
    request: ListingRequest,
    max_pages: Option<u32>,
) -> Result<Vec<RemoteFileRecord>> {
    let mut all_records = Vec::new();
    let mut request = request;
    let mut pages = 0u32;

    loop {
        let page = client
            .list_page(&request)
            .await
            .context("Failed to list page")?;
        pages += 1;
        all_records.extend(page.records);
        info!("📊 Listed records so far: {}", all_records.len());

        match page.next_page_token {
            Some(token) if max_pages.map_or(true, |max| pages < max) => {
                request = request.with_page_token(Some(token));
            }
            Some(_) => {
                warn!("⏭️ Page limit {} reached, remaining pages ignored", pages);
                break;
            }
            None => break,
        }
    }

    Ok(all_records)
}
