use anyhow::{anyhow, Result};
use async_trait::async_trait;
use drive_projection::drive_service::drive_client::{
    DriveListingClient, ListingPage, ListingRequest, ListingScope,
};
use drive_projection::projection::RemoteFileRecord;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

const ROOT_KEY: &str = "root";

/// Pages served per scope. A scope with several pages is chained with
/// `page-<n>` continuation tokens.
#[derive(Debug, Clone, Default)]
pub struct MockResponses {
    pub pages: HashMap<String, Vec<ListingPage>>,
    pub failing_scopes: HashSet<String>,
}

/// Mock implementation of DriveListingClient for testing
#[derive(Clone, Default)]
pub struct MockDriveClient {
    responses: Arc<Mutex<MockResponses>>,
    requests: Arc<Mutex<Vec<ListingRequest>>>,
}

fn scope_key(scope: &ListingScope) -> String {
    match scope {
        ListingScope::Root => ROOT_KEY.to_string(),
        ListingScope::Parent(id) => id.clone(),
    }
}

impl MockDriveClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-page root listing.
    pub fn with_root(records: Vec<RemoteFileRecord>) -> Self {
        let client = Self::new();
        client.set_children(ListingScope::Root, records);
        client
    }

    pub fn set_children(&self, scope: ListingScope, records: Vec<RemoteFileRecord>) {
        self.set_pages(
            scope,
            vec![ListingPage {
                records,
                ..Default::default()
            }],
        );
    }

    pub fn set_pages(&self, scope: ListingScope, pages: Vec<ListingPage>) {
        let mut responses = self.responses.lock().unwrap();
        responses.pages.insert(scope_key(&scope), pages);
    }

    pub fn make_scope_fail(&self, scope: ListingScope) {
        let mut responses = self.responses.lock().unwrap();
        responses.failing_scopes.insert(scope_key(&scope));
    }

    pub fn clear_failures(&self) {
        self.responses.lock().unwrap().failing_scopes.clear();
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ListingRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DriveListingClient for MockDriveClient {
    async fn list_page(&self, request: &ListingRequest) -> Result<ListingPage> {
        self.requests.lock().unwrap().push(request.clone());

        let key = scope_key(&request.scope);
        let responses = self.responses.lock().unwrap();
        if responses.failing_scopes.contains(&key) {
            return Err(anyhow!("Mock listing failure for {}", key));
        }

        let pages = match responses.pages.get(&key) {
            Some(pages) => pages,
            None => return Ok(ListingPage::default()),
        };
        let index = match &request.page_token {
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| anyhow!("Unknown page token {}", token))?,
            None => 0,
        };
        let mut page = pages
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("No page {} for {}", index, key))?;
        page.next_page_token = (index + 1 < pages.len()).then(|| format!("page-{}", index + 1));
        Ok(page)
    }
}
