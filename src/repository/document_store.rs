//! Destination of the migration: keyed documents grouped in collections,
//! written in all-or-nothing batches.

use crate::config::mongo_conf::MongoConfig;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::options::{ClientOptions, Credential, ReplaceOptions, ResolverConfig};
use mongodb::{Client, Database};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{error, info, instrument};

/// One replace-or-insert of `document` under `_id = id`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWrite {
    pub collection: String,
    pub id: String,
    pub document: Document,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Apply every write or none of them.
    async fn commit_batch(&self, writes: &[DocumentWrite]) -> RepositoryResult<()>;
}

pub struct MongoDocumentStore {
    client: Client,
    database: Database,
}

impl MongoDocumentStore {
    pub async fn new(config: &MongoConfig) -> RepositoryResult<Self> {
        let mut client_options =
            ClientOptions::parse_with_resolver_config(&config.uri, ResolverConfig::cloudflare()).await?;
        client_options.app_name = Some("QuotedeskMigration".to_string());
        client_options.max_pool_size = Some(config.pool_size);
        client_options.connect_timeout = Some(std::time::Duration::from_secs(config.connection_timeout_secs));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            client_options.credential =
                Some(Credential::builder().username(username.clone()).password(password.clone()).build());
        }

        let client = Client::with_options(client_options)?;
        let database = client.database(&config.database);
        info!(database = %config.database, "Connected to document database");
        Ok(Self { client, database })
    }

    /// Round-trip to the server so connection problems surface before any fetch.
    pub async fn ping(&self) -> RepositoryResult<()> {
        self.database.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    #[instrument(skip(self, writes), fields(writes = writes.len()))]
    async fn commit_batch(&self, writes: &[DocumentWrite]) -> RepositoryResult<()> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let options = ReplaceOptions::builder().upsert(true).build();
        for write in writes {
            let mut document = write.document.clone();
            document.insert("_id", write.id.as_str());
            let collection = self.database.collection::<Document>(&write.collection);
            let result = collection
                .replace_one_with_session(doc! { "_id": write.id.as_str() }, document, options.clone(), &mut session)
                .await;
            if let Err(e) = result {
                error!(collection = %write.collection, id = %write.id, "Batch write failed: {}", e);
                if let Err(abort) = session.abort_transaction().await {
                    error!("Failed to abort transaction: {}", abort);
                }
                return Err(e.into());
            }
        }

        session.commit_transaction().await.map_err(|e| {
            error!("Failed to commit batch: {}", e);
            RepositoryError::database(format!("Commit failed: {}", e))
        })?;
        info!("Batch committed");
        Ok(())
    }
}

/// Document store held in memory. Commits can be made to fail on demand.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
    reject_commits: AtomicBool,
    commits: AtomicUsize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following commit fail without writing anything.
    pub fn reject_commits(&self, reject: bool) {
        self.reject_commits.store(reject, Ordering::SeqCst);
    }

    /// Number of batches committed so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub async fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections.read().await.get(collection).and_then(|docs| docs.get(id)).cloned()
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.collections.read().await.get(collection).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn commit_batch(&self, writes: &[DocumentWrite]) -> RepositoryResult<()> {
        if self.reject_commits.load(Ordering::SeqCst) {
            return Err(RepositoryError::database("Transaction aborted: commit rejected by store"));
        }
        let mut collections = self.collections.write().await;
        for write in writes {
            let mut document = write.document.clone();
            document.insert("_id", write.id.as_str());
            collections.entry(write.collection.clone()).or_default().insert(write.id.clone(), document);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(collection: &str, id: &str, name: &str) -> DocumentWrite {
        DocumentWrite { collection: collection.into(), id: id.into(), document: doc! { "name": name } }
    }

    #[tokio::test]
    async fn test_commit_replaces_by_id() {
        let store = InMemoryDocumentStore::new();
        store.commit_batch(&[write("customers", "C001", "Acme")]).await.unwrap();
        store.commit_batch(&[write("customers", "C001", "Acme Ltd")]).await.unwrap();
        assert_eq!(store.count("customers").await, 1);
        let doc = store.get("customers", "C001").await.unwrap();
        assert_eq!(doc.get_str("name").unwrap(), "Acme Ltd");
        assert_eq!(doc.get_str("_id").unwrap(), "C001");
        assert_eq!(store.commit_count(), 2);
    }

    #[tokio::test]
    async fn test_rejected_commit_writes_nothing() {
        let store = InMemoryDocumentStore::new();
        store.reject_commits(true);
        let result = store.commit_batch(&[write("services", "s1", "Hosting")]).await;
        assert!(result.is_err());
        assert_eq!(store.count("services").await, 0);
        assert_eq!(store.commit_count(), 0);
    }
}
