use async_trait::async_trait;
use checker_core::{CheckResult, CheckerError, CheckerResult, RecordStore, ReviewRecord};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 种子文件中的一条记录
#[derive(Debug, Clone, Deserialize)]
pub struct SeedRecord {
    pub id: String,
    pub url: String,
}

/// 内存记录存储
///
/// 用于嵌入式部署和测试。记录URL来自种子文件或 [`InMemoryRecordStore::insert_record`]，
/// 每条记录只保留最新一次检查结果和复核状态。
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<String, String>>>,
    results: Arc<RwLock<HashMap<String, CheckResult>>>,
    reviews: Arc<RwLock<HashMap<String, ReviewRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从记录列表创建
    pub fn with_records<I, K, V>(records: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = records
            .into_iter()
            .map(|(id, url)| (id.into(), url.into()))
            .collect();
        Self {
            records: Arc::new(RwLock::new(map)),
            ..Self::default()
        }
    }

    /// 从JSON种子文件加载记录
    pub async fn from_seed_file(path: impl AsRef<Path>) -> CheckerResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            CheckerError::Configuration(format!("读取记录文件 {} 失败: {e}", path.display()))
        })?;
        let seeds: Vec<SeedRecord> = serde_json::from_str(&content)?;

        info!("Loaded {} records from {}", seeds.len(), path.display());
        Ok(Self::with_records(
            seeds.into_iter().map(|seed| (seed.id, seed.url)),
        ))
    }

    pub async fn insert_record(&self, id: impl Into<String>, url: impl Into<String>) {
        self.records.write().await.insert(id.into(), url.into());
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn latest_result(&self, record_id: &str) -> Option<CheckResult> {
        self.results.read().await.get(record_id).cloned()
    }

    pub async fn result_count(&self) -> usize {
        self.results.read().await.len()
    }

    pub async fn review(&self, record_id: &str) -> Option<ReviewRecord> {
        self.reviews.read().await.get(record_id).cloned()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn listing_url(&self, record_id: &str) -> CheckerResult<Option<String>> {
        Ok(self.records.read().await.get(record_id).cloned())
    }

    async fn save_check_result(&self, result: &CheckResult) -> CheckerResult<()> {
        debug!(
            record_id = %result.record_id,
            status = %result.status,
            "Saving check result"
        );
        self.results
            .write()
            .await
            .insert(result.record_id.clone(), result.clone());
        Ok(())
    }

    async fn save_review(&self, review: &ReviewRecord) -> CheckerResult<()> {
        self.reviews
            .write()
            .await
            .insert(review.record_id.clone(), review.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checker_core::{CheckStatus, CheckTask, Classification};
    use std::io::Write;

    #[tokio::test]
    async fn test_lookup_and_save() {
        let store = InMemoryRecordStore::with_records([("r1", "https://example.com/1")]);

        assert_eq!(
            store.listing_url("r1").await.unwrap().as_deref(),
            Some("https://example.com/1")
        );
        assert!(store.listing_url("missing").await.unwrap().is_none());

        let task = CheckTask::new("r1", "https://example.com/1", 1);
        let first = CheckResult::from_classification(&task, Classification::error("timeout"));
        let second = CheckResult::from_classification(&task, Classification::live(None));
        store.save_check_result(&first).await.unwrap();
        store.save_check_result(&second).await.unwrap();

        assert_eq!(store.result_count().await, 1);
        assert_eq!(
            store.latest_result("r1").await.unwrap().status,
            CheckStatus::Live
        );
    }

    #[tokio::test]
    async fn test_seed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "a", "url": "https://example.com/a"}}, {{"id": "b", "url": "https://example.com/b"}}]"#
        )
        .unwrap();

        let store = InMemoryRecordStore::from_seed_file(file.path()).await.unwrap();
        assert_eq!(store.record_count().await, 2);
        assert!(store.listing_url("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_seed_file_missing() {
        let result = InMemoryRecordStore::from_seed_file("/no/such/records.json").await;
        assert!(matches!(result, Err(CheckerError::Configuration(_))));
    }
}
