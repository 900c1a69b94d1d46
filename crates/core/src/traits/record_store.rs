use async_trait::async_trait;

use crate::{
    models::{CheckResult, ReviewRecord},
    CheckerResult,
};

/// 外部数据层抽象接口
///
/// 记录、检查结果和复核状态的持久化由外部系统负责，本服务只通过此接口读写。
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 查询记录对应的待检查URL，记录不存在时返回 None
    async fn listing_url(&self, record_id: &str) -> CheckerResult<Option<String>>;

    /// 保存检查结果
    async fn save_check_result(&self, result: &CheckResult) -> CheckerResult<()>;

    /// 保存复核状态
    async fn save_review(&self, review: &ReviewRecord) -> CheckerResult<()>;
}
