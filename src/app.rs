use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use checker_api::{create_app, AppState};
use checker_core::{AppConfig, AutomationDriver, RecordStore};
use checker_dispatcher::{AutomationService, LockManager};
use checker_infrastructure::{init_metrics, EventBus, InMemoryRecordStore, MetricsCollector};
use checker_worker::{ClassifierSettings, HttpAutomationDriver, StatusClassifier};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info, warn};

/// HTTP服务器在检查排空后的最长关闭等待
const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// 主应用程序
pub struct Application {
    config: AppConfig,
    state: AppState,
}

impl Application {
    /// 按配置创建应用：记录存储从记录文件加载，浏览器服务走HTTP驱动，按需安装指标导出
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        // 指标句柄在创建时绑定到全局记录器，导出器必须先于组件安装
        if config.observability.metrics_enabled {
            init_metrics(&config.observability.metrics_bind_address)
                .context("启动指标导出失败")?;
            info!(
                "Prometheus指标导出: http://{}/metrics",
                config.observability.metrics_bind_address
            );
        }

        let store = match &config.store.seed_file {
            Some(path) => {
                let store = InMemoryRecordStore::from_seed_file(path)
                    .await
                    .with_context(|| format!("加载记录文件失败: {path}"))?;
                info!("已加载 {} 条记录: {}", store.record_count().await, path);
                store
            }
            None => {
                warn!("未配置记录文件，记录存储为空");
                InMemoryRecordStore::new()
            }
        };

        let driver =
            HttpAutomationDriver::new(&config.driver).context("创建浏览器服务客户端失败")?;
        info!("浏览器服务: {}", config.driver.endpoint);

        Ok(Self::with_components(
            config,
            Arc::new(driver),
            Arc::new(store),
        ))
    }

    /// 使用给定的驱动和存储组装服务
    pub fn with_components(
        config: AppConfig,
        driver: Arc<dyn AutomationDriver>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        let bus = EventBus::new();
        let metrics = MetricsCollector::new();

        let settings = ClassifierSettings::from_config(&config.automation, &config.driver);
        let classifier = Arc::new(StatusClassifier::new(driver, settings));
        info!(driver = classifier.driver_name(), "状态分类器已就绪");

        let automation = AutomationService::new(
            &config.automation,
            classifier,
            Arc::clone(&store),
            bus.clone(),
            metrics.clone(),
        );
        let locks = Arc::new(LockManager::new(&config.locks, bus.clone(), metrics.clone()));

        let state = AppState {
            automation,
            locks,
            store,
            bus,
            metrics,
            keep_alive: Duration::from_secs(config.api.sse_keep_alive_seconds),
        };

        Self { config, state }
    }

    pub fn router(&self) -> Router {
        create_app(self.state.clone(), &self.config.api)
    }

    pub fn automation(&self) -> &AutomationService {
        &self.state.automation
    }

    pub fn locks(&self) -> &Arc<LockManager> {
        &self.state.locks
    }

    /// 运行直到收到关闭信号
    ///
    /// 关闭顺序：停止派发并等待进行中的检查（有上限），然后停止锁清扫和HTTP服务器。
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let sweeper = self.config.locks.sweep_interval().map(|interval| {
            Arc::clone(&self.state.locks).spawn_sweeper(interval, shutdown_rx.resubscribe())
        });

        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;
        let local_addr = listener.local_addr().context("读取监听地址失败")?;
        info!("API服务器启动在 http://{}", local_addr);

        let mut server_shutdown = shutdown_rx.resubscribe();
        let app = self.router();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.recv().await;
                })
                .await
        });

        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("应用收到关闭信号");
            }
            result = &mut server => {
                // 服务器先于关闭信号退出
                return match result {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e).context("API服务器运行失败"),
                    Err(e) => Err(e).context("API服务器任务异常退出"),
                };
            }
        }

        let grace = self.config.automation.shutdown_grace();
        if self.state.automation.shutdown(grace).await {
            info!("所有进行中的检查已完成");
        } else {
            warn!("等待进行中的检查超时 ({:?})，仍有检查未完成", grace);
        }

        if let Some(sweeper) = sweeper {
            if let Err(e) = sweeper.await {
                error!("锁清扫任务异常退出: {}", e);
            }
        }

        // 事件流连接不会自行结束，超时后直接终止服务器
        match tokio::time::timeout(SERVER_SHUTDOWN_TIMEOUT, &mut server).await {
            Ok(Ok(Ok(()))) => info!("API服务器已停止"),
            Ok(Ok(Err(e))) => error!("API服务器关闭时发生错误: {}", e),
            Ok(Err(e)) => error!("API服务器任务异常退出: {}", e),
            Err(_) => {
                warn!("API服务器未在 {:?} 内关闭，强制终止", SERVER_SHUTDOWN_TIMEOUT);
                server.abort();
            }
        }

        Ok(())
    }
}
