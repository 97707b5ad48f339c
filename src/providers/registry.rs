use std::collections::BTreeMap;
use std::sync::Arc;
use reqwest::Client;
use serde::Serialize;

use crate::{
    config::Config,
    errors::AppError,
    jobs::AssetKind,
    providers::{ImageProvider, JobProvider},
};
use super::{
    bfl::BflProvider,
    gemini::GeminiProvider,
    ideogram::IdeogramProvider,
    recraft::RecraftProvider,
    runway::RunwayProvider,
    seedance::SeedanceProvider,
};

/// Listing entry for `GET /api/providers`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: String,
    /// `sync` for one-shot image providers, `job` for polled providers
    pub mode: &'static str,
    pub asset_kind: AssetKind,
    pub configured: bool,
}

/// Registry of every enabled vendor adapter, keyed by provider id
pub struct ProviderRegistry {
    image_providers: BTreeMap<String, Arc<dyn ImageProvider>>,
    job_providers: BTreeMap<String, Arc<dyn JobProvider>>,
}

impl ProviderRegistry {
    /// 从配置创建提供商注册表
    ///
    /// ## 功能说明
    /// 为每个启用的提供商创建适配器实例，共享同一个HTTP客户端。
    /// 缺少API密钥的提供商仍然会注册，请求时返回配置错误。
    ///
    /// ## 参数说明
    /// - `config`: 应用程序配置
    /// - `http_client`: 启动时创建的共享HTTP客户端
    pub fn new(config: &Config, http_client: Client) -> Self {
        let mut registry = Self::new_empty();
        let providers = &config.providers;

        if providers.gemini.enabled {
            registry.register_image(Arc::new(GeminiProvider::new(providers.gemini.clone(), http_client.clone())));
        }
        if providers.ideogram.enabled {
            registry.register_image(Arc::new(IdeogramProvider::new(providers.ideogram.clone(), http_client.clone())));
        }
        if providers.recraft.enabled {
            registry.register_image(Arc::new(RecraftProvider::new(providers.recraft.clone(), http_client.clone())));
        }
        if providers.bfl.enabled {
            registry.register_job(Arc::new(BflProvider::new(providers.bfl.clone(), http_client.clone())));
        }
        if providers.runway.enabled {
            registry.register_job(Arc::new(RunwayProvider::new(providers.runway.clone(), http_client.clone())));
        }
        if providers.seedance.enabled {
            registry.register_job(Arc::new(SeedanceProvider::new(providers.seedance.clone(), http_client)));
        }

        tracing::info!(
            image_providers = registry.image_providers.len(),
            job_providers = registry.job_providers.len(),
            "Provider registry initialized"
        );

        registry
    }

    /// Create an empty provider registry, used by tests to register fakes
    pub fn new_empty() -> Self {
        Self {
            image_providers: BTreeMap::new(),
            job_providers: BTreeMap::new(),
        }
    }

    pub fn register_image(&mut self, provider: Arc<dyn ImageProvider>) {
        self.image_providers.insert(provider.id().to_string(), provider);
    }

    pub fn register_job(&mut self, provider: Arc<dyn JobProvider>) {
        self.job_providers.insert(provider.id().to_string(), provider);
    }

    /// 根据提供商ID获取同步图片提供商
    ///
    /// ## 返回值
    /// - `Ok(Arc<dyn ImageProvider>)`: 找到的提供商实例
    /// - `Err(AppError::ProviderNotFound)`: 未找到，错误信息列出可用的提供商
    pub fn image_provider(&self, id: &str) -> Result<Arc<dyn ImageProvider>, AppError> {
        self.image_providers.get(id).cloned().ok_or_else(|| {
            AppError::provider_not_found(format!(
                "No image provider named '{}'. Available: {}",
                id,
                self.image_providers.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    /// 根据提供商ID获取异步任务提供商
    pub fn job_provider(&self, id: &str) -> Result<Arc<dyn JobProvider>, AppError> {
        self.job_providers.get(id).cloned().ok_or_else(|| {
            AppError::provider_not_found(format!(
                "No job provider named '{}'. Available: {}",
                id,
                self.job_providers.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    /// All registered providers, image providers first, each group sorted by id
    pub fn describe(&self) -> Vec<ProviderInfo> {
        let images = self.image_providers.values().map(|provider| ProviderInfo {
            id: provider.id().to_string(),
            mode: "sync",
            asset_kind: AssetKind::Image,
            configured: provider.has_credentials(),
        });
        let jobs = self.job_providers.values().map(|provider| ProviderInfo {
            id: provider.id().to_string(),
            mode: "job",
            asset_kind: provider.asset_kind(),
            configured: provider.has_credentials(),
        });
        images.chain(jobs).collect()
    }

    pub fn len(&self) -> usize {
        self.image_providers.len() + self.job_providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
