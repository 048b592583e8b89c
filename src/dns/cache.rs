//! 持久化的域名解析缓存
//!
//! 只保存网页抓取兜底得到的地址。整个文件按修改时间判定新旧，
//! 超过 7 天即整体丢弃并删除，不做逐条过期。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::common::SetHostsError;

/// 缓存文件有效期
pub const CACHE_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);

/// 单个域名的缓存记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// ISO-8601 时间
    #[serde(default)]
    pub last_update: String,
    #[serde(default)]
    pub ipv4: Vec<String>,
    #[serde(default)]
    pub ipv6: Vec<String>,
    #[serde(default)]
    pub source: String,
}

impl CacheRecord {
    pub fn new(ipv4: Vec<String>, ipv6: Vec<String>, source: &str) -> Self {
        Self {
            last_update: chrono::Local::now().to_rfc3339(),
            ipv4,
            ipv6,
            source: source.to_string(),
        }
    }

    pub fn addresses(&self) -> impl Iterator<Item = &String> {
        self.ipv4.iter().chain(self.ipv6.iter())
    }
}

pub type CacheRecords = HashMap<String, CacheRecord>;

/// 域名解析缓存
pub struct ResolverCache {
    path: PathBuf,
    records: Mutex<CacheRecords>,
    valid_at_start: bool,
}

impl ResolverCache {
    /// 打开缓存：文件有效则加载，过期则删除后从空缓存开始
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let valid_at_start = Self::is_valid(&path);
        let records = Self::load(&path);
        info!(
            path = %path.display(),
            valid = valid_at_start,
            records = records.len(),
            "resolver cache opened"
        );
        Self {
            path,
            records: Mutex::new(records),
            valid_at_start,
        }
    }

    /// 缓存文件存在且修改时间不超过 7 天
    pub fn is_valid(path: &Path) -> bool {
        let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(_) => return false,
        };
        // 修改时间在未来时 elapsed 报错，视为刚写入
        let age = modified.elapsed().unwrap_or_default();
        age <= CACHE_EXPIRY
    }

    /// 加载缓存文件。文件缺失或过期返回空表，过期文件顺带删除
    pub fn load(path: &Path) -> CacheRecords {
        if !Self::is_valid(path) {
            if path.exists() {
                match std::fs::remove_file(path) {
                    Ok(()) => info!(path = %path.display(), "stale resolver cache removed"),
                    Err(e) => error!(path = %path.display(), error = %e, "failed to remove stale resolver cache"),
                }
            }
            return HashMap::new();
        }

        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read resolver cache");
                return HashMap::new();
            }
        };
        match serde_json::from_str(&data) {
            Ok(records) => records,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to parse resolver cache");
                HashMap::new()
            }
        }
    }

    /// 确保缓存目录存在。这是少数需要中止运行的错误之一
    pub fn ensure_dir(path: &Path) -> Result<(), SetHostsError> {
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                std::fs::create_dir_all(dir).map_err(|source| SetHostsError::CacheDir {
                    path: dir.to_path_buf(),
                    source,
                })
            }
            _ => Ok(()),
        }
    }

    pub fn valid_at_start(&self) -> bool {
        self.valid_at_start
    }

    pub fn get(&self, domain: &str) -> Option<CacheRecord> {
        self.lock().get(domain).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// 写入一条记录并立即落盘
    pub async fn insert(&self, domain: &str, record: CacheRecord) {
        self.lock().insert(domain.to_string(), record);
        self.save().await;
    }

    /// 将整张表覆盖写入缓存文件。失败只记录日志
    pub async fn save(&self) {
        let json = {
            let records = self.lock();
            match serde_json::to_string_pretty(&*records) {
                Ok(j) => j,
                Err(e) => {
                    error!(error = %e, "failed to serialize resolver cache");
                    return;
                }
            }
        };
        match tokio::fs::write(&self.path, json.as_bytes()).await {
            Ok(()) => debug!(path = %self.path.display(), bytes = json.len(), "resolver cache saved"),
            Err(e) => error!(path = %self.path.display(), error = %e, "failed to save resolver cache"),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheRecords> {
        // 持锁期间不会 panic，中毒时直接取回数据
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}
