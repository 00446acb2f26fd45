//! 宠物照片缓存 - 远端图片落地为本地文件
//!
//! pull 落库前把远端 photo 指针解析成本地路径：
//! - 远端 URL → 下载到 photos/{pet_id}.jpg，行里存本地路径
//! - 已是存在的本地路径 → 原样保留
//! - 其余情况（含下载失败）→ None
//!
//! 下载是 best-effort 的：照片失败绝不影响宠物行本身的落库。

use std::path::{Path, PathBuf};
use std::time::Duration;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{PawquestSDKError, Result};

/// 照片下载的独立超时：不让一张挂死的图拖住整轮 pull
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PhotoCache {
    dir: PathBuf,
    client: reqwest::Client,
}

impl PhotoCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { dir: dir.into(), client }
    }

    /// 缓存文件路径按实体 id 定位，与远端 URL 无关（重放幂等）
    pub fn path_for(&self, pet_id: &str) -> PathBuf {
        self.dir.join(format!("{}.jpg", pet_id))
    }

    /// 把远端 photo 指针解析为本地路径；任何失败都退化为 None
    pub async fn resolve(&self, pet_id: &str, remote: Option<&str>) -> Option<String> {
        let pointer = remote?;
        if pointer.starts_with("http://") || pointer.starts_with("https://") {
            let dest = self.path_for(pet_id);
            match self.download(pointer, &dest).await {
                Ok(()) => Some(dest.to_string_lossy().into_owned()),
                Err(e) => {
                    warn!("📷 宠物 {} 照片下载失败，置空: {}", pet_id, e);
                    None
                }
            }
        } else if Path::new(pointer).exists() {
            Some(pointer.to_string())
        } else {
            debug!("📷 宠物 {} 的照片指针无效，置空: {}", pet_id, pointer);
            None
        }
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PawquestSDKError::IO(format!("创建照片缓存目录失败: {}", e)))?;
        }

        let response = self.client
            .get(url)
            .send()
            .await
            .map_err(|e| PawquestSDKError::Transport(format!("下载照片失败: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PawquestSDKError::Transport(format!(
                "下载照片失败，HTTP 状态码: {}", status
            )));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| PawquestSDKError::IO(format!("创建照片文件失败: {}", e)))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result
                .map_err(|e| PawquestSDKError::Transport(format!("读取数据块失败: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| PawquestSDKError::IO(format!("写入照片文件失败: {}", e)))?;
        }
        file.flush()
            .await
            .map_err(|e| PawquestSDKError::IO(format!("写入照片文件失败: {}", e)))?;

        debug!("📷 照片下载完成: {}", dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn none_pointer_resolves_to_none() {
        let dir = TempDir::new().unwrap();
        let cache = PhotoCache::new(dir.path());
        assert_eq!(cache.resolve("p1", None).await, None);
    }

    #[tokio::test]
    async fn existing_local_path_is_kept() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("existing.jpg");
        tokio::fs::write(&local, b"jpeg").await.unwrap();

        let cache = PhotoCache::new(dir.path());
        let resolved = cache.resolve("p1", Some(local.to_str().unwrap())).await;
        assert_eq!(resolved, Some(local.to_string_lossy().into_owned()));
    }

    #[tokio::test]
    async fn dangling_local_path_is_nulled() {
        let dir = TempDir::new().unwrap();
        let cache = PhotoCache::new(dir.path());
        assert_eq!(cache.resolve("p1", Some("/no/such/file.jpg")).await, None);
    }

    #[tokio::test]
    async fn unreachable_url_is_nulled() {
        let dir = TempDir::new().unwrap();
        let cache = PhotoCache::new(dir.path());
        // 端口 1 直接拒绝连接
        assert_eq!(cache.resolve("p1", Some("http://127.0.0.1:1/a.jpg")).await, None);
    }
}
