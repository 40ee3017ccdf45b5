//! # 临时句柄模块
//!
//! ## 设计思路
//!
//! 探测与处理都需要一个“临时可寻址”的源数据句柄（类似浏览器的 object URL）。
//! 句柄的生命周期严格限定在单次探测 / 处理调用内，成功与失败路径都必须释放且只释放一次。
//!
//! ## 实现思路
//!
//! - `ObjectUrlStore` 持有 `Arc<Mutex<HashMap>>` 登记表，句柄 ID 单调递增。
//! - `ObjectUrl` 采用 RAII：构造时登记，`Drop` 时注销。
//!   无论调用方通过 `?` 提前返回还是正常结束，释放都会发生一次。
//! - `live_count` 用于诊断与测试中断言无泄漏。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use super::ImageError;

#[derive(Debug, Default)]
struct StoreInner {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, Bytes>>,
    revoked_total: AtomicU64,
}

/// 临时句柄登记表。
#[derive(Debug, Clone, Default)]
pub struct ObjectUrlStore {
    inner: Arc<StoreInner>,
}

impl ObjectUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为源字节创建临时句柄。
    pub fn create(&self, bytes: Bytes) -> Result<ObjectUrl, ImageError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut entries = self
            .inner
            .entries
            .lock()
            .map_err(|_| ImageError::Processing("object url registry lock poisoned".to_string()))?;
        entries.insert(id, bytes);

        log::debug!("🔗 已创建临时句柄 blob:{}", id);

        Ok(ObjectUrl {
            id,
            store: Arc::clone(&self.inner),
        })
    }

    /// 当前未释放的句柄数量。
    pub fn live_count(&self) -> usize {
        match self.inner.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// 累计已释放的句柄数量。
    pub fn revoked_total(&self) -> u64 {
        self.inner.revoked_total.load(Ordering::SeqCst)
    }
}

/// 临时句柄，`Drop` 时自动注销。
#[derive(Debug)]
pub struct ObjectUrl {
    id: u64,
    store: Arc<StoreInner>,
}

impl ObjectUrl {
    pub fn href(&self) -> String {
        format!("blob:{}", self.id)
    }

    /// 通过句柄读取源字节。
    pub fn resolve(&self) -> Result<Bytes, ImageError> {
        let entries = self
            .store
            .entries
            .lock()
            .map_err(|_| ImageError::Processing("object url registry lock poisoned".to_string()))?;

        entries
            .get(&self.id)
            .cloned()
            .ok_or_else(|| ImageError::Processing(format!("{} has been revoked", self.href())))
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        let removed = match self.store.entries.lock() {
            Ok(mut entries) => entries.remove(&self.id).is_some(),
            Err(poisoned) => poisoned.into_inner().remove(&self.id).is_some(),
        };

        if removed {
            self.store.revoked_total.fetch_add(1, Ordering::SeqCst);
            log::debug!("🧹 已释放临时句柄 blob:{}", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_count_survives_poisoned_registry() {
        let store = ObjectUrlStore::new();
        let url = store.create(Bytes::from_static(b"jpg")).expect("create handle");

        let inner = Arc::clone(&store.inner);
        let panicked = std::thread::spawn(move || {
            let _entries = inner.entries.lock().expect("registry lock");
            panic!("worker died while holding the registry");
        })
        .join();
        assert!(panicked.is_err());
        assert!(store.inner.entries.is_poisoned());

        assert_eq!(store.live_count(), 1);
        drop(url);
        assert_eq!(store.live_count(), 0);
        assert_eq!(store.revoked_total(), 1);
    }

    #[test]
    fn handle_is_revoked_once_on_drop() {
        let store = ObjectUrlStore::new();
        {
            let url = store.create(Bytes::from_static(b"png")).expect("create handle");
            assert_eq!(store.live_count(), 1);
            assert_eq!(url.resolve().expect("resolve handle"), Bytes::from_static(b"png"));
        }

        assert_eq!(store.live_count(), 0);
        assert_eq!(store.revoked_total(), 1);
    }

    #[test]
    fn handle_is_revoked_on_early_return() {
        fn failing_step(store: &ObjectUrlStore) -> Result<(), ImageError> {
            let _url = store.create(Bytes::from_static(b"jpg"))?;
            Err(ImageError::Decode("Failed to load image".to_string()))
        }

        let store = ObjectUrlStore::new();
        assert!(failing_step(&store).is_err());
        assert_eq!(store.live_count(), 0);
        assert_eq!(store.revoked_total(), 1);
    }

    #[test]
    fn handle_ids_are_distinct() {
        let store = ObjectUrlStore::new();
        let first = store.create(Bytes::new()).expect("create handle");
        let second = store.create(Bytes::new()).expect("create handle");
        assert_ne!(first.href(), second.href());
    }
}
