// 回调句柄注册表
// 原生回调只能携带整数句柄，这里将句柄映射回接收器

use crate::receiver::StreamReceiver;
use crate::{DemuxError, Result};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 不透明句柄，0 保留为无效值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    pub fn from_raw(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 句柄注册表
pub struct HandleRegistry<T> {
    entries: DashMap<Handle, Arc<T>>,
    next: AtomicU64,
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next: AtomicU64::new(1),
        }
    }

    /// 注册对象，返回新句柄
    pub fn insert(&self, value: Arc<T>) -> Handle {
        let handle = Handle(self.next.fetch_add(1, Ordering::Relaxed));
        self.entries.insert(handle, value);
        handle
    }

    pub fn get(&self, handle: Handle) -> Option<Arc<T>> {
        self.entries.get(&handle).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, handle: Handle) -> Option<Arc<T>> {
        self.entries.remove(&handle).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleRegistry<StreamReceiver> {
    /// 将原生回调的数据投递到句柄对应的接收器
    pub fn deliver(&self, raw_handle: u64, data: &[u8]) -> Result<usize> {
        let receiver = Handle::from_raw(raw_handle)
            .and_then(|handle| self.get(handle))
            .ok_or(DemuxError::UnknownHandle(raw_handle))?;

        receiver.submit(data)
    }
}
