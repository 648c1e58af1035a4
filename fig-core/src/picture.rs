//! 图片负载共享。
//!
//! 同一源路径的图片在整个文档中只加载一次，由所有引用它的图片线共享。
//! 缓存只持有 [`Weak`]，最后一个 [`PictureRef`] 被丢弃时像素数据随之释放；
//! 释放后的条目无法再升级，因此不可能被再次访问。

use std::collections::HashMap;
use std::path::Path;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PictureFormat {
    Eps,
    Gif,
    Jpeg,
    Pcx,
    Png,
    Ppm,
    Tiff,
    Xbm,
    Xpm,
    Unknown,
}

impl PictureFormat {
    /// 按扩展名推断格式，大小写不敏感。
    pub fn from_path(path: &str) -> Self {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("eps") | Some("ps") | Some("pdf") => PictureFormat::Eps,
            Some("gif") => PictureFormat::Gif,
            Some("jpg") | Some("jpeg") => PictureFormat::Jpeg,
            Some("pcx") => PictureFormat::Pcx,
            Some("png") => PictureFormat::Png,
            Some("ppm") | Some("pgm") | Some("pbm") => PictureFormat::Ppm,
            Some("tif") | Some("tiff") => PictureFormat::Tiff,
            Some("xbm") => PictureFormat::Xbm,
            Some("xpm") => PictureFormat::Xpm,
            _ => PictureFormat::Unknown,
        }
    }
}

/// 解码后的图片负载。解码本身由外部读取器完成。
#[derive(Debug, Clone, PartialEq)]
pub struct PictureData {
    pub path: String,
    pub format: PictureFormat,
    pub width: u32,
    pub height: u32,
    pub bitmap: Vec<u8>,
    pub palette: Vec<[u8; 3]>,
}

impl PictureData {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            format: PictureFormat::from_path(&path),
            path,
            width: 0,
            height: 0,
            bitmap: Vec::new(),
            palette: Vec::new(),
        }
    }

    pub fn with_pixels(mut self, width: u32, height: u32, bitmap: Vec<u8>) -> Self {
        self.width = width;
        self.height = height;
        self.bitmap = bitmap;
        self
    }

    pub fn with_palette(mut self, palette: Vec<[u8; 3]>) -> Self {
        self.palette = palette;
        self
    }
}

/// 指向共享图片负载的句柄，克隆即增加引用计数。
#[derive(Debug, Clone)]
pub struct PictureRef(Rc<PictureData>);

impl PictureRef {
    #[inline]
    pub fn data(&self) -> &PictureData {
        &self.0
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.0.path
    }

    /// 当前持有该负载的句柄数量。
    #[inline]
    pub fn refcount(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    #[inline]
    pub fn ptr_eq(a: &PictureRef, b: &PictureRef) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl PartialEq for PictureRef {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Serialize for PictureRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.path())
    }
}

/// 以源路径为键的图片缓存。
#[derive(Debug, Default)]
pub struct PictureCache {
    entries: HashMap<String, Weak<PictureData>>,
}

impl PictureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回已加载的负载；不存在或已释放时调用 `load` 解码并登记。
    ///
    /// 登记新负载前先清除已释放的条目，缓存大小不超过历史上同时存活的图片数。
    pub fn acquire<E, F>(&mut self, path: &str, load: F) -> Result<PictureRef, E>
    where
        F: FnOnce(&str) -> Result<PictureData, E>,
    {
        if let Some(existing) = self.lookup(path) {
            debug!(path, refcount = existing.refcount(), "复用已缓存的图片");
            return Ok(existing);
        }
        let data = Rc::new(load(path)?);
        self.purge();
        self.entries.insert(path.to_string(), Rc::downgrade(&data));
        debug!(path, "已加载图片");
        Ok(PictureRef(data))
    }

    pub fn lookup(&self, path: &str) -> Option<PictureRef> {
        self.entries.get(path).and_then(Weak::upgrade).map(PictureRef)
    }

    /// 引用该路径负载的句柄数量，已释放时为 0。
    pub fn refcount(&self, path: &str) -> usize {
        self.entries.get(path).map_or(0, Weak::strong_count)
    }

    #[inline]
    pub fn is_alive(&self, path: &str) -> bool {
        self.refcount(path) > 0
    }

    /// 清除已释放的条目，返回清除数量。
    pub fn purge(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.strong_count() > 0);
        let purged = before - self.entries.len();
        if purged > 0 {
            debug!(purged, "已清理失效的图片条目");
        }
        purged
    }

    /// 登记中的条目数量，含尚未清除的失效条目。
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 仍有引用的条目数量。
    pub fn live_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    fn load(path: &str) -> Result<PictureData, Infallible> {
        Ok(PictureData::new(path).with_pixels(2, 1, vec![0, 255]))
    }

    #[test]
    fn format_is_guessed_from_extension() {
        assert_eq!(PictureFormat::from_path("logo.PNG"), PictureFormat::Png);
        assert_eq!(PictureFormat::from_path("scan.tiff"), PictureFormat::Tiff);
        assert_eq!(PictureFormat::from_path("figure"), PictureFormat::Unknown);
    }

    #[test]
    fn acquire_shares_one_payload_per_path() {
        let mut cache = PictureCache::new();
        let first = cache.acquire("logo.png", load).unwrap();
        let second = cache
            .acquire("logo.png", |_| -> Result<PictureData, Infallible> {
                panic!("cached picture must not be reloaded")
            })
            .unwrap();
        assert!(PictureRef::ptr_eq(&first, &second));
        assert_eq!(cache.refcount("logo.png"), 2);

        drop(first);
        assert_eq!(cache.refcount("logo.png"), 1);
        drop(second);
        assert!(!cache.is_alive("logo.png"));
        assert!(cache.lookup("logo.png").is_none());
        assert_eq!(cache.purge(), 1);
    }

    #[test]
    fn released_picture_is_loaded_again() {
        let mut cache = PictureCache::new();
        drop(cache.acquire("a.gif", load).unwrap());
        let reloaded = cache.acquire("a.gif", load).unwrap();
        assert_eq!(reloaded.refcount(), 1);
        assert_eq!(reloaded.data().format, PictureFormat::Gif);
        assert_eq!(cache.live_count(), 1);
    }

    #[test]
    fn loading_a_new_picture_drops_released_entries() {
        let mut cache = PictureCache::new();
        for round in 0..5 {
            drop(cache.acquire(&format!("frame{round}.png"), load).unwrap());
        }
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.live_count(), 0);

        let kept = cache.acquire("kept.png", load).unwrap();
        let other = cache.acquire("other.png", load).unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.is_alive("kept.png") && cache.is_alive("other.png"));
        drop((kept, other));
        assert_eq!(cache.purge(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn loader_errors_are_propagated() {
        let mut cache = PictureCache::new();
        let result = cache.acquire("missing.xpm", |path| Err(format!("cannot read {path}")));
        assert_eq!(result.unwrap_err(), "cannot read missing.xpm");
        assert_eq!(cache.refcount("missing.xpm"), 0);
    }
}
