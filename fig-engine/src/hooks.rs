//! 编辑器向外部协作者发出的通知。

use fig_core::depth::DepthRange;
use fig_core::entity::EntityId;
use fig_core::geometry::{Bounds, Point};
use fig_core::store::ObjectStore;

/// 渲染、包围盒计算与智能连线由外部实现，所有方法都有空实现。
pub trait EditorHooks {
    /// 文档的最小/最大占用深度发生变化，`None` 表示文档已没有可见图元。
    fn depth_range_changed(&mut self, _range: Option<DepthRange>) {}

    /// 该区域需要重绘。
    fn region_dirty(&mut self, _region: Bounds) {}

    /// 图元的显示包围盒。默认取定义点的外包盒。
    fn entity_bounds(&self, store: &ObjectStore, id: EntityId) -> Option<Bounds> {
        store.defining_bounds(id)
    }

    /// 图元被整体平移后，连接到它们的智能连线需要跟随调整。
    fn adjust_smart_links(&mut self, _moved: &[EntityId], _dx: i32, _dy: i32) {}

    /// 图元以 `fix` 为不动点缩放后，连接到它的智能连线需要跟随调整。
    fn adjust_scaled_links(&mut self, _scaled: EntityId, _fix: Point, _sx: f64, _sy: f64) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl EditorHooks for NoHooks {}
