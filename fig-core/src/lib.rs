//! 图形编辑器文档核心。
//!
//! 负责图元的内存表示（线、样条、圆弧、椭圆、文本与可嵌套的组合体）、
//! 按深度维护的渲染计数表，以及图片负载的共享引用计数。
//! 撤销引擎位于 `fig-engine`，只通过本 crate 的仓库原语修改文档。

pub mod depth;
pub mod entity;
pub mod picture;
pub mod store;

pub mod geometry {
    use glam::{DVec2, IVec2};
    use serde::{Deserialize, Serialize};

    /// 二维整数点。图形坐标以整数单位保存，位移量的舍入由调用方完成。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Point(pub IVec2);

    impl Point {
        #[inline]
        pub fn new(x: i32, y: i32) -> Self {
            Self(IVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: IVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> i32 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> i32 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, dx: i32, dy: i32) -> Self {
            Self(self.0 + IVec2::new(dx, dy))
        }

        /// 从 `self` 指向 `other` 的整数位移。
        #[inline]
        pub fn offset_to(self, other: Point) -> IVec2 {
            other.0 - self.0
        }

        /// 以 `fix` 为不动点缩放，结果四舍五入到整数坐标。
        pub fn scale_about(self, fix: Point, sx: f64, sy: f64) -> Self {
            let x = f64::from(fix.x()) + f64::from(self.x() - fix.x()) * sx;
            let y = f64::from(fix.y()) + f64::from(self.y() - fix.y()) * sy;
            Self::new(x.round() as i32, y.round() as i32)
        }

        #[inline]
        pub fn as_dvec2(self) -> DVec2 {
            self.0.as_dvec2()
        }
    }

    impl From<IVec2> for Point {
        fn from(value: IVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 轴对齐包围盒，两个角点均为整数坐标。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Bounds {
        min: Point,
        max: Point,
    }

    impl Bounds {
        /// 由任意两个对角构造，内部会规整为 min/max。
        pub fn new(a: Point, b: Point) -> Self {
            Self {
                min: Point::from_vec(a.0.min(b.0)),
                max: Point::from_vec(a.0.max(b.0)),
            }
        }

        pub fn from_points<I>(points: I) -> Option<Self>
        where
            I: IntoIterator<Item = Point>,
        {
            let mut iter = points.into_iter();
            let first = iter.next()?;
            let mut bounds = Self::new(first, first);
            for point in iter {
                bounds.include_point(point);
            }
            Some(bounds)
        }

        #[inline]
        pub fn min(&self) -> Point {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point {
            self.max
        }

        #[inline]
        pub fn width(&self) -> i32 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> i32 {
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point) {
            self.min = Point::from_vec(self.min.0.min(point.0));
            self.max = Point::from_vec(self.max.0.max(point.0));
        }

        pub fn include_bounds(&mut self, other: &Bounds) {
            self.include_point(other.min);
            self.include_point(other.max);
        }

        /// 合并两个可选包围盒，任意一侧为空时返回另一侧。
        pub fn union(a: Option<Bounds>, b: Option<Bounds>) -> Option<Bounds> {
            match (a, b) {
                (Some(mut a), Some(b)) => {
                    a.include_bounds(&b);
                    Some(a)
                }
                (a, None) => a,
                (None, b) => b,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn translate_is_reversed_by_negated_delta() {
            let point = Point::new(-7, 12);
            let moved = point.translate(30, -45);
            assert_eq!(moved, Point::new(23, -33));
            assert_eq!(moved.translate(-30, 45), point);
        }

        #[test]
        fn scale_about_fix_point_rounds() {
            let fix = Point::new(10, 10);
            assert_eq!(Point::new(20, 15).scale_about(fix, 2.0, 2.0), Point::new(30, 20));
            assert_eq!(Point::new(13, 10).scale_about(fix, 0.5, 1.0), Point::new(12, 10));
            assert_eq!(fix.scale_about(fix, 3.0, 0.25), fix);
        }

        #[test]
        fn bounds_normalise_corners_and_merge() {
            let mut bounds = Bounds::new(Point::new(10, -5), Point::new(-2, 8));
            assert_eq!(bounds.min(), Point::new(-2, -5));
            assert_eq!(bounds.max(), Point::new(10, 8));
            bounds.include_point(Point::new(20, 0));
            assert_eq!(bounds.width(), 22);
            assert_eq!(bounds.height(), 13);

            assert!(Bounds::from_points(Vec::new()).is_none());
            let merged = Bounds::union(None, Some(bounds)).expect("union keeps one side");
            assert_eq!(merged, bounds);
        }
    }
}

pub mod errors {
    use std::collections::TryReserveError;

    use thiserror::Error;

    use crate::entity::ObjectKind;

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum CoreError {
        #[error("out of memory while allocating {0}")]
        OutOfMemory(&'static str),
        #[error("invariant violated: {0}")]
        InvariantViolation(String),
        #[error("entity with id {0} not found")]
        EntityNotFound(u64),
        #[error("entity {id} is a {actual}, expected {expected}")]
        WrongKind {
            id: u64,
            expected: ObjectKind,
            actual: ObjectKind,
        },
        #[error("depth {0} is outside of the supported range")]
        DepthOutOfRange(i64),
        #[error("entity {0} is still linked into a container")]
        NotDetached(u64),
        #[error("entity {0} is not a compound")]
        NotACompound(u64),
    }

    impl From<TryReserveError> for CoreError {
        fn from(_: TryReserveError) -> Self {
            CoreError::OutOfMemory("object storage")
        }
    }
}

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::depth::{DepthRange, DepthTable};
    pub use crate::entity::{
        Arc, ArcKind, Arrow, ArrowEnd, Arrows, Compound, Depth, Direction, Ellipse, EllipseKind,
        Entity, EntityId, Justification, Line, LineKind, MAX_DEPTH, ObjectKind, Picture,
        Primitive, Spline, SplineKind, Style, Text, Variant,
    };
    pub use crate::errors::CoreError;
    pub use crate::geometry::{Bounds, Point};
    pub use crate::picture::{PictureCache, PictureData, PictureFormat, PictureRef};
    pub use crate::store::ObjectStore;
}
