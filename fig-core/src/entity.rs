//! 图元定义：线、样条、圆弧、椭圆、文本与组合体。
//!
//! 五种基本图元各自实现 [`Primitive`]，仓库与撤销引擎只通过这一组协议
//! （深度、平移、缩放、定义点、可失败的深拷贝）统一处理它们。
//! 组合体只保存子图元的 [`EntityId`]，真正的存储位于 [`crate::store::ObjectStore`]。

use std::fmt;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::geometry::{Bounds, Point};
use crate::picture::PictureRef;

/// 渲染深度，数值越大越靠后绘制。
pub type Depth = u16;

pub const MAX_DEPTH: Depth = 999;
pub const DEFAULT_DEPTH: Depth = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// 提供原始数值，便于日志输出。
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Line,
    Spline,
    Arc,
    Ellipse,
    Text,
    Compound,
}

impl ObjectKind {
    /// 参与深度计数的图元种类，顺序即深度表子计数的下标。
    pub const PRIMITIVES: [ObjectKind; 5] = [
        ObjectKind::Line,
        ObjectKind::Spline,
        ObjectKind::Arc,
        ObjectKind::Ellipse,
        ObjectKind::Text,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Line => "line",
            ObjectKind::Spline => "spline",
            ObjectKind::Arc => "arc",
            ObjectKind::Ellipse => "ellipse",
            ObjectKind::Text => "text",
            ObjectKind::Compound => "compound",
        }
    }

    #[inline]
    pub fn primitive_index(self) -> Option<usize> {
        match self {
            ObjectKind::Line => Some(0),
            ObjectKind::Spline => Some(1),
            ObjectKind::Arc => Some(2),
            ObjectKind::Ellipse => Some(3),
            ObjectKind::Text => Some(4),
            ObjectKind::Compound => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
    DashDotted,
    DashDoubleDotted,
    DashTripleDotted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JoinStyle {
    #[default]
    Miter,
    Round,
    Bevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CapStyle {
    #[default]
    Butt,
    Round,
    Projecting,
}

/// 线类图元共用的外观属性。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub depth: Depth,
    pub thickness: i32,
    pub pen_color: i32,
    pub fill_color: i32,
    /// -1 表示不填充。
    pub fill_style: i32,
    pub line_style: LineStyle,
    pub style_val: f32,
    pub join_style: JoinStyle,
    pub cap_style: CapStyle,
}

impl Style {
    pub fn at_depth(depth: Depth) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }
}

impl Default for Style {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            thickness: 1,
            pen_color: 0,
            fill_color: 7,
            fill_style: -1,
            line_style: LineStyle::Solid,
            style_val: 0.0,
            join_style: JoinStyle::Miter,
            cap_style: CapStyle::Butt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arrow {
    pub kind: u8,
    pub filled: bool,
    pub thickness: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for Arrow {
    fn default() -> Self {
        Self {
            kind: 0,
            filled: false,
            thickness: 1.0,
            width: 60.0,
            height: 120.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrowEnd {
    Forward,
    Backward,
}

/// 端点箭头。每个箭头只属于它所修饰的那个端点，缺省即为 `None`。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Arrows {
    pub forward: Option<Arrow>,
    pub backward: Option<Arrow>,
}

impl Arrows {
    #[inline]
    pub fn get(&self, end: ArrowEnd) -> Option<&Arrow> {
        match end {
            ArrowEnd::Forward => self.forward.as_ref(),
            ArrowEnd::Backward => self.backward.as_ref(),
        }
    }

    #[inline]
    pub fn slot_mut(&mut self, end: ArrowEnd) -> &mut Option<Arrow> {
        match end {
            ArrowEnd::Forward => &mut self.forward,
            ArrowEnd::Backward => &mut self.backward,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.forward.is_none() && self.backward.is_none()
    }
}

/// 逐节点复制一条链，内存不足时不留下任何部分结果。
pub fn copy_chain<T: Copy>(chain: &[T]) -> Result<Vec<T>, CoreError> {
    let mut copy = Vec::new();
    copy.try_reserve_exact(chain.len())
        .map_err(|_| CoreError::OutOfMemory("point chain"))?;
    copy.extend_from_slice(chain);
    Ok(copy)
}

fn copy_string(source: &str) -> Result<String, CoreError> {
    let mut copy = String::new();
    copy.try_reserve_exact(source.len())
        .map_err(|_| CoreError::OutOfMemory("text buffer"))?;
    copy.push_str(source);
    Ok(copy)
}

/// 五种基本图元的公共协议。
pub trait Primitive: Sized {
    fn depth(&self) -> Depth;

    fn set_depth(&mut self, depth: Depth);

    /// 原地平移所有带坐标的字段，不分配内存。
    fn translate(&mut self, dx: i32, dy: i32);

    fn scale_about(&mut self, fix: Point, sx: f64, sy: f64);

    /// 定义几何的关键点，用于粗略包围盒；精确范围由外部计算。
    fn defining_points(&self) -> Vec<Point>;

    fn try_clone(&self) -> Result<Self, CoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineKind {
    Polyline,
    Box,
    Polygon,
    ArcBox,
    Picture,
}

impl LineKind {
    /// 闭合类型在链尾显式保存一个与首点相同的闭合点。
    #[inline]
    pub fn is_closed(self) -> bool {
        !matches!(self, LineKind::Polyline)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Picture {
    pub source: PictureRef,
    pub flipped: bool,
}

impl Picture {
    pub fn new(source: PictureRef) -> Self {
        Self {
            source,
            flipped: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub kind: LineKind,
    pub style: Style,
    /// 圆角矩形的圆角半径，其它类型忽略。
    pub radius: i32,
    pub arrows: Arrows,
    pub picture: Option<Picture>,
    pub points: Vec<Point>,
}

impl Line {
    pub fn new(kind: LineKind) -> Self {
        Self {
            kind,
            style: Style::default(),
            radius: 0,
            arrows: Arrows::default(),
            picture: None,
            points: Vec::new(),
        }
    }

    pub fn polyline<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Point>,
    {
        let mut line = Self::new(LineKind::Polyline);
        line.points.extend(points);
        line
    }

    /// 构造多边形，若首尾不同则补上闭合点。
    pub fn polygon<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Point>,
    {
        let mut line = Self::new(LineKind::Polygon);
        line.points.extend(points);
        line.close_chain();
        line
    }

    /// 以两个对角构造矩形类线（`Box`、`ArcBox`、`Picture`）。
    pub fn rectangle(kind: LineKind, a: Point, b: Point) -> Self {
        let bounds = Bounds::new(a, b);
        let (min, max) = (bounds.min(), bounds.max());
        let mut line = Self::new(kind);
        line.points = vec![
            min,
            Point::new(max.x(), min.y()),
            max,
            Point::new(min.x(), max.y()),
            min,
        ];
        line
    }

    pub fn picture(a: Point, b: Point, picture: Picture) -> Self {
        let mut line = Self::rectangle(LineKind::Picture, a, b);
        line.picture = Some(picture);
        line
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.kind.is_closed()
    }

    /// 不计闭合点的顶点数。
    pub fn vertex_count(&self) -> usize {
        if self.is_closed() {
            self.points.len().saturating_sub(1)
        } else {
            self.points.len()
        }
    }

    fn close_chain(&mut self) {
        if let (Some(first), Some(last)) = (self.points.first(), self.points.last()) {
            if first != last || self.points.len() == 1 {
                let first = *first;
                self.points.push(first);
            }
        }
    }

    /// 在顶点 `index` 之前插入一个点；闭合线在首点变化时同步闭合点。
    pub fn insert_vertex(&mut self, index: usize, point: Point) -> Result<(), CoreError> {
        if index > self.vertex_count() {
            return Err(CoreError::InvariantViolation(format!(
                "vertex index {index} out of range for {} points",
                self.vertex_count()
            )));
        }
        self.points
            .try_reserve(1)
            .map_err(|_| CoreError::OutOfMemory("point chain"))?;
        self.points.insert(index, point);
        if self.is_closed() && index == 0 {
            if let Some(last) = self.points.last_mut() {
                *last = point;
            }
        }
        Ok(())
    }

    pub fn remove_vertex(&mut self, index: usize) -> Result<Point, CoreError> {
        if index >= self.vertex_count() {
            return Err(CoreError::InvariantViolation(format!(
                "vertex index {index} out of range for {} points",
                self.vertex_count()
            )));
        }
        let removed = self.points.remove(index);
        if self.is_closed() && index == 0 {
            if let Some(&first) = self.points.first() {
                if let Some(last) = self.points.last_mut() {
                    *last = first;
                }
            }
        }
        Ok(removed)
    }
}

impl Primitive for Line {
    fn depth(&self) -> Depth {
        self.style.depth
    }

    fn set_depth(&mut self, depth: Depth) {
        self.style.depth = depth;
    }

    fn translate(&mut self, dx: i32, dy: i32) {
        for point in &mut self.points {
            *point = point.translate(dx, dy);
        }
    }

    fn scale_about(&mut self, fix: Point, sx: f64, sy: f64) {
        for point in &mut self.points {
            *point = point.scale_about(fix, sx, sy);
        }
    }

    fn defining_points(&self) -> Vec<Point> {
        self.points.clone()
    }

    fn try_clone(&self) -> Result<Self, CoreError> {
        Ok(Self {
            kind: self.kind,
            style: self.style,
            radius: self.radius,
            arrows: self.arrows,
            // 图片只增加引用计数，不复制像素。
            picture: self.picture.clone(),
            points: copy_chain(&self.points)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplineKind {
    OpenApprox,
    ClosedApprox,
    OpenInterp,
    ClosedInterp,
    OpenX,
    ClosedX,
}

impl SplineKind {
    #[inline]
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            SplineKind::ClosedApprox | SplineKind::ClosedInterp | SplineKind::ClosedX
        )
    }

    /// 同一族内开/闭互换。
    pub fn toggled(self) -> Self {
        match self {
            SplineKind::OpenApprox => SplineKind::ClosedApprox,
            SplineKind::ClosedApprox => SplineKind::OpenApprox,
            SplineKind::OpenInterp => SplineKind::ClosedInterp,
            SplineKind::ClosedInterp => SplineKind::OpenInterp,
            SplineKind::OpenX => SplineKind::ClosedX,
            SplineKind::ClosedX => SplineKind::OpenX,
        }
    }

    /// 新插入控制点使用的形状因子。
    pub fn default_sfactor(self) -> f64 {
        match self {
            SplineKind::OpenInterp | SplineKind::ClosedInterp => -1.0,
            _ => 1.0,
        }
    }
}

/// 样条：点链与形状因子链等长并同步增删。两条链都不对外可变，
/// 只能通过成对的 `push`/`insert`/`remove` 修改。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spline {
    pub kind: SplineKind,
    pub style: Style,
    pub arrows: Arrows,
    points: Vec<Point>,
    sfactors: Vec<f64>,
}

impl Spline {
    pub fn new(kind: SplineKind) -> Self {
        Self {
            kind,
            style: Style::default(),
            arrows: Arrows::default(),
            points: Vec::new(),
            sfactors: Vec::new(),
        }
    }

    /// 以点链构造样条，每个点取该类型的默认形状因子。
    pub fn through<I>(kind: SplineKind, points: I) -> Self
    where
        I: IntoIterator<Item = Point>,
    {
        let mut spline = Self::new(kind);
        let sfactor = kind.default_sfactor();
        for point in points {
            spline.points.push(point);
            spline.sfactors.push(sfactor);
        }
        spline
    }

    pub fn from_chains(
        kind: SplineKind,
        points: Vec<Point>,
        sfactors: Vec<f64>,
    ) -> Result<Self, CoreError> {
        if points.len() != sfactors.len() {
            return Err(CoreError::InvariantViolation(format!(
                "spline chains differ in length: {} points, {} sfactors",
                points.len(),
                sfactors.len()
            )));
        }
        Ok(Self {
            kind,
            style: Style::default(),
            arrows: Arrows::default(),
            points,
            sfactors,
        })
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn sfactors(&self) -> &[f64] {
        &self.sfactors
    }

    pub fn nodes(&self) -> impl Iterator<Item = (Point, f64)> + '_ {
        self.points.iter().copied().zip(self.sfactors.iter().copied())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.kind.is_closed()
    }

    fn reserve_node(&mut self) -> Result<(), CoreError> {
        self.points
            .try_reserve(1)
            .map_err(|_| CoreError::OutOfMemory("spline points"))?;
        self.sfactors
            .try_reserve(1)
            .map_err(|_| CoreError::OutOfMemory("spline shape factors"))?;
        Ok(())
    }

    pub fn push(&mut self, point: Point, sfactor: f64) -> Result<(), CoreError> {
        self.reserve_node()?;
        self.points.push(point);
        self.sfactors.push(sfactor);
        Ok(())
    }

    pub fn insert(&mut self, index: usize, point: Point, sfactor: f64) -> Result<(), CoreError> {
        if index > self.len() {
            return Err(CoreError::InvariantViolation(format!(
                "spline index {index} out of range for {} points",
                self.len()
            )));
        }
        // 两条链都先预留，之后的插入不会失败，保证不会只改了一条。
        self.reserve_node()?;
        self.points.insert(index, point);
        self.sfactors.insert(index, sfactor);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<(Point, f64), CoreError> {
        if index >= self.len() {
            return Err(CoreError::InvariantViolation(format!(
                "spline index {index} out of range for {} points",
                self.len()
            )));
        }
        Ok((self.points.remove(index), self.sfactors.remove(index)))
    }

    pub fn set_sfactor(&mut self, index: usize, sfactor: f64) -> Result<(), CoreError> {
        let slot = self.sfactors.get_mut(index).ok_or_else(|| {
            CoreError::InvariantViolation(format!("spline index {index} out of range"))
        })?;
        *slot = sfactor;
        Ok(())
    }

    /// 在 `index` 处拆分，两段共享该点。箭头按端点分配到两侧。
    pub fn split_at(&self, index: usize) -> Result<(Spline, Spline), CoreError> {
        if index == 0 || index + 1 >= self.len() {
            return Err(CoreError::InvariantViolation(format!(
                "cannot split a spline of {} points at {index}",
                self.len()
            )));
        }
        let head = Spline {
            kind: self.kind,
            style: self.style,
            arrows: Arrows {
                forward: None,
                backward: self.arrows.backward,
            },
            points: copy_chain(&self.points[..=index])?,
            sfactors: copy_chain(&self.sfactors[..=index])?,
        };
        let tail = Spline {
            kind: self.kind,
            style: self.style,
            arrows: Arrows {
                forward: self.arrows.forward,
                backward: None,
            },
            points: copy_chain(&self.points[index..])?,
            sfactors: copy_chain(&self.sfactors[index..])?,
        };
        Ok((head, tail))
    }
}

impl Primitive for Spline {
    fn depth(&self) -> Depth {
        self.style.depth
    }

    fn set_depth(&mut self, depth: Depth) {
        self.style.depth = depth;
    }

    fn translate(&mut self, dx: i32, dy: i32) {
        for point in &mut self.points {
            *point = point.translate(dx, dy);
        }
    }

    fn scale_about(&mut self, fix: Point, sx: f64, sy: f64) {
        for point in &mut self.points {
            *point = point.scale_about(fix, sx, sy);
        }
    }

    fn defining_points(&self) -> Vec<Point> {
        self.points.clone()
    }

    fn try_clone(&self) -> Result<Self, CoreError> {
        Ok(Self {
            kind: self.kind,
            style: self.style,
            arrows: self.arrows,
            points: copy_chain(&self.points)?,
            sfactors: copy_chain(&self.sfactors)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArcKind {
    Open,
    PieWedge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    Clockwise,
    #[default]
    CounterClockwise,
}

/// 三点圆弧。圆心由三点推导，点改变形状时重新计算。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Arc {
    pub kind: ArcKind,
    pub direction: Direction,
    pub style: Style,
    pub arrows: Arrows,
    points: [Point; 3],
    center: DVec2,
}

impl Arc {
    pub fn new(kind: ArcKind, points: [Point; 3]) -> Self {
        Self {
            kind,
            direction: Direction::default(),
            style: Style::default(),
            arrows: Arrows::default(),
            points,
            center: derive_center(&points),
        }
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    #[inline]
    pub fn points(&self) -> [Point; 3] {
        self.points
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        self.center
    }

    pub fn set_points(&mut self, points: [Point; 3]) {
        self.points = points;
        self.center = derive_center(&points);
    }
}

/// 三点外接圆圆心；三点共线时退化为首尾中点。
fn derive_center(points: &[Point; 3]) -> DVec2 {
    let [a, b, c] = [
        points[0].as_dvec2(),
        points[1].as_dvec2(),
        points[2].as_dvec2(),
    ];
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() <= f64::EPSILON {
        return (a + c) * 0.5;
    }
    let (a2, b2, c2) = (a.length_squared(), b.length_squared(), c.length_squared());
    DVec2::new(
        (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
        (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
    )
}

impl Primitive for Arc {
    fn depth(&self) -> Depth {
        self.style.depth
    }

    fn set_depth(&mut self, depth: Depth) {
        self.style.depth = depth;
    }

    fn translate(&mut self, dx: i32, dy: i32) {
        for point in &mut self.points {
            *point = point.translate(dx, dy);
        }
        // 圆心只由整数点导出，来回平移后逐位相同
        self.center = derive_center(&self.points);
    }

    fn scale_about(&mut self, fix: Point, sx: f64, sy: f64) {
        let scaled = self.points.map(|point| point.scale_about(fix, sx, sy));
        self.set_points(scaled);
    }

    fn defining_points(&self) -> Vec<Point> {
        self.points.to_vec()
    }

    fn try_clone(&self) -> Result<Self, CoreError> {
        Ok(self.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EllipseKind {
    ByRadii,
    ByDiameter,
    CircleByRadius,
    CircleByDiameter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ellipse {
    pub kind: EllipseKind,
    pub direction: Direction,
    pub style: Style,
    pub angle: f64,
    pub center: Point,
    /// x/y 半径，始终非负。
    pub radii: Point,
    /// 交互绘制时的起止标记点。
    pub start: Point,
    pub end: Point,
}

impl Ellipse {
    pub fn new(kind: EllipseKind, center: Point, radii: Point) -> Self {
        let radii = Point::new(radii.x().abs(), radii.y().abs());
        Self {
            kind,
            direction: Direction::default(),
            style: Style::default(),
            angle: 0.0,
            center,
            radii,
            start: center,
            end: center.translate(radii.x(), radii.y()),
        }
    }

    pub fn circle(center: Point, radius: i32) -> Self {
        Self::new(
            EllipseKind::CircleByRadius,
            center,
            Point::new(radius, radius),
        )
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }
}

impl Primitive for Ellipse {
    fn depth(&self) -> Depth {
        self.style.depth
    }

    fn set_depth(&mut self, depth: Depth) {
        self.style.depth = depth;
    }

    fn translate(&mut self, dx: i32, dy: i32) {
        self.center = self.center.translate(dx, dy);
        self.start = self.start.translate(dx, dy);
        self.end = self.end.translate(dx, dy);
    }

    fn scale_about(&mut self, fix: Point, sx: f64, sy: f64) {
        self.center = self.center.scale_about(fix, sx, sy);
        self.start = self.start.scale_about(fix, sx, sy);
        self.end = self.end.scale_about(fix, sx, sy);
        let rx = (f64::from(self.radii.x()) * sx.abs()).round() as i32;
        let ry = (f64::from(self.radii.y()) * sy.abs()).round() as i32;
        self.radii = Point::new(rx, ry);
    }

    fn defining_points(&self) -> Vec<Point> {
        vec![
            self.center.translate(-self.radii.x(), -self.radii.y()),
            self.center.translate(self.radii.x(), self.radii.y()),
        ]
    }

    fn try_clone(&self) -> Result<Self, CoreError> {
        Ok(self.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Justification {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Text {
    pub justification: Justification,
    pub font: i32,
    pub size: f32,
    pub angle: f64,
    pub color: i32,
    pub depth: Depth,
    pub flags: i32,
    /// 字体层量出的高度与长度，本 crate 不做测量。
    pub height: i32,
    pub length: i32,
    pub base: Point,
    pub content: String,
}

impl Text {
    pub fn new(base: Point, content: impl Into<String>) -> Self {
        Self {
            justification: Justification::default(),
            font: 0,
            size: 12.0,
            angle: 0.0,
            color: 0,
            depth: DEFAULT_DEPTH,
            flags: 0,
            height: 0,
            length: 0,
            base,
            content: content.into(),
        }
    }

    pub fn at_depth(mut self, depth: Depth) -> Self {
        self.depth = depth;
        self
    }
}

impl Primitive for Text {
    fn depth(&self) -> Depth {
        self.depth
    }

    fn set_depth(&mut self, depth: Depth) {
        self.depth = depth;
    }

    fn translate(&mut self, dx: i32, dy: i32) {
        self.base = self.base.translate(dx, dy);
    }

    // 字号不随缩放变化，只移动锚点。
    fn scale_about(&mut self, fix: Point, sx: f64, sy: f64) {
        self.base = self.base.scale_about(fix, sx, sy);
    }

    fn defining_points(&self) -> Vec<Point> {
        vec![
            self.base,
            self.base.translate(self.length, -self.height),
        ]
    }

    fn try_clone(&self) -> Result<Self, CoreError> {
        Ok(Self {
            justification: self.justification,
            font: self.font,
            size: self.size,
            angle: self.angle,
            color: self.color,
            depth: self.depth,
            flags: self.flags,
            height: self.height,
            length: self.length,
            base: self.base,
            content: copy_string(&self.content)?,
        })
    }
}

const CHILD_ORDER: [ObjectKind; 6] = [
    ObjectKind::Line,
    ObjectKind::Spline,
    ObjectKind::Arc,
    ObjectKind::Ellipse,
    ObjectKind::Text,
    ObjectKind::Compound,
];

/// 组合体：按种类分列表保存子图元 ID。
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Compound {
    pub nw_corner: Point,
    pub se_corner: Point,
    pub tagged: bool,
    pub comments: Option<String>,
    lines: Vec<EntityId>,
    splines: Vec<EntityId>,
    arcs: Vec<EntityId>,
    ellipses: Vec<EntityId>,
    texts: Vec<EntityId>,
    compounds: Vec<EntityId>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, kind: ObjectKind) -> &[EntityId] {
        match kind {
            ObjectKind::Line => &self.lines,
            ObjectKind::Spline => &self.splines,
            ObjectKind::Arc => &self.arcs,
            ObjectKind::Ellipse => &self.ellipses,
            ObjectKind::Text => &self.texts,
            ObjectKind::Compound => &self.compounds,
        }
    }

    pub(crate) fn list_mut(&mut self, kind: ObjectKind) -> &mut Vec<EntityId> {
        match kind {
            ObjectKind::Line => &mut self.lines,
            ObjectKind::Spline => &mut self.splines,
            ObjectKind::Arc => &mut self.arcs,
            ObjectKind::Ellipse => &mut self.ellipses,
            ObjectKind::Text => &mut self.texts,
            ObjectKind::Compound => &mut self.compounds,
        }
    }

    /// 依次列出各列表中的子图元，组合体排在最后。
    pub fn children(&self) -> impl Iterator<Item = (ObjectKind, EntityId)> + '_ {
        CHILD_ORDER
            .into_iter()
            .flat_map(move |kind| self.list(kind).iter().map(move |id| (kind, *id)))
    }

    pub fn child_count(&self) -> usize {
        self.lines.len()
            + self.splines.len()
            + self.arcs.len()
            + self.ellipses.len()
            + self.texts.len()
            + self.compounds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.child_count() == 0
    }

    pub fn contains(&self, kind: ObjectKind, id: EntityId) -> bool {
        self.list(kind).contains(&id)
    }

    #[inline]
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.nw_corner, self.se_corner)
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.nw_corner = bounds.min();
        self.se_corner = bounds.max();
    }

    /// 复制外壳（角点、标记、注释），子列表留空。
    pub fn try_clone_shell(&self) -> Result<Self, CoreError> {
        let comments = match &self.comments {
            Some(comments) => Some(copy_string(comments)?),
            None => None,
        };
        Ok(Self {
            nw_corner: self.nw_corner,
            se_corner: self.se_corner,
            tagged: self.tagged,
            comments,
            ..Self::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Entity {
    Line(Line),
    Spline(Spline),
    Arc(Arc),
    Ellipse(Ellipse),
    Text(Text),
    Compound(Compound),
}

impl Entity {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Entity::Line(_) => ObjectKind::Line,
            Entity::Spline(_) => ObjectKind::Spline,
            Entity::Arc(_) => ObjectKind::Arc,
            Entity::Ellipse(_) => ObjectKind::Ellipse,
            Entity::Text(_) => ObjectKind::Text,
            Entity::Compound(_) => ObjectKind::Compound,
        }
    }

    /// 组合体本身不占深度，返回 `None`。
    pub fn depth(&self) -> Option<Depth> {
        match self {
            Entity::Line(line) => Some(line.depth()),
            Entity::Spline(spline) => Some(spline.depth()),
            Entity::Arc(arc) => Some(arc.depth()),
            Entity::Ellipse(ellipse) => Some(ellipse.depth()),
            Entity::Text(text) => Some(text.depth()),
            Entity::Compound(_) => None,
        }
    }

    pub(crate) fn set_depth(&mut self, depth: Depth) {
        match self {
            Entity::Line(line) => line.set_depth(depth),
            Entity::Spline(spline) => spline.set_depth(depth),
            Entity::Arc(arc) => arc.set_depth(depth),
            Entity::Ellipse(ellipse) => ellipse.set_depth(depth),
            Entity::Text(text) => text.set_depth(depth),
            Entity::Compound(_) => {}
        }
    }

    /// 组合体只移动自身角点，子图元由仓库递归处理。
    pub fn translate(&mut self, dx: i32, dy: i32) {
        match self {
            Entity::Line(line) => line.translate(dx, dy),
            Entity::Spline(spline) => spline.translate(dx, dy),
            Entity::Arc(arc) => arc.translate(dx, dy),
            Entity::Ellipse(ellipse) => ellipse.translate(dx, dy),
            Entity::Text(text) => text.translate(dx, dy),
            Entity::Compound(compound) => {
                compound.nw_corner = compound.nw_corner.translate(dx, dy);
                compound.se_corner = compound.se_corner.translate(dx, dy);
            }
        }
    }

    pub fn scale_about(&mut self, fix: Point, sx: f64, sy: f64) {
        match self {
            Entity::Line(line) => line.scale_about(fix, sx, sy),
            Entity::Spline(spline) => spline.scale_about(fix, sx, sy),
            Entity::Arc(arc) => arc.scale_about(fix, sx, sy),
            Entity::Ellipse(ellipse) => ellipse.scale_about(fix, sx, sy),
            Entity::Text(text) => text.scale_about(fix, sx, sy),
            Entity::Compound(compound) => {
                let nw = compound.nw_corner.scale_about(fix, sx, sy);
                let se = compound.se_corner.scale_about(fix, sx, sy);
                compound.set_bounds(Bounds::new(nw, se));
            }
        }
    }

    pub fn defining_points(&self) -> Vec<Point> {
        match self {
            Entity::Line(line) => line.defining_points(),
            Entity::Spline(spline) => spline.defining_points(),
            Entity::Arc(arc) => arc.defining_points(),
            Entity::Ellipse(ellipse) => ellipse.defining_points(),
            Entity::Text(text) => text.defining_points(),
            Entity::Compound(compound) => vec![compound.nw_corner, compound.se_corner],
        }
    }

    /// 带端点箭头的图元（线、样条、圆弧）返回箭头槽位。
    pub fn arrows(&self) -> Option<&Arrows> {
        match self {
            Entity::Line(line) => Some(&line.arrows),
            Entity::Spline(spline) => Some(&spline.arrows),
            Entity::Arc(arc) => Some(&arc.arrows),
            _ => None,
        }
    }

    pub fn arrows_mut(&mut self) -> Option<&mut Arrows> {
        match self {
            Entity::Line(line) => Some(&mut line.arrows),
            Entity::Spline(spline) => Some(&mut spline.arrows),
            Entity::Arc(arc) => Some(&mut arc.arrows),
            _ => None,
        }
    }

    /// 基本图元的深拷贝；组合体只复制外壳。
    pub fn try_clone(&self) -> Result<Self, CoreError> {
        Ok(match self {
            Entity::Line(line) => Entity::Line(line.try_clone()?),
            Entity::Spline(spline) => Entity::Spline(spline.try_clone()?),
            Entity::Arc(arc) => Entity::Arc(arc.try_clone()?),
            Entity::Ellipse(ellipse) => Entity::Ellipse(ellipse.try_clone()?),
            Entity::Text(text) => Entity::Text(text.try_clone()?),
            Entity::Compound(compound) => Entity::Compound(compound.try_clone_shell()?),
        })
    }
}

/// 从 [`Entity`] 中按具体类型取出图元。
pub trait Variant: Sized {
    const KIND: ObjectKind;

    fn from_entity(entity: &Entity) -> Option<&Self>;

    fn from_entity_mut(entity: &mut Entity) -> Option<&mut Self>;
}

macro_rules! entity_variant {
    ($ty:ident) => {
        impl Variant for $ty {
            const KIND: ObjectKind = ObjectKind::$ty;

            fn from_entity(entity: &Entity) -> Option<&Self> {
                match entity {
                    Entity::$ty(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_entity_mut(entity: &mut Entity) -> Option<&mut Self> {
                match entity {
                    Entity::$ty(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Entity {
            fn from(value: $ty) -> Self {
                Entity::$ty(value)
            }
        }
    };
}

entity_variant!(Line);
entity_variant!(Spline);
entity_variant!(Arc);
entity_variant!(Ellipse);
entity_variant!(Text);
entity_variant!(Compound);
