//! 生成替换图元的变形规则：线与样条互转、开闭切换、合并与拆分。
//!
//! 这里的函数只读取原图元并构造新的图元，不触碰文档；交换与撤销由编辑器完成。

use fig_core::entity::{
    Arc, ArcKind, Arrows, Entity, Line, LineKind, Primitive, Spline, SplineKind, copy_chain,
};
use fig_core::errors::CoreError;
use fig_core::geometry::Point;

use crate::errors::EngineError;

fn sfactor_chain(len: usize, value: impl Fn(usize) -> f64) -> Result<Vec<f64>, CoreError> {
    let mut chain = Vec::new();
    chain
        .try_reserve_exact(len)
        .map_err(|_| CoreError::OutOfMemory("spline shape factors"))?;
    chain.extend((0..len).map(value));
    Ok(chain)
}

fn closed_chain(points: &[Point]) -> Result<Vec<Point>, CoreError> {
    let mut chain = Vec::new();
    chain
        .try_reserve_exact(points.len() + 1)
        .map_err(|_| CoreError::OutOfMemory("point chain"))?;
    chain.extend_from_slice(points);
    if let Some(&first) = points.first() {
        chain.push(first);
    }
    Ok(chain)
}

/// 线转样条、样条转线；矩形与圆角矩形转为多边形。
pub fn converted(entity: &Entity) -> Result<Entity, EngineError> {
    match entity {
        Entity::Line(line) => match line.kind {
            LineKind::Polyline => {
                if line.points.len() < 2 {
                    return Err(EngineError::rejected("a polyline needs two points to become a spline"));
                }
                let last = line.points.len() - 1;
                let sfactors = sfactor_chain(line.points.len(), |index| {
                    if index == 0 || index == last { 0.0 } else { 1.0 }
                })?;
                let mut spline =
                    Spline::from_chains(SplineKind::OpenX, copy_chain(&line.points)?, sfactors)?
                        .with_style(line.style);
                spline.arrows = line.arrows;
                Ok(spline.into())
            }
            LineKind::Polygon => {
                let vertices = &line.points[..line.vertex_count()];
                if vertices.len() < 3 {
                    return Err(EngineError::rejected("a polygon needs three vertices to become a spline"));
                }
                let sfactors = sfactor_chain(vertices.len(), |_| 1.0)?;
                let spline = Spline::from_chains(SplineKind::ClosedX, copy_chain(vertices)?, sfactors)?
                    .with_style(line.style);
                Ok(spline.into())
            }
            LineKind::Box | LineKind::ArcBox => {
                let mut polygon = Line::new(LineKind::Polygon).with_style(line.style);
                polygon.points = copy_chain(&line.points)?;
                Ok(polygon.into())
            }
            LineKind::Picture => Err(EngineError::rejected("picture objects cannot be converted")),
        },
        Entity::Spline(spline) => {
            let mut line = if spline.is_closed() {
                let mut polygon = Line::new(LineKind::Polygon);
                polygon.points = closed_chain(spline.points())?;
                polygon
            } else {
                let mut polyline = Line::new(LineKind::Polyline);
                polyline.points = copy_chain(spline.points())?;
                polyline.arrows = spline.arrows;
                polyline
            };
            line.style = spline.style;
            Ok(line.into())
        }
        other => Err(EngineError::rejected(format!(
            "{} objects cannot be converted",
            other.kind()
        ))),
    }
}

/// 折线与多边形、开/闭样条、开口圆弧与扇形互换。闭合后的图元不带箭头。
pub fn toggled_closure(entity: &Entity) -> Result<Entity, EngineError> {
    match entity {
        Entity::Line(line) => {
            let mut toggled = Line::new(LineKind::Polyline).with_style(line.style);
            match line.kind {
                LineKind::Polyline => {
                    if line.points.len() < 3 {
                        return Err(EngineError::rejected("closing a polyline needs three points"));
                    }
                    toggled.kind = LineKind::Polygon;
                    toggled.points = if line.points.first() == line.points.last() {
                        copy_chain(&line.points)?
                    } else {
                        closed_chain(&line.points)?
                    };
                }
                LineKind::Polygon => {
                    toggled.points = copy_chain(&line.points[..line.vertex_count()])?;
                }
                _ => {
                    return Err(EngineError::rejected(format!(
                        "{:?} lines cannot be opened",
                        line.kind
                    )));
                }
            }
            Ok(toggled.into())
        }
        Entity::Spline(spline) => {
            let kind = spline.kind.toggled();
            if kind.is_closed() && spline.len() < 3 {
                return Err(EngineError::rejected("closing a spline needs three points"));
            }
            let last = spline.len().saturating_sub(1);
            let end_sfactor = if kind == SplineKind::OpenX {
                0.0
            } else {
                kind.default_sfactor()
            };
            let sfactors = sfactor_chain(spline.len(), |index| {
                if index == 0 || index == last {
                    end_sfactor
                } else {
                    spline.sfactors()[index]
                }
            })?;
            let mut toggled = Spline::from_chains(kind, copy_chain(spline.points())?, sfactors)?
                .with_style(spline.style);
            if !kind.is_closed() {
                toggled.arrows = spline.arrows;
            }
            Ok(toggled.into())
        }
        Entity::Arc(arc) => {
            let mut toggled: Arc = arc.try_clone()?;
            toggled.kind = match arc.kind {
                ArcKind::Open => ArcKind::PieWedge,
                ArcKind::PieWedge => ArcKind::Open,
            };
            if toggled.kind == ArcKind::PieWedge {
                toggled.arrows = Arrows::default();
            }
            Ok(toggled.into())
        }
        other => Err(EngineError::rejected(format!(
            "{} objects cannot be opened or closed",
            other.kind()
        ))),
    }
}

/// 首尾相接地合并两条开口折线或两条开口样条。
///
/// 第一条的终点与第二条的起点重合时只保留一次。结果沿用第一条的样式与后向箭头、
/// 第二条的前向箭头。
pub fn joined(first: &Entity, second: &Entity) -> Result<Entity, EngineError> {
    match (first, second) {
        (Entity::Line(a), Entity::Line(b))
            if a.kind == LineKind::Polyline && b.kind == LineKind::Polyline =>
        {
            let skip = usize::from(a.points.last().is_some() && a.points.last() == b.points.first());
            let mut points = Vec::new();
            points
                .try_reserve_exact(a.points.len() + b.points.len() - skip)
                .map_err(|_| CoreError::OutOfMemory("point chain"))?;
            points.extend_from_slice(&a.points);
            points.extend_from_slice(&b.points[skip..]);
            let mut line = Line::new(LineKind::Polyline).with_style(a.style);
            line.radius = a.radius;
            line.points = points;
            line.arrows = Arrows {
                forward: b.arrows.forward,
                backward: a.arrows.backward,
            };
            Ok(line.into())
        }
        (Entity::Spline(a), Entity::Spline(b)) if !a.is_closed() && !b.is_closed() => {
            let skip = usize::from(!a.is_empty() && a.points().last() == b.points().first());
            let mut spline = Spline::new(a.kind).with_style(a.style);
            for (point, sfactor) in a.nodes() {
                spline.push(point, sfactor)?;
            }
            // 第二条属于另一族时按结果的种类重新取形状因子
            let last = b.len().saturating_sub(1);
            for (index, (point, sfactor)) in b.nodes().enumerate().skip(skip) {
                let sfactor = if b.kind == a.kind {
                    sfactor
                } else if index == last && a.kind == SplineKind::OpenX {
                    0.0
                } else {
                    a.kind.default_sfactor()
                };
                spline.push(point, sfactor)?;
            }
            spline.arrows = Arrows {
                forward: b.arrows.forward,
                backward: a.arrows.backward,
            };
            Ok(spline.into())
        }
        _ => Err(EngineError::rejected(
            "only two open polylines or two open splines can be joined",
        )),
    }
}

/// 在内部顶点 `index` 处把开口折线或开口样条拆成共享该点的两段。
pub fn split(entity: &Entity, index: usize) -> Result<(Entity, Entity), EngineError> {
    match entity {
        Entity::Line(line) if line.kind == LineKind::Polyline => {
            if index == 0 || index + 1 >= line.points.len() {
                return Err(EngineError::rejected(format!(
                    "cannot split a polyline of {} points at {index}",
                    line.points.len()
                )));
            }
            let mut head = Line::new(LineKind::Polyline).with_style(line.style);
            head.radius = line.radius;
            head.points = copy_chain(&line.points[..=index])?;
            head.arrows.backward = line.arrows.backward;
            let mut tail = Line::new(LineKind::Polyline).with_style(line.style);
            tail.radius = line.radius;
            tail.points = copy_chain(&line.points[index..])?;
            tail.arrows.forward = line.arrows.forward;
            Ok((head.into(), tail.into()))
        }
        Entity::Spline(spline) if !spline.is_closed() => {
            if index == 0 || index + 1 >= spline.len() {
                return Err(EngineError::rejected(format!(
                    "cannot split a spline of {} points at {index}",
                    spline.len()
                )));
            }
            let (head, tail) = spline.split_at(index)?;
            Ok((head.into(), tail.into()))
        }
        _ => Err(EngineError::rejected("only open polylines and open splines can be split")),
    }
}

#[cfg(test)]
mod tests {
    use fig_core::entity::{Arrow, Style, Text};

    use super::*;

    fn points(coords: &[(i32, i32)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn polyline_becomes_x_spline_with_sharp_ends() {
        let mut line = Line::polyline(points(&[(0, 0), (10, 10), (20, 0)])).with_style(Style::at_depth(9));
        line.arrows.forward = Some(Arrow::default());
        let Entity::Spline(spline) = converted(&line.into()).unwrap() else {
            panic!("expected a spline");
        };
        assert_eq!(spline.kind, SplineKind::OpenX);
        assert_eq!(spline.sfactors(), &[0.0, 1.0, 0.0]);
        assert_eq!(spline.style.depth, 9);
        assert!(spline.arrows.forward.is_some());
    }

    #[test]
    fn polygon_and_closed_spline_convert_both_ways() {
        let polygon = Line::polygon(points(&[(0, 0), (10, 0), (10, 10)]));
        let Entity::Spline(spline) = converted(&polygon.into()).unwrap() else {
            panic!("expected a spline");
        };
        assert_eq!(spline.kind, SplineKind::ClosedX);
        assert_eq!(spline.len(), 3);

        let Entity::Line(back) = converted(&spline.into()).unwrap() else {
            panic!("expected a line");
        };
        assert_eq!(back.kind, LineKind::Polygon);
        assert_eq!(back.points, points(&[(0, 0), (10, 0), (10, 10), (0, 0)]));
    }

    #[test]
    fn boxes_become_polygons_and_text_is_rejected() {
        let boxed = Line::rectangle(LineKind::ArcBox, Point::new(0, 0), Point::new(4, 4));
        let Entity::Line(polygon) = converted(&boxed.into()).unwrap() else {
            panic!("expected a line");
        };
        assert_eq!(polygon.kind, LineKind::Polygon);
        assert_eq!(polygon.vertex_count(), 4);

        let text = Text::new(Point::new(0, 0), "x");
        assert!(matches!(converted(&text.into()), Err(EngineError::Rejected(_))));
    }

    #[test]
    fn closing_drops_arrows_and_reopening_keeps_vertices() {
        let mut line = Line::polyline(points(&[(0, 0), (10, 0), (10, 10)]));
        line.arrows.backward = Some(Arrow::default());
        let closed = toggled_closure(&line.into()).unwrap();
        let Entity::Line(polygon) = &closed else {
            panic!("expected a line");
        };
        assert_eq!(polygon.kind, LineKind::Polygon);
        assert!(polygon.arrows.is_empty());
        assert_eq!(polygon.points.len(), 4);

        let Entity::Line(reopened) = toggled_closure(&closed).unwrap() else {
            panic!("expected a line");
        };
        assert_eq!(reopened.points, points(&[(0, 0), (10, 0), (10, 10)]));
    }

    #[test]
    fn arc_toggles_between_open_and_pie_wedge() {
        let arc = Arc::new(ArcKind::Open, [Point::new(0, 0), Point::new(5, 5), Point::new(10, 0)]);
        let Entity::Arc(wedge) = toggled_closure(&arc.into()).unwrap() else {
            panic!("expected an arc");
        };
        assert_eq!(wedge.kind, ArcKind::PieWedge);
    }

    #[test]
    fn join_keeps_the_shared_point_once() {
        let mut a = Line::polyline(points(&[(0, 0), (10, 0)]));
        a.arrows.backward = Some(Arrow::default());
        a.arrows.forward = Some(Arrow { kind: 2, ..Arrow::default() });
        let mut b = Line::polyline(points(&[(10, 0), (10, 10)]));
        b.arrows.forward = Some(Arrow { kind: 3, ..Arrow::default() });

        let Entity::Line(merged) = joined(&a.into(), &b.into()).unwrap() else {
            panic!("expected a line");
        };
        assert_eq!(merged.points, points(&[(0, 0), (10, 0), (10, 10)]));
        assert_eq!(merged.arrows.forward.map(|arrow| arrow.kind), Some(3));
        assert!(merged.arrows.backward.is_some());
    }

    #[test]
    fn joining_mixed_spline_families_adopts_the_first_kind() {
        let a = Spline::through(SplineKind::OpenApprox, points(&[(0, 0), (5, 5), (10, 0)]));
        let b = Spline::through(SplineKind::OpenInterp, points(&[(10, 0), (15, 5), (20, 0)]));
        let Entity::Spline(merged) = joined(&a.into(), &b.into()).unwrap() else {
            panic!("expected a spline");
        };
        assert_eq!(merged.kind, SplineKind::OpenApprox);
        assert_eq!(merged.len(), 5);
        assert_eq!(merged.sfactors(), &[1.0; 5]);

        let mut x = Spline::new(SplineKind::OpenX);
        x.push(Point::new(0, 0), 0.0).unwrap();
        x.push(Point::new(5, 5), 1.0).unwrap();
        let tail = Spline::through(SplineKind::OpenInterp, points(&[(8, 8), (9, 0)]));
        let Entity::Spline(merged) = joined(&x.into(), &tail.into()).unwrap() else {
            panic!("expected a spline");
        };
        assert_eq!(merged.sfactors(), &[0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn split_needs_an_interior_vertex() {
        let line: Entity = Line::polyline(points(&[(0, 0), (5, 5), (10, 0)])).into();
        assert!(split(&line, 0).is_err());
        assert!(split(&line, 2).is_err());
        let (Entity::Line(head), Entity::Line(tail)) = split(&line, 1).unwrap() else {
            panic!("expected two lines");
        };
        assert_eq!(head.points.last(), tail.points.first());

        let spline: Entity = Spline::through(SplineKind::OpenApprox, points(&[(0, 0), (5, 5), (10, 0)])).into();
        let (Entity::Spline(head), Entity::Spline(tail)) = split(&spline, 1).unwrap() else {
            panic!("expected two splines");
        };
        assert_eq!(head.len() + tail.len(), 4);
    }
}
