use fig_config::{EditorConfig, MAX_DEPTH};
use fig_core::depth::DepthRange;
use fig_core::entity::{
    Arc, ArcKind, Arrow, ArrowEnd, Entity, EntityId, Line, ObjectKind, Spline, SplineKind, Style,
    Text,
};
use fig_core::geometry::{Bounds, Point};
use fig_engine::editor::{Editor, EditorOptions};
use fig_engine::errors::EngineError;
use fig_engine::hooks::EditorHooks;
use fig_engine::operation::Operation;
use tracing::{debug, info};

/// 把编辑器通知写入日志，并统计重绘请求次数。
#[derive(Debug, Default)]
pub struct TraceHooks {
    pub redraws: usize,
    pub range: Option<DepthRange>,
}

impl EditorHooks for TraceHooks {
    fn depth_range_changed(&mut self, range: Option<DepthRange>) {
        info!(range = ?range, "深度范围变化");
        self.range = range;
    }

    fn region_dirty(&mut self, region: Bounds) {
        debug!(region = ?region, "区域需要重绘");
        self.redraws += 1;
    }

    fn adjust_smart_links(&mut self, moved: &[EntityId], dx: i32, dy: i32) {
        debug!(count = moved.len(), dx, dy, "调整智能连线");
    }

    fn adjust_scaled_links(&mut self, scaled: EntityId, fix: Point, sx: f64, sy: f64) {
        debug!(id = %scaled, fix = ?fix, sx, sy, "按缩放调整智能连线");
    }
}

pub fn editor_options(config: &EditorConfig) -> EditorOptions {
    EditorOptions {
        verify_depths: config.verify_depths,
    }
}

fn p(x: i32, y: i32) -> Point {
    Point::new(x, y)
}

/// 演示脚本：建立一张小图，依次执行若干操作与撤销，返回最终的编辑器。
pub fn run_session(config: &EditorConfig) -> Result<Editor<TraceHooks>, EngineError> {
    let depth = config.clamped_depth();
    let back = depth.saturating_add(10).min(MAX_DEPTH);
    let mut editor =
        Editor::with_hooks(TraceHooks::default()).with_options(editor_options(config));

    let frame = editor.create(
        Line::polygon([p(0, 0), p(400, 0), p(400, 300), p(0, 300)])
            .with_style(Style::at_depth(back)),
    )?;
    let path = editor.create(
        Line::polyline([p(20, 20), p(120, 20), p(120, 80)]).with_style(Style::at_depth(depth)),
    )?;
    let tail = editor
        .create(Line::polyline([p(120, 80), p(200, 80)]).with_style(Style::at_depth(depth)))?;
    let mut curve = Spline::through(
        SplineKind::OpenInterp,
        [p(40, 200), p(120, 140), p(200, 220), p(280, 160)],
    )
    .with_style(Style::at_depth(depth.saturating_sub(5)));
    curve.arrows.forward = Some(Arrow::default());
    let curve = editor.create(curve)?;
    let arc = editor.create(
        Arc::new(ArcKind::Open, [p(300, 100), p(330, 130), p(360, 100)])
            .with_style(Style::at_depth(depth)),
    )?;
    let label =
        editor.create(Text::new(p(20, 280), "fig demo").at_depth(depth.saturating_sub(1)))?;

    editor.apply(Operation::Add {
        entities: vec![frame, path, tail, curve, arc, label],
    })?;
    editor.apply(Operation::Join {
        first: path,
        second: tail,
    })?;
    let joined = editor
        .latest()
        .first()
        .copied()
        .ok_or_else(|| EngineError::Rejected("join produced nothing".to_string()))?;

    editor.apply(Operation::AddArrowHead {
        target: joined,
        end: ArrowEnd::Forward,
        arrow: Arrow {
            filled: true,
            ..Arrow::default()
        },
    })?;
    editor.apply(Operation::Move {
        entities: vec![arc, label],
        from: p(0, 0),
        to: p(10, -10),
    })?;

    editor.select(joined)?;
    editor.select(arc)?;
    let group = editor.glue_selection()?;
    info!(group = %group, "已组合选中图元");

    // 连续两次撤销等于重做
    editor.undo()?;
    editor.undo()?;

    editor.apply(Operation::OpenClose { target: curve })?;
    editor.undo()?;
    Ok(editor)
}

fn describe(entity: &Entity) -> String {
    match entity {
        Entity::Line(line) => format!("{:?} 顶点数={}", line.kind, line.points.len()),
        Entity::Spline(spline) => format!("{:?} 控制点数={}", spline.kind, spline.len()),
        Entity::Arc(arc) => format!("{:?} 点={:?}", arc.kind, arc.points()),
        Entity::Ellipse(ellipse) => format!("{:?}", ellipse.kind),
        Entity::Text(text) => format!("文字 {:?}", text.content),
        Entity::Compound(compound) => format!("成员数={}", compound.child_count()),
    }
}

/// 打印文档概览与深度统计。
pub fn print_summary(editor: &Editor<TraceHooks>) {
    let store = editor.store();
    println!("fig 编辑会话演示");
    println!("最近的动作：{}", editor.last_action());

    println!("顶层图元：");
    let root = store.root();
    let mut top: Vec<_> = store
        .iter()
        .filter(|(_, _, parent)| *parent == Some(root))
        .collect();
    top.sort_by_key(|(id, _, _)| *id);
    for (id, entity, _) in top {
        let depth = entity.depth().map_or_else(|| "-".to_string(), |d| d.to_string());
        println!("  - {id} {} 深度={depth} {}", entity.kind(), describe(entity));
    }

    println!("深度统计：");
    for (depth, slot) in store.depths().occupied() {
        let kinds: Vec<String> = ObjectKind::PRIMITIVES
            .iter()
            .filter(|kind| slot.count_of(**kind) > 0)
            .map(|kind| format!("{}×{}", kind, slot.count_of(*kind)))
            .collect();
        println!("  - 深度 {depth}: {} ({})", slot.count(), kinds.join(", "));
    }
    match store.depths().range() {
        Some(range) => println!("深度范围 {}..={}", range.min, range.max),
        None => println!("文档为空"),
    }
    println!("重绘请求 {} 次，游离图元 {} 个", editor.hooks().redraws, store.detached().len());
}
