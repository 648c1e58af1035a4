
use fig_core::entity::{
    Arc, ArcKind, Arrow, ArrowEnd, Compound, Ellipse, EntityId, Line, LineKind, Spline,
    SplineKind, Style, Text,
};
use fig_core::geometry::Point;
use fig_engine::editor::Editor;
use fig_engine::operation::{ActionKind, Operation};
use fig_engine::undo::UndoOutcome;

struct Figure {
    editor: Editor,
    polyline: EntityId,
    tail: EntityId,
    polygon: EntityId,
    spline: EntityId,
    arc: EntityId,
    boxed: EntityId,
    text: EntityId,
    group: EntityId,
}

fn p(x: i32, y: i32) -> Point {
    Point::new(x, y)
}

fn figure() -> Figure {
    let mut editor = Editor::new();
    let polyline = editor
        .create(Line::polyline([p(0, 0), p(10, 0), p(10, 10)]).with_style(Style::at_depth(10)))
        .unwrap();
    let tail = editor
        .create(Line::polyline([p(10, 10), p(30, 10)]).with_style(Style::at_depth(11)))
        .unwrap();
    let polygon = editor
        .create(Line::polygon([p(0, 0), p(40, 0), p(40, 40)]).with_style(Style::at_depth(20)))
        .unwrap();
    let mut curve = Spline::through(
        SplineKind::OpenApprox,
        [p(0, 0), p(20, 20), p(40, 0), p(60, 20)],
    )
    .with_style(Style::at_depth(30));
    curve.arrows.backward = Some(Arrow::default());
    let spline = editor.create(curve).unwrap();
    let arc = editor
        .create(Arc::new(ArcKind::Open, [p(0, 0), p(10, 10), p(20, 0)]).with_style(Style::at_depth(40)))
        .unwrap();
    let ellipse = editor
        .create(Ellipse::circle(p(100, 100), 25).with_style(Style::at_depth(50)))
        .unwrap();
    let boxed = editor
        .create(Line::rectangle(LineKind::Box, p(200, 200), p(260, 240)).with_style(Style::at_depth(15)))
        .unwrap();
    let text = editor.create(Text::new(p(5, 5), "note").at_depth(60)).unwrap();

    let group = editor.create(Compound::new()).unwrap();
    for depth in [2, 7] {
        let member = editor
            .create(Line::polyline([p(0, 0), p(i32::from(depth), 3)]).with_style(Style::at_depth(depth)))
            .unwrap();
        editor.nest(group, member).unwrap();
    }

    editor
        .apply(Operation::Add {
            entities: vec![polyline, tail, polygon, spline, arc, ellipse, boxed, text, group],
        })
        .unwrap();

    Figure {
        editor,
        polyline,
        tail,
        polygon,
        spline,
        arc,
        boxed,
        text,
        group,
    }
}

/// 执行、撤销、重做、再撤销，文档依次回到执行前后的状态。
fn round_trip(build: impl FnOnce(&mut Figure) -> Operation) {
    let mut figure = figure();
    let operation = build(&mut figure);
    let action = operation.action();
    let editor = &mut figure.editor;

    let before = snapshot::document(editor);
    editor.apply(operation).unwrap();
    assert_eq!(editor.last_action(), action);
    let after = snapshot::document(editor);
    assert_ne!(before, after, "{action} left the figure unchanged");

    assert_eq!(editor.undo().unwrap(), UndoOutcome::Reverted(action));
    assert_eq!(snapshot::document(editor), before, "undo of {action}");
    editor.store().verify_depths().unwrap();

    editor.undo().unwrap();
    assert_eq!(editor.last_action(), action);
    assert_eq!(snapshot::document(editor), after, "redo of {action}");

    editor.undo().unwrap();
    assert_eq!(snapshot::document(editor), before, "second undo of {action}");
    editor.store().verify_depths().unwrap();
}

#[test]
fn add_round_trip() {
    round_trip(|figure| {
        let extra = figure
            .editor
            .create(Line::polyline([p(-5, -5), p(-1, -1)]).with_style(Style::at_depth(3)))
            .unwrap();
        Operation::Add {
            entities: vec![extra],
        }
    });
}

#[test]
fn delete_round_trip() {
    round_trip(|figure| Operation::Delete {
        entities: vec![figure.polyline, figure.group],
    });
}

#[test]
fn move_round_trip() {
    round_trip(|figure| Operation::Move {
        entities: vec![figure.arc, figure.group, figure.text],
        from: p(0, 0),
        to: p(13, -7),
    });
}

#[test]
fn scale_round_trip() {
    round_trip(|figure| Operation::Scale {
        target: figure.polygon,
        fix: p(0, 0),
        from: p(10, 10),
        to: p(20, 20),
    });
}

#[test]
fn edit_round_trip() {
    round_trip(|figure| {
        let replacement = figure
            .editor
            .create(Text::new(p(5, 5), "edited").at_depth(61))
            .unwrap();
        Operation::Edit {
            target: figure.text,
            replacement,
        }
    });
}

#[test]
fn glue_round_trip() {
    round_trip(|figure| Operation::Glue {
        entities: vec![figure.polyline, figure.text, figure.group],
    });
}

#[test]
fn break_round_trip() {
    round_trip(|figure| Operation::Break {
        compound: figure.group,
    });
}

#[test]
fn load_round_trip() {
    round_trip(|figure| {
        let editor = &mut figure.editor;
        let other = editor.create(Compound::new()).unwrap();
        let line = editor
            .create(Line::polyline([p(1, 1), p(2, 2)]).with_style(Style::at_depth(900)))
            .unwrap();
        editor.nest(other, line).unwrap();
        Operation::Load {
            figure: other,
            name: "second.fig".to_string(),
        }
    });
}

#[test]
fn add_point_round_trip() {
    round_trip(|figure| Operation::AddPoint {
        target: figure.polyline,
        index: 1,
        point: p(5, -5),
        sfactor: None,
    });
    round_trip(|figure| Operation::AddPoint {
        target: figure.spline,
        index: 4,
        point: p(80, 0),
        sfactor: Some(0.5),
    });
    round_trip(|figure| Operation::AddPoint {
        target: figure.polygon,
        index: 0,
        point: p(-10, -10),
        sfactor: None,
    });
}

#[test]
fn delete_point_round_trip() {
    round_trip(|figure| Operation::DeletePoint {
        target: figure.spline,
        index: 1,
    });
    round_trip(|figure| Operation::DeletePoint {
        target: figure.polyline,
        index: 0,
    });
}

#[test]
fn arrowhead_round_trips() {
    round_trip(|figure| Operation::AddArrowHead {
        target: figure.polyline,
        end: ArrowEnd::Forward,
        arrow: Arrow {
            filled: true,
            ..Arrow::default()
        },
    });
    round_trip(|figure| Operation::DeleteArrowHead {
        target: figure.spline,
        end: ArrowEnd::Backward,
    });
}

#[test]
fn convert_round_trips() {
    round_trip(|figure| Operation::Convert {
        target: figure.polyline,
    });
    round_trip(|figure| Operation::Convert {
        target: figure.spline,
    });
    round_trip(|figure| Operation::Convert {
        target: figure.boxed,
    });
}

#[test]
fn open_close_round_trips() {
    round_trip(|figure| Operation::OpenClose {
        target: figure.polygon,
    });
    round_trip(|figure| Operation::OpenClose {
        target: figure.arc,
    });
    round_trip(|figure| Operation::OpenClose {
        target: figure.spline,
    });
}

#[test]
fn join_round_trip() {
    round_trip(|figure| Operation::Join {
        first: figure.polyline,
        second: figure.tail,
    });
}

#[test]
fn split_round_trip() {
    round_trip(|figure| Operation::Split {
        target: figure.spline,
        index: 2,
    });
}

#[test]
fn join_and_split_share_one_undo_state() {
    let mut figure = figure();
    let editor = &mut figure.editor;
    editor
        .apply(Operation::Join {
            first: figure.polyline,
            second: figure.tail,
        })
        .unwrap();
    assert_eq!(editor.last_action(), ActionKind::JoinSplit);
    let joined = editor.latest()[0];
    let line = editor.store().get_as::<Line>(joined).unwrap();
    assert_eq!(line.points, vec![p(0, 0), p(10, 0), p(10, 10), p(30, 10)]);

    editor
        .apply(Operation::Split {
            target: joined,
            index: 2,
        })
        .unwrap();
    assert_eq!(editor.last_action(), ActionKind::JoinSplit);
    assert_eq!(editor.latest().len(), 2);
    assert!(!editor.store().contains(figure.polyline));
    assert!(!editor.store().contains(figure.tail));
}

#[test]
fn move_restores_an_arc_with_a_fractional_center() {
    round_trip(|figure| {
        let editor = &mut figure.editor;
        let skewed = editor
            .create(Arc::new(ArcKind::Open, [p(0, 0), p(1, 3), p(7, 2)]).with_style(Style::at_depth(41)))
            .unwrap();
        editor
            .apply(Operation::Add {
                entities: vec![skewed],
            })
            .unwrap();
        Operation::Move {
            entities: vec![skewed, figure.arc],
            from: p(0, 0),
            to: p(13, -7),
        }
    });
}
