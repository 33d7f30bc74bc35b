//! End-to-end viewer behavior on the headless backend

use approx::assert_relative_eq;
use devview_core::{face_barycenters, DMatrix, Error, Vector3f};
use devview_gpu::{HeadlessBackend, Program};
use devview_visualization::{
    run, DisplayMode, InputEvent, Key, Modifiers, MouseButton, ScriptedEvents, Viewer, ViewerCallbacks,
    ViewerConfig, MAX_ZOOM, MIN_ZOOM,
};
use std::cell::RefCell;

const SIZE: u32 = 400;

fn tetrahedron() -> (DMatrix<f64>, DMatrix<usize>) {
    let v = DMatrix::from_row_slice(
        4,
        3,
        &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
    );
    let f = DMatrix::from_row_slice(4, 3, &[0usize, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3]);
    (v, f)
}

fn square() -> (DMatrix<f64>, DMatrix<usize>) {
    let v = DMatrix::from_row_slice(
        4,
        3,
        &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
    );
    let f = DMatrix::from_row_slice(2, 3, &[0usize, 1, 2, 0, 2, 3]);
    (v, f)
}

fn config() -> ViewerConfig {
    ViewerConfig {
        width: SIZE,
        height: SIZE,
        target_fps: 1000,
        ..ViewerConfig::default()
    }
}

/// Launched viewer showing the tetrahedron with vertices 0 and 1 marked
fn tetrahedron_viewer() -> Viewer<HeadlessBackend> {
    let (v, f) = tetrahedron();
    let mut viewer = Viewer::new(HeadlessBackend::new(SIZE, SIZE), config()).unwrap();
    viewer.set_mesh(&v, &f, None).unwrap();
    viewer.set_marked_points(&[0, 1]).unwrap();
    viewer.launch().unwrap();
    viewer
}

/// Cursor (top-left origin) over a vertex
fn cursor_over(viewer: &Viewer<HeadlessBackend>, vertex: usize) -> [f32; 2] {
    let p = viewer.project(&viewer.mesh().vertices()[vertex]);
    [p.x, SIZE as f32 - p.y]
}

fn modifiers(shift: bool, ctrl: bool) -> InputEvent {
    InputEvent::ModifiersChanged(Modifiers {
        shift,
        ctrl,
        alt: false,
    })
}

fn press(viewer: &mut Viewer<HeadlessBackend>, at: [f32; 2], button: MouseButton) {
    viewer
        .handle_event(&InputEvent::CursorMoved { x: at[0], y: at[1] })
        .unwrap();
    viewer
        .handle_event(&InputEvent::MouseInput { button, pressed: true })
        .unwrap();
}

fn release(viewer: &mut Viewer<HeadlessBackend>, button: MouseButton) {
    viewer
        .handle_event(&InputEvent::MouseInput { button, pressed: false })
        .unwrap();
}

fn click(viewer: &mut Viewer<HeadlessBackend>, at: [f32; 2], shift: bool) {
    viewer.handle_event(&modifiers(shift, false)).unwrap();
    press(viewer, at, MouseButton::Left);
    release(viewer, MouseButton::Left);
    viewer.render_frame().unwrap();
}

fn move_to(viewer: &mut Viewer<HeadlessBackend>, at: [f32; 2]) {
    viewer
        .handle_event(&InputEvent::CursorMoved { x: at[0], y: at[1] })
        .unwrap();
}

#[test]
fn test_click_selects_point_and_miss_clears() {
    let mut viewer = tetrahedron_viewer();

    let at = cursor_over(&viewer, 0);
    click(&mut viewer, at, false);
    assert_eq!(viewer.selected_points(), &[true, false]);

    click(&mut viewer, [5.0, 5.0], false);
    assert_eq!(viewer.selected_points(), &[false, false]);
}

#[test]
fn test_shift_click_extends_selection() {
    let mut viewer = tetrahedron_viewer();
    let p0 = cursor_over(&viewer, 0);
    let p1 = cursor_over(&viewer, 1);

    click(&mut viewer, p0, false);
    click(&mut viewer, p1, true);
    assert_eq!(viewer.selected_points(), &[true, true]);

    // Point 0 is now drawn in the selected color
    click(&mut viewer, p0, true);
    assert_eq!(viewer.selected_points(), &[true, true]);

    click(&mut viewer, p1, false);
    assert_eq!(viewer.selected_points(), &[true, true]);
}

#[test]
fn test_occluded_point_cannot_be_picked() {
    let mut viewer = tetrahedron_viewer();
    let at = cursor_over(&viewer, 0);
    let x = at[0] as u32;
    let y = (SIZE as f32 - at[1]) as u32;
    viewer.backend_mut().paint(x, y, [0.3, 0.3, 0.3]);
    viewer.render_frame().unwrap();

    click(&mut viewer, at, false);
    assert_eq!(viewer.selected_points(), &[false, false]);
}

#[test]
fn test_clicks_before_launch_are_ignored() {
    let (v, f) = tetrahedron();
    let mut viewer = Viewer::new(HeadlessBackend::new(SIZE, SIZE), config()).unwrap();
    viewer.set_mesh(&v, &f, None).unwrap();
    viewer.set_marked_points(&[0, 1]).unwrap();
    let at = cursor_over(&viewer, 0);
    press(&mut viewer, at, MouseButton::Left);
    assert_eq!(viewer.selected_points(), &[false, false]);
    assert_eq!(viewer.backend().pixel_reads(), 0);
}

#[test]
fn test_drag_moves_only_selected_points() {
    let mut viewer = tetrahedron_viewer();
    let at = cursor_over(&viewer, 0);

    press(&mut viewer, at, MouseButton::Left);
    assert!(viewer.is_dragging());
    move_to(&mut viewer, [at[0] + 30.0, at[1]]);
    let first = viewer.point_translations()[0];
    assert!(first.x > 0.0);
    assert_eq!(viewer.point_translations()[1], Vector3f::zeros());

    // Increments are measured from the press, not accumulated
    move_to(&mut viewer, [at[0] + 30.0, at[1]]);
    assert_relative_eq!(viewer.point_translations()[0], first, epsilon = 1e-6);

    release(&mut viewer, MouseButton::Left);
    assert!(!viewer.is_dragging());
    assert!(viewer.take_interaction());
    assert!(!viewer.take_interaction());
}

#[test]
fn test_ctrl_drag_moves_along_depth() {
    let mut viewer = tetrahedron_viewer();
    let at = cursor_over(&viewer, 0);

    press(&mut viewer, at, MouseButton::Left);
    viewer.handle_event(&modifiers(false, true)).unwrap();
    move_to(&mut viewer, [at[0], at[1] + 40.0]);
    let t = viewer.point_translations()[0];
    assert!(t.norm() > 0.0);
    release(&mut viewer, MouseButton::Left);
}

#[test]
fn test_dragging_can_be_disabled() {
    let mut viewer = tetrahedron_viewer();
    viewer.set_dragging_enabled(false);
    let at = cursor_over(&viewer, 0);
    press(&mut viewer, at, MouseButton::Left);
    assert_eq!(viewer.selected_points(), &[true, false]);
    assert!(!viewer.is_dragging());
}

#[test]
fn test_middle_drag_pans_camera() {
    let mut viewer = tetrahedron_viewer();
    press(&mut viewer, [5.0, 5.0], MouseButton::Middle);
    move_to(&mut viewer, [45.0, 5.0]);
    assert!(viewer.camera().translation.x > 0.0);
    release(&mut viewer, MouseButton::Middle);

    // Cursor motion without a button does nothing
    let before = viewer.camera().translation;
    move_to(&mut viewer, [100.0, 100.0]);
    assert_eq!(viewer.camera().translation, before);
}

#[test]
fn test_left_drag_rotates_unless_disabled() {
    let mut viewer = tetrahedron_viewer();
    let start = viewer.camera().rotation;
    press(&mut viewer, [50.0, 200.0], MouseButton::Left);
    move_to(&mut viewer, [150.0, 200.0]);
    assert_ne!(viewer.camera().rotation, start);
    release(&mut viewer, MouseButton::Left);

    viewer.set_rotation_enabled(false);
    let start = viewer.camera().rotation;
    press(&mut viewer, [50.0, 200.0], MouseButton::Left);
    move_to(&mut viewer, [150.0, 250.0]);
    assert_eq!(viewer.camera().rotation, start);
}

#[test]
fn test_scroll_zoom_stays_clamped() {
    let mut viewer = tetrahedron_viewer();
    for _ in 0..1000 {
        viewer.handle_event(&InputEvent::Scroll { delta: 50.0 }).unwrap();
        assert!(viewer.camera().zoom() <= MAX_ZOOM);
    }
    assert_relative_eq!(viewer.camera().zoom(), MAX_ZOOM);
    for _ in 0..1000 {
        viewer.handle_event(&InputEvent::Scroll { delta: -50.0 }).unwrap();
        assert!(viewer.camera().zoom() >= MIN_ZOOM);
    }
    assert_relative_eq!(viewer.camera().zoom(), MIN_ZOOM);
}

#[test]
fn test_resize_updates_viewport_and_backend() {
    let mut viewer = tetrahedron_viewer();
    viewer
        .handle_event(&InputEvent::Resized { width: 800, height: 600 })
        .unwrap();
    assert_eq!(viewer.camera().viewport(), (800, 600));
    assert_eq!(viewer.backend().size(), (800, 600));

    // Minimized windows report zero sizes
    viewer
        .handle_event(&InputEvent::Resized { width: 0, height: 0 })
        .unwrap();
    assert_eq!(viewer.camera().viewport(), (800, 600));
}

#[test]
fn test_vertices_round_trip_and_centering() {
    let (v, f) = tetrahedron();
    let mut viewer = Viewer::new(HeadlessBackend::new(SIZE, SIZE), config()).unwrap();
    viewer.set_mesh(&v, &f, None).unwrap();

    let back = viewer.get_vertices();
    assert_eq!(back.shape(), (4, 3));
    for r in 0..4 {
        for c in 0..3 {
            assert_eq!(back[(r, c)], v[(r, c)] as f32);
        }
    }

    let shift = viewer.mesh().initial_shift();
    let centers = face_barycenters(viewer.mesh().vertices(), viewer.get_faces());
    let moved: Vec<_> = centers.iter().map(|p| shift.transform_point(p)).collect();
    let mut min = moved[0].coords;
    let mut max = moved[0].coords;
    for p in &moved {
        min = min.inf(&p.coords);
        max = max.sup(&p.coords);
        assert!(p.coords.amax() <= 1.0 + 1e-5);
    }
    assert_relative_eq!((min + max) * 0.5, Vector3f::zeros(), epsilon = 1e-5);
}

#[test]
fn test_color_row_counts() {
    let (v, f) = square();
    let mut viewer = Viewer::new(HeadlessBackend::new(SIZE, SIZE), config()).unwrap();
    viewer.set_mesh(&v, &f, None).unwrap();

    for rows in [4, 2, 6] {
        let colors = DMatrix::from_element(rows, 3, 0.5);
        assert!(viewer.set_colors(&colors).is_ok(), "{rows} rows");
    }
    let colors = DMatrix::from_element(5, 3, 0.5);
    assert!(matches!(viewer.set_colors(&colors), Err(Error::InvalidInput(_))));
    let colors = DMatrix::from_element(4, 2, 0.5);
    assert!(matches!(viewer.set_colors(&colors), Err(Error::InvalidInput(_))));
}

#[test]
fn test_tetrahedron_launches_in_vertex_mode() {
    let (v, f) = tetrahedron();
    let mut viewer = Viewer::new(HeadlessBackend::new(SIZE, SIZE), config()).unwrap();
    viewer.set_mesh(&v, &f, None).unwrap();
    viewer.launch().unwrap();
    assert!(!viewer.coloring().face_based());

    viewer.set_colors_uniform([1.0, 0.0, 0.0]).unwrap();
    viewer.render_frame().unwrap();
    viewer.set_face_based_coloring(true).unwrap();
    viewer.set_face_based_coloring(false).unwrap();
    viewer.render_frame().unwrap();
}

#[test]
fn test_modify_faces_keeps_face_based_shading() {
    let (v, f) = square();
    let mut viewer = Viewer::new(HeadlessBackend::new(SIZE, SIZE), config()).unwrap();
    viewer.set_mesh(&v, &f, None).unwrap();
    viewer.set_colors(&DMatrix::from_element(4, 3, 0.5)).unwrap();
    viewer.set_face_based_coloring(true).unwrap();
    viewer.launch().unwrap();

    viewer.modify_faces(&f, None).unwrap();
    assert!(viewer.coloring().face_based());
    assert!(!viewer.coloring().default_color_used());
}

#[test]
fn test_invalid_mesh_is_rejected() {
    let mut viewer = Viewer::new(HeadlessBackend::new(SIZE, SIZE), config()).unwrap();
    let v = DMatrix::from_element(3, 2, 0.0);
    let f = DMatrix::from_row_slice(1, 3, &[0usize, 1, 2]);
    assert!(matches!(viewer.set_mesh(&v, &f, None), Err(Error::InvalidInput(_))));

    let (v, _) = square();
    let f = DMatrix::from_row_slice(1, 3, &[0usize, 1, 7]);
    assert!(matches!(viewer.set_mesh(&v, &f, None), Err(Error::InvalidInput(_))));

    let bad = ViewerConfig {
        height: 0,
        ..config()
    };
    assert!(Viewer::new(HeadlessBackend::new(SIZE, SIZE), bad).is_err());
}

#[test]
fn test_frame_follows_display_mode_and_plots() {
    let mut viewer = tetrahedron_viewer();
    viewer.set_display_mode(DisplayMode::TextureWireframe);
    viewer
        .set_plots(
            vec!["energy".to_string(), "max error".to_string()],
            vec![vec![3.0, 2.0, 1.5], vec![1.0, 0.1, 0.01]],
        )
        .unwrap();
    viewer.set_plotting_enabled(true);
    viewer.render_frame().unwrap();

    let frame = viewer.backend().last_frame().unwrap();
    let programs: Vec<Program> = frame.draws.iter().map(|d| d.program).collect();
    assert_eq!(
        programs,
        vec![
            Program::Texture,
            Program::Lines,
            Program::Points,
            Program::PlotBackground,
            Program::PlotLines,
            Program::PlotLines,
        ]
    );
    assert_eq!(frame.clear_color, [0.9, 0.9, 0.9]);

    viewer.set_display_mode(DisplayMode::Fill);
    viewer.set_plotting_enabled(false);
    viewer.render_frame().unwrap();
    let frame = viewer.backend().last_frame().unwrap();
    let programs: Vec<Program> = frame.draws.iter().map(|d| d.program).collect();
    assert_eq!(programs, vec![Program::Fill, Program::Points]);

    assert!(viewer.set_plots(vec![], vec![vec![1.0]]).is_err());
}

#[test]
fn test_set_mesh_drops_out_of_range_marks() {
    let mut viewer = tetrahedron_viewer();
    viewer.set_marked_points(&[3]).unwrap();
    let (v, f) = square();
    let v3 = v.rows(0, 3).into_owned();
    let f3 = f.rows(0, 1).into_owned();
    viewer.set_mesh(&v3, &f3, None).unwrap();
    assert!(viewer.marked_points().is_empty());
}

#[test]
fn test_pre_draw_reports_interaction() {
    let mut viewer = tetrahedron_viewer();
    let at = cursor_over(&viewer, 0);
    let mut events = ScriptedEvents::new()
        .idle(1)
        .frame(vec![
            InputEvent::CursorMoved { x: at[0], y: at[1] },
            InputEvent::MouseInput {
                button: MouseButton::Left,
                pressed: true,
            },
        ])
        .frame(vec![InputEvent::CursorMoved {
            x: at[0] + 10.0,
            y: at[1],
        }])
        .frame(vec![InputEvent::MouseInput {
            button: MouseButton::Left,
            pressed: false,
        }])
        .idle(1);

    let flags = RefCell::new(Vec::new());
    let mut callbacks = ViewerCallbacks::new().pre_draw(|_viewer, interacted| {
        flags.borrow_mut().push(interacted);
        Ok(())
    });
    let frames = run(&mut viewer, &mut events, &mut callbacks).unwrap();
    drop(callbacks);

    assert_eq!(frames, 6);
    assert_eq!(flags.into_inner(), vec![false, false, true, true, false, false]);
    assert!(viewer.point_translations()[0].x > 0.0);
}

#[test]
fn test_keyboard_hook_can_consume_escape() {
    let mut viewer = tetrahedron_viewer();
    let escape = InputEvent::KeyInput {
        key: Key::Escape,
        pressed: true,
    };

    let mut events = ScriptedEvents::new().frame(vec![escape.clone()]).idle(2);
    let mut callbacks = ViewerCallbacks::new().keyboard(|_viewer, key, _pressed| *key == Key::Escape);
    assert_eq!(run(&mut viewer, &mut events, &mut callbacks).unwrap(), 4);

    let mut viewer = tetrahedron_viewer();
    let mut events = ScriptedEvents::new().frame(vec![escape]).idle(2);
    let frames = run(&mut viewer, &mut events, &mut ViewerCallbacks::new()).unwrap();
    assert_eq!(frames, 1);
    assert_eq!(events.remaining(), 2);
}

#[test]
fn test_snap_key_aligns_camera() {
    let mut viewer = tetrahedron_viewer();
    assert!(viewer.handle_key(&Key::Character('S')));
    let r = viewer.camera().rotation.to_rotation_matrix();
    for value in r.matrix().iter() {
        assert!(value.abs() < 1e-5 || (value.abs() - 1.0).abs() < 1e-5);
    }
}

#[test]
fn test_mouse_hook_can_swallow_clicks() {
    let mut viewer = tetrahedron_viewer();
    let at = cursor_over(&viewer, 0);
    let mut events = ScriptedEvents::new().frame(vec![
        InputEvent::CursorMoved { x: at[0], y: at[1] },
        InputEvent::MouseInput {
            button: MouseButton::Left,
            pressed: true,
        },
    ]);
    let mut callbacks = ViewerCallbacks::new().mouse(|_viewer, _event| true);
    run(&mut viewer, &mut events, &mut callbacks).unwrap();
    assert_eq!(viewer.selected_points(), &[false, false]);
    assert_eq!(viewer.input().cursor, at);
}

#[test]
fn test_solver_updates_from_pre_draw() {
    let (v, f) = tetrahedron();
    let mut viewer = tetrahedron_viewer();
    let mut step = 0;
    let mut callbacks = ViewerCallbacks::new().pre_draw(move |viewer, _interacted| {
        step += 1;
        let moved = v.map(|x| x * (1.0 + 0.1 * step as f64));
        viewer.modify_vertices(&moved)?;
        if step == 3 {
            viewer.exit();
        }
        Ok(())
    });
    let mut events = ScriptedEvents::new().without_close();
    let frames = run(&mut viewer, &mut events, &mut callbacks).unwrap();
    assert_eq!(frames, 3);
    assert_relative_eq!(viewer.get_vertices()[(1, 0)], 1.3, epsilon = 1e-6);
    assert_eq!(viewer.get_faces().len(), f.nrows());
}
