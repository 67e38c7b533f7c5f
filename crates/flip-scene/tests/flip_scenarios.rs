use anyhow::{Context, Result};
use flip_scene::{
    CaptureVars, Display, ElementId, ElementTree, ElementTreeExt, FitOutcome, FitVars, Flip,
    FlipEvent, FlipVars, LinearEngine, Point, PropValue, Property, Rect, SceneGraph,
    TimelineVars, TransformParts,
};

const EPSILON: f64 = 1e-6;

fn engine_flip() -> Flip {
    let mut flip = Flip::new();
    flip.register(Box::new(LinearEngine::default()));
    flip
}

fn timed(duration_ms: f64) -> FlipVars {
    FlipVars {
        timeline: TimelineVars {
            duration_ms: Some(duration_ms),
            ..TimelineVars::default()
        },
        ..FlipVars::default()
    }
}

fn page() -> (SceneGraph, ElementId) {
    let mut scene = SceneGraph::new();
    let root = scene.add_root(Rect::new(0.0, 0.0, 800.0, 600.0));
    (scene, root)
}

#[test]
fn moved_element_starts_over_its_old_box() -> Result<()> {
    let (mut scene, root) = page();
    let card = scene.add_child(root, Rect::new(0.0, 0.0, 100.0, 50.0));
    scene.set_dom_id(card, "card");

    let mut flip = engine_flip();
    let state = flip.get_state(&scene, "#card", &CaptureVars::default());
    assert_eq!(state.len(), 1);

    scene.set_flow_box(card, Rect::new(200.0, 150.0, 100.0, 50.0));
    flip.from(&mut scene, &state, timed(400.0))?;

    assert!(scene.bounding_rect(card).approx_eq(&Rect::new(0.0, 0.0, 100.0, 50.0), EPSILON));
    assert_eq!(scene.live_property(card, &Property::X), Some(PropValue::Number(-200.0)));
    assert_eq!(scene.live_property(card, &Property::Y), Some(PropValue::Number(-150.0)));

    flip.update(&mut scene, 200.0);
    assert!(scene.bounding_rect(card).approx_eq(&Rect::new(100.0, 75.0, 100.0, 50.0), EPSILON));

    flip.update(&mut scene, 200.0);
    assert!(scene.bounding_rect(card).approx_eq(&Rect::new(200.0, 150.0, 100.0, 50.0), EPSILON));
    assert!(!flip.is_flipping(card));
    Ok(())
}

#[test]
fn from_an_unchanged_capture_is_the_identity() -> Result<()> {
    let (mut scene, root) = page();
    let el = scene.add_child(root, Rect::new(40.0, 40.0, 120.0, 80.0));
    scene.set_base_transform(
        el,
        TransformParts {
            rotation: 30.0,
            scale_x: 1.5,
            ..TransformParts::IDENTITY
        },
    );
    let before = scene.bounding_rect(el);

    let mut flip = engine_flip();
    let state = flip.get_state(&scene, el, &CaptureVars::default());
    flip.from(&mut scene, &state, timed(100.0))?;

    assert!(scene.bounding_rect(el).approx_eq(&before, EPSILON));
    flip.update(&mut scene, 50.0);
    assert!(scene.bounding_rect(el).approx_eq(&before, EPSILON));
    Ok(())
}

#[test]
fn make_absolute_keeps_elements_in_place() {
    let (mut scene, root) = page();
    let first = scene.add_child(root, Rect::new(0.0, 0.0, 50.0, 50.0));
    let second = scene.add_child(root, Rect::new(50.0, 50.0, 20.0, 20.0));
    let flip = Flip::new();

    let changed = flip.make_absolute(&mut scene, vec![first, second]);
    assert_eq!(changed, vec![first, second]);
    let inline = scene.inline_style(second);
    assert_eq!((inline.left, inline.top), (Some(50.0), Some(50.0)));
    assert_eq!((inline.width, inline.height), (Some(20.0), Some(20.0)));
    assert!(scene.bounding_rect(second).approx_eq(&Rect::new(50.0, 50.0, 20.0, 20.0), EPSILON));
    assert!(scene.computed_style(second).position.is_out_of_flow());

    // Already absolute: nothing to do.
    assert!(flip.make_absolute(&mut scene, second).is_empty());
}

#[test]
fn fit_get_vars_reports_without_mutating() -> Result<()> {
    let (mut scene, root) = page();
    let small = scene.add_child(root, Rect::new(0.0, 0.0, 100.0, 50.0));
    let large = scene.add_child(root, Rect::new(300.0, 300.0, 200.0, 100.0));
    let inline_before = scene.inline_style(small);

    let mut flip = Flip::new();
    let outcome = flip.fit(
        &mut scene,
        small,
        large.into(),
        FitVars {
            scale: true,
            get_vars: true,
            ..FitVars::default()
        },
    )?;
    let FitOutcome::Vars { delta, values } = outcome else {
        panic!("expected computed values, got {outcome:?}");
    };
    assert!((delta.scale_x - 2.0).abs() < EPSILON);
    assert!((delta.scale_y - 2.0).abs() < EPSILON);
    assert!((values.scale_x - 2.0).abs() < EPSILON);
    assert_eq!(scene.inline_style(small), inline_before);
    Ok(())
}

#[test]
fn fit_onto_own_state_reports_identity_delta() -> Result<()> {
    let (mut scene, root) = page();
    let card = scene.add_child(root, Rect::new(40.0, 20.0, 100.0, 50.0));
    scene.set_base_transform(
        card,
        TransformParts {
            x: 7.0,
            rotation: 30.0,
            ..TransformParts::default()
        },
    );

    let mut flip = Flip::new();
    let state = flip.get_state(&scene, card, &CaptureVars::default());
    let own = state
        .get_element_state(card)
        .context("card was not captured")?;
    let outcome = flip.fit(
        &mut scene,
        card,
        own.into(),
        FitVars {
            scale: true,
            get_vars: true,
            ..FitVars::default()
        },
    )?;
    let FitOutcome::Vars { delta, values } = outcome else {
        panic!("expected computed values, got {outcome:?}");
    };
    assert!(delta.is_identity(1e-4), "delta {delta:?}");
    assert!((values.x - 7.0).abs() < EPSILON);
    assert!((values.rotation - 30.0).abs() < 1e-4);
    Ok(())
}

#[test]
fn nested_children_keep_their_rendered_size() -> Result<()> {
    let (mut scene, root) = page();
    let panel = scene.add_child(root, Rect::new(0.0, 0.0, 100.0, 100.0));
    let label = scene.add_child(panel, Rect::new(10.0, 10.0, 40.0, 20.0));

    let mut flip = engine_flip();
    let state = flip.get_state(&scene, panel, &CaptureVars::default());
    scene.set_flow_box(panel, Rect::new(0.0, 0.0, 300.0, 300.0));

    flip.from(
        &mut scene,
        &state,
        FlipVars {
            scale: true,
            nested: true,
            ..timed(100.0)
        },
    )?;
    let panel_box = scene.bounding_rect(panel);
    assert!(panel_box.approx_eq(&Rect::new(0.0, 0.0, 100.0, 100.0), EPSILON));
    let label_box = scene.bounding_rect(label);
    assert!((label_box.width - 40.0).abs() < EPSILON);
    assert!((label_box.height - 20.0).abs() < EPSILON);
    assert!(flip.is_flipping(label));

    flip.update(&mut scene, 100.0);
    let label_box = scene.bounding_rect(label);
    assert!((label_box.width - 40.0).abs() < EPSILON);
    assert_eq!(scene.live_property(label, &Property::ScaleX), Some(PropValue::Number(1.0)));
    Ok(())
}

#[test]
fn complete_flips_is_synchronous_and_idempotent() -> Result<()> {
    let (mut scene, root) = page();
    let el = scene.add_child(root, Rect::new(0.0, 0.0, 40.0, 40.0));
    let mut flip = engine_flip();
    let state = flip.get_state(&scene, el, &CaptureVars::default());

    assert_eq!(flip.complete_flips(&mut scene, &state), 0);

    scene.set_flow_box(el, Rect::new(0.0, 400.0, 40.0, 40.0));
    let id = flip.from(&mut scene, &state, timed(1000.0))?;
    assert_eq!(flip.get_by_target(el).map(|t| t.id), Some(id));

    assert_eq!(flip.complete_flips(&mut scene, &state), 1);
    assert!(scene.bounding_rect(el).approx_eq(&Rect::new(0.0, 400.0, 40.0, 40.0), EPSILON));
    assert!(flip.get_by_target(el).is_none());
    assert_eq!(flip.complete_flips(&mut scene, &state), 0);
    Ok(())
}

#[test]
fn newer_flip_takes_over_the_element() -> Result<()> {
    let (mut scene, root) = page();
    let el = scene.add_child(root, Rect::new(0.0, 0.0, 40.0, 40.0));
    let mut flip = engine_flip();

    let first_state = flip.get_state(&scene, el, &CaptureVars::default());
    scene.set_flow_box(el, Rect::new(100.0, 0.0, 40.0, 40.0));
    let first = flip.from(&mut scene, &first_state, timed(100.0))?;
    flip.update(&mut scene, 50.0);

    let second_state = flip.get_state(&scene, el, &CaptureVars::default());
    scene.set_flow_box(el, Rect::new(200.0, 0.0, 40.0, 40.0));
    let second = flip.from(&mut scene, &second_state, timed(100.0))?;

    assert!(flip.timeline(first).is_none());
    assert_eq!(flip.get_by_target(el).map(|t| t.id), Some(second));
    // Starts from where the interrupted flip was captured mid-flight.
    assert!(scene.bounding_rect(el).approx_eq(&Rect::new(50.0, 0.0, 40.0, 40.0), EPSILON));

    let events: Vec<FlipEvent> = flip.drain_events().collect();
    let kinds: Vec<(bool, _)> = events.iter().map(|e| (e.is_started(), e.timeline_id())).collect();
    assert_eq!(kinds, vec![(true, first), (false, first), (true, second)]);
    Ok(())
}

#[test]
fn captured_style_props_are_tweened() -> Result<()> {
    let (mut scene, root) = page();
    let el = scene.add_child(root, Rect::new(0.0, 0.0, 40.0, 40.0));
    scene.set_style(el, "background-color", "#ff0000");

    let mut flip = engine_flip();
    let state = flip.get_state(
        &scene,
        el,
        &CaptureVars {
            props: Some("background-color".into()),
            ..CaptureVars::default()
        },
    );
    scene.set_style(el, "background-color", "#0000ff");
    flip.from(&mut scene, &state, timed(100.0))?;

    let prop = Property::Style("background-color".into());
    assert_eq!(scene.live_property(el, &prop), Some(PropValue::Color([1.0, 0.0, 0.0, 1.0])));
    flip.update(&mut scene, 50.0);
    let mid = scene
        .live_property(el, &prop)
        .and_then(|v| v.as_color())
        .expect("color");
    assert!((mid[0] - 0.5).abs() < 0.01 && (mid[2] - 0.5).abs() < 0.01);
    flip.update(&mut scene, 50.0);
    assert_eq!(scene.live_property(el, &prop), Some(PropValue::Color([0.0, 0.0, 1.0, 1.0])));
    Ok(())
}

#[test]
fn leaving_elements_fade_out_then_hide() -> Result<()> {
    let (mut scene, root) = page();
    let keep = scene.add_child(root, Rect::new(0.0, 0.0, 40.0, 40.0));
    let drop = scene.add_child(root, Rect::new(0.0, 50.0, 40.0, 40.0));
    scene.set_dom_id(keep, "keep").set_dom_id(drop, "drop");

    let mut flip = engine_flip();
    let state = flip.get_state(&scene, "#keep, #drop", &CaptureVars::default());
    scene.set_display(drop, Display::None);
    scene.set_flow_box(keep, Rect::new(0.0, 50.0, 40.0, 40.0));

    flip.from(
        &mut scene,
        &state,
        FlipVars {
            fade: true,
            absolute_on_leave: true,
            ..timed(100.0)
        },
    )?;
    assert!(scene.is_rendered(drop));
    assert!(scene.computed_style(drop).position.is_out_of_flow());
    assert!(scene.bounding_rect(drop).approx_eq(&Rect::new(0.0, 50.0, 40.0, 40.0), EPSILON));

    flip.update(&mut scene, 50.0);
    assert!((scene.computed_style(drop).opacity - 0.5).abs() < EPSILON);

    flip.update(&mut scene, 50.0);
    assert!(!scene.is_rendered(drop));
    assert_eq!(scene.inline_style(drop), Default::default());
    Ok(())
}

#[test]
fn convert_point_through_transformed_parents() -> Result<()> {
    let (mut scene, root) = page();
    let a = scene.add_child(root, Rect::new(100.0, 100.0, 100.0, 100.0));
    let b = scene.add_child(root, Rect::new(400.0, 50.0, 50.0, 50.0));
    scene.set_base_transform(
        b,
        TransformParts {
            rotation: 90.0,
            scale_x: 2.0,
            scale_y: 2.0,
            ..TransformParts::IDENTITY
        },
    );
    let flip = Flip::new();

    let p = Point::new(10.0, 20.0);
    let there = flip.convert_point(&scene, a, b, p)?;
    let back = flip.convert_point(&scene, b, a, there)?;
    assert!(back.approx_eq(&p, 1e-9));

    let detached = scene.add_child(root, Rect::ZERO);
    scene.remove(detached);
    assert!(flip.convert_coordinates(&scene, a, detached).is_err());
    Ok(())
}

#[test]
fn state_update_is_idempotent_and_keeps_identity() {
    let (mut scene, root) = page();
    let items: Vec<ElementId> = (0..3)
        .map(|i| scene.add_child(root, Rect::new(0.0, 60.0 * i as f64, 50.0, 50.0)))
        .collect();
    let flip = Flip::new();
    let mut state = flip.get_state(&scene, items.clone(), &CaptureVars::default());
    let ids: Vec<String> = state.element_states.iter().map(|s| s.id.clone()).collect();

    scene.set_flow_box(items[1], Rect::new(300.0, 0.0, 50.0, 50.0));
    state.update(&scene);
    let once = state.element_states.clone();
    state.update(&scene);

    assert_eq!(state.element_states, once);
    assert_eq!(state.targets, items);
    assert_eq!(
        state.element_states.iter().map(|s| s.id.clone()).collect::<Vec<_>>(),
        ids
    );
    assert!(state.element_states[1].bounds.approx_eq(&Rect::new(300.0, 0.0, 50.0, 50.0), EPSILON));
}

#[test]
fn fit_with_scale_matches_target_box() -> Result<()> {
    let (mut scene, root) = page();
    let holder = scene.add_child(root, Rect::new(50.0, 50.0, 400.0, 400.0));
    scene.set_base_transform(
        holder,
        TransformParts {
            rotation: 45.0,
            ..TransformParts::IDENTITY
        },
    );
    let el = scene.add_child(holder, Rect::new(10.0, 10.0, 60.0, 30.0));
    let target = scene.add_child(root, Rect::new(500.0, 100.0, 120.0, 60.0));

    let mut flip = Flip::new();
    flip.fit(
        &mut scene,
        el,
        target.into(),
        FitVars {
            scale: true,
            ..FitVars::default()
        },
    )?;
    assert!(scene.bounding_rect(el).approx_eq(&scene.bounding_rect(target), 1e-6));
    Ok(())
}
