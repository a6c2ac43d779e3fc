use glam::Vec3;

use planar_shadows::error::SceneElement;
use planar_shadows::input::Command as InputCommand;
use planar_shadows::renderer::constants::{matrix, REG_FILTER, REG_POS_AND_ROT_MX};
use planar_shadows::renderer::device::{
    FillMode, RenderState, Resource, StencilTest, Surface, TargetId,
};
use planar_shadows::renderer::filter::{FilterMode, NO_FILTER};
use planar_shadows::renderer::shader::{
    SHADOW_VERTEX_SHADER, TARGET_BLUR_PIXEL_SHADER, TARGET_EDGES_PIXEL_SHADER,
    TARGET_PIXEL_SHADER, TARGET_VERTEX_SHADER,
};
use planar_shadows::renderer::software::{Command, DrawCall, SoftwareDevice};
use planar_shadows::renderer::{Device, SceneRenderer};
use planar_shadows::scene::demo::build_demo_scene;
use planar_shadows::scene::transform::compose_transform;
use planar_shadows::settings::RenderSettings;
use planar_shadows::{DemoError, DeviceError};

const SIZE: u32 = 8;
const SCENE_DRAWS: usize = 5;

fn demo_renderer(settings: &RenderSettings) -> SceneRenderer<SoftwareDevice> {
    let device = SoftwareDevice::new(SIZE, SIZE);
    let mut renderer = SceneRenderer::new(device, SIZE, SIZE, settings).unwrap();
    build_demo_scene(&mut renderer).unwrap();
    renderer
}

fn render_and_collect(renderer: &mut SceneRenderer<SoftwareDevice>, time: f32) -> Vec<DrawCall> {
    let journal = renderer.device().journal();
    journal.borrow_mut().clear();
    renderer.render_frame(time).unwrap();
    let draws = journal.borrow().draws().cloned().collect();
    draws
}

fn created_resource(command: &Command) -> Option<Resource> {
    match command {
        Command::CreateTarget { id, .. } => Some(Resource::Target(*id)),
        Command::CreateGeometry { id, .. } => Some(Resource::Geometry(*id)),
        Command::CreateVertexShader { id, .. } => Some(Resource::VertexShader(*id)),
        Command::CreatePixelShader { id, .. } => Some(Resource::PixelShader(*id)),
        _ => None,
    }
}

fn target(id: TargetId) -> Option<Surface> {
    Some(Surface::Target(id))
}

#[test]
fn unfiltered_frame_copies_the_color_target_to_the_back_buffer() {
    let mut renderer = demo_renderer(&RenderSettings::default());
    let journal = renderer.device().journal();
    let draws = render_and_collect(&mut renderer, 0.5);

    assert_eq!(draws.len(), SCENE_DRAWS + 1);
    for draw in &draws[..SCENE_DRAWS] {
        assert_eq!(
            draw.outputs,
            [
                target(renderer.color_target()),
                target(renderer.normals_target())
            ]
        );
    }

    let last = draws.last().unwrap();
    assert_eq!(last.vertex_shader, TARGET_VERTEX_SHADER);
    assert_eq!(last.pixel_shader, TARGET_PIXEL_SHADER);
    assert_eq!(last.outputs, [Some(Surface::BackBuffer), None]);
    assert_eq!(last.textures, [Some(renderer.color_target()), None]);

    let journal = journal.borrow();
    let last_draw = journal
        .commands()
        .iter()
        .rposition(|c| matches!(c, Command::Draw(_)))
        .unwrap();
    assert_eq!(
        journal.pixel_constants_before(last_draw, REG_FILTER),
        Some(&NO_FILTER.pixel_constants()[..])
    );
}

#[test]
fn sixteen_blur_passes_alternate_targets_and_end_on_the_back_buffer() {
    let settings = RenderSettings {
        initial_filter: FilterMode::Filtered {
            blur_iterations: 16,
        },
        ..RenderSettings::default()
    };
    let mut renderer = demo_renderer(&settings);
    let draws = render_and_collect(&mut renderer, 1.0);
    assert_eq!(draws.len(), SCENE_DRAWS + 1 + 16);

    let (color, normals) = (renderer.color_target(), renderer.normals_target());
    let (edges, scratch) = (renderer.edges_target(), renderer.scratch_target());

    let edge = &draws[SCENE_DRAWS];
    assert_eq!(edge.pixel_shader, TARGET_EDGES_PIXEL_SHADER);
    assert_eq!(edge.outputs, [target(edges), None]);
    assert_eq!(edge.textures, [Some(normals), None]);

    for (i, draw) in draws[SCENE_DRAWS + 1..].iter().enumerate() {
        let iteration = i + 1;
        let (source, destination) = if iteration % 2 == 1 {
            (color, scratch)
        } else {
            (scratch, color)
        };
        assert_eq!(draw.pixel_shader, TARGET_BLUR_PIXEL_SHADER);
        assert_eq!(draw.textures, [Some(source), Some(edges)]);
        if iteration == 16 {
            assert_eq!(draw.outputs, [Some(Surface::BackBuffer), None]);
        } else {
            assert_eq!(draw.outputs, [target(destination), None]);
        }
    }
}

#[test]
fn zero_blur_iterations_still_blurs_once_into_the_back_buffer() {
    let settings = RenderSettings {
        initial_filter: FilterMode::Filtered { blur_iterations: 0 },
        ..RenderSettings::default()
    };
    let mut renderer = demo_renderer(&settings);
    let draws = render_and_collect(&mut renderer, 0.0);

    assert_eq!(draws.len(), SCENE_DRAWS + 2);
    let last = draws.last().unwrap();
    assert_eq!(last.pixel_shader, TARGET_BLUR_PIXEL_SHADER);
    assert_eq!(last.outputs, [Some(Surface::BackBuffer), None]);
    assert_eq!(
        last.textures,
        [Some(renderer.color_target()), Some(renderer.edges_target())]
    );
}

#[test]
fn bindings_are_restored_after_a_frame() {
    for filter in [
        FilterMode::Off,
        FilterMode::Filtered { blur_iterations: 4 },
    ] {
        let settings = RenderSettings {
            initial_filter: filter,
            ..RenderSettings::default()
        };
        let mut renderer = demo_renderer(&settings);
        renderer.render_frame(0.3).unwrap();

        let device = renderer.device();
        assert_eq!(device.render_target(0), Ok(Some(Surface::BackBuffer)));
        assert_eq!(device.render_target(1), Ok(None));
        assert_eq!(device.texture(0), None);
        assert_eq!(device.texture(1), None);
        assert!(device.last_presented().is_some());
    }
}

#[test]
fn shadow_pass_toggles_stencil_around_the_plane() {
    let settings = RenderSettings {
        planar_shadows: true,
        ..RenderSettings::default()
    };
    let mut renderer = demo_renderer(&settings);
    let journal = renderer.device().journal();
    journal.borrow_mut().clear();
    renderer.render_frame(0.7).unwrap();

    let journal = journal.borrow();
    let states: Vec<RenderState> = journal
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::RenderState(state) => Some(*state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        [
            RenderState::StencilEnable(false),
            RenderState::StencilEnable(true),
            RenderState::StencilEnable(false),
            RenderState::StencilEnable(true),
            RenderState::StencilTest(StencilTest::EqualIncrement),
            RenderState::StencilTest(StencilTest::Replace),
        ]
    );

    // the shadow draws come after every lit draw
    let draws: Vec<&DrawCall> = journal.draws().collect();
    let shadows: Vec<usize> = draws
        .iter()
        .enumerate()
        .filter(|(_, d)| d.vertex_shader == SHADOW_VERTEX_SHADER)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(shadows, [SCENE_DRAWS, SCENE_DRAWS + 1, SCENE_DRAWS + 2]);
}

#[test]
fn failed_construction_releases_in_reverse_order() {
    for successes in 1..6 {
        let mut device = SoftwareDevice::new(SIZE, SIZE);
        device.fail_creation_after(successes);
        let journal = device.journal();

        let err = SceneRenderer::new(device, SIZE, SIZE, &RenderSettings::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            DemoError::Initialization {
                source: DeviceError::OutOfMemory,
                ..
            }
        ));

        let journal = journal.borrow();
        let mut created: Vec<Resource> =
            journal.commands().iter().filter_map(created_resource).collect();
        assert_eq!(created.len(), successes);
        created.reverse();
        assert_eq!(journal.releases(), created);
    }
}

#[test]
fn dropping_the_renderer_releases_everything_newest_first() {
    let renderer = demo_renderer(&RenderSettings::default());
    let journal = renderer.device().journal();
    drop(renderer);

    let journal = journal.borrow();
    let mut created: Vec<Resource> =
        journal.commands().iter().filter_map(created_resource).collect();
    created.reverse();
    assert_eq!(journal.releases(), created);
}

#[test]
fn rendering_without_a_plane_fails_before_the_scene_begins() {
    let device = SoftwareDevice::new(SIZE, SIZE);
    let mut renderer = SceneRenderer::new(device, SIZE, SIZE, &RenderSettings::default()).unwrap();
    let journal = renderer.device().journal();
    journal.borrow_mut().clear();

    let err = renderer.render_frame(0.0).unwrap_err();
    assert!(matches!(
        err,
        DemoError::MissingSceneElement(SceneElement::Plane)
    ));
    assert!(journal.borrow().commands().is_empty());
}

#[test]
fn device_failures_during_a_frame_propagate() {
    let mut renderer = demo_renderer(&RenderSettings::default());
    renderer.device_mut().fail_draw_after(2);
    let err = renderer.render_frame(0.0).unwrap_err();
    assert!(matches!(err, DemoError::Device(DeviceError::SurfaceLost)));
}

#[test]
fn reselecting_a_filter_mode_changes_nothing() {
    let mut renderer = demo_renderer(&RenderSettings::default());
    let mode = FilterMode::Filtered { blur_iterations: 2 };
    renderer.apply(InputCommand::SelectFilter(mode)).unwrap();
    let first = render_and_collect(&mut renderer, 0.2);

    renderer.apply(InputCommand::SelectFilter(mode)).unwrap();
    assert_eq!(renderer.filter_mode(), mode);
    let second = render_and_collect(&mut renderer, 0.2);
    assert_eq!(first, second);
}

#[test]
fn wireframe_toggle_reaches_the_device() {
    let mut renderer = demo_renderer(&RenderSettings::default());
    let journal = renderer.device().journal();
    journal.borrow_mut().clear();

    renderer.apply(InputCommand::ToggleWireframe).unwrap();
    assert!(renderer.wireframe());
    assert_eq!(
        journal.borrow().commands(),
        &[Command::RenderState(RenderState::FillMode(
            FillMode::Wireframe
        ))]
    );
}

/// Transform uploaded for the first listed model (third draw: after the
/// light source and the plane).
fn first_model_transform(renderer: &mut SceneRenderer<SoftwareDevice>) -> Vec<[f32; 4]> {
    let journal = renderer.device().journal();
    journal.borrow_mut().clear();
    renderer.render_frame(0.0).unwrap();
    let journal = journal.borrow();
    let draw = journal
        .commands()
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, Command::Draw(_)))
        .map(|(i, _)| i)
        .nth(2)
        .unwrap();
    let uploaded = journal
        .vertex_constants_before(draw, REG_POS_AND_ROT_MX)
        .unwrap()
        .to_vec();
    uploaded
}

#[test]
fn rotating_models_changes_the_uploaded_transform() {
    let mut renderer = demo_renderer(&RenderSettings::default());
    let (_, model) = renderer.models().next().unwrap();
    let position = model.transform().position();
    let rotation = model.transform().rotation();

    let before = first_model_transform(&mut renderer);
    assert_eq!(before, matrix(&compose_transform(position, rotation)));

    renderer.apply(InputCommand::RotateModels(0.25)).unwrap();
    renderer.apply(InputCommand::RotateModels(0.5)).unwrap();
    let after = first_model_transform(&mut renderer);

    let expected = compose_transform(position, rotation + Vec3::new(0.0, 0.0, 0.75));
    let (_, model) = renderer.models().next().unwrap();
    assert!(model.transform().matrix().abs_diff_eq(expected, 1e-5));
    assert_eq!(after, matrix(&model.transform().matrix()));
    assert_ne!(after, before);
}
