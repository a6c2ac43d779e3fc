use planar_shadows::renderer::filter::{
    texel_offsets, FilterKernel, FilterMode, BLUR_FILTER, EDGE_FILTER,
};
use planar_shadows::renderer::software::{blur, detect_edges, Image, SoftwareDevice, Taps};
use planar_shadows::renderer::SceneRenderer;
use planar_shadows::scene::demo::build_demo_scene;
use planar_shadows::settings::RenderSettings;

// a power of two keeps the texel shifts exact
const SIZE: u32 = 16;

fn taps(kernel: &FilterKernel) -> Taps {
    Taps {
        weights: kernel.pixel_constants(),
        offsets: texel_offsets(),
    }
}

fn rendered(filter: FilterMode) -> SceneRenderer<SoftwareDevice> {
    let settings = RenderSettings {
        initial_filter: filter,
        ..RenderSettings::default()
    };
    let device = SoftwareDevice::new(SIZE, SIZE);
    let mut renderer = SceneRenderer::new(device, SIZE, SIZE, &settings).unwrap();
    build_demo_scene(&mut renderer).unwrap();
    renderer.render_frame(0.4).unwrap();
    renderer
}

fn image(renderer: &SceneRenderer<SoftwareDevice>, id: planar_shadows::renderer::TargetId) -> Image {
    renderer.device().target_image(id).unwrap().clone()
}

#[test]
fn unfiltered_output_is_the_color_target() {
    let renderer = rendered(FilterMode::Off);
    let color = image(&renderer, renderer.color_target());
    assert_eq!(renderer.device().back_buffer(), &color);
}

#[test]
fn edge_pass_matches_the_reference_detector() {
    let renderer = rendered(FilterMode::Filtered { blur_iterations: 1 });
    let normals = image(&renderer, renderer.normals_target());
    let edges = image(&renderer, renderer.edges_target());

    assert_eq!(edges, detect_edges(&normals, &taps(&EDGE_FILTER)));
    // the demo scene has silhouettes, so some edge is lit
    assert!((0..SIZE).any(|y| (0..SIZE).any(|x| edges.get(x, y)[0] > 0.0)));
}

#[test]
fn one_blur_pass_is_bit_identical_to_the_reference() {
    let renderer = rendered(FilterMode::Filtered { blur_iterations: 1 });
    let color = image(&renderer, renderer.color_target());
    let normals = image(&renderer, renderer.normals_target());

    let edges = detect_edges(&normals, &taps(&EDGE_FILTER));
    let expected = blur(&color, &edges, &taps(&BLUR_FILTER));
    assert_eq!(renderer.device().back_buffer(), &expected);
}

#[test]
fn two_blur_passes_go_through_the_scratch_target() {
    let renderer = rendered(FilterMode::Filtered { blur_iterations: 2 });
    let normals = image(&renderer, renderer.normals_target());
    let color = image(&renderer, renderer.color_target());
    let edges = detect_edges(&normals, &taps(&EDGE_FILTER));

    let once = blur(&color, &edges, &taps(&BLUR_FILTER));
    assert_eq!(image(&renderer, renderer.scratch_target()), once);

    let twice = blur(&once, &edges, &taps(&BLUR_FILTER));
    assert_eq!(renderer.device().back_buffer(), &twice);
}
