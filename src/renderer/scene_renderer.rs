// renderer/scene_renderer.rs
//
// Owns the device and everything drawn with it, and sequences a frame:
// global constants, scene capture into the colour and normals targets, then
// either the no-op kernel straight to the back buffer or the filter passes.

use glam::Vec3;

use crate::error::{DemoError, Result, SceneElement};
use crate::input::Command;
use crate::renderer::constants::{
    color, float, matrix, point, vector, ConstantWriter, AMBIENT_COLOR, ATTENUATION,
    BACKGROUND_COLOR, BLACK, DIFFUSE_COEF, POINT_COLOR, POINT_POSITION, REG_AMBIENT_COLOR,
    REG_ATTENUATION, REG_DIFFUSE_COEF, REG_EYE, REG_MODEL_DATA, REG_POINT_COLOR,
    REG_POINT_POSITION, REG_POS_AND_ROT_MX, REG_SHADOW_ATTENUATION, REG_SHADOW_PROJ_MX,
    REG_SPECULAR_COEF, REG_SPECULAR_F, REG_VIEW_MX, SHADOW_ATTENUATION, SPECULAR_COEF,
    SPECULAR_F, STENCIL_REF_VALUE,
};
use crate::renderer::device::{
    ClearFlags, CullMode, Device, FillMode, RenderState, Resource, StencilTest, TargetId,
};
use crate::renderer::filter::{
    FilterInputs, FilterMode, FilterPipeline, NO_FILTER, SAMPLER_INDEX_TARGET,
    TARGET_INDEX_COLOR, TARGET_INDEX_NORMALS,
};
use crate::renderer::geometry::GeometryBuffer;
use crate::renderer::primitives::fullscreen_quad_mesh;
use crate::renderer::shader::{
    PixelShader, ShaderSet, VertexShader, TARGET_PIXEL_SHADER, TARGET_VERTEX_SHADER,
};
use crate::renderer::target::{InputBinding, RenderTarget};
use crate::scene::camera::Camera;
use crate::scene::model::{AnimatedModel, Animation, ModelId, Plane};
use crate::scene::transform::Transform;
use crate::settings::RenderSettings;

pub struct SceneRenderer<D: Device> {
    device: D,
    camera: Camera,
    aspect: f32,
    point_light_position: Vec3,
    point_light_enabled: bool,
    ambient_light_enabled: bool,
    wireframe: bool,
    planar_shadows: bool,
    filter_mode: FilterMode,

    plane: Option<Plane>,
    light_source: Option<AnimatedModel>,
    target_plane: Option<AnimatedModel>,
    models: Vec<(ModelId, AnimatedModel)>,
    next_model_id: u32,

    color: RenderTarget,
    normals: RenderTarget,
    filter: FilterPipeline,
    /// Everything this renderer owns on the device, in acquisition order.
    acquired: Vec<Resource>,
    constants: ConstantWriter,
}

struct Targets {
    color: RenderTarget,
    normals: RenderTarget,
    filter: FilterPipeline,
}

fn acquire_targets<D: Device>(
    device: &mut D,
    width: u32,
    height: u32,
    acquired: &mut Vec<Resource>,
) -> Result<Targets> {
    let color = RenderTarget::new(device, width, height, "ColorTarget")?;
    acquired.push(color.resource());
    let normals = RenderTarget::new(device, width, height, "NormalsTarget")?;
    acquired.push(normals.resource());
    let filter = FilterPipeline::new(device, width, height, acquired)?;
    Ok(Targets {
        color,
        normals,
        filter,
    })
}

fn initial_render_states(settings: &RenderSettings) -> [RenderState; 7] {
    let fill = if settings.wireframe {
        FillMode::Wireframe
    } else {
        FillMode::Solid
    };
    [
        RenderState::CullMode(CullMode::None),
        RenderState::StencilEnable(true),
        RenderState::StencilTest(StencilTest::Replace),
        RenderState::StencilRef(STENCIL_REF_VALUE),
        RenderState::StencilMask(0xff),
        RenderState::AlphaBlend(true),
        RenderState::FillMode(fill),
    ]
}

/// Releases `acquired` newest first.
fn release_all<D: Device + ?Sized>(device: &mut D, acquired: &[Resource]) {
    for resource in acquired.iter().rev() {
        log::debug!("Releasing {:?}", resource);
        device.release(*resource);
    }
}

/// Per-model draw: animate, upload the model block and transform, bind the
/// model's shaders and texture, submit.
fn draw_model<D: Device + ?Sized>(
    device: &mut D,
    model: &mut AnimatedModel,
    time: f32,
    shadow: bool,
    constants: &mut ConstantWriter,
) -> Result<()> {
    model.set_time(time);
    constants.clear();
    if model.write_constants(constants)? > 0 {
        device.set_vertex_constants(REG_MODEL_DATA, constants.as_slice())?;
    }
    device.set_vertex_constants(REG_POS_AND_ROT_MX, &matrix(&model.transform().matrix()))?;
    model.shaders().bind(device, shadow)?;

    match model.texture() {
        Some((sampler, target)) => {
            let mut input = InputBinding::attach(device, sampler, target)?;
            model.draw(&mut *input)?;
            input.unbind()
        }
        None => model.draw(device),
    }
}

impl<D: Device> SceneRenderer<D> {
    /// Takes ownership of `device` and acquires the render targets and
    /// filter shaders. On failure everything acquired so far is released.
    pub fn new(mut device: D, width: u32, height: u32, settings: &RenderSettings) -> Result<Self> {
        for state in initial_render_states(settings) {
            device
                .set_render_state(state)
                .map_err(|source| DemoError::init("render state", source))?;
        }

        let mut acquired = Vec::new();
        let targets = match acquire_targets(&mut device, width, height, &mut acquired) {
            Ok(targets) => targets,
            Err(err) => {
                log::error!(
                    "Initialization failed: {}; rolling back {} resources",
                    err,
                    acquired.len()
                );
                release_all(&mut device, &acquired);
                return Err(err);
            }
        };

        log::info!(
            "Scene renderer ready ({}x{}, filter {})",
            width,
            height,
            settings.initial_filter
        );

        Ok(Self {
            device,
            camera: Camera::new(settings.camera),
            aspect: width as f32 / height.max(1) as f32,
            point_light_position: POINT_POSITION,
            point_light_enabled: true,
            ambient_light_enabled: true,
            wireframe: settings.wireframe,
            planar_shadows: settings.planar_shadows,
            filter_mode: settings.initial_filter,
            plane: None,
            light_source: None,
            target_plane: None,
            models: Vec::new(),
            next_model_id: 0,
            color: targets.color,
            normals: targets.normals,
            filter: targets.filter,
            acquired,
            constants: ConstantWriter::new(),
        })
    }

    pub fn load_vertex_shader(&mut self, name: &str) -> Result<VertexShader> {
        let shader = VertexShader::new(&mut self.device, name)?;
        self.acquired.push(shader.resource());
        Ok(shader)
    }

    pub fn load_pixel_shader(&mut self, name: &str) -> Result<PixelShader> {
        let shader = PixelShader::new(&mut self.device, name)?;
        self.acquired.push(shader.resource());
        Ok(shader)
    }

    fn adopt(&mut self, resource: Resource) {
        self.acquired.push(resource);
    }

    fn discard(&mut self, resource: Resource) {
        self.acquired.retain(|owned| *owned != resource);
        self.device.release(resource);
    }

    pub fn set_plane(&mut self, plane: Plane) {
        self.adopt(plane.model().resource());
        if let Some(old) = self.plane.replace(plane) {
            self.discard(old.model().resource());
        }
    }

    pub fn set_light_source(&mut self, model: AnimatedModel) {
        self.adopt(model.resource());
        if let Some(old) = self.light_source.replace(model) {
            self.discard(old.resource());
        }
    }

    /// Builds the full-screen quad that shows the colour target.
    pub fn create_target_plane(&mut self) -> Result<()> {
        let vertex = self.load_vertex_shader(TARGET_VERTEX_SHADER)?;
        let pixel = self.load_pixel_shader(TARGET_PIXEL_SHADER)?;
        let (vertices, indices) = fullscreen_quad_mesh();
        let geometry = GeometryBuffer::new(&mut self.device, "TargetPlane", &vertices, &indices)?;
        let model = AnimatedModel::new(
            geometry,
            ShaderSet::unshadowed(vertex, pixel),
            Transform::default(),
            Animation::Static,
        )
        .with_texture(SAMPLER_INDEX_TARGET, self.color.id());
        self.adopt(model.resource());
        if let Some(old) = self.target_plane.replace(model) {
            self.discard(old.resource());
        }
        Ok(())
    }

    /// Models are drawn in the order they were added.
    pub fn add_model(&mut self, model: AnimatedModel) -> ModelId {
        let id = ModelId(self.next_model_id);
        self.next_model_id += 1;
        self.adopt(model.resource());
        self.models.push((id, model));
        id
    }

    pub fn remove_model(&mut self, id: ModelId) -> bool {
        let Some(index) = self.models.iter().position(|(model_id, _)| *model_id == id) else {
            return false;
        };
        let (_, model) = self.models.remove(index);
        self.discard(model.resource());
        true
    }

    /// Fails if the plane, light source or target plane is missing.
    pub fn ensure_ready(&self) -> Result<()> {
        let missing = if self.plane.is_none() {
            Some(SceneElement::Plane)
        } else if self.light_source.is_none() {
            Some(SceneElement::LightSource)
        } else if self.target_plane.is_none() {
            Some(SceneElement::TargetPlane)
        } else {
            None
        };
        match missing {
            Some(element) => {
                log::error!("Cannot render: no {} was set", element);
                Err(DemoError::MissingSceneElement(element))
            }
            None => Ok(()),
        }
    }

    /// Renders and presents one frame at `time` seconds.
    pub fn render_frame(&mut self, time: f32) -> Result<()> {
        self.ensure_ready()?;
        self.device.begin_scene()?;
        self.upload_global_constants()?;
        self.capture_scene(time)?;
        self.compose(time)?;
        self.device.end_scene()?;
        self.device.present()?;
        Ok(())
    }

    fn upload_global_constants(&mut self) -> Result<()> {
        let shadow = self
            .plane
            .as_ref()
            .ok_or(DemoError::MissingSceneElement(SceneElement::Plane))?
            .projection_matrix(self.point_light_position);
        let ambient = if self.ambient_light_enabled {
            AMBIENT_COLOR
        } else {
            BLACK
        };
        let point_color = if self.point_light_enabled {
            POINT_COLOR
        } else {
            BLACK
        };

        let d = &mut self.device;
        d.set_vertex_constants(REG_VIEW_MX, &matrix(&self.camera.view_proj(self.aspect)))?;
        d.set_vertex_constants(REG_DIFFUSE_COEF, &[float(DIFFUSE_COEF)])?;
        d.set_vertex_constants(REG_AMBIENT_COLOR, &[color(ambient)])?;
        d.set_vertex_constants(REG_POINT_COLOR, &[color(point_color)])?;
        d.set_vertex_constants(REG_POINT_POSITION, &[point(self.point_light_position)])?;
        d.set_vertex_constants(REG_ATTENUATION, &[vector(ATTENUATION)])?;
        d.set_vertex_constants(REG_SPECULAR_COEF, &[float(SPECULAR_COEF)])?;
        d.set_vertex_constants(REG_SPECULAR_F, &[float(SPECULAR_F)])?;
        d.set_vertex_constants(REG_EYE, &[point(self.camera.eye())])?;
        d.set_vertex_constants(REG_SHADOW_PROJ_MX, &matrix(&shadow))?;
        d.set_vertex_constants(REG_SHADOW_ATTENUATION, &[vector(SHADOW_ATTENUATION)])?;
        Ok(())
    }

    fn capture_scene(&mut self, time: f32) -> Result<()> {
        let Self {
            device,
            color: color_target,
            normals,
            plane,
            light_source,
            models,
            constants,
            planar_shadows,
            ..
        } = self;
        let Some(plane) = plane.as_mut() else {
            return Err(DemoError::MissingSceneElement(SceneElement::Plane));
        };
        let Some(light_source) = light_source.as_mut() else {
            return Err(DemoError::MissingSceneElement(SceneElement::LightSource));
        };
        let shadows = *planar_shadows;

        let mut color_output = color_target.bind_as_output(device, TARGET_INDEX_COLOR)?;
        let mut scene = normals.bind_as_output(&mut *color_output, TARGET_INDEX_NORMALS)?;
        scene.clear(ClearFlags::all(), color(BACKGROUND_COLOR), 1.0, 0)?;

        // with shadows on, only the plane marks the stencil buffer
        if shadows {
            scene.set_render_state(RenderState::StencilEnable(false))?;
        }
        draw_model(&mut *scene, light_source, time, false, constants)?;
        if shadows {
            scene.set_render_state(RenderState::StencilEnable(true))?;
        }
        draw_model(&mut *scene, plane.model_mut(), time, false, constants)?;
        if shadows {
            scene.set_render_state(RenderState::StencilEnable(false))?;
        }
        for (_, model) in models.iter_mut() {
            draw_model(&mut *scene, model, time, false, constants)?;
        }

        if shadows {
            scene.set_render_state(RenderState::StencilEnable(true))?;
            scene.set_render_state(RenderState::StencilTest(StencilTest::EqualIncrement))?;
            for (_, model) in models.iter_mut() {
                draw_model(&mut *scene, model, time, true, constants)?;
            }
            scene.set_render_state(RenderState::StencilTest(StencilTest::Replace))?;
        }

        scene.unbind()?;
        color_output.unbind()?;
        Ok(())
    }

    fn compose(&mut self, time: f32) -> Result<()> {
        let Self {
            device,
            color,
            normals,
            target_plane,
            filter,
            filter_mode,
            constants,
            ..
        } = self;
        let Some(target_plane) = target_plane.as_mut() else {
            return Err(DemoError::MissingSceneElement(SceneElement::TargetPlane));
        };

        match *filter_mode {
            FilterMode::Off => {
                NO_FILTER.upload(device, color.float_width(), color.float_height())?;
                draw_model(device, target_plane, time, false, constants)
            }
            FilterMode::Filtered { blur_iterations } => {
                let inputs = FilterInputs {
                    color,
                    normals,
                    quad: target_plane.geometry(),
                    quad_shader: target_plane.shaders().vertex,
                };
                filter.run(device, &inputs, blur_iterations)
            }
        }
    }

    /// Applies an input command. `Quit` is left to the caller.
    pub fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Quit => {}
            Command::CameraUp => self.camera.move_up(),
            Command::CameraDown => self.camera.move_down(),
            Command::CameraNearer => self.camera.move_nearer(),
            Command::CameraFarther => self.camera.move_farther(),
            Command::CameraClockwise => self.camera.move_clockwise(),
            Command::CameraCounterclockwise => self.camera.move_counterclockwise(),
            Command::MoveLight(offset) => {
                self.point_light_position += Vec3::from(offset);
                log::debug!("Point light at {:?}", self.point_light_position);
            }
            Command::SelectFilter(mode) => self.set_filter_mode(mode),
            Command::ToggleWireframe => self.set_wireframe(!self.wireframe)?,
            Command::RotateModels(delta) => self.rotate_models(delta),
            Command::TogglePointLight => {
                self.point_light_enabled = !self.point_light_enabled;
                log::info!("Point light {}", on_off(self.point_light_enabled));
            }
            Command::ToggleAmbientLight => {
                self.ambient_light_enabled = !self.ambient_light_enabled;
                log::info!("Ambient light {}", on_off(self.ambient_light_enabled));
            }
        }
        Ok(())
    }

    pub fn set_filter_mode(&mut self, mode: FilterMode) {
        if self.filter_mode != mode {
            log::info!("Filter mode: {}", mode);
            self.filter_mode = mode;
        }
    }

    pub fn set_wireframe(&mut self, wireframe: bool) -> Result<()> {
        let fill = if wireframe {
            FillMode::Wireframe
        } else {
            FillMode::Solid
        };
        self.device.set_render_state(RenderState::FillMode(fill))?;
        self.wireframe = wireframe;
        log::info!("Wireframe {}", on_off(wireframe));
        Ok(())
    }

    pub fn rotate_models(&mut self, delta: f32) {
        for (_, model) in &mut self.models {
            model.rotate(delta);
        }
    }

    /// Render targets keep their size; only the projection follows the window.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    pub fn wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn point_light_position(&self) -> Vec3 {
        self.point_light_position
    }

    pub fn point_light_enabled(&self) -> bool {
        self.point_light_enabled
    }

    pub fn ambient_light_enabled(&self) -> bool {
        self.ambient_light_enabled
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn models(&self) -> impl Iterator<Item = (ModelId, &AnimatedModel)> {
        self.models.iter().map(|(id, model)| (*id, model))
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn color_target(&self) -> TargetId {
        self.color.id()
    }

    pub fn normals_target(&self) -> TargetId {
        self.normals.id()
    }

    pub fn edges_target(&self) -> TargetId {
        self.filter.edges()
    }

    pub fn scratch_target(&self) -> TargetId {
        self.filter.scratch()
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

impl<D: Device> Drop for SceneRenderer<D> {
    fn drop(&mut self) {
        log::info!("Releasing {} device resources", self.acquired.len());
        release_all(&mut self.device, &self.acquired);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::primitives::plane_mesh;
    use crate::renderer::shader::{COLOR_PIXEL_SHADER, DIFFUSE_VERTEX_SHADER};
    use crate::renderer::software::SoftwareDevice;

    fn renderer_with_plane() -> SceneRenderer<SoftwareDevice> {
        let device = SoftwareDevice::new(4, 4);
        let mut renderer = SceneRenderer::new(device, 4, 4, &RenderSettings::default()).unwrap();
        let vertex = renderer.load_vertex_shader(DIFFUSE_VERTEX_SHADER).unwrap();
        let pixel = renderer.load_pixel_shader(COLOR_PIXEL_SHADER).unwrap();
        let (vertices, indices) = plane_mesh(2.0);
        let plane = Plane::new(
            renderer.device_mut(),
            &vertices,
            &indices,
            ShaderSet::unshadowed(vertex, pixel),
            Transform::default(),
        )
        .unwrap();
        renderer.set_plane(plane);
        renderer
    }

    #[test]
    fn capture_names_the_missing_light_source() {
        let mut renderer = renderer_with_plane();
        let err = renderer.capture_scene(0.0).unwrap_err();
        assert!(matches!(
            err,
            DemoError::MissingSceneElement(SceneElement::LightSource)
        ));
    }

    #[test]
    fn readiness_names_the_first_missing_element() {
        let renderer = renderer_with_plane();
        assert!(matches!(
            renderer.ensure_ready(),
            Err(DemoError::MissingSceneElement(SceneElement::LightSource))
        ));
    }
}
