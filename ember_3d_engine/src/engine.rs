/// Ember3D Engine - explicit engine context
///
/// The `Engine` owns the graphics device, the model registry, the frame
/// orchestrator and the collaborator boundaries (window input, physics,
/// managed callbacks, networking). There is no global state: the host
/// creates one `Engine` at startup and drives it frame by frame.

use std::sync::Arc;
use std::time::Instant;
use bytemuck::Pod;
use glam::{Mat4, Vec3};
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use crate::callback::{CallbackRegistry, CallbackSink};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::graphics_device::{GraphicsDevice, ImageRegion, PipelineDesc, PipelineHandle, TextureFormat};
use crate::network::NetworkPump;
use crate::physics::{BodyDescriptor, BodyHandle, PhysicsWorld};
use crate::render::{FrameOrchestrator, FrameParams, FrameStats, OverlayRenderer};
use crate::resource::{Material, MeshIndex, Model, ModelHandle, ModelRegistry, Texture};
use crate::window::{InputState, WindowEvent, WindowEventSource};
use crate::{engine_error, engine_info, engine_warn};

const SOURCE: &str = "ember3d::Engine";

new_key_type! {
    /// Texture owned by the engine
    pub struct TextureHandle;
}

// ===== PUBLIC API =====

/// Engine context
///
/// # Example
///
/// ```no_run
/// use ember_3d_engine::ember3d::{Config, Engine, NullCallbackSink, WinitEventQueue};
/// # fn device() -> Box<dyn ember_3d_engine::ember3d::render::GraphicsDevice> { unimplemented!() }
///
/// let mut engine = Engine::startup(Config::default(), device(), Box::new(NullCallbackSink))?;
/// let mut events = WinitEventQueue::new();
/// engine.run(&mut events)?;
/// engine.shutdown()?;
/// # Ok::<(), ember_3d_engine::ember3d::Error>(())
/// ```
pub struct Engine {
    config: Config,
    device: Box<dyn GraphicsDevice>,
    models: ModelRegistry,
    textures: SlotMap<TextureHandle, Texture>,
    pipelines: Vec<PipelineHandle>,
    orchestrator: FrameOrchestrator,
    input: InputState,
    callbacks: CallbackRegistry,
    network: Option<NetworkPump>,
    physics: Option<Box<dyn PhysicsWorld>>,
    bodies: SecondaryMap<ModelHandle, BodyHandle>,
    params: FrameParams,
    started: Instant,
    quit_requested: bool,
}

impl Engine {
    /// Build the engine around an already created device
    ///
    /// # Errors
    ///
    /// `InitializationFailed` if the configuration is invalid or the device
    /// was created with a different frame-in-flight depth.
    pub fn startup(
        config: Config,
        device: Box<dyn GraphicsDevice>,
        callback_sink: Box<dyn CallbackSink>,
    ) -> Result<Self> {
        config.validate().map_err(Self::log_and_return_error)?;

        if device.frames_in_flight() != config.frames_in_flight {
            return Err(Self::log_and_return_error(Error::InitializationFailed(format!(
                "device has {} frames in flight, config asks for {}",
                device.frames_in_flight(),
                config.frames_in_flight
            ))));
        }

        let extent = device.swapchain_extent();
        let orchestrator = FrameOrchestrator::new(&config, extent).map_err(Self::log_and_return_error)?;

        engine_info!(
            SOURCE,
            "Engine started for '{}' ({}x{}, {} frames in flight, capabilities {:?})",
            config.app_name,
            extent.width,
            extent.height,
            config.frames_in_flight,
            config.capabilities
        );

        Ok(Self {
            config,
            device,
            models: ModelRegistry::new(),
            textures: SlotMap::with_key(),
            pipelines: Vec::new(),
            orchestrator,
            input: InputState::new(),
            callbacks: CallbackRegistry::new(callback_sink),
            network: None,
            physics: None,
            bodies: SecondaryMap::new(),
            params: FrameParams::default(),
            started: Instant::now(),
            quit_requested: false,
        })
    }

    fn log_and_return_error(error: Error) -> Error {
        engine_error!(SOURCE, "{}", error);
        error
    }

    // ===== ACCESSORS =====

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> &mut dyn GraphicsDevice {
        self.device.as_mut()
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn callbacks_mut(&mut self) -> &mut CallbackRegistry {
        &mut self.callbacks
    }

    pub fn network_mut(&mut self) -> Option<&mut NetworkPump> {
        self.network.as_mut()
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.orchestrator.stats()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    // ===== RESOURCES =====

    /// Create a pipeline and wrap it in a material; the engine destroys it at shutdown
    pub fn create_material(&mut self, desc: &PipelineDesc) -> Result<Arc<Material>> {
        let material = Material::from_pipeline_desc(self.device.as_mut(), desc)?;
        self.pipelines.push(material.pipeline());
        Ok(Arc::new(material))
    }

    pub fn create_model(&mut self, name: impl Into<String>) -> ModelHandle {
        self.models.create_model(name)
    }

    pub fn model(&self, handle: ModelHandle) -> Option<&Model> {
        self.models.model(handle)
    }

    pub fn model_mut(&mut self, handle: ModelHandle) -> Option<&mut Model> {
        self.models.model_mut(handle)
    }

    /// Upload a mesh into a model using the configured upload timeout
    ///
    /// Returns `Ok(false)` for an empty vertex list.
    pub fn add_mesh<V: Pod>(
        &mut self,
        model: ModelHandle,
        name: &str,
        vertices: &[V],
        indices: &[u32],
        material: Arc<Material>,
    ) -> Result<bool> {
        let timeout = self.config.upload_timeout;
        let target = self
            .models
            .model_mut(model)
            .ok_or_else(|| Error::InvalidResource(format!("stale model handle {:?}", model)))?;
        target.add_mesh(self.device.as_mut(), name, vertices, indices, material, timeout)
    }

    /// `add_mesh` with 16- or 32-bit indices
    pub fn add_mesh_with_indices<V: Pod, I: MeshIndex>(
        &mut self,
        model: ModelHandle,
        name: &str,
        vertices: &[V],
        indices: &[I],
        material: Arc<Material>,
    ) -> Result<bool> {
        let timeout = self.config.upload_timeout;
        let target = self
            .models
            .model_mut(model)
            .ok_or_else(|| Error::InvalidResource(format!("stale model handle {:?}", model)))?;
        target.add_mesh_with_indices(self.device.as_mut(), name, vertices, indices, material, timeout)
    }

    /// Destroy a model, its GPU buffers and its physics body link
    pub fn destroy_model(&mut self, model: ModelHandle) -> bool {
        self.bodies.remove(model);
        self.models.destroy_model(self.device.as_mut(), model)
    }

    pub fn load_texture(
        &mut self,
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: TextureFormat,
        pixels: &[u8],
    ) -> Result<TextureHandle> {
        let texture = Texture::load(
            self.device.as_mut(),
            name,
            width,
            height,
            format,
            pixels,
            self.config.upload_timeout,
        )?;
        Ok(self.textures.insert(texture))
    }

    /// Load a texture with a caller-built mip chain, level 0 first
    pub fn load_texture_mips(
        &mut self,
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: TextureFormat,
        levels: &[&[u8]],
    ) -> Result<TextureHandle> {
        let texture = Texture::load_mip_chain(
            self.device.as_mut(),
            name,
            width,
            height,
            format,
            levels,
            self.config.upload_timeout,
        )?;
        Ok(self.textures.insert(texture))
    }

    /// Copy a rectangle of `src`'s level 0 into `dst`'s level 0
    pub fn copy_texture_region(&mut self, src: TextureHandle, dst: TextureHandle, region: ImageRegion) -> Result<()> {
        let stale = |handle| Error::InvalidResource(format!("stale texture handle {:?}", handle));
        let source = self.textures.get(src).ok_or_else(|| stale(src))?;
        let target = self.textures.get(dst).ok_or_else(|| stale(dst))?;
        target.copy_region_from(self.device.as_mut(), source, region, self.config.upload_timeout)
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&Texture> {
        self.textures.get(handle)
    }

    pub fn release_texture(&mut self, handle: TextureHandle) -> bool {
        match self.textures.remove(handle) {
            Some(texture) => {
                texture.release(self.device.as_mut());
                true
            }
            None => false,
        }
    }

    // ===== COLLABORATORS =====

    pub fn attach_network(&mut self, network: NetworkPump) {
        self.network = Some(network);
    }

    pub fn attach_physics(&mut self, physics: Box<dyn PhysicsWorld>) {
        self.physics = Some(physics);
    }

    pub fn set_overlay(&mut self, overlay: Box<dyn OverlayRenderer>) {
        self.orchestrator.set_overlay(overlay);
    }

    /// Register a physics body owned by `model`
    pub fn add_body(&mut self, model: ModelHandle, desc: &BodyDescriptor) -> Result<BodyHandle> {
        if self.models.model(model).is_none() {
            return Err(Error::InvalidResource(format!("stale model handle {:?}", model)));
        }
        let physics = self
            .physics
            .as_mut()
            .ok_or_else(|| Error::InitializationFailed("no physics world attached".to_string()))?;

        let body = physics.add_body(model, desc)?;
        self.bodies.insert(model, body);
        Ok(body)
    }

    pub fn body(&self, model: ModelHandle) -> Option<BodyHandle> {
        self.bodies.get(model).copied()
    }

    pub fn set_camera(&mut self, view_projection: Mat4, position: Vec3) {
        self.params.view_projection = view_projection;
        self.params.camera_position = position;
    }

    // ===== FRAME LOOP =====

    /// Process window events and render one frame
    ///
    /// Returns `Ok(false)` once a quit was requested.
    ///
    /// # Errors
    ///
    /// Frame errors are logged and returned; `Error::is_fatal` tells whether
    /// the host must stop.
    pub fn run_frame(&mut self, window: &mut dyn WindowEventSource) -> Result<bool> {
        self.input.begin_frame();
        for event in window.poll_events() {
            match event {
                WindowEvent::Resized(extent) => self.orchestrator.handle_resize(extent),
                WindowEvent::Quit => self.quit_requested = true,
                WindowEvent::Input(input) => {
                    if self.input.apply(&input) {
                        window.set_mouse_capture(self.input.mouse_captured());
                    }
                }
            }
        }

        if self.quit_requested {
            return Ok(false);
        }

        if let Some(network) = self.network.as_mut() {
            if let Err(e) = network.pump(&mut self.callbacks) {
                engine_warn!(SOURCE, "Network pump failed: {}", e);
            }
        }

        self.params.time = self.started.elapsed().as_secs_f32();
        let draw_list = self.models.draw_list();

        match self.orchestrator.render_frame(self.device.as_mut(), &draw_list, &self.params) {
            Ok(_) => Ok(true),
            Err(e) => {
                engine_error!(SOURCE, "Frame {} failed: {}", self.orchestrator.ring().frame(), e);
                Err(e)
            }
        }
    }

    /// Run frames until quit or a fatal error
    ///
    /// Non-fatal frame errors are logged and the loop continues.
    pub fn run(&mut self, window: &mut dyn WindowEventSource) -> Result<()> {
        loop {
            match self.run_frame(window) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => {}
            }
        }
    }

    /// Drain the GPU and release every resource the engine created
    pub fn shutdown(mut self) -> Result<()> {
        let idle = self.device.wait_idle();
        if let Err(e) = &idle {
            engine_error!(SOURCE, "wait_idle failed during shutdown: {}", e);
        }

        self.models.destroy_all(self.device.as_mut());
        for (_, texture) in self.textures.drain() {
            texture.release(self.device.as_mut());
        }
        for pipeline in self.pipelines.drain(..) {
            self.device.destroy_pipeline(pipeline);
        }

        let stats = self.device.memory_stats();
        if stats.live_count > 0 {
            engine_warn!(
                SOURCE,
                "{} allocations ({} bytes) still live at shutdown",
                stats.live_count,
                stats.live_bytes
            );
        }
        engine_info!(SOURCE, "Engine shut down after {} frames", self.orchestrator.ring().frame());
        idle
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
