use std::iter;

use eframe::egui::{
    self, CentralPanel, ClippedPrimitive, CollapsingHeader, DragValue, Frame, ScrollArea,
    SidePanel, Slider, TextureId, Ui,
};
use log::{info, warn};
use nalgebra::Point3;
use wgpu::{
    Backends, Color, CommandEncoder, CommandEncoderDescriptor, CompositeAlphaMode, Device,
    DeviceDescriptor, Dx12Compiler, Features, FilterMode, Instance, InstanceDescriptor, Limits,
    LoadOp, Operations, PowerPreference, PresentMode, Queue, RenderPassColorAttachment,
    RenderPassDescriptor, RequestAdapterOptions, Surface, SurfaceConfiguration, SurfaceError,
    TextureUsages, TextureViewDescriptor,
};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyboardInput, VirtualKeyCode, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::Window;

use crate::camera::{Camera, CameraInput, CameraSettings};
use crate::tracer::scene::{Material, Scene, Sphere};
use crate::tracer::texture::Image;
use crate::tracer::{Renderer, Settings, ShadingMode};
use crate::util::Instant;

pub struct Application {
    surface: Surface,
    device: Device,
    queue: Queue,
    config: SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    // 무조건 winit의 Window를 쓸 것!
    pub window: Window,
    egui_state: egui_winit::State,
    egui_context: egui::Context,
    egui_renderer: egui_wgpu::Renderer,
    egui_screen: egui_wgpu::renderer::ScreenDescriptor,

    camera: Camera,
    camera_input: CameraInput,
    renderer: Renderer,
    scene: Scene,
    settings: Settings,

    // 렌더러 결과를 egui에 띄우기 위한 텍스쳐
    viewport_image: Image,
    viewport_texture: TextureId,

    last_frame: Instant,
    // 카메라가 움직이거나 설정이 바뀌었을 때만 다시 그림
    needs_render: bool,
}

impl Application {
    pub async fn new(window: Window, event_loop: &EventLoop<()>) -> Self {
        let size = window.inner_size();

        // instance는 Adapter와 Surface를 만들어주며 이들에 필요한 정보를 제공함.
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::all(),                     // 모든 종류의 백엔드 허용
            dx12_shader_compiler: Dx12Compiler::default(), // DirectX 사용시, 쉐이더 컴파일러로 FXC 사용
        });

        // 전달하는 &window가 생성하는 surface보다 오래 유지되어야 함.
        // Application이 둘 다 들고 있으니 문제 없음
        let surface = unsafe { instance.create_surface(&window) }.expect("surface 생성 실패");

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .expect("사용 가능한 GPU 어댑터가 없음");

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    features: Features::empty(),
                    limits: if cfg!(target_arch = "wasm32") {
                        // 브라우저가 아직 webgpu를 제대로 지원 안하니 webgl2 기준 채택
                        Limits::downlevel_webgl2_defaults()
                    } else {
                        Limits::default()
                    },
                    label: Some("Glint GPU"),
                },
                None,
            )
            .await
            .expect("GPU 장치 요청 실패");

        let capabilities = surface.get_capabilities(&adapter);

        // 색 포맷으로 sRGB 사용
        let surface_format = capabilities
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .unwrap_or(capabilities.formats[0]);
        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: PresentMode::AutoVsync,
            alpha_mode: CompositeAlphaMode::Auto,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let egui_state = egui_winit::State::new(event_loop);
        let egui_context = egui::Context::default();

        let mut egui_renderer = egui_wgpu::Renderer::new(
            &device,
            surface_format,
            None, // 깊이 안씀
            1,    // 멀티 샘플링 1번만 할꺼임
        );
        let egui_screen = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [config.width, config.height],
            pixels_per_point: egui_context.pixels_per_point(),
        };

        // 뷰포트 크기는 첫 프레임에 egui 패널 크기를 보고 정함
        let viewport_image = Image::new(&device, 1, 1, "Glint Output");
        let viewport_texture =
            egui_renderer.register_native_texture(&device, &viewport_image.view, FilterMode::Nearest);

        let camera = Camera::new(CameraSettings::default())
            .looking_at(Point3::new(0.0, 0.0, 6.0), Point3::origin());

        info!("started with {}x{} window, {:?} surface", size.width, size.height, surface_format);

        Self {
            surface,
            device,
            queue,
            config,
            size,
            window,
            egui_state,
            egui_context,
            egui_renderer,
            egui_screen,
            camera,
            camera_input: CameraInput::default(),
            renderer: Renderer::new(),
            scene: default_scene(),
            settings: Settings::default(),
            viewport_image,
            viewport_texture,
            last_frame: Instant::now(),
            needs_render: true,
        }
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);

        self.egui_screen.pixels_per_point = self.egui_context.pixels_per_point();
        self.egui_screen.size_in_pixels = [self.config.width, self.config.height];
    }

    pub fn update(&mut self) {
        let now = Instant::now();
        let time_step = (now - self.last_frame).as_secs_f32().min(1.0 / 30.0);
        self.last_frame = now;

        if self.camera.on_update(time_step, &self.camera_input) {
            self.needs_render = true;
        }
    }

    pub fn render(&mut self) -> Result<(), SurfaceError> {
        let output = self.surface.get_current_texture()?; // 렌더링 결과를 출력할 곳

        let view = output.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Encoder"),
        });

        // render_pass가 encoder를 빌려오기 때문에 아래처럼 따로 빼지 않으면 앞으로 계속 쓸 수 없음
        {
            let primitives = self.update_egui(&mut encoder);
            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color {
                            r: 0.0,
                            g: 0.0,
                            b: 0.0,
                            a: 1.0,
                        }),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            self.egui_renderer
                .render(&mut render_pass, &primitives, &self.egui_screen)
        }

        self.queue.submit(iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    // true: 앱에서 입력 처리를 했으니 따로 관리할 필요 없음
    // false: 아래 event loop에서 처리 해야 함.
    pub fn input(&mut self, event: &WindowEvent) -> bool {
        if let WindowEvent::Focused(false) = event {
            self.camera_input.release_all();
        }

        // F12: 현재 화면을 png로 저장
        #[cfg(not(target_arch = "wasm32"))]
        {
            if let WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state: ElementState::Pressed,
                        virtual_keycode: Some(VirtualKeyCode::F12),
                        ..
                    },
                ..
            } = event
            {
                self.save_screenshot();
                return true;
            }
        }

        let egui_response = self.egui_state.on_event(&self.egui_context, event);

        // 커서 위치는 egui가 먹어도 카메라가 알고 있어야 다음 회전량이 튀지 않음
        if let WindowEvent::CursorMoved { .. } = event {
            self.camera_input.handle_event(event);
            return egui_response.consumed;
        }
        if egui_response.consumed {
            return true;
        }

        self.camera_input.handle_event(event)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn save_screenshot(&self) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|duration| duration.as_secs())
            .unwrap_or_default();
        let path = format!("glint-{timestamp}.png");

        match self.renderer.save_png(&path) {
            Ok(()) => info!("saved screenshot to {path}"),
            Err(error) => log::error!("failed to save screenshot: {error}"),
        }
    }

    /// egui 패널 크기에 맞춰 카메라, 렌더러, 텍스쳐 크기를 맞춤
    fn resize_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.camera.on_resize(width, height);
        if !self.renderer.on_resize(width, height) {
            return;
        }

        info!("viewport resized to {width}x{height}");
        if self
            .viewport_image
            .resize(&self.device, PhysicalSize::new(width, height))
        {
            self.egui_renderer.update_egui_texture_from_wgpu_texture(
                &self.device,
                &self.viewport_image.view,
                FilterMode::Nearest,
                self.viewport_texture,
            );
        }
        self.needs_render = true;
    }

    fn render_viewport(&mut self) {
        if !self.needs_render {
            return;
        }

        self.renderer
            .render(&self.camera, &self.scene, &self.settings);
        self.viewport_image
            .load_image(&self.queue, bytemuck::cast_slice(self.renderer.image_data()));
        self.needs_render = false;
    }

    fn update_egui(&mut self, encoder: &mut CommandEncoder) -> Vec<ClippedPrimitive> {
        let egui_input = self.egui_state.take_egui_input(&self.window);

        let last_render_ms = self.renderer.last_render_time().as_secs_f64() * 1000.0;
        let image_size = self.viewport_image.size();
        let texture_id = self.viewport_texture;
        let settings = &mut self.settings;
        let scene = &mut self.scene;
        let mut camera_settings = self.camera.settings().clone();
        let mut viewport = None;
        let mut changed = false;

        let egui_output = self.egui_context.run(egui_input, |ctx| {
            SidePanel::right("Settings")
                .resizable(true)
                .default_width(260.0)
                .show(ctx, |ui| {
                    ScrollArea::vertical().show(ui, |ui| {
                        changed |= settings_panel(ui, last_render_ms, settings, &mut camera_settings);
                        changed |= scene_panel(ui, scene);
                    });
                });

            CentralPanel::default().frame(Frame::none()).show(ctx, |ui| {
                let pixels_per_point = ctx.pixels_per_point();
                let available = ui.available_size() * pixels_per_point;
                viewport = Some((available.x as u32, available.y as u32));

                ui.image(
                    texture_id,
                    egui::vec2(
                        image_size.width as f32 / pixels_per_point,
                        image_size.height as f32 / pixels_per_point,
                    ),
                );
            });
        });

        if changed {
            if let Err(error) = self.scene.validate() {
                warn!("scene is invalid after edit: {error}");
            }
            self.camera.set_settings(camera_settings);
            self.needs_render = true;
        }
        if let Some((width, height)) = viewport {
            self.resize_viewport(width, height);
        }
        self.render_viewport();

        self.egui_state.handle_platform_output(
            &self.window,
            &self.egui_context,
            egui_output.platform_output,
        );
        let primitives = self.egui_context.tessellate(egui_output.shapes);
        egui_output.textures_delta.set.iter().for_each(|(id, delta)| {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, delta);
        });
        egui_output.textures_delta.free.iter().for_each(|id| {
            self.egui_renderer.free_texture(id);
        });

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            encoder,
            &primitives,
            &self.egui_screen,
        );

        primitives
    }
}

/// 처음 띄우는 장면. 분홍색 구 하나를 커다란 파란 구 위에 올려둠
fn default_scene() -> Scene {
    let mut scene = Scene::default();

    let pink = scene.push_material(Material {
        albedo: [1.0, 0.0, 1.0].into(),
        roughness: 0.0,
        ..Default::default()
    });
    let blue = scene.push_material(Material {
        albedo: [0.2, 0.3, 1.0].into(),
        roughness: 0.1,
        ..Default::default()
    });

    for sphere in [
        Sphere::new(Point3::origin(), 1.0, pink),
        Sphere::new(Point3::new(0.0, -101.0, 0.0), 100.0, blue),
    ] {
        if let Err(error) = scene.push_sphere(sphere) {
            warn!("skipping default sphere: {error}");
        }
    }

    scene
}

fn settings_panel(
    ui: &mut Ui,
    last_render_ms: f64,
    settings: &mut Settings,
    camera: &mut CameraSettings,
) -> bool {
    let mut changed = false;

    ui.label(format!("Last render: {last_render_ms:.3}ms"));
    changed |= ui.checkbox(&mut settings.flip_y, "Flip Y").changed();

    ui.horizontal(|ui| {
        ui.label("Shading");
        changed |= ui
            .radio_value(&mut settings.shading, ShadingMode::Albedo, "Albedo")
            .changed();
        changed |= ui
            .radio_value(&mut settings.shading, ShadingMode::Normals, "Normals")
            .changed();
    });

    CollapsingHeader::new("Background").show(ui, |ui| {
        ui.horizontal(|ui| {
            ui.label("Horizon");
            changed |= ui
                .color_edit_button_rgb(&mut settings.background.horizon.data.0[0])
                .changed();
        });
        ui.horizontal(|ui| {
            ui.label("Zenith");
            changed |= ui
                .color_edit_button_rgb(&mut settings.background.zenith.data.0[0])
                .changed();
        });
    });

    CollapsingHeader::new("Camera").show(ui, |ui| {
        changed |= ui
            .add(Slider::new(&mut camera.vertical_fov, 1.0..=179.0).text("Vertical FOV"))
            .changed();
        changed |= ui
            .add(Slider::new(&mut camera.near, 0.01..=10.0).text("Near"))
            .changed();
        changed |= ui
            .add(Slider::new(&mut camera.far, 10.0..=1000.0).text("Far"))
            .changed();
        changed |= ui
            .add(Slider::new(&mut camera.rotation_speed, 0.05..=2.0).text("Rotation speed"))
            .changed();
        changed |= ui
            .add(Slider::new(&mut camera.movement_speed, 0.5..=50.0).text("Movement speed"))
            .changed();
    });

    changed
}

fn scene_panel(ui: &mut Ui, scene: &mut Scene) -> bool {
    let mut changed = false;
    let material_count = scene.materials().len();

    CollapsingHeader::new("Spheres")
        .default_open(true)
        .show(ui, |ui| {
            for (index, sphere) in scene.spheres_mut().iter_mut().enumerate() {
                ui.push_id(("sphere", index), |ui| {
                    ui.label(format!("Sphere {index}"));
                    ui.horizontal(|ui| {
                        changed |= ui.add(DragValue::new(&mut sphere.position.x).speed(0.01)).changed();
                        changed |= ui.add(DragValue::new(&mut sphere.position.y).speed(0.01)).changed();
                        changed |= ui.add(DragValue::new(&mut sphere.position.z).speed(0.01)).changed();
                    });
                    changed |= ui
                        .add(
                            DragValue::new(&mut sphere.radius)
                                .speed(0.01)
                                .clamp_range(0.01..=f32::MAX)
                                .prefix("Radius: "),
                        )
                        .changed();
                    changed |= ui
                        .add(
                            DragValue::new(&mut sphere.material_index)
                                .clamp_range(0..=material_count.saturating_sub(1))
                                .prefix("Material: "),
                        )
                        .changed();
                    ui.separator();
                });
            }
        });

    CollapsingHeader::new("Materials")
        .default_open(true)
        .show(ui, |ui| {
            for (index, material) in scene.materials_mut().iter_mut().enumerate() {
                ui.push_id(("material", index), |ui| {
                    ui.horizontal(|ui| {
                        ui.label(format!("Material {index}"));
                        changed |= ui
                            .color_edit_button_rgb(&mut material.albedo.data.0[0])
                            .changed();
                    });
                    changed |= ui
                        .add(Slider::new(&mut material.roughness, 0.0..=1.0).text("Roughness"))
                        .changed();
                    changed |= ui
                        .add(Slider::new(&mut material.metallic, 0.0..=1.0).text("Metallic"))
                        .changed();
                    ui.separator();
                });
            }
        });

    ui.horizontal(|ui| {
        if ui.button("Add material").clicked() {
            scene.push_material(Material::default());
            changed = true;
        }
        if ui.button("Add sphere").clicked() {
            match scene.push_sphere(Sphere::default()) {
                Ok(_) => changed = true,
                Err(error) => warn!("cannot add sphere: {error}"),
            }
        }
    });

    changed
}
