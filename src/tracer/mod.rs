use std::path::Path;
use std::time::Duration;

use image::RgbaImage;
use log::{debug, warn};
use nalgebra::{Point3, Unit, Vector3};
use rayon::prelude::*;
use thiserror::Error;

use crate::camera::Camera;
use crate::tracer::ray::Ray;
use crate::tracer::scene::{Scene, Sphere};
use crate::util::{color_to_abgr, Color, Instant};

pub mod ray;
pub mod scene;
pub mod texture;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing has been rendered yet")]
    Empty,
    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

/// 광선이 구에 맞았을 때 색을 정하는 방법
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadingMode {
    /// 재질의 albedo를 그대로 씀
    #[default]
    Albedo,
    /// 법선 벡터를 [-1, 1]에서 [0, 1]로 옮겨 색으로 씀
    Normals,
}

/// 아무것도 맞지 않은 광선이 받는 하늘색. 광선의 y 성분으로 두 색을 섞음
#[derive(Debug, Clone, PartialEq)]
pub struct Background {
    pub horizon: Color,
    pub zenith: Color,
}

impl Default for Background {
    fn default() -> Self {
        Self {
            horizon: Color::new(1.0, 1.0, 1.0),
            zenith: Color::new(0.5, 0.7, 1.0),
        }
    }
}

impl Background {
    pub fn color(&self, direction: &Vector3<f32>) -> Color {
        let t = 0.5 * (direction.normalize().y + 1.0);
        self.horizon * (1.0 - t) + self.zenith * t
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    /// 켜면 이미지의 0번째 줄이 아래쪽이 됨
    pub flip_y: bool,
    pub shading: ShadingMode,
    pub background: Background,
}

pub struct Renderer {
    image_data: Vec<u32>,
    width: u32,
    height: u32,
    last_render_time: Duration,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            image_data: vec![],
            width: 0,
            height: 0,
            last_render_time: Duration::ZERO,
        }
    }

    /// 크기가 실제로 바뀌어 버퍼를 새로 만들었으면 true
    pub fn on_resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        if width == self.width && height == self.height {
            return false;
        }

        self.width = width;
        self.height = height;
        self.image_data = vec![0; (width * height) as usize];

        true
    }

    pub fn render(&mut self, camera: &Camera, scene: &Scene, settings: &Settings) {
        if self.image_data.is_empty() {
            return;
        }
        if camera.viewport_size() != self.size() {
            warn!(
                "camera viewport {:?} does not match image size {:?}, skipping frame",
                camera.viewport_size(),
                self.size()
            );
            return;
        }

        let start = Instant::now();

        let width = self.width as usize;
        let height = self.height as usize;
        let origin = *camera.position();
        let ray_directions = camera.ray_directions();

        // 픽셀끼리는 서로 영향을 주지 않으니 줄 단위로 나눠서 병렬로 처리
        self.image_data
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(row, pixels)| {
                let y = if settings.flip_y { height - 1 - row } else { row };

                for (x, pixel) in pixels.iter_mut().enumerate() {
                    let ray = Ray::new(origin, ray_directions[y * width + x]);
                    *pixel = color_to_abgr(&Self::per_pixel(&ray, scene, settings));
                }
            });

        self.last_render_time = start.elapsed();
        debug!(
            "rendered {}x{} in {:.3}ms",
            self.width,
            self.height,
            self.last_render_time.as_secs_f64() * 1000.0
        );
    }

    // DirectX의 RayGen 쉐이더와 같음
    pub fn per_pixel(ray: &Ray, scene: &Scene, settings: &Settings) -> Color {
        let Some(hit) = Self::trace_ray(ray, scene) else {
            return settings.background.color(&ray.direction);
        };

        match settings.shading {
            ShadingMode::Albedo => scene.material_of(hit.sphere).albedo,
            ShadingMode::Normals => hit.normal.into_inner().add_scalar(1.0) * 0.5,
        }
    }

    /// 가장 가까운 구를 찾음. 거리가 같으면 장면에 먼저 있는 구가 이김
    pub fn trace_ray<'a>(ray: &Ray, scene: &'a Scene) -> Option<HitPayload<'a>> {
        let mut closest: Option<(&Sphere, f32)> = None;

        for sphere in scene.spheres() {
            let Some(distance) = sphere.intersect(ray) else {
                continue;
            };

            match closest {
                Some((_, previous_distance)) if previous_distance <= distance => {}
                _ => closest = Some((sphere, distance)),
            }
        }

        closest.map(|(sphere, distance)| Self::closest_hit(ray, distance, sphere))
    }

    fn closest_hit<'a>(ray: &Ray, distance: f32, sphere: &'a Sphere) -> HitPayload<'a> {
        let position = ray.at(distance);
        let normal = Unit::new_normalize(position - sphere.position);

        HitPayload {
            distance,
            position,
            normal,
            sphere,
        }
    }

    pub fn image_data(&self) -> &[u32] {
        &self.image_data
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn last_render_time(&self) -> Duration {
        self.last_render_time
    }

    /// 현재 버퍼를 RGBA 이미지로 복사함
    pub fn snapshot(&self) -> Option<RgbaImage> {
        let bytes = self
            .image_data
            .iter()
            .flat_map(|pixel| pixel.to_le_bytes())
            .collect();

        RgbaImage::from_raw(self.width, self.height, bytes)
    }

    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), RenderError> {
        if self.image_data.is_empty() {
            return Err(RenderError::Empty);
        }

        let image = self.snapshot().ok_or(RenderError::Empty)?;
        image.save_with_format(path, image::ImageFormat::Png)?;

        Ok(())
    }
}

// Cherno씨와 같은 디자인 선택, HitPayload는 빛의 경로에 대한 정보만 담고
// 이를 이용해 색상을 알아내는건 나중에 함
#[derive(Debug, Clone, Copy)]
pub struct HitPayload<'a> {
    pub distance: f32,
    pub position: Point3<f32>,
    pub normal: Unit<Vector3<f32>>,
    pub sphere: &'a Sphere,
}
