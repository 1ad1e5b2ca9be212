use nalgebra::{Point3, Vector3};
use thiserror::Error;

use crate::tracer::ray::Ray;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    #[error("sphere {sphere} refers to material {index}, but the scene only has {count} materials")]
    MaterialOutOfRange {
        sphere: usize,
        index: usize,
        count: usize,
    },
    #[error("sphere {sphere} has invalid radius {radius}")]
    InvalidRadius { sphere: usize, radius: f32 },
}

/// 구 여러개와 재질 목록. 구는 재질을 인덱스로 참조함
#[derive(Debug, Clone, Default)]
pub struct Scene {
    spheres: Vec<Sphere>,
    materials: Vec<Material>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sphere {
    pub position: Point3<f32>,
    pub radius: f32,
    pub material_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub albedo: Vector3<f32>,
    // 아직 어떤 쉐이더도 아래 두 값을 쓰지 않음
    pub roughness: f32,
    pub metallic: f32,
}

impl Default for Sphere {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            radius: 0.5,
            material_index: 0,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vector3::new(1.0, 1.0, 1.0),
            roughness: 1.0,
            metallic: 0.0,
        }
    }
}

impl Sphere {
    pub fn new(position: Point3<f32>, radius: f32, material_index: usize) -> Self {
        Self {
            position,
            radius,
            material_index,
        }
    }

    /// 광선이 구와 처음 만나는 지점까지의 거리 t를 구함. t <= 0이면 맞지 않은 것으로 봄
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        // 구가 원점에 있다고 가정하고 풀기 위해 광선 시작점을 옮김
        // (d·d) t^2 + 2 (o·d) t + (o·o - r^2) = 0
        let origin = ray.origin - self.position;

        let a = ray.direction.magnitude_squared();
        let half_b = origin.dot(&ray.direction);
        let c = origin.magnitude_squared() - self.radius * self.radius;

        // 판별식
        let discriminant = half_b * half_b - a * c;
        if discriminant < 0.0 {
            return None;
        }

        let distance = (-half_b - discriminant.sqrt()) / a;
        (distance > 0.0).then_some(distance)
    }

    fn validate(&self, sphere: usize, material_count: usize) -> Result<(), SceneError> {
        if !(self.radius > 0.0 && self.radius.is_finite()) {
            return Err(SceneError::InvalidRadius {
                sphere,
                radius: self.radius,
            });
        }

        if self.material_index >= material_count {
            return Err(SceneError::MaterialOutOfRange {
                sphere,
                index: self.material_index,
                count: material_count,
            });
        }

        Ok(())
    }
}

impl Scene {
    pub fn new(spheres: Vec<Sphere>, materials: Vec<Material>) -> Result<Self, SceneError> {
        let scene = Self { spheres, materials };
        scene.validate()?;
        Ok(scene)
    }

    /// 흰색 재질 하나에 구 하나만 있는 장면
    pub fn single_sphere(position: Point3<f32>, radius: f32) -> Result<Self, SceneError> {
        Self::new(
            vec![Sphere::new(position, radius, 0)],
            vec![Material::default()],
        )
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        self.spheres
            .iter()
            .enumerate()
            .try_for_each(|(index, sphere)| sphere.validate(index, self.materials.len()))
    }

    pub fn push_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn push_sphere(&mut self, sphere: Sphere) -> Result<usize, SceneError> {
        sphere.validate(self.spheres.len(), self.materials.len())?;
        self.spheres.push(sphere);
        Ok(self.spheres.len() - 1)
    }

    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// 편집기용. 길이는 바꿀 수 없고, 바꾼 뒤엔 `validate`로 확인해야 함
    pub fn spheres_mut(&mut self) -> &mut [Sphere] {
        &mut self.spheres
    }

    pub fn materials_mut(&mut self) -> &mut [Material] {
        &mut self.materials
    }

    pub fn material_of(&self, sphere: &Sphere) -> &Material {
        debug_assert!(sphere.material_index < self.materials.len());
        &self.materials[sphere.material_index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_sphere_at(z: f32) -> Sphere {
        Sphere::new(Point3::new(0.0, 0.0, z), 1.0, 0)
    }

    #[test]
    fn ray_through_center_takes_nearer_root() {
        let sphere = unit_sphere_at(-5.0);
        let ray = Ray::new(Point3::origin(), Vector3::new(0.0, 0.0, -1.0));

        // 근은 4와 6, 가까운 쪽을 골라야 함
        assert_relative_eq!(sphere.intersect(&ray).unwrap(), 4.0);
    }

    #[test]
    fn unnormalized_direction_scales_distance() {
        let sphere = unit_sphere_at(-5.0);
        let ray = Ray::new(Point3::origin(), Vector3::new(0.0, 0.0, -4.0));

        let t = sphere.intersect(&ray).unwrap();
        assert_relative_eq!(t, 1.0);
        assert_relative_eq!(ray.at(t), Point3::new(0.0, 0.0, -4.0));
    }

    #[test]
    fn radial_rays_from_any_side_hit_near_surface() {
        let sphere = Sphere::new(Point3::new(1.0, -2.0, 3.0), 0.75, 0);
        let offsets = [
            Vector3::new(3.0, 0.0, 0.0),
            Vector3::new(0.0, -2.5, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(-0.2, 4.0, -7.0),
        ];

        for offset in offsets {
            let origin = sphere.position + offset;
            let ray = Ray::new(origin, -offset * 0.5);
            let t = sphere.intersect(&ray).unwrap();

            let expected = offset.magnitude() - sphere.radius;
            assert_relative_eq!((ray.at(t) - origin).magnitude(), expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn missing_and_behind_rays_are_rejected() {
        let sphere = unit_sphere_at(-5.0);

        let sideways = Ray::new(Point3::origin(), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(sphere.intersect(&sideways), None);

        let away = Ray::new(Point3::origin(), Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(sphere.intersect(&away), None);
    }

    #[test]
    fn origin_inside_sphere_does_not_hit() {
        let sphere = unit_sphere_at(0.0);
        let ray = Ray::new(Point3::origin(), Vector3::new(0.0, 1.0, 0.0));

        assert_eq!(sphere.intersect(&ray), None);
    }

    #[test]
    fn construction_rejects_dangling_material_index() {
        let result = Scene::new(vec![Sphere::new(Point3::origin(), 1.0, 2)], vec![Material::default()]);

        assert_eq!(
            result.unwrap_err(),
            SceneError::MaterialOutOfRange {
                sphere: 0,
                index: 2,
                count: 1
            }
        );
    }

    #[test]
    fn construction_rejects_non_positive_radius() {
        let materials = vec![Material::default()];

        for radius in [0.0, -1.0, f32::NAN] {
            let result = Scene::new(vec![Sphere::new(Point3::origin(), radius, 0)], materials.clone());
            assert!(matches!(result, Err(SceneError::InvalidRadius { sphere: 0, .. })));
        }
    }

    #[test]
    fn push_sphere_validates_against_current_materials() {
        let mut scene = Scene::default();
        assert!(scene.push_sphere(Sphere::default()).is_err());

        let material = scene.push_material(Material::default());
        assert_eq!(scene.push_sphere(Sphere::default()), Ok(0));
        assert_eq!(scene.spheres()[0].material_index, material);
    }

    #[test]
    fn editing_through_slices_can_be_revalidated() {
        let mut scene = Scene::single_sphere(Point3::new(0.0, 0.0, -1.0), 0.5).unwrap();
        assert!(scene.validate().is_ok());

        scene.spheres_mut()[0].material_index = 3;
        assert!(scene.validate().is_err());
    }
}
