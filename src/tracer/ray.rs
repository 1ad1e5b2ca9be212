use nalgebra::{Point3, Vector3};

/// 카메라에서 쏘는 광선. `direction`이 단위 벡터일 필요는 없음
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self { origin, direction }
    }

    /// origin + t * direction
    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_walks_along_unnormalized_direction() {
        let ray = Ray::new(Point3::new(1.0, 2.0, 3.0), Vector3::new(0.0, 0.0, -2.0));

        assert_eq!(ray.at(0.0), Point3::new(1.0, 2.0, 3.0));
        assert_eq!(ray.at(1.0), Point3::new(1.0, 2.0, 1.0));
        assert_eq!(ray.at(-0.5), Point3::new(1.0, 2.0, 4.0));
    }
}
