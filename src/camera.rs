use log::debug;
use nalgebra::{
    Isometry3, Matrix4, Perspective3, Point2, Point3, Unit, UnitQuaternion, Vector2, Vector3,
    Vector4,
};
use rayon::prelude::*;
use winit::event::{ElementState, KeyboardInput, MouseButton, VirtualKeyCode, WindowEvent};

/// 마우스 이동량(픽셀)을 회전량으로 바꿀 때 곱하는 값
const MOUSE_SENSITIVITY: f32 = 0.002;

#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    /// 수직 시야각. 단위는 도(degree)
    pub vertical_fov: f32,
    pub near: f32,
    pub far: f32,
    pub rotation_speed: f32,
    pub movement_speed: f32,
    /// Shift를 누르고 있을 때 이동 속도에 곱해짐
    pub boost_multiplier: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            vertical_fov: 45.0,
            near: 0.1,
            far: 100.0,
            rotation_speed: 0.3,
            movement_speed: 5.0,
            boost_multiplier: 3.0,
        }
    }
}

/// 셸이 매 프레임 채워주는 입력 상태. 카메라는 `Camera::on_update`에서만 읽음
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraInput {
    pub mouse: Point2<f32>,
    /// 회전 버튼(우클릭)을 누르고 있는지
    pub rotating: bool,

    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub boost: bool,
}

impl Default for CameraInput {
    fn default() -> Self {
        Self {
            mouse: Point2::origin(),
            rotating: false,
            forward: false,
            backward: false,
            left: false,
            right: false,
            up: false,
            down: false,
            boost: false,
        }
    }
}

impl CameraInput {
    // true: 카메라 입력으로 처리함
    // false: 카메라랑 상관 없는 이벤트
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse = Point2::new(position.x as f32, position.y as f32);
                true
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Right,
                ..
            } => {
                self.rotating = matches!(state, ElementState::Pressed);
                true
            }
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state,
                        virtual_keycode: Some(key),
                        ..
                    },
                ..
            } => {
                let is_press = matches!(state, ElementState::Pressed);
                match key {
                    VirtualKeyCode::W => self.forward = is_press,
                    VirtualKeyCode::S => self.backward = is_press,
                    VirtualKeyCode::A => self.left = is_press,
                    VirtualKeyCode::D => self.right = is_press,
                    VirtualKeyCode::E | VirtualKeyCode::Space => self.up = is_press,
                    VirtualKeyCode::Q | VirtualKeyCode::LControl => self.down = is_press,
                    VirtualKeyCode::LShift | VirtualKeyCode::RShift => self.boost = is_press,
                    _ => return false,
                };
                true
            }
            _ => false,
        }
    }

    /// 창이 포커스를 잃으면 눌린 키 상태를 믿을 수 없으니 모두 뗌
    pub fn release_all(&mut self) {
        *self = Self {
            mouse: self.mouse,
            ..Default::default()
        };
    }
}

pub struct Camera {
    settings: CameraSettings,

    projection: Perspective3<f32>,
    view: Isometry3<f32>,

    position: Point3<f32>,
    forward: Unit<Vector3<f32>>,

    // 픽셀마다 미리 계산해둔 월드 공간 광선 방향. 길이는 언제나 width * height
    ray_directions: Vec<Vector3<f32>>,
    last_mouse: Option<Point2<f32>>,

    viewport_width: u32,
    viewport_height: u32,
}

impl Camera {
    /// 원점에서 -Z를 바라보는 카메라. 뷰포트 크기는 `on_resize`가 불릴 때 정해짐
    pub fn new(settings: CameraSettings) -> Self {
        let position = Point3::origin();
        let forward = -Vector3::z_axis();

        let mut camera = Self {
            projection: Self::build_projection(&settings, 1.0),
            view: Self::build_view(&position, &forward),
            settings,
            position,
            forward,
            ray_directions: vec![],
            last_mouse: None,
            viewport_width: 0,
            viewport_height: 0,
        };
        camera.reevaluate_rays();

        camera
    }

    pub fn looking_at(mut self, position: Point3<f32>, target: Point3<f32>) -> Self {
        self.position = position;
        self.forward = Unit::new_normalize(target - position);

        self.reevaluate_view();
        self.reevaluate_rays();

        self
    }

    pub fn on_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if width == self.viewport_width && height == self.viewport_height {
            return;
        }

        debug!("camera viewport resized to {width}x{height}");
        self.viewport_width = width;
        self.viewport_height = height;

        self.reevaluate_projection();
        self.reevaluate_rays();
    }

    /// 입력에 따라 카메라를 움직이고, 실제로 움직였으면 true를 돌려줌
    pub fn on_update(&mut self, time_step: f32, input: &CameraInput) -> bool {
        let mouse_delta = self
            .last_mouse
            .map_or_else(Vector2::zeros, |last| input.mouse - last)
            * MOUSE_SENSITIVITY;
        self.last_mouse = Some(input.mouse);

        let up = Vector3::y_axis();
        let right = Unit::new_normalize(self.forward.cross(&up));
        let mut moved = false;

        let mut direction = Vector3::<f32>::zeros();
        if input.forward {
            direction += self.forward.as_ref();
        }
        if input.backward {
            direction -= self.forward.as_ref();
        }
        if input.right {
            direction += right.as_ref();
        }
        if input.left {
            direction -= right.as_ref();
        }
        if input.up {
            direction += up.as_ref();
        }
        if input.down {
            direction -= up.as_ref();
        }

        let mut speed = self.settings.movement_speed * time_step;
        if input.boost {
            speed *= self.settings.boost_multiplier;
        }

        let translation = direction * speed;
        if translation != Vector3::zeros() {
            self.position += translation;
            moved = true;
        }

        if input.rotating && mouse_delta != Vector2::zeros() {
            let pitch_delta = mouse_delta.y * self.rotation_speed(); // 아래로 움직이면 양수
            let yaw_delta = mouse_delta.x * self.rotation_speed(); // 오른쪽으로 움직이면 양수

            let rotation = UnitQuaternion::from_axis_angle(&right, -pitch_delta)
                * UnitQuaternion::from_axis_angle(&up, -yaw_delta);

            self.forward = rotation * self.forward;
            self.forward.renormalize_fast();
            moved = true;
        }

        if moved {
            self.reevaluate_view();
            self.reevaluate_rays();
        }

        moved
    }

    pub fn rotation_speed(&self) -> f32 {
        self.settings.rotation_speed
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// 시야각이나 클리핑 평면이 바뀌면 투영과 광선을 다시 계산함
    pub fn set_settings(&mut self, settings: CameraSettings) {
        if settings == self.settings {
            return;
        }

        self.settings = settings;
        self.reevaluate_projection();
        self.reevaluate_rays();
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection.to_homogeneous()
    }

    pub fn inverse_projection(&self) -> Matrix4<f32> {
        self.projection.inverse()
    }

    pub fn view(&self) -> Matrix4<f32> {
        self.view.to_homogeneous()
    }

    pub fn inverse_view(&self) -> Matrix4<f32> {
        self.view.inverse().to_homogeneous()
    }

    pub fn position(&self) -> &Point3<f32> {
        &self.position
    }

    pub fn forward(&self) -> &Unit<Vector3<f32>> {
        &self.forward
    }

    pub fn ray_directions(&self) -> &[Vector3<f32>] {
        &self.ray_directions
    }

    pub fn viewport_size(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    fn build_projection(settings: &CameraSettings, aspect: f32) -> Perspective3<f32> {
        Perspective3::new(
            aspect,
            settings.vertical_fov.to_radians(),
            settings.near,
            settings.far,
        )
    }

    fn build_view(position: &Point3<f32>, forward: &Unit<Vector3<f32>>) -> Isometry3<f32> {
        let target = position + forward.as_ref();
        Isometry3::look_at_rh(position, &target, &Vector3::y_axis())
    }

    fn reevaluate_projection(&mut self) {
        // 뷰포트가 아직 없으면 일단 정사각형으로 둠
        let aspect = if self.viewport_width == 0 || self.viewport_height == 0 {
            1.0
        } else {
            self.viewport_width as f32 / self.viewport_height as f32
        };

        self.projection = Self::build_projection(&self.settings, aspect);
    }

    fn reevaluate_view(&mut self) {
        self.view = Self::build_view(&self.position, &self.forward);
    }

    fn reevaluate_rays(&mut self) {
        let width = self.viewport_width;
        let height = self.viewport_height;
        let inverse_projection = self.projection.inverse();
        let inverse_view = self.view.inverse();

        self.ray_directions = (0..(width * height) as usize)
            .into_par_iter()
            .map(|index| {
                let x = index as u32 % width;
                let y = index as u32 / width;

                // 픽셀 중심 기준 [-1, 1] 좌표. 이미지의 0번째 줄이 위쪽이 되도록 y를 뒤집음
                let coord = Vector2::new(
                    (x as f32 + 0.5) / width as f32,
                    (y as f32 + 0.5) / height as f32,
                ) * 2.0
                    - Vector2::repeat(1.0);

                let target = inverse_projection * Vector4::new(coord.x, -coord.y, 1.0, 1.0);
                let direction = (target.xyz() / target.w).normalize();

                inverse_view.transform_vector(&direction).normalize()
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera_with_fov(vertical_fov: f32) -> Camera {
        Camera::new(CameraSettings {
            vertical_fov,
            ..Default::default()
        })
    }

    #[test]
    fn new_camera_has_no_rays_until_resized() {
        let camera = Camera::new(CameraSettings::default());

        assert!(camera.ray_directions().is_empty());
        assert_eq!(camera.viewport_size(), (0, 0));
        assert_eq!(*camera.position(), Point3::origin());
        assert_relative_eq!(camera.forward().into_inner(), Vector3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn resize_rebuilds_cache_without_moving() {
        let mut camera = Camera::new(CameraSettings::default())
            .looking_at(Point3::new(1.0, 2.0, 3.0), Point3::origin());
        let position = *camera.position();
        let view = camera.view();

        camera.on_resize(16, 9);
        assert_eq!(camera.ray_directions().len(), 16 * 9);

        camera.on_resize(7, 31);
        assert_eq!(camera.ray_directions().len(), 7 * 31);
        assert_eq!(*camera.position(), position);
        assert_eq!(camera.view(), view);
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let mut camera = Camera::new(CameraSettings::default());
        camera.on_resize(8, 8);

        camera.on_resize(0, 8);
        camera.on_resize(8, 0);

        assert_eq!(camera.viewport_size(), (8, 8));
        assert_eq!(camera.ray_directions().len(), 64);
    }

    #[test]
    fn same_size_resize_keeps_cache() {
        let mut camera = Camera::new(CameraSettings::default());
        camera.on_resize(10, 5);
        let before = camera.ray_directions().as_ptr();

        camera.on_resize(10, 5);

        assert_eq!(camera.ray_directions().as_ptr(), before);
    }

    #[test]
    fn idle_update_reports_no_movement() {
        let mut camera = Camera::new(CameraSettings::default());
        camera.on_resize(4, 4);
        let view = camera.view();

        let input = CameraInput::default();
        assert!(!camera.on_update(0.0, &input));
        assert!(!camera.on_update(0.0, &input));
        assert_eq!(camera.view(), view);
    }

    #[test]
    fn held_key_without_time_does_not_move() {
        let mut camera = Camera::new(CameraSettings::default());
        let input = CameraInput {
            forward: true,
            ..Default::default()
        };

        assert!(!camera.on_update(0.0, &input));
        assert_eq!(*camera.position(), Point3::origin());
    }

    #[test]
    fn forward_key_moves_along_view_direction() {
        let mut camera = Camera::new(CameraSettings::default());
        camera.on_resize(4, 4);
        let view = camera.view();

        let mut input = CameraInput {
            forward: true,
            ..Default::default()
        };
        assert!(camera.on_update(0.1, &input));
        assert_relative_eq!(*camera.position(), Point3::new(0.0, 0.0, -0.5), epsilon = 1e-6);
        assert_ne!(camera.view(), view);

        input.boost = true;
        assert!(camera.on_update(0.1, &input));
        assert_relative_eq!(*camera.position(), Point3::new(0.0, 0.0, -2.0), epsilon = 1e-5);
    }

    #[test]
    fn strafe_and_vertical_keys_use_right_and_up() {
        let mut camera = Camera::new(CameraSettings::default());
        let input = CameraInput {
            right: true,
            up: true,
            ..Default::default()
        };

        assert!(camera.on_update(0.2, &input));
        assert_relative_eq!(*camera.position(), Point3::new(1.0, 1.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn mouse_only_rotates_while_button_held() {
        let mut camera = Camera::new(CameraSettings::default());
        camera.on_resize(4, 4);

        let mut input = CameraInput {
            mouse: Point2::new(100.0, 100.0),
            ..Default::default()
        };
        // 첫 호출은 기준 위치만 기억함
        assert!(!camera.on_update(0.016, &input));

        input.mouse = Point2::new(150.0, 100.0);
        assert!(!camera.on_update(0.016, &input));
        assert_relative_eq!(camera.forward().into_inner(), Vector3::new(0.0, 0.0, -1.0));

        input.rotating = true;
        input.mouse = Point2::new(200.0, 100.0);
        assert!(camera.on_update(0.016, &input));

        // 오른쪽으로 끌면 오른쪽을 바라봄
        let forward = camera.forward();
        assert!(forward.x > 0.0);
        assert_relative_eq!(forward.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(forward.magnitude(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn dragging_down_pitches_down() {
        let mut camera = Camera::new(CameraSettings::default());
        let mut input = CameraInput {
            rotating: true,
            ..Default::default()
        };
        camera.on_update(0.0, &input);

        input.mouse = Point2::new(0.0, 40.0);
        assert!(camera.on_update(0.0, &input));
        assert!(camera.forward().y < 0.0);
    }

    #[test]
    fn rays_are_unit_length() {
        let mut camera = Camera::new(CameraSettings::default())
            .looking_at(Point3::new(0.0, 0.0, 3.0), Point3::new(1.0, 0.5, 0.0));
        camera.on_resize(13, 7);

        for direction in camera.ray_directions() {
            assert_relative_eq!(direction.magnitude(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn center_pixel_looks_forward() {
        let mut camera = Camera::new(CameraSettings::default());
        camera.on_resize(3, 3);

        assert_relative_eq!(
            camera.ray_directions()[4],
            Vector3::new(0.0, 0.0, -1.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn pixel_centers_follow_field_of_view() {
        let mut camera = camera_with_fov(90.0);
        camera.on_resize(2, 2);

        // tan(45°) = 1 이므로 오른쪽 위 픽셀 중심은 (0.5, 0.5, -1) 방향
        let expected = Vector3::new(0.5, 0.5, -1.0).normalize();
        assert_relative_eq!(camera.ray_directions()[1], expected, epsilon = 1e-4);

        // 아래쪽 줄은 y가 음수
        assert!(camera.ray_directions()[2].y < 0.0);
        assert!(camera.ray_directions()[3].y < 0.0);
    }

    #[test]
    fn rays_follow_camera_orientation() {
        let mut camera =
            Camera::new(CameraSettings::default()).looking_at(Point3::origin(), Point3::new(1.0, 0.0, 0.0));
        camera.on_resize(3, 3);

        assert_relative_eq!(
            camera.ray_directions()[4],
            Vector3::new(1.0, 0.0, 0.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn changing_fov_rebuilds_rays() {
        let mut camera = camera_with_fov(45.0);
        camera.on_resize(2, 2);
        let narrow = camera.ray_directions()[0];

        camera.set_settings(CameraSettings {
            vertical_fov: 90.0,
            ..Default::default()
        });
        let wide = camera.ray_directions()[0];

        assert!(wide.x.abs() > narrow.x.abs());
        assert_eq!(camera.ray_directions().len(), 4);
    }
}
