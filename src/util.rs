use cfg_if::cfg_if;
use nalgebra::Vector3;

cfg_if! {
    // wasm에선 std::time::Instant가 패닉하므로 web-time 사용
    if #[cfg(target_arch = "wasm32")] {
        pub use web_time::Instant;
    } else {
        pub use std::time::Instant;
    }
}

/// RGB 색상. 각 성분은 보통 [0, 1] 범위지만 강제하지는 않음
pub type Color = Vector3<f32>;

/// 색상을 `(A << 24) | (B << 16) | (G << 8) | R` 형태의 u32로 변환함.
///
/// 범위를 벗어난 값은 [0, 1]로 잘리고, NaN은 0이 됨.
pub fn color_to_abgr(color: &Color) -> u32 {
    let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;

    let r = channel(color.x);
    let g = channel(color.y);
    let b = channel(color.z);
    let a = 255;

    (a << 24) | (b << 16) | (g << 8) | r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_packs_with_full_alpha() {
        assert_eq!(color_to_abgr(&Color::new(1.0, 0.0, 0.0)), 0xFF0000FF);
    }

    #[test]
    fn channels_are_in_abgr_order() {
        assert_eq!(color_to_abgr(&Color::new(0.0, 1.0, 0.0)), 0xFF00FF00);
        assert_eq!(color_to_abgr(&Color::new(0.0, 0.0, 1.0)), 0xFFFF0000);
        assert_eq!(color_to_abgr(&Color::new(1.0, 1.0, 1.0)), 0xFFFFFFFF);
    }

    #[test]
    fn channels_round_to_nearest() {
        // 0.5 * 255 + 0.5 = 128.0
        assert_eq!(color_to_abgr(&Color::new(0.5, 0.0, 0.0)) & 0xFF, 128);
        // 0.2 * 255 + 0.5 = 51.5
        assert_eq!(color_to_abgr(&Color::new(0.2, 0.0, 0.0)) & 0xFF, 51);
    }

    #[test]
    fn out_of_range_and_nan_do_not_overflow() {
        let packed = color_to_abgr(&Color::new(4.0, -3.0, f32::NAN));
        assert_eq!(packed, 0xFF0000FF);

        let infinite = color_to_abgr(&Color::new(f32::INFINITY, f32::NEG_INFINITY, 0.0));
        assert_eq!(infinite, 0xFF0000FF);
    }
}
