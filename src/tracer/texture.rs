use wgpu::{
    Device, Extent3d, FilterMode, ImageCopyTexture, ImageDataLayout, Origin3d, Queue, Sampler,
    SamplerDescriptor, Texture, TextureAspect, TextureDescriptor, TextureDimension, TextureFormat,
    TextureUsages, TextureView, TextureViewDescriptor,
};
use winit::dpi::PhysicalSize;

/// 렌더러가 만든 픽셀 버퍼를 화면에 띄우기 위한 GPU 텍스쳐
pub struct Image {
    pub gpu_texture: Texture,
    pub view: TextureView,
    pub sampler: Sampler,
    pub name: String,
}

impl Image {
    pub fn new(device: &Device, width: u32, height: u32, label: &str) -> Image {
        let gpu_texture = device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                // 크기가 0인 텍스쳐는 만들 수 없음
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1, // 이미지의 레이어 갯수. 단순한 2차원 이미지니 1개로
            },
            mip_level_count: 1, // 거리에 따라 다른 텍스쳐 쓰기. 우린 그런거 없음.
            sample_count: 1,    // 안티 에일리징을 위한 멀티 샘플링. 우린 그런거 안씀
            dimension: TextureDimension::D2, // 2차원 텍스쳐
            // 렌더러의 u32 픽셀은 little endian 기준 R, G, B, A 순서의 바이트
            // egui가 sRGB 텍스쳐를 기대하므로 Srgb 포맷 사용
            format: TextureFormat::Rgba8UnormSrgb,

            // Texture Binding: 쉐이더에서 쓸 예정
            // Copy destination: CPU에서 GPU로 데이터가 복사될 예정
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = gpu_texture.create_view(&TextureViewDescriptor {
            label: Some(&format!("{} view", label)),
            ..Default::default() // label 뺴고 나머진 기본값 그대로
        });

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some(&format!("{} sampler", label)),
            mag_filter: FilterMode::Nearest, // 픽셀 하나하나가 광선 하나니까 섞지 않음
            min_filter: FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            gpu_texture,
            view,
            sampler,
            name: label.to_string(),
        }
    }

    pub fn load_image(&mut self, queue: &Queue, rgba: &[u8]) {
        let pixel_count = {
            let size = self.gpu_texture.size();
            size.width * size.height
        } as usize;
        if pixel_count != rgba.len() / 4 {
            log::warn!(
                "{}: expected {} pixels but got {}, skipping upload",
                self.name,
                pixel_count,
                rgba.len() / 4
            );
            return;
        }

        queue.write_texture(
            ImageCopyTexture {
                texture: &self.gpu_texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            rgba,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.gpu_texture.width()),
                rows_per_image: Some(self.gpu_texture.height()),
            },
            self.gpu_texture.size(),
        )
    }

    /// 크기가 바뀌었으면 텍스쳐를 새로 만들고 true를 돌려줌
    pub fn resize(&mut self, device: &Device, new_size: PhysicalSize<u32>) -> bool {
        if self.size() == new_size {
            return false;
        }

        let new = Self::new(device, new_size.width, new_size.height, &self.name);
        self.sampler = new.sampler;
        self.view = new.view;
        self.gpu_texture = new.gpu_texture;

        true
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.gpu_texture.width(), self.gpu_texture.height())
    }
}
