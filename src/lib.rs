use cfg_if::cfg_if;
use log::{error, warn};
use wgpu::SurfaceError;
use winit::event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use crate::app::Application;

// wasm32 환경에서만 wasm_bindgen 활용
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod app;
pub mod camera;
pub mod tracer;
pub mod util;

// wasm 연결시 아래 함수를 시작점으로 삼도록 함.
#[cfg_attr(target_arch = "wasm32", wasm_bindgen(start))]
pub async fn run() {
    // 로거 초기화
    cfg_if! {
        // 만약 현재 환경이 wasm32라면
        if #[cfg(target_arch = "wasm32")] {
            // panic 발생시 웹 브라우저의 console.err에 로그 띄우기
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            console_log::init_with_level(log::Level::Info).expect("로거 초기화 실패");
        } else {
            // 아니면 기본적인 로거만 불러오기. RUST_LOG로 바꿀 수 있음
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("glint=info"))
                .init();
        }
    }

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title("Glint: Ray Tracer")
        .build(&event_loop)
        .expect("창 생성 실패");

    #[cfg(target_arch = "wasm32")]
    {
        // 웹에선 winit이 만든 canvas를 직접 문서에 붙여줘야 함
        use winit::dpi::PhysicalSize;
        use winit::platform::web::WindowExtWebSys;

        window.set_inner_size(PhysicalSize::new(1280, 720));
        web_sys::window()
            .and_then(|win| win.document())
            .and_then(|doc| {
                let destination = doc.get_element_by_id("glint")?;
                let canvas = web_sys::Element::from(window.canvas());
                destination.append_child(&canvas).ok()?;
                Some(())
            })
            .expect("canvas를 문서에 붙이지 못함");
    }

    let mut app = Application::new(window, &event_loop).await;

    event_loop.run(move |event, _, control_flow| match event {
        Event::WindowEvent {
            ref event,
            window_id,
        } if window_id == app.window.id() => match event {
            // 만약 앱을 운영체제에서 닫으려고 하거나
            WindowEvent::CloseRequested |
            // 키보드 입력이 들어왔고
            WindowEvent::KeyboardInput {
                input: KeyboardInput {
                    // 키보드가 새로 눌러졌으며, 그 눌러진 키가 ESC라면
                    state: ElementState::Pressed, virtual_keycode: Some(VirtualKeyCode::Escape), ..
                }, ..
            } => *control_flow = ControlFlow::ExitWithCode(0), // 나가기

            WindowEvent::Resized(size) => app.resize(*size),
            WindowEvent::ScaleFactorChanged { new_inner_size, .. } => app.resize(**new_inner_size),

            _ => {
                app.input(event);
            }
        },
        Event::RedrawRequested(window_id) if window_id == app.window.id() => {
            app.update();

            match app.render() {
                Ok(()) => {}
                // surface를 잃어버렸으면 다시 설정
                Err(SurfaceError::Lost) => app.resize(app.size),
                Err(SurfaceError::OutOfMemory) => {
                    error!("GPU 메모리 부족, 종료함");
                    *control_flow = ControlFlow::ExitWithCode(1);
                }
                Err(other) => warn!("frame skipped: {other:?}"),
            }
        }
        // 매 프레임마다 다시 그리기 요청. 실제 레이 트레이싱은 뭔가 바뀌었을 때만 함
        Event::MainEventsCleared => app.window.request_redraw(),
        _ => {}
    });
}
