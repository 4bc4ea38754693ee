/// 安装 panic 钩子，使 Rust panic 信息输出到浏览器控制台。
#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
pub fn set_panic_hook() {}

/// 将 `log` 输出接到浏览器控制台。只在 wasm32 上生效。
#[cfg(target_arch = "wasm32")]
pub fn init_logger() {
    let level = if cfg!(debug_assertions) {
        log::Level::Debug
    } else {
        log::Level::Info
    };
    wasm_logger::init(wasm_logger::Config::new(level));
}

#[cfg(not(target_arch = "wasm32"))]
pub fn init_logger() {}
