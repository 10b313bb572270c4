use kiln_winit_app::app::{WinitApp, fatal};

fn main() {
    if let Err(e) = WinitApp::run() {
        fatal(e);
    }
}
