//! Compiles every stage under `shader/src` into `shader/.build`.
//!
//! ```text
//! cargo run -p kiln-shader-build [-- --force] [--release]
//! ```
//! `--force` recompiles up-to-date outputs, `--release` drops debug info.

mod glsl;
mod task;

use glsl::GlslCompiler;
use kiln_crate_tools::{init_log::init_log, resource::KilnPath};
use rayon::prelude::*;
use task::ShaderCompileTask;

fn main() {
    init_log();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let force = args.iter().any(|a| a == "--force");
    let release = args.iter().any(|a| a == "--release");

    let src_dir = KilnPath::shader_src_path();
    let build_dir = KilnPath::shader_build_dir();
    log::info!("shader sources: {}", src_dir.display());
    log::info!("shader output: {}", build_dir.display());

    let compiler = GlslCompiler::new(src_dir.clone(), !release);
    let tasks: Vec<ShaderCompileTask> = walkdir::WalkDir::new(&src_dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| ShaderCompileTask::new(entry.path(), &build_dir))
        .collect();

    let failures: Vec<_> = tasks
        .par_iter()
        .filter_map(|task| {
            let stale = match task.is_stale() {
                Ok(stale) => force || stale,
                Err(e) => return Some(e),
            };
            if !stale {
                log::info!("up to date: {}", task.shader_path.display());
                return None;
            }
            log::info!("compiling: {}", task.shader_path.display());
            compiler.compile(task).err()
        })
        .collect();

    for failure in &failures {
        log::error!("{}", failure);
    }
    log::info!("{} shaders, {} failed", tasks.len(), failures.len());
    if !failures.is_empty() {
        std::process::exit(1);
    }
}
