use std::path::{Path, PathBuf};

/// Workspace-relative paths
///
/// Everything is derived from the workspace root (the parent of this crate's manifest directory),
/// so binaries and tests agree on locations regardless of the working directory.
///
/// ```ignore
/// let vert = KilnPath::shader_build_path("mesh.vert");     // shader/.build/mesh.vert.spv
/// let tex = KilnPath::assets_path("uv_checker.png");       // assets/uv_checker.png
/// let cache = KilnPath::pipeline_cache_path("mesh.bin");   // target/pipeline-cache/mesh.bin
/// ```
pub struct KilnPath {}
// root
impl KilnPath {
    pub fn workspace_path() -> PathBuf {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }

    pub fn target_path() -> PathBuf {
        Self::workspace_path().join("target")
    }
}
// files
impl KilnPath {
    /// A file under `assets/`
    pub fn assets_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("assets").join(filename)
    }

    pub fn shader_root_path() -> PathBuf {
        Self::workspace_path().join("shader")
    }

    /// GLSL sources; includes sit next to the stages that use them
    pub fn shader_src_path() -> PathBuf {
        Self::shader_root_path().join("src")
    }

    pub fn shader_build_dir() -> PathBuf {
        Self::shader_root_path().join(".build")
    }

    /// Compiled SPIR-V for a shader source name: `shader/.build/<name>.spv`
    pub fn shader_build_path(filename: &str) -> PathBuf {
        let mut file = filename.to_string();
        file.push_str(".spv");
        Self::shader_build_dir().join(file)
    }

    pub fn pipeline_cache_dir() -> PathBuf {
        Self::target_path().join("pipeline-cache")
    }

    pub fn pipeline_cache_path(filename: &str) -> PathBuf {
        Self::pipeline_cache_dir().join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_build_path() {
        let path = KilnPath::shader_build_path("mesh.vert");
        assert!(path.ends_with("shader/.build/mesh.vert.spv"));
        assert!(path.starts_with(KilnPath::workspace_path()));
    }

    #[test]
    fn test_cache_under_target() {
        let path = KilnPath::pipeline_cache_path("mesh.bin");
        assert!(path.starts_with(KilnPath::target_path()));
        assert_eq!(path.file_name().and_then(|f| f.to_str()), Some("mesh.bin"));
    }
}
