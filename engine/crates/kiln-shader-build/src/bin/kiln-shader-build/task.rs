use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}
impl ShaderStage {
    /// Stage from the file extension; anything else (such as `.glsl` includes) is not an entry point.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "vert" => Some(Self::Vertex),
            "frag" => Some(Self::Fragment),
            "comp" => Some(Self::Compute),
            _ => None,
        }
    }

    #[inline]
    pub fn glslc_name(self) -> &'static str {
        match self {
            Self::Vertex => "vert",
            Self::Fragment => "frag",
            Self::Compute => "comp",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShaderBuildError {
    #[error("failed to run glslc for {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("glslc rejected {path}:\n{stderr}")]
    Compile { path: PathBuf, stderr: String },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One shader stage to compile.
///
/// Output names keep the full source name, `mesh.vert` becomes `<out>/mesh.vert.spv`, which is
/// where the renderer looks them up.
#[derive(Debug)]
pub struct ShaderCompileTask {
    pub shader_path: PathBuf,
    pub output_path: PathBuf,
    pub stage: ShaderStage,
}
impl ShaderCompileTask {
    pub fn new(shader_path: &Path, output_dir: &Path) -> Option<Self> {
        let stage = ShaderStage::from_path(shader_path)?;
        let mut output_name = shader_path.file_name()?.to_os_string();
        output_name.push(".spv");
        Some(Self {
            shader_path: shader_path.to_path_buf(),
            output_path: output_dir.join(output_name),
            stage,
        })
    }

    /// Missing outputs and sources newer than their output need a compile.
    ///
    /// Includes are not tracked; touching one needs `--force`.
    pub fn is_stale(&self) -> Result<bool, ShaderBuildError> {
        let modified = |path: &Path| {
            std::fs::metadata(path).and_then(|m| m.modified()).map_err(|source| ShaderBuildError::Io {
                path: path.to_path_buf(),
                source,
            })
        };
        if !self.output_path.exists() {
            return Ok(true);
        }
        Ok(modified(&self.shader_path)? > modified(&self.output_path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_from_extension() {
        assert_eq!(ShaderStage::from_path(Path::new("src/mesh.vert")), Some(ShaderStage::Vertex));
        assert_eq!(ShaderStage::from_path(Path::new("composite.frag")), Some(ShaderStage::Fragment));
        assert_eq!(ShaderStage::from_path(Path::new("bindless.glsl")), None);
        assert_eq!(ShaderStage::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_output_keeps_source_name() {
        let task = ShaderCompileTask::new(Path::new("shader/src/mesh.vert"), Path::new("shader/.build")).unwrap();
        assert_eq!(task.output_path, Path::new("shader/.build/mesh.vert.spv"));
        assert_eq!(task.stage.glslc_name(), "vert");

        assert!(ShaderCompileTask::new(Path::new("shader/src/camera.glsl"), Path::new("shader/.build")).is_none());
    }

    #[test]
    fn test_missing_output_is_stale() {
        let task = ShaderCompileTask::new(Path::new("does-not-exist.frag"), Path::new("nowhere")).unwrap();
        assert!(task.is_stale().unwrap());
    }
}
