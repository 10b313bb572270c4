use std::process::Command;

use crate::task::{ShaderBuildError, ShaderCompileTask};

/// Wraps `glslc` from the Vulkan SDK, which has to be on `PATH`.
pub struct GlslCompiler {
    include_dir: std::path::PathBuf,
    debug_info: bool,
}
impl GlslCompiler {
    pub fn new(include_dir: std::path::PathBuf, debug_info: bool) -> Self {
        Self { include_dir, debug_info }
    }

    fn command(&self, task: &ShaderCompileTask) -> Command {
        let mut cmd = Command::new("glslc");
        cmd.arg(format!("-I{}", self.include_dir.display()))
            .arg(format!("-fshader-stage={}", task.stage.glslc_name()))
            // descriptor indexing is core in 1.2
            .arg("--target-env=vulkan1.2");
        if self.debug_info {
            cmd.arg("-g");
        }
        cmd.arg("-o").arg(&task.output_path).arg(&task.shader_path);
        cmd
    }

    pub fn compile(&self, task: &ShaderCompileTask) -> Result<(), ShaderBuildError> {
        if let Some(parent) = task.output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ShaderBuildError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let output = self.command(task).output().map_err(|source| ShaderBuildError::Spawn {
            path: task.shader_path.clone(),
            source,
        })?;
        if !output.stdout.is_empty() {
            log::info!("glslc: {}", String::from_utf8_lossy(&output.stdout));
        }
        if !output.status.success() {
            return Err(ShaderBuildError::Compile {
                path: task.shader_path.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn test_command_line() {
        let compiler = GlslCompiler::new("shader/src".into(), false);
        let task = ShaderCompileTask::new(Path::new("shader/src/skybox.frag"), Path::new("out")).unwrap();
        let cmd = compiler.command(&task);
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "glslc");
        assert!(args.contains(&"-fshader-stage=frag".to_string()));
        assert!(args.contains(&"-Ishader/src".to_string()));
        assert!(!args.contains(&"-g".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("shader/src/skybox.frag"));
    }
}
