use std::{
    collections::HashMap,
    ffi::CStr,
    path::{Path, PathBuf},
};

use ash::vk;

use crate::{
    error::{GfxError, GfxResult},
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
};

pub struct GfxShaderModule {
    handle: vk::ShaderModule,
    path: PathBuf,
}

impl GfxShaderModule {
    /// Loads a precompiled `.spv` file.
    pub fn new(path: &Path) -> GfxResult<Self> {
        let shader_load_err = |source| GfxError::ShaderLoad {
            path: path.to_path_buf(),
            source,
        };
        let mut file = std::fs::File::open(path).map_err(shader_load_err)?;
        let code = ash::util::read_spv(&mut file).map_err(shader_load_err)?;

        let gfx_device = Gfx::get().gfx_device();
        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let handle = unsafe { gfx_device.create_shader_module(&create_info, None)? };
        let module = Self {
            handle,
            path: path.to_path_buf(),
        };
        if let Err(e) = gfx_device.set_debug_name(&module, path.to_string_lossy()) {
            module.destroy();
            return Err(e);
        }
        Ok(module)
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn destroy(self) {
        unsafe { Gfx::get().gfx_device().destroy_shader_module(self.handle, None) };
    }
}
impl DebugType for GfxShaderModule {
    fn debug_type_name() -> &'static str {
        "GfxShaderModule"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

/// Shader modules keyed by path. Pipelines built from the same `.spv` share one module.
#[derive(Default)]
pub struct GfxShaderModuleCache {
    modules: HashMap<PathBuf, GfxShaderModule>,
}

impl GfxShaderModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, path: &Path) -> GfxResult<vk::ShaderModule> {
        if let Some(module) = self.modules.get(path) {
            return Ok(module.handle());
        }
        log::info!("loading shader module {:?}", path);
        let module = GfxShaderModule::new(path)?;
        let handle = module.handle();
        self.modules.insert(path.to_path_buf(), module);
        Ok(handle)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn destroy(self) {
        for (_, module) in self.modules {
            module.destroy();
        }
    }
}

/// Entry point name shared by every stage.
pub const ENTRY_MAIN: &CStr = c"main";
