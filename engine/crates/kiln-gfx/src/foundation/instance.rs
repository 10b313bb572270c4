use std::ffi::{CStr, CString, c_char};

use ash::vk;
use itertools::Itertools;

use crate::{
    error::{GfxError, GfxResult},
    foundation::debug_messenger::GfxDebugMsger,
};

pub struct GfxInstance {
    /// function pointers plus a raw handle; lifetime is managed by hand
    pub(crate) ash_instance: ash::Instance,
}

impl GfxInstance {
    /// Creates the instance with the surface extensions the window system needs, plus debug utils.
    pub fn new(
        vk_entry: &ash::Entry,
        app_name: &str,
        engine_name: &str,
        surface_exts: &[*const c_char],
    ) -> GfxResult<Self> {
        let app_name = CString::new(app_name).map_err(|_| GfxError::DebugName(app_name.to_string()))?;
        let engine_name = CString::new(engine_name).map_err(|_| GfxError::DebugName(engine_name.to_string()))?;
        let app_info = vk::ApplicationInfo::default()
            .api_version(vk::API_VERSION_1_3)
            .application_name(app_name.as_c_str())
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(engine_name.as_c_str())
            .engine_version(vk::make_api_version(0, 1, 0, 0));

        let required = surface_exts
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(*ext) })
            .chain(Self::basic_instance_exts())
            .unique()
            .collect_vec();

        let supported = unsafe { vk_entry.enumerate_instance_extension_properties(None)? };
        if let Some(missing) = required.iter().find(|ext| {
            !supported.iter().any(|props| props.extension_name_as_c_str().is_ok_and(|name| name == **ext))
        }) {
            return Err(GfxError::MissingInstanceExtension(missing.to_string_lossy().into_owned()));
        }

        let exts_str = required.iter().map(|ext| format!("\n\t{:?}", ext)).join("");
        log::info!("instance extensions: {}", exts_str);

        let enabled_exts = required.iter().map(|ext| ext.as_ptr()).collect_vec();
        let mut debug_utils_messenger_ci = GfxDebugMsger::debug_utils_messenger_ci();
        let instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&enabled_exts)
            .push_next(&mut debug_utils_messenger_ci);

        let ash_instance = unsafe { vk_entry.create_instance(&instance_ci, None)? };

        Ok(Self { ash_instance })
    }

    /// Validation layers are toggled from the Vulkan Configurator, not from code.
    fn basic_instance_exts() -> Vec<&'static CStr> {
        vec![ash::ext::debug_utils::NAME]
    }

    pub fn destroy(self) {
        log::info!("destroying GfxInstance");
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}
// getters
impl GfxInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }

    #[inline]
    pub fn vk_instance(&self) -> vk::Instance {
        self.ash_instance.handle()
    }
}
