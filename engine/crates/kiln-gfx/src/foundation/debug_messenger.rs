use std::ffi::CStr;

use ash::vk;

use crate::error::GfxResult;

pub struct GfxDebugMsger {
    pub(crate) vk_debug_utils_instance: ash::ext::debug_utils::Instance,
    pub(crate) vk_debug_utils_messenger: vk::DebugUtilsMessengerEXT,
}

impl GfxDebugMsger {
    pub fn new(vk_entry: &ash::Entry, instance: &ash::Instance) -> GfxResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(vk_entry, instance);

        let create_info = Self::debug_utils_messenger_ci();
        let debug_messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };

        Ok(Self {
            vk_debug_utils_instance: loader,
            vk_debug_utils_messenger: debug_messenger,
        })
    }

    pub fn destroy(self) {
        log::info!("destroying GfxDebugMsger");
        unsafe {
            self.vk_debug_utils_instance.destroy_debug_utils_messenger(self.vk_debug_utils_messenger, None);
        }
    }
}

/// Validation messages come as one line of JSON in some layers; pull out `MainMessage` (it holds
/// newlines) and pretty-print the rest.
fn format_validation_message(message_type: vk::DebugUtilsMessageTypeFlagsEXT, msg: &str) -> String {
    let mut json_value = serde_json::from_str::<serde_json::Value>(msg);
    let mut json_obj = json_value.as_mut().ok().and_then(|v| v.as_object_mut());
    let main_msg_value = json_obj.as_mut().and_then(|obj| obj.remove("MainMessage"));
    let main_msg_str = main_msg_value.as_ref().and_then(|value| value.as_str()).unwrap_or_default();
    let total_msg_str =
        json_obj.and_then(|obj| serde_json::to_string_pretty(&obj).ok()).unwrap_or_else(|| msg.to_string());

    format!("[{:?}]\n{}\n{}\n", message_type, total_msg_str, main_msg_str)
}

/// # Safety
/// called by the validation layer with a valid callback data pointer
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let callback_data = unsafe { *p_callback_data };

    let msg = if callback_data.p_message.is_null() {
        std::borrow::Cow::from("")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };
    let format_msg = format_validation_message(message_type, msg.as_ref());

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{}", format_msg),
        _ => log::info!("{}", format_msg),
    };

    // only layer developers return TRUE
    vk::FALSE
}

impl GfxDebugMsger {
    pub const MSG_TYPE: vk::DebugUtilsMessageTypeFlagsEXT = vk::DebugUtilsMessageTypeFlagsEXT::from_raw(
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL.as_raw()
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION.as_raw()
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE.as_raw(),
    );
    pub const MSG_SEVERITY: vk::DebugUtilsMessageSeverityFlagsEXT = vk::DebugUtilsMessageSeverityFlagsEXT::from_raw(
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING.as_raw() | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR.as_raw(),
    );

    /// also chained into the instance create info, so instance creation itself is covered
    pub fn debug_utils_messenger_ci() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(Self::MSG_SEVERITY)
            .message_type(Self::MSG_TYPE)
            .pfn_user_callback(Some(vk_debug_callback))
    }
}

/// Vulkan objects that can carry a debug name
pub trait DebugType {
    fn debug_type_name() -> &'static str;
    fn vk_handle(&self) -> impl vk::Handle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_plain_message() {
        let out = format_validation_message(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL, "plain text");
        assert!(out.contains("plain text"));
    }

    #[test]
    fn test_format_json_message_splits_main_message() {
        let msg = r#"{"MainMessage":"line one\nline two","VUID":"VUID-1"}"#;
        let out = format_validation_message(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION, msg);
        assert!(out.contains("line one\nline two"));
        assert!(out.contains("VUID-1"));
        assert!(!out.contains("MainMessage"));
    }
}
