pub mod bindless_manager;
pub mod deferred_destroy;
pub mod frame_counter;
pub mod handles;
pub mod pipeline_settings;
pub mod render_data;
pub mod resource_manager;
pub mod resource_pool;
pub mod resource_registry;
pub mod vertex;
