pub mod descriptor_cursor;
