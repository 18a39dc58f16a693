pub mod codec;
pub mod data_core;
pub mod path;
pub mod shadow_tree;
pub mod validation;
pub mod value;
