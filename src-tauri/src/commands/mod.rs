pub mod listening;
pub mod permissions;
pub mod settings;
pub mod speech;
pub mod tap;
pub mod whitelist;
