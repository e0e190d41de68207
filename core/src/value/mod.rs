pub mod instance;
pub mod record;
