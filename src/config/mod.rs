// Re-export all items from the submodules
mod env_vars;
mod settings;

// Re-export settings types
pub use settings::{
    ConfigurationError,
    DestinationType,
    RouterSettings,
    S3Settings,
    Settings,
};

// Re-export environment lookup helpers
pub use env_vars::{
    load_env_file,
    process_env,
};
