//! Constants used throughout templer

/// Key holding the list of entries in a definition document
pub const TEMPLATES_KEY: &str = "templates";

/// Name of the variable bound to the omit placeholder in every render context
pub const OMIT_VARIABLE: &str = "omit";

/// Prefix of the omit placeholder; a random digest is appended per renderer
pub const OMIT_PLACEHOLDER_PREFIX: &str = "__omit_place_holder__";

/// Marker carried in the detail of errors raised by the `mandatory` filter
pub const MANDATORY_ERROR_MARKER: &str = "mandatory variable is undefined";

/// Template name used when registering a one-off template string
pub const INLINE_TEMPLATE_NAME: &str = "inline";

/// Words that [`crate::context::evaluate_string`] and `to_bool` accept as booleans
pub mod booleans {
    pub const TRUE_WORDS: &[&str] = &["y", "yes", "t", "true", "on", "1"];
    pub const FALSE_WORDS: &[&str] = &["n", "no", "f", "false", "off", "0"];
}

/// Exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
}

/// Verbosity levels
pub mod verbosity {
    pub const INFO: u8 = 0;
    pub const DEBUG: u8 = 1;
    pub const TRACE: u8 = 2;
}

/// Definitions whose file name ends with this suffix are rendered before parsing
pub const TEMPLATE_SUFFIX: &str = ".j2";
