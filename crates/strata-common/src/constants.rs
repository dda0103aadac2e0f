//! Workspace-wide constants: standard scope names, paths and file names.

/// Path of the root project.
pub const ROOT_PATH: &str = ":";

/// Scope holding compile-only dependencies.
pub const COMPILE_ONLY: &str = "compileOnly";

/// Scope holding runtime-only dependencies.
pub const RUNTIME_ONLY: &str = "runtimeOnly";

/// Scope holding dependencies visible at compile time and run time.
pub const IMPLEMENTATION: &str = "implementation";

/// Scope composed for the compile role.
pub const COMPILE_CLASSPATH: &str = "compileClasspath";

/// Scope composed for the runtime role.
pub const RUNTIME_CLASSPATH: &str = "runtimeClasspath";

/// Scopes every unit owns from declaration, in creation order.
pub const STANDARD_SCOPES: [&str; 5] = [
    COMPILE_ONLY,
    RUNTIME_ONLY,
    IMPLEMENTATION,
    COMPILE_CLASSPATH,
    RUNTIME_CLASSPATH,
];

/// File extension for project tree descriptions.
pub const DESCRIPTION_EXTENSION: &str = ".strata";

/// Description file read when none is given on the command line.
pub const DEFAULT_DESCRIPTION_FILE: &str = "build.strata";

/// SHA-256 digest length in hex characters.
pub const SHA256_HEX_LENGTH: usize = 64;

/// Application name used in CLI output.
pub const APP_NAME: &str = "strata";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "strata";
