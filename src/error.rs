use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors from the desktop settings channel and the settings tree.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("no settings channel accepted a connection (tried: {tried})")]
    NoChannel { tried: String },

    #[error("settings request {method} {endpoint} failed with status {status}: {body}")]
    Status {
        method: &'static str,
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("settings transport error: {0}")]
    Transport(String),

    #[error("expected {expected} at {path}, got: {found}")]
    UnexpectedShape {
        path: String,
        expected: &'static str,
        found: String,
    },

    #[error("invalid value for {path}: {reason}")]
    InvalidValue { path: String, reason: String },

    #[error("setting {path} to {value} is out of range [{min}, {max}]")]
    OutOfRange {
        path: String,
        value: f64,
        min: String,
        max: String,
    },
}

/// Failures of a wrapped command-line tool.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {stderr}", code.map_or_else(|| "signal".to_string(), |c| format!("code {c}")))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} produced unexpected output: {reason}")]
    Output { program: String, reason: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{tool} not installed. {help}")]
    NotInstalled { tool: &'static str, help: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Protocol(#[from] SettingsError),

    #[error("{0}")]
    Timeout(String),

    #[error("{operation}: {source}")]
    ExternalTool {
        operation: String,
        #[source]
        source: ToolError,
    },

    #[error("not connected to container engine at {host}: {reason}")]
    Unreachable { host: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("container engine error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("Kubernetes API error: {0}")]
    Kube(Box<kube::Error>),

    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a tool failure with the operation that was attempted.
    pub fn tool(operation: impl Into<String>, source: ToolError) -> Self {
        Error::ExternalTool {
            operation: operation.into(),
            source,
        }
    }

    /// True for errors meaning "nothing matched", which callers usually
    /// treat as "not created yet".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        Error::Kube(Box::new(err))
    }
}
