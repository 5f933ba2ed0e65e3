use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    JsonError(String),
    BadAddress(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::JsonError(e) => write!(f, "JSON parsing error: {}", e),
            ConfigError::BadAddress(e) => write!(f, "Address formatting error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Failures of the record broadcast transport.
#[derive(Debug)]
pub enum TransportError {
    BindFailed(std::io::Error),
    MalformedRecord(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::BindFailed(e) => write!(f, "Transport bind failed: {}", e),
            TransportError::MalformedRecord(r) => write!(f, "Malformed broadcast record: {:?}", r),
        }
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug)]
pub enum CaptureError {
    SourceUnavailable(String),
    SpawnFailed(std::io::Error),
    IoError(std::io::Error),
    TransportError(TransportError),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::SourceUnavailable(e) => write!(f, "Capture source unavailable: {}", e),
            CaptureError::SpawnFailed(e) => write!(f, "Capture tool spawn failed: {}", e),
            CaptureError::IoError(e) => write!(f, "Capture IO error: {}", e),
            CaptureError::TransportError(e) => write!(f, "Capture publish error: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<TransportError> for CaptureError {
    fn from(err: TransportError) -> Self {
        CaptureError::TransportError(err)
    }
}

#[derive(Debug)]
pub enum LifecycleError {
    InvalidInterface(String),
    SpawnFailed(std::io::Error),
    MissingProcessId,
    WaitFailed(std::io::Error),
    SignalFailed(String),
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::InvalidInterface(e) => write!(f, "Invalid interface name: {:?}", e),
            LifecycleError::SpawnFailed(e) => write!(f, "Capture process spawn failed: {}", e),
            LifecycleError::MissingProcessId => {
                write!(f, "Capture process exited before its id could be read")
            }
            LifecycleError::WaitFailed(e) => write!(f, "Waiting for capture process failed: {}", e),
            LifecycleError::SignalFailed(e) => write!(f, "Signalling capture process failed: {}", e),
        }
    }
}

impl std::error::Error for LifecycleError {}

#[derive(Debug)]
pub enum PingError {
    InvalidNetworkSpec(String),
    TooManyHosts { network: String, hosts: usize, limit: usize },
}

impl fmt::Display for PingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PingError::InvalidNetworkSpec(e) => write!(f, "Invalid network: {}", e),
            PingError::TooManyHosts {
                network,
                hosts,
                limit,
            } => write!(
                f,
                "Network {} has {} hosts, more than the limit of {}",
                network, hosts, limit
            ),
        }
    }
}

impl std::error::Error for PingError {}

/// Termination of one subscriber's relay. `Disconnected` is the normal end of a stream.
#[derive(Debug)]
pub enum StreamError {
    Disconnected,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Disconnected => write!(f, "Stream client disconnected"),
        }
    }
}

impl std::error::Error for StreamError {}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    Config(ConfigError),
    CaptureError(CaptureError),
    LifecycleError(LifecycleError),
    WebError(WebError),
    InitializationFailed(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::Config(e) => write!(f, "Configuration error: {}", e),
            ControllerError::CaptureError(e) => write!(f, "Capture error: {}", e),
            ControllerError::LifecycleError(e) => write!(f, "Lifecycle error: {}", e),
            ControllerError::WebError(e) => write!(f, "Web error: {}", e),
            ControllerError::InitializationFailed(e) => write!(f, "Initialization failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::Config(err)
    }
}

impl From<CaptureError> for ControllerError {
    fn from(err: CaptureError) -> Self {
        ControllerError::CaptureError(err)
    }
}

impl From<LifecycleError> for ControllerError {
    fn from(err: LifecycleError) -> Self {
        ControllerError::LifecycleError(err)
    }
}

impl From<WebError> for ControllerError {
    fn from(err: WebError) -> Self {
        ControllerError::WebError(err)
    }
}
