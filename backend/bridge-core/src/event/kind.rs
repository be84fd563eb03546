use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Symbolic name ↔ wire name codec.
///
/// Encoding is lowercase with `_` between words (`ServiceInitialized` →
/// `service_initialized`). Decoding accepts exactly the encoder's output and
/// returns `None` for anything else, so unrecognised traffic is dropped
/// instead of failing the caller.
pub trait WireName: Sized + Copy {
    fn encode(self) -> &'static str;

    fn decode(name: &str) -> Option<Self>;
}

/// Notification categories emitted by the daemon.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    // Service lifecycle
    ServiceInitialized,
    ServiceStarting,
    ServiceStarted,
    ServiceStopping,
    ServiceStopped,
    ServiceError,

    // Connection lifecycle
    Connected,
    Disconnected,
    ConnectionError,
    ConnectionLost,
    Reconnecting,
    Reconnected,

    // Discovery (client side)
    DiscoveryStarted,
    ServerListFound,
    ServerDiscovered,
    DiscoveryCompleted,
    DiscoveryTimeout,

    // Authentication
    OtpNeeded,
    OtpValidated,
    OtpInvalid,
    OtpGenerated,
    SslHandshakeStarted,
    SslHandshakeCompleted,
    SslHandshakeFailed,
    CertificateShared,
    CertificateReceived,

    // Server choice (client side)
    ServerChoiceNeeded,
    ServerChoiceMade,

    // Client management (server side)
    ClientConnected,
    ClientDisconnected,
    ClientAuthenticated,
    ClientAdded,
    ClientRemoved,
    ClientUpdated,

    // Streams
    StreamEnabled,
    StreamDisabled,
    StreamsUpdated,

    // Configuration
    ConfigLoaded,
    ConfigSaved,
    ConfigUpdated,
    ConfigError,

    // State / mode
    StateChanged,
    ModeChanged,

    // Screen
    ScreenChanged,
    ScreenTransitionStarted,
    ScreenTransitionCompleted,

    // Transfers
    FileTransferStarted,
    FileTransferProgress,
    FileTransferCompleted,
    FileTransferFailed,
    ClipboardSynced,

    // Network quality
    NetworkLatencyHigh,
    NetworkQualityDegraded,
    NetworkQualityRestored,

    // General
    StatusUpdate,
    Info,
    Warning,
    Error,
    Test,
    Pong,

    // Command results
    CommandSuccess,
    CommandError,
}

impl EventKind {
    /// Kinds that report the outcome of a specific command.
    pub fn is_command_result(self) -> bool {
        matches!(self, EventKind::CommandSuccess | EventKind::CommandError)
    }
}

/// Operations the daemon accepts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommandKind {
    // Service control
    ServiceChoice,
    StartServer,
    StopServer,
    StartClient,
    StopClient,

    // Status
    Status,
    ServerStatus,
    ClientStatus,

    // Configuration
    GetServerConfig,
    SetServerConfig,
    GetClientConfig,
    SetClientConfig,
    SaveConfig,
    ReloadConfig,

    // Streams
    EnableStream,
    DisableStream,
    GetStreams,

    // Client management (server only)
    AddClient,
    RemoveClient,
    EditClient,
    ListClients,

    // SSL / certificates
    EnableSsl,
    DisableSsl,
    ShareCertificate,
    ReceiveCertificate,
    SetOtp,

    // Server selection (client)
    CheckServerChoiceNeeded,
    GetFoundServers,
    ChooseServer,
    CheckOtpNeeded,

    DiscoverServices,

    // Daemon control
    Shutdown,
    Ping,
}

impl WireName for EventKind {
    fn encode(self) -> &'static str {
        self.into()
    }

    fn decode(name: &str) -> Option<Self> {
        EventKind::from_str(name).ok()
    }
}

impl WireName for CommandKind {
    fn encode(self) -> &'static str {
        self.into()
    }

    fn decode(name: &str) -> Option<Self> {
        CommandKind::from_str(name).ok()
    }
}
