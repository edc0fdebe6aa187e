/// Config schema types (server, uploads, whatsapp session).
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default HTTP port when neither the config file nor `PORT` sets one.
pub const DEFAULT_PORT: u16 = 3000;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub uploads: UploadsConfig,
    pub whatsapp: WhatsAppConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Bearer token required on every route except `/health`.
    /// Unset means the API is open, as it is on a trusted loopback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            api_token: None,
        }
    }
}

/// Where uploaded media lands and how long it stays there.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    pub dir: PathBuf,
    /// Maximum accepted multipart body size, in bytes.
    pub max_bytes: usize,
    /// Files older than this are removed by the retention sweeper.
    /// `0` disables the sweeper.
    pub retention_secs: u64,
    /// How often the sweeper runs.
    pub sweep_interval_secs: u64,
    /// Remove an uploaded file as soon as it was sent successfully.
    pub delete_after_send: bool,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            max_bytes: 64 * 1024 * 1024,
            retention_secs: 24 * 60 * 60,
            sweep_interval_secs: 15 * 60,
            delete_after_send: false,
        }
    }
}

/// WhatsApp Web session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Directory holding the linked-device session store.
    pub session_dir: PathBuf,
    /// A login QR older than this is no longer served.
    pub qr_ttl_secs: u64,
    /// Also draw each new login QR on the terminal.
    pub print_qr: bool,
    /// Device name shown under "Linked devices" on the phone.
    pub device_name: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            session_dir: PathBuf::from(".wabridge").join("session"),
            qr_ttl_secs: 60,
            print_qr: true,
            device_name: "wabridge".into(),
        }
    }
}
