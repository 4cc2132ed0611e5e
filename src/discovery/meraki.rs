use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::core::error::DiscoveryError;

const API_KEY_HEADER: &str = "X-Cisco-Meraki-API-Key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDevice {
    pub serial: String,
    pub model: String,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub claimed_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lan_ip: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

/// `MV` + 1..=3 digits + optional `W`/`w` (MV12, MV72W, ...).
pub fn is_camera_model(model: &str) -> bool {
    let Some(rest) = model.strip_prefix("MV") else {
        return false;
    };
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if !(1..=3).contains(&digits) {
        return false;
    }
    let tail = &rest[digits..];
    matches!(tail, "" | "W" | "w") || tail.starts_with('-')
}

pub fn read_api_key(path: &Path) -> Result<String, DiscoveryError> {
    let raw = std::fs::read_to_string(path).map_err(|e| DiscoveryError::ApiKey {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let key = raw.trim();
    if key.is_empty() {
        return Err(DiscoveryError::ApiKey {
            path: path.to_path_buf(),
            message: "file is empty".into(),
        });
    }
    Ok(key.to_string())
}

/// Masks a key for logging. Short keys are masked completely; longer ones
/// keep their last five characters.
pub fn redact_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len().max(1));
    }
    let hidden = chars.len() - 5;
    let tail: String = chars[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), tail)
}

pub struct MerakiClient {
    base_url: String,
    api_key: String,
    agent: ureq::Agent,
}

impl MerakiClient {
    pub fn new(base_url: &str, api_key: String) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            agent,
        }
    }

    /// Cameras in the organisation inventory; other device types are dropped.
    pub fn inventory(&self, org_id: &str) -> Result<Vec<InventoryDevice>, DiscoveryError> {
        let url = format!("{}/organizations/{}/inventory", self.base_url, org_id);
        let devices: Vec<InventoryDevice> = self.get_json(&url)?;
        Ok(devices
            .into_iter()
            .filter(|d| is_camera_model(&d.model))
            .collect())
    }

    pub fn device(&self, network_id: &str, serial: &str) -> Result<DeviceDetails, DiscoveryError> {
        let url = format!("{}/networks/{}/devices/{}", self.base_url, network_id, serial);
        self.get_json(&url)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, DiscoveryError> {
        let response = match self
            .agent
            .get(url)
            .set(API_KEY_HEADER, &self.api_key)
            .set("Content-Type", "application/json")
            .call()
        {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, _)) => {
                return Err(DiscoveryError::Status {
                    url: url.to_string(),
                    status,
                });
            }
            Err(e) => {
                return Err(DiscoveryError::Http {
                    url: url.to_string(),
                    message: e.to_string(),
                });
            }
        };

        if response.status() != 200 {
            return Err(DiscoveryError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let body = response.into_string().map_err(|source| DiscoveryError::Read {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|source| DiscoveryError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
