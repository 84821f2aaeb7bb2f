//! File uploads and shell commands, used to push ILX sources onto the device.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{parse_body, uri, BigIpClient, BigIpError, URI_MGMT, URI_SHARED, URI_TM};

/// Maximum bytes per upload request.
pub(crate) const UPLOAD_CHUNK_SIZE: usize = 512 * 1024;

/// Where BIG-IP stores files received through the upload endpoint.
const DEFAULT_UPLOAD_DIR: &str = "/var/config/rest/downloads";

/// Result of `/mgmt/shared/file-transfer/uploads/<file>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Upload {
    pub remaining_byte_count: i64,
    pub total_byte_count: i64,
    pub local_file_path: String,
    pub temporary_file_path: String,
    pub generation: i64,
}

/// Body of `/mgmt/tm/util/bash`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BashCommand {
    pub command: String,
    pub util_cmd_args: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_result: Option<String>,
}

impl BashCommand {
    /// `bash -c '<script>'`.
    pub fn run(script: &str) -> Self {
        Self {
            command: "run".to_string(),
            util_cmd_args: format!("-c '{}'", script),
            command_result: None,
        }
    }
}

impl BigIpClient {
    /// Upload `content` as `file_name`, split into ranges of at most 512 KiB.
    pub async fn upload_file(&self, file_name: &str, content: &[u8]) -> Result<Upload, BigIpError> {
        let path = uri(&[URI_MGMT, URI_SHARED, "file-transfer", "uploads", file_name]);
        let total = content.len();

        let mut last = None;
        if total == 0 {
            last = Some(self.post_bytes(&path, "0-0/0", Vec::new()).await?);
        }
        for (index, chunk) in content.chunks(UPLOAD_CHUNK_SIZE).enumerate() {
            let start = index * UPLOAD_CHUNK_SIZE;
            let end = start + chunk.len() - 1;
            let range = format!("{}-{}/{}", start, end, total);
            debug!(file = %file_name, range = %range, "Uploading chunk");
            last = Some(self.post_bytes(&path, &range, chunk.to_vec()).await?);
        }

        let body = last.unwrap_or_default();
        let mut upload: Upload = if body.trim().is_empty() {
            Upload::default()
        } else {
            parse_body(&path, &body)?
        };
        if upload.local_file_path.is_empty() {
            upload.local_file_path = format!("{}/{}", DEFAULT_UPLOAD_DIR, file_name);
        }
        Ok(upload)
    }

    /// Run a command through `/mgmt/tm/util/bash`.
    pub async fn run_command(&self, command: &BashCommand) -> Result<BashCommand, BigIpError> {
        let path = uri(&[URI_MGMT, URI_TM, "util", "bash"]);
        let body = self.post(&path, command).await?;
        parse_body(&path, &body)
    }
}
