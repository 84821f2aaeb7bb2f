//! iRules LX workspaces (`/mgmt/tm/ilx/workspace`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::transfer::BashCommand;
use super::{uri, uri_name, BigIpClient, BigIpError, URI_MGMT, URI_TM};

/// Root of the workspace tree on the device.
pub const WORKSPACE_UPLOAD_PATH: &str = "/var/ilx/workspaces";

/// The only workspace files that may be replaced from outside.
const MUTABLE_FILES: &[&str] = &["index.js", "package.json"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IlxFile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IlxExtension {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<IlxFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IlxWorkspace {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub full_path: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub generation: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub self_link: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub node_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub staged_directory: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<IlxExtension>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<IlxFile>,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

impl IlxWorkspace {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Identifies an extension inside a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionConfig {
    pub name: String,
    pub partition: String,
    pub workspace_name: String,
}

impl ExtensionConfig {
    fn extension_dir(&self) -> String {
        format!(
            "{}/{}/{}/extensions/{}/",
            WORKSPACE_UPLOAD_PATH, self.partition, self.workspace_name, self.name
        )
    }

    fn rules_dir(&self) -> String {
        format!(
            "{}/{}/{}/rules/",
            WORKSPACE_UPLOAD_PATH, self.partition, self.workspace_name
        )
    }
}

fn workspace_path(name: &str) -> String {
    uri(&[URI_MGMT, URI_TM, "ilx", "workspace", &uri_name(name)])
}

/// Mutable files directly inside `dir`, sorted by name. Subdirectories are ignored.
async fn mutable_files(dir: &Path) -> Result<Vec<(String, Vec<u8>)>, BigIpError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !MUTABLE_FILES.contains(&name.as_str()) {
            continue;
        }
        let content = tokio::fs::read(entry.path()).await?;
        files.push((name, content));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

impl BigIpClient {
    /// Fetch a workspace. `None` when it does not exist.
    pub async fn get_workspace(&self, name: &str) -> Result<Option<IlxWorkspace>, BigIpError> {
        self.get_entity(&workspace_path(name)).await
    }

    pub async fn create_workspace(&self, name: &str) -> Result<(), BigIpError> {
        self.post(&workspace_path(""), &IlxWorkspace::named(name))
            .await
            .map(|_| ())
    }

    pub async fn patch_workspace(&self, name: &str) -> Result<(), BigIpError> {
        self.patch(&workspace_path(name), &IlxWorkspace::named(name)).await
    }

    pub async fn delete_workspace(&self, name: &str) -> Result<(), BigIpError> {
        self.delete(&workspace_path(name)).await
    }

    /// Add an extension to an existing workspace.
    pub async fn create_extension(&self, opts: &ExtensionConfig) -> Result<(), BigIpError> {
        let path = format!("{}?options=extension,{}", workspace_path(""), opts.name);
        self.post(&path, &IlxWorkspace::named(&opts.workspace_name))
            .await
            .map(|_| ())
    }

    /// Replace the extension's `index.js` and `package.json` with the ones in `dir`.
    pub async fn upload_extension_files(
        &self,
        opts: &ExtensionConfig,
        dir: impl AsRef<Path>,
    ) -> Result<(), BigIpError> {
        self.upload_to(dir.as_ref(), &opts.extension_dir()).await
    }

    /// Replace the workspace rules' `index.js` and `package.json` with the ones in `dir`.
    pub async fn upload_rule_files(
        &self,
        opts: &ExtensionConfig,
        dir: impl AsRef<Path>,
    ) -> Result<(), BigIpError> {
        self.upload_to(dir.as_ref(), &opts.rules_dir()).await
    }

    async fn upload_to(&self, dir: &Path, destination: &str) -> Result<(), BigIpError> {
        let files = mutable_files(dir).await?;
        debug!(dir = %dir.display(), count = files.len(), "Uploading workspace files");

        let mut uploaded = Vec::with_capacity(files.len());
        for (name, content) in &files {
            let upload = self.upload_file(name, content).await?;
            uploaded.push((name, upload.local_file_path));
        }

        for (name, local_path) in uploaded {
            let script = format!("cat {} > {}{}", local_path, destination, name);
            self.run_command(&BashCommand::run(&script)).await?;
            info!(file = %name, destination = %destination, "Copied file into workspace");
        }
        Ok(())
    }
}
