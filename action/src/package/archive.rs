//! DAR archive creation and inspection

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::ActionError;
use crate::filesys::file::File;
use crate::package::manifest::{self, MANIFEST_FILE_NAME};
use crate::utils::starts_with_ignore_case;

pub const DEFAULT_PACKAGE_NAME: &str = "package.dar";
const DAR_EXTENSION: &str = ".dar";

/// Archive file name: `package.dar` by default, `.dar` appended when missing
pub fn package_file_name(name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        None => DEFAULT_PACKAGE_NAME.to_string(),
        Some(name) if has_dar_extension(name) => name.to_string(),
        Some(name) => format!("{}{}", name, DAR_EXTENSION),
    }
}

fn has_dar_extension(name: &str) -> bool {
    name.len()
        .checked_sub(DAR_EXTENSION.len())
        .and_then(|start| name.get(start..))
        .is_some_and(|ext| starts_with_ignore_case(ext, DAR_EXTENSION))
}

/// Builds DAR archives from files below a staging root
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    root: PathBuf,
}

impl PackageBuilder {
    /// Files named in the manifest are resolved against `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Stage in the process working directory
    pub fn from_current_dir() -> Result<Self, ActionError> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create `<output_dir>/<name>.dar` from the manifest and the files it lists.
    ///
    /// When `version` is given the manifest is updated first. The manifest is
    /// copied into the staging root as `deployit-manifest.xml`.
    pub async fn create_package(
        &self,
        manifest_path: &Path,
        output_dir: &Path,
        name: Option<&str>,
        version: Option<&str>,
    ) -> Result<PathBuf, ActionError> {
        File::new(manifest_path).require().await?;

        if let Some(version) = version.map(str::trim).filter(|v| !v.is_empty()) {
            manifest::set_version(manifest_path, version).await?;
        }

        let staged = self.root.join(MANIFEST_FILE_NAME);
        if !same_file(manifest_path, &staged).await {
            tokio::fs::copy(manifest_path, &staged).await?;
            debug!("Copied {} to {}", manifest_path.display(), staged.display());
        }

        if tokio::fs::metadata(output_dir).await.is_err() {
            info!("Output path not found, creating {}", output_dir.display());
            tokio::fs::create_dir_all(output_dir).await?;
        }

        let package_path = output_dir.join(package_file_name(name));
        info!("Package path set: {}", package_path.display());
        if tokio::fs::metadata(&package_path).await.is_ok() {
            return Err(ActionError::PackageExists(package_path.display().to_string()));
        }

        let xml = File::new(&staged).read_string().await?;
        let entries = manifest::deployable_files(&xml)?;
        info!("Files to include in the package: {}", entries.join(", "));

        let root = self.root.clone();
        let target = package_path.clone();
        tokio::task::spawn_blocking(move || write_archive(&target, &root, &entries)).await??;

        info!("Package created at {}", package_path.display());
        Ok(package_path)
    }
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn write_archive(package_path: &Path, root: &Path, entries: &[String]) -> Result<(), ActionError> {
    // Every entry must exist before the archive file is created
    for entry in entries {
        let path = root.join(entry);
        if fs::symlink_metadata(&path).is_err() {
            return Err(ActionError::FileNotFound(path.display().to_string()));
        }
    }

    let mut zip = ZipWriter::new(fs::File::create(package_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        let path = root.join(entry);
        let name = entry_name(entry);
        if path.is_dir() {
            add_directory(&mut zip, &path, &name, options)?;
        } else {
            add_file(&mut zip, &path, &name, options)?;
        }
    }

    zip.finish()?;
    Ok(())
}

fn add_file(
    zip: &mut ZipWriter<fs::File>,
    path: &Path,
    name: &str,
    options: SimpleFileOptions,
) -> Result<(), ActionError> {
    debug!("Adding {}", name);
    zip.start_file(name, options)?;
    let mut source = fs::File::open(path)?;
    io::copy(&mut source, zip)?;
    Ok(())
}

fn add_directory(
    zip: &mut ZipWriter<fs::File>,
    path: &Path,
    name: &str,
    options: SimpleFileOptions,
) -> Result<(), ActionError> {
    zip.add_directory(format!("{}/", name), options)?;

    let mut children: Vec<fs::DirEntry> = fs::read_dir(path)?.collect::<Result<_, _>>()?;
    children.sort_by_key(|e| e.file_name());

    for child in children {
        let child_name = format!("{}/{}", name, child.file_name().to_string_lossy());
        let child_path = child.path();
        if child_path.is_dir() {
            add_directory(zip, &child_path, &child_name, options)?;
        } else {
            add_file(zip, &child_path, &child_name, options)?;
        }
    }
    Ok(())
}

/// Archive entry name: forward slashes, no leading `./` or `/`
fn entry_name(entry: &str) -> String {
    let name = entry.replace('\\', "/");
    let name = name.trim_start_matches("./").trim_start_matches('/');
    name.trim_end_matches('/').to_string()
}

/// Read the `deployit-manifest.xml` entry of a DAR archive
pub async fn manifest_entry(archive_path: &Path) -> Result<String, ActionError> {
    File::new(archive_path).require().await?;
    let path = archive_path.to_path_buf();
    tokio::task::spawn_blocking(move || read_manifest_entry(&path)).await?
}

fn read_manifest_entry(path: &Path) -> Result<String, ActionError> {
    let mut archive = ZipArchive::new(fs::File::open(path)?)?;
    let mut entry = match archive.by_name(MANIFEST_FILE_NAME) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(ActionError::ManifestNotFound(path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(xml)
}
