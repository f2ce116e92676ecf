//! `deployit-manifest.xml` access

use std::path::Path;

use roxmltree::{Document, Node};
use tracing::info;

use crate::errors::ActionError;
use crate::filesys::file::File;

/// Name of the manifest entry inside a DAR archive
pub const MANIFEST_FILE_NAME: &str = "deployit-manifest.xml";

/// Root elements a manifest may have
pub const ROOT_ELEMENTS: [&str; 2] = ["udm.DeploymentPackage", "udm.ProvisioningPackage"];

fn parse(xml: &str) -> Result<Document<'_>, ActionError> {
    Document::parse(xml).map_err(|e| ActionError::InvalidManifest(format!("XML error: {}", e)))
}

fn package_element<'a, 'input>(doc: &'a Document<'input>) -> Result<Node<'a, 'input>, ActionError> {
    let root = doc.root_element();
    let name = root.tag_name().name();
    if ROOT_ELEMENTS.contains(&name) {
        Ok(root)
    } else {
        Err(ActionError::InvalidManifest(format!(
            "root element <{}> is not one of {}",
            name,
            ROOT_ELEMENTS.join(", ")
        )))
    }
}

fn required_attribute(xml: &str, attribute: &str) -> Result<String, ActionError> {
    let doc = parse(xml)?;
    let root = package_element(&doc)?;
    root.attribute(attribute)
        .map(str::to_string)
        .ok_or_else(|| {
            ActionError::InvalidManifest(format!(
                "<{}> has no '{}' attribute",
                root.tag_name().name(),
                attribute
            ))
        })
}

/// The `application` attribute of the package
pub fn application(xml: &str) -> Result<String, ActionError> {
    required_attribute(xml, "application")
}

/// The `version` attribute of the package
pub fn version(xml: &str) -> Result<String, ActionError> {
    required_attribute(xml, "version")
}

/// Files the archive must contain: the manifest itself followed by the
/// `file` of every deployable, without duplicates
pub fn deployable_files(xml: &str) -> Result<Vec<String>, ActionError> {
    let doc = parse(xml)?;
    let root = package_element(&doc)?;

    let mut files = vec![MANIFEST_FILE_NAME.to_string()];
    let deployables = root
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "deployables");

    if let Some(deployables) = deployables {
        for file in deployables
            .children()
            .filter(|n| n.is_element())
            .filter_map(|n| n.attribute("file"))
            .map(str::trim)
            .filter(|f| !f.is_empty())
        {
            if !files.iter().any(|existing| existing == file) {
                files.push(file.to_string());
            }
        }
    }

    Ok(files)
}

/// Return the manifest text with the package `version` replaced, or added
/// when absent. The rest of the document is left byte for byte.
pub fn with_version(xml: &str, version: &str) -> Result<String, ActionError> {
    let doc = parse(xml)?;
    let root = package_element(&doc)?;
    let escaped = escape_attribute(version);

    let existing = root
        .attributes()
        .find(|a| a.name() == "version" && a.namespace().is_none());

    let mut out = String::with_capacity(xml.len() + escaped.len() + 12);
    match existing {
        Some(attr) => {
            let range = attr.range_value();
            out.push_str(&xml[..range.start]);
            out.push_str(&escaped);
            out.push_str(&xml[range.end..]);
        }
        None => {
            // '<' + element name
            let name_end = root.range().start + 1 + root.tag_name().name().len();
            out.push_str(&xml[..name_end]);
            out.push_str(&format!(" version=\"{}\"", escaped));
            out.push_str(&xml[name_end..]);
        }
    }
    Ok(out)
}

/// Rewrite the version of the manifest file at `path`
pub async fn set_version(path: &Path, version: &str) -> Result<(), ActionError> {
    let file = File::new(path);
    let xml = file.read_string().await?;
    let updated = with_version(&xml, version)?;
    file.write_string(&updated).await?;
    info!("Set version {} in {}", version, path.display());
    Ok(())
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
