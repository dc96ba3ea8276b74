//! Reader for the legacy `packages.config` manifest format.
//!
//! ```xml
//! <packages>
//!   <package id="Newtonsoft.Json" version="13.0.3" targetFramework="net472" />
//! </packages>
//! ```
//!
//! Each `<package>` element yields a pinned [`DirectDependency`]
//! `(id, [version,version], framework)`. Duplicate ids keep the first
//! occurrence, matching the reference tool's behavior; entries whose
//! `targetFramework` is incompatible with the project TFM are skipped.

use std::collections::HashSet;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::framework::Tfm;
use crate::version::VersionRange;

use super::{DependencyFlags, DirectDependency, ManifestError};

pub struct PackagesConfigReader;

impl PackagesConfigReader {
    pub fn read(
        path: &Path,
        project_tfm: &Tfm,
    ) -> Result<(Vec<DirectDependency>, Vec<String>), ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|_| ManifestError::NotFound(path.to_path_buf()))?;
        Self::parse(&content, project_tfm).map_err(|reason| ManifestError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn parse(
        content: &str,
        project_tfm: &Tfm,
    ) -> Result<(Vec<DirectDependency>, Vec<String>), String> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        let mut warnings = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if e.name().as_ref() == b"package" =>
                {
                    let mut id = None;
                    let mut version = None;
                    let mut target_framework = None;
                    let mut development_dependency = false;

                    for attr in e.attributes().flatten() {
                        let key = attr.key.as_ref();
                        let value = attr
                            .decode_and_unescape_value(reader.decoder())
                            .unwrap_or_default()
                            .to_string();
                        match key {
                            b"id" => id = Some(value),
                            b"version" => version = Some(value),
                            b"targetFramework" => target_framework = Some(value),
                            b"developmentDependency" => {
                                development_dependency = value == "true";
                            }
                            _ => {}
                        }
                    }

                    let (Some(id), Some(version)) = (id, version) else {
                        warnings.push("skipped <package> entry missing id or version".to_string());
                        continue;
                    };

                    if !seen.insert(id.to_lowercase()) {
                        warnings.push(format!("duplicate <package> entry for {id}, first wins"));
                        continue;
                    }

                    let entry_tfm = target_framework
                        .as_deref()
                        .and_then(|s| Tfm::parse(s).ok());
                    if let Some(tfm) = &entry_tfm
                        && !tfm.is_compatible_with(project_tfm)
                    {
                        warnings.push(format!(
                            "skipped {id}: targetFramework {target_framework:?} incompatible with project framework"
                        ));
                        continue;
                    }

                    let Ok(version) = version.parse() else {
                        warnings.push(format!("skipped {id}: invalid version {version:?}"));
                        continue;
                    };

                    out.push(DirectDependency {
                        id,
                        range: VersionRange::exact(version),
                        framework: entry_tfm,
                        flags: DependencyFlags {
                            development_only: development_dependency,
                            private_assets_all: false,
                        },
                    });
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(e.to_string()),
            }
            buf.clear();
        }

        Ok((out, warnings))
    }
}
