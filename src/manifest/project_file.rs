//! Readers for the project file itself: the common case when no lockfile
//! or legacy manifest is present.
//!
//! [`ProjectFileReader`] evaluates `<PackageReference>`/`<Reference>` items
//! with `quick-xml`, tracking `PropertyGroup`-declared properties well
//! enough to resolve `$(TargetFramework)`-style self-references in simple
//! cases (the common `<TargetFrameworks>net8.0;net472</TargetFrameworks>`
//! pattern needs no evaluation at all). When that evaluation fails —
//! malformed XML, for instance — [`XmlFallbackReader`] takes over with a
//! line-oriented scan that ignores conditions and framework context
//! entirely, grounded on the same substring-search approach previously used
//! for IDE-inline C# dependency extraction.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::framework::Tfm;
use crate::version::{Version, VersionRange};

use super::{DependencyFlags, DirectDependency, ManifestError};

pub struct ProjectFileResult {
    pub dependencies: Vec<DirectDependency>,
    pub project_tfm: Option<Tfm>,
    pub project_version: Option<Version>,
    pub warnings: Vec<String>,
}

pub struct ProjectFileReader;

impl ProjectFileReader {
    pub fn read(path: &Path) -> Result<ProjectFileResult, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|_| ManifestError::NotFound(path.to_path_buf()))?;
        Self::parse(&content).map_err(|reason| ManifestError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn parse(content: &str) -> Result<ProjectFileResult, String> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut warnings = Vec::new();
        let mut dependencies: Vec<DirectDependency> = Vec::new();
        let mut seen_ids = std::collections::HashSet::new();

        let mut project_tfm: Option<Tfm> = None;
        let mut version: Option<String> = None;
        let mut version_prefix: Option<String> = None;
        let mut version_suffix: Option<String> = None;

        // Text-element state: which simple property we're inside, to capture
        // `<TargetFramework>net8.0</TargetFramework>`-style text nodes.
        let mut pending_property: Option<String> = None;

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let name = local_name(e.name().as_ref());
                    match name {
                        "TargetFramework" | "TargetFrameworkVersion" | "TargetFrameworks"
                        | "Version" | "VersionPrefix" | "VersionSuffix" => {
                            pending_property = Some(name.to_string());
                        }
                        "PackageReference" => {
                            if let Some(dep) =
                                parse_package_reference_element(&mut reader, e, &mut warnings)
                            {
                                push_dependency(dep, &mut dependencies, &mut seen_ids, &mut warnings);
                            }
                        }
                        "Reference" => {
                            if let Some(dep) = parse_reference_item(&reader, e) {
                                push_dependency(dep, &mut dependencies, &mut seen_ids, &mut warnings);
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    let name = local_name(e.name().as_ref());
                    if name == "PackageReference"
                        && let Some(dep) = package_reference_from_attrs(&reader, e, &mut warnings)
                    {
                        push_dependency(dep, &mut dependencies, &mut seen_ids, &mut warnings);
                    }
                }
                Ok(Event::Text(ref t)) => {
                    if let Some(prop) = pending_property.take() {
                        let text = t.unescape().unwrap_or_default().to_string();
                        match prop.as_str() {
                            "TargetFramework" if project_tfm.is_none() => {
                                project_tfm = Tfm::parse(&text).ok();
                            }
                            "TargetFrameworkVersion" if project_tfm.is_none() => {
                                project_tfm = Tfm::parse(&text).ok();
                            }
                            "TargetFrameworks" if project_tfm.is_none() => {
                                let first = text.split(';').find(|s| !s.trim().is_empty());
                                project_tfm = first.and_then(|s| Tfm::parse(s.trim()).ok());
                            }
                            "Version" => {
                                version.get_or_insert(text);
                            }
                            "VersionPrefix" => {
                                version_prefix.get_or_insert(text);
                            }
                            "VersionSuffix" => {
                                version_suffix.get_or_insert(text);
                            }
                            _ => {}
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(e.to_string()),
            }
            buf.clear();
        }

        let project_version = version
            .and_then(|v| v.parse().ok())
            .or_else(|| {
                version_prefix.map(|prefix| match &version_suffix {
                    Some(suffix) => format!("{prefix}-{suffix}"),
                    None => prefix,
                })
                .and_then(|s| s.parse().ok())
            });

        Ok(ProjectFileResult {
            dependencies,
            project_tfm,
            project_version,
            warnings,
        })
    }
}

fn push_dependency(
    dep: DirectDependency,
    out: &mut Vec<DirectDependency>,
    seen: &mut std::collections::HashSet<String>,
    warnings: &mut Vec<String>,
) {
    let key = dep.id.to_lowercase();
    if !seen.insert(key) {
        warnings.push(format!("duplicate <PackageReference> for {}, first wins", dep.id));
        return;
    }
    out.push(dep);
}

fn local_name(qualified: &[u8]) -> &str {
    std::str::from_utf8(qualified).unwrap_or("")
}

/// Attributes found on a `<PackageReference>` start/empty tag, before any
/// nested child elements (`<Version>`, `<PrivateAssets>`, ...) are folded
/// in. Attribute and nested-element forms are equally valid MSBuild item
/// metadata syntax; whichever is present wins, attributes taking priority
/// since they're read first.
#[derive(Default)]
struct PackageReferenceAttrs {
    id: Option<String>,
    version: Option<String>,
    is_implicit: bool,
    private_assets: Option<String>,
    include_assets: Option<String>,
    exclude_assets: Option<String>,
}

fn read_package_reference_attrs(
    reader: &Reader<&[u8]>,
    start: &quick_xml::events::BytesStart,
) -> PackageReferenceAttrs {
    let mut attrs = PackageReferenceAttrs::default();
    for attr in start.attributes().flatten() {
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .unwrap_or_default()
            .to_string();
        match attr.key.as_ref() {
            b"Include" => attrs.id = Some(value),
            b"Version" => attrs.version = Some(value),
            b"IsImplicitlyDefined" => attrs.is_implicit = value.eq_ignore_ascii_case("true"),
            b"PrivateAssets" => attrs.private_assets = Some(value),
            b"IncludeAssets" => attrs.include_assets = Some(value),
            b"ExcludeAssets" => attrs.exclude_assets = Some(value),
            _ => {}
        }
    }
    attrs
}

/// Turns a fully-gathered set of `PackageReference` attributes/metadata
/// into a [`DirectDependency`], or `None` when the reference should be
/// dropped entirely (implicit, versionless, or its effective asset set is
/// empty).
///
/// A reference with `IsImplicitlyDefined="true"` (added automatically by
/// the SDK for implicit framework references) is ignored. A reference with
/// no version metadata at all is skipped — not treated as a universal
/// range — matching the teacher's own PackageReference scanner, which
/// silently drops versionless entries rather than guessing a range.
fn package_reference_from(attrs: PackageReferenceAttrs, warnings: &mut Vec<String>) -> Option<DirectDependency> {
    let id = attrs.id?;
    if attrs.is_implicit {
        return None;
    }

    let version_str = attrs.version?;

    let range: VersionRange = version_str.parse().unwrap_or_else(|_| {
        warnings.push(format!("invalid <PackageReference> version {version_str:?} for {id}"));
        VersionRange::universal()
    });

    let private_assets_all = attrs
        .private_assets
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("all"))
        .unwrap_or(false);
    let effectively_empty = attrs
        .include_assets
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("none") || s.trim().is_empty())
        .unwrap_or(false)
        || attrs
            .exclude_assets
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("all"))
            .unwrap_or(false);
    if effectively_empty {
        return None;
    }

    Some(DirectDependency {
        id,
        range,
        framework: None,
        flags: DependencyFlags {
            development_only: false,
            private_assets_all,
        },
    })
}

/// Parses a self-closing `<PackageReference Include="..." Version="..." />`,
/// which can carry no nested children.
fn package_reference_from_attrs(
    reader: &Reader<&[u8]>,
    start: &quick_xml::events::BytesStart,
    warnings: &mut Vec<String>,
) -> Option<DirectDependency> {
    package_reference_from(read_package_reference_attrs(reader, start), warnings)
}

/// Parses a `<PackageReference>` opened with a `Start` event, folding in
/// any nested `<Version>`/`<PrivateAssets>`/`<IncludeAssets>`/
/// `<ExcludeAssets>` child elements (e.g. `<PackageReference
/// Include="Foo"><Version>1.2.3</Version></PackageReference>`) up to the
/// matching `</PackageReference>`. Consuming the whole element here means
/// its children are never seen by the caller's own event loop, so a nested
/// `<Version>` can't be mistaken for the project's own `<Version>`
/// property.
fn parse_package_reference_element(
    reader: &mut Reader<&[u8]>,
    start: &quick_xml::events::BytesStart,
    warnings: &mut Vec<String>,
) -> Option<DirectDependency> {
    let mut attrs = read_package_reference_attrs(reader, start);

    let mut pending_child: Option<String> = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e.name().as_ref());
                if matches!(name, "Version" | "PrivateAssets" | "IncludeAssets" | "ExcludeAssets") {
                    pending_child = Some(name.to_string());
                }
            }
            Ok(Event::Text(ref t)) => {
                if let Some(child) = pending_child.take() {
                    let text = t.unescape().unwrap_or_default().to_string();
                    match child.as_str() {
                        "Version" => attrs.version.get_or_insert(text),
                        "PrivateAssets" => attrs.private_assets.get_or_insert(text),
                        "IncludeAssets" => attrs.include_assets.get_or_insert(text),
                        "ExcludeAssets" => attrs.exclude_assets.get_or_insert(text),
                        _ => continue,
                    };
                }
            }
            Ok(Event::End(ref e)) if local_name(e.name().as_ref()) == "PackageReference" => break,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warnings.push(format!("malformed XML inside <PackageReference>: {e}"));
                break;
            }
        }
        buf.clear();
    }

    package_reference_from(attrs, warnings)
}

/// Parses a classic `<Reference Include="Name, Version=1.2.3.0, Culture=neutral, PublicKeyToken=..." />`.
fn parse_reference_item(
    reader: &Reader<&[u8]>,
    start: &quick_xml::events::BytesStart,
) -> Option<DirectDependency> {
    let include = start
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"Include")
        .map(|a| {
            a.decode_and_unescape_value(reader.decoder())
                .unwrap_or_default()
                .to_string()
        })?;

    if !include.contains("Version=") {
        return None;
    }

    let mut parts = include.split(',').map(str::trim);
    let name = parts.next()?.to_string();
    let version_str = include
        .split(',')
        .map(str::trim)
        .find_map(|p| p.strip_prefix("Version="))?;

    let version: Version = version_str.parse().ok()?;

    Some(DirectDependency {
        id: name,
        range: VersionRange::exact(version),
        framework: None,
        flags: DependencyFlags::default(),
    })
}

/// Last-resort reader used when MSBuild-style evaluation fails. Scans line
/// by line for `<PackageReference Include="..." Version="..." />` without
/// interpreting conditions, properties, or target frameworks.
pub struct XmlFallbackReader;

impl XmlFallbackReader {
    pub fn read(path: &Path) -> Result<ProjectFileResult, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|_| ManifestError::NotFound(path.to_path_buf()))?;
        Ok(Self::parse(&content))
    }

    fn parse(content: &str) -> ProjectFileResult {
        let mut dependencies = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut warnings = Vec::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if !trimmed.contains("<PackageReference") || !trimmed.contains("Include=") {
                continue;
            }
            let Some(id) = extract_quoted(line, "Include=\"") else { continue };
            let version_str = extract_quoted(line, "Version=\"")
                .or_else(|| extract_element_text(line, "<Version>"));
            let Some(version_str) = version_str else { continue };
            let Ok(range) = version_str.parse::<VersionRange>() else { continue };

            if !seen.insert(id.to_lowercase()) {
                warnings.push(format!("duplicate <PackageReference> for {id}, first wins"));
                continue;
            }
            dependencies.push(DirectDependency {
                id,
                range,
                framework: None,
                flags: DependencyFlags::default(),
            });
        }

        let version_line = content
            .lines()
            .find_map(|l| extract_element_text(l, "<Version>"));
        let prefix = content
            .lines()
            .find_map(|l| extract_element_text(l, "<VersionPrefix>"));
        let suffix = content
            .lines()
            .find_map(|l| extract_element_text(l, "<VersionSuffix>"));

        let project_version = version_line
            .or_else(|| {
                prefix.map(|p| match &suffix {
                    Some(s) => format!("{p}-{s}"),
                    None => p,
                })
            })
            .and_then(|s| s.parse().ok())
            .or_else(|| Some("1.0.0".parse().unwrap()));

        ProjectFileResult {
            dependencies,
            project_tfm: None,
            project_version,
            warnings,
        }
    }
}

fn extract_quoted(line: &str, marker: &str) -> Option<String> {
    let start = line.find(marker)? + marker.len();
    let rest = &line[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

fn extract_element_text(line: &str, open_tag: &str) -> Option<String> {
    let start = line.find(open_tag)? + open_tag.len();
    let rest = &line[start..];
    let end = rest.find('<')?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFramework>net8.0</TargetFramework>
    <Version>2.3.4</Version>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="Newtonsoft.Json" Version="13.0.3" />
    <PackageReference Include="NoVersion.Pkg" />
    <PackageReference Include="Internal.Tool" Version="1.0.0" PrivateAssets="All" />
    <PackageReference Include="Newtonsoft.Json" Version="12.0.0" />
  </ItemGroup>
</Project>
"#;

    #[test]
    fn parses_target_framework_and_version() {
        let result = ProjectFileReader::parse(SAMPLE).unwrap();
        assert_eq!(result.project_tfm, Some(Tfm::parse("net8.0").unwrap()));
        assert_eq!(result.project_version, Some("2.3.4".parse().unwrap()));
    }

    #[test]
    fn skips_versionless_reference_and_dedups() {
        let result = ProjectFileReader::parse(SAMPLE).unwrap();
        assert!(!result.dependencies.iter().any(|d| d.id == "NoVersion.Pkg"));
        assert_eq!(
            result.dependencies.iter().filter(|d| d.id == "Newtonsoft.Json").count(),
            1
        );
    }

    #[test]
    fn private_assets_all_is_flagged() {
        let result = ProjectFileReader::parse(SAMPLE).unwrap();
        let tool = result.dependencies.iter().find(|d| d.id == "Internal.Tool").unwrap();
        assert!(tool.flags.private_assets_all);
    }

    #[test]
    fn fallback_reader_matches_basic_extraction() {
        let result = XmlFallbackReader::parse(SAMPLE);
        assert!(result.dependencies.iter().any(|d| d.id == "Newtonsoft.Json"));
        assert_eq!(result.project_version, Some("2.3.4".parse().unwrap()));
    }

    const NESTED_VERSION_SAMPLE: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFramework>net8.0</TargetFramework>
    <Version>2.3.4</Version>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="Foo">
      <Version>1.2.3</Version>
    </PackageReference>
  </ItemGroup>
</Project>
"#;

    #[test]
    fn reads_version_from_nested_element() {
        let result = ProjectFileReader::parse(NESTED_VERSION_SAMPLE).unwrap();
        let foo = result.dependencies.iter().find(|d| d.id == "Foo").unwrap();
        assert!(foo.range.contains(&"1.2.3".parse().unwrap()));
    }

    #[test]
    fn nested_package_reference_version_does_not_leak_into_project_version() {
        let result = ProjectFileReader::parse(NESTED_VERSION_SAMPLE).unwrap();
        assert_eq!(result.project_version, Some("2.3.4".parse().unwrap()));
    }
}
