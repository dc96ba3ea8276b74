//! Reader for a `nuget.config`-style XML document: the `<packageSources>`
//! and `<packageSourceCredentials>` sections that determine which v3
//! endpoints a scan queries and what credentials (if any) it presents to
//! each one.
//!
//! ```xml
//! <configuration>
//!   <packageSources>
//!     <add key="nuget.org" value="https://api.nuget.org/v3/index.json" />
//!     <add key="company-feed" value="https://pkgs.example.com/v3/index.json" />
//!   </packageSources>
//!   <packageSourceCredentials>
//!     <company-feed>
//!       <add key="Username" value="ci-bot" />
//!       <add key="ClearTextPassword" value="token" />
//!     </company-feed>
//!   </packageSourceCredentials>
//! </configuration>
//! ```
//!
//! `key` elements under `packageSourceCredentials` are matched against the
//! `key` attribute of a `packageSources/add`, not its URL, matching how
//! the reference tool's own `nuget.config` parser resolves credentials.

use std::collections::HashMap;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::registries::nuget::FeedCredentials;

/// One configured package source plus, if present, its matching credentials.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub key: String,
    pub url: String,
    pub credentials: Option<FeedCredentials>,
}

/// The parsed contents of a `nuget.config` document relevant to this crate:
/// an ordered list of feeds, in document order.
#[derive(Debug, Clone, Default)]
pub struct NugetConfigFile {
    pub feeds: Vec<FeedConfig>,
}

/// Tracks which XML section the reader is currently inside, one stack frame
/// per open element, so a bare `<add key="..." value="..." />` can be
/// routed to the right bucket without re-parsing ancestor context each time.
#[derive(Debug, Clone)]
enum Context {
    Root,
    PackageSources,
    PackageSourceCredentials,
    /// Inside `<packageSourceCredentials><some-source-key>`; carries the
    /// source key so nested `<add>` elements can be attributed to it.
    SourceCredential(String),
    Other,
}

impl NugetConfigFile {
    pub fn read(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Context> = vec![Context::Root];
        let mut sources: Vec<(String, String)> = Vec::new();
        let mut credentials: HashMap<String, (Option<String>, Option<String>)> = HashMap::new();

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let name = local_name(e.name().as_ref());
                    let ctx = match (stack.last(), name) {
                        (_, "packageSources") => Context::PackageSources,
                        (_, "packageSourceCredentials") => Context::PackageSourceCredentials,
                        (Some(Context::PackageSourceCredentials), _) => {
                            Context::SourceCredential(name.to_string())
                        }
                        _ => Context::Other,
                    };
                    stack.push(ctx);
                }
                Ok(Event::Empty(ref e)) => {
                    if local_name(e.name().as_ref()) != "add" {
                        continue;
                    }
                    let mut key = None;
                    let mut value = None;
                    for attr in e.attributes().flatten() {
                        let v = attr
                            .decode_and_unescape_value(reader.decoder())
                            .unwrap_or_default()
                            .to_string();
                        match attr.key.as_ref() {
                            b"key" => key = Some(v),
                            b"value" => value = Some(v),
                            _ => {}
                        }
                    }
                    let (Some(key), Some(value)) = (key, value) else { continue };

                    match stack.last() {
                        Some(Context::PackageSources) => sources.push((key, value)),
                        Some(Context::SourceCredential(source_key)) => {
                            let entry = credentials.entry(source_key.clone()).or_insert((None, None));
                            if key.eq_ignore_ascii_case("Username") {
                                entry.0 = Some(value);
                            } else if key.eq_ignore_ascii_case("ClearTextPassword")
                                || key.eq_ignore_ascii_case("Password")
                            {
                                entry.1 = Some(value);
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::End(_)) => {
                    stack.pop();
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(e.to_string()),
            }
            buf.clear();
        }

        let feeds = sources
            .into_iter()
            .map(|(key, url)| {
                let credentials = credentials.get(&key).and_then(|(user, pass)| match (user, pass) {
                    (Some(username), Some(password)) => Some(FeedCredentials {
                        username: username.clone(),
                        password: password.clone(),
                    }),
                    _ => None,
                });
                FeedConfig { key, url, credentials }
            })
            .collect();

        Ok(Self { feeds })
    }
}

fn local_name(qualified: &[u8]) -> &str {
    std::str::from_utf8(qualified).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<configuration>
  <packageSources>
    <add key="nuget.org" value="https://api.nuget.org/v3/index.json" />
    <add key="company-feed" value="https://pkgs.example.com/v3/index.json" />
  </packageSources>
  <packageSourceCredentials>
    <company-feed>
      <add key="Username" value="ci-bot" />
      <add key="ClearTextPassword" value="token" />
    </company-feed>
  </packageSourceCredentials>
</configuration>
"#;

    #[test]
    fn parses_sources_in_document_order() {
        let config = NugetConfigFile::parse(SAMPLE).unwrap();
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.feeds[0].key, "nuget.org");
        assert_eq!(config.feeds[1].key, "company-feed");
    }

    #[test]
    fn matches_credentials_by_source_key() {
        let config = NugetConfigFile::parse(SAMPLE).unwrap();
        assert!(config.feeds[0].credentials.is_none());
        let creds = config.feeds[1].credentials.as_ref().unwrap();
        assert_eq!(creds.username, "ci-bot");
        assert_eq!(creds.password, "token");
    }

    #[test]
    fn source_without_credentials_has_none() {
        let config = NugetConfigFile::parse(SAMPLE).unwrap();
        assert!(config.feeds.iter().find(|f| f.key == "nuget.org").unwrap().credentials.is_none());
    }
}
