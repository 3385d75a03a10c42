//! Image reference parsing
//!
//! References follow the usual `[registry/]repository[:tag]` form.
//! Bare Docker Hub names gain the `library/` prefix and the tag
//! defaults to `latest`.

use crate::error::{SkiffError, SkiffResult};
use std::fmt;

/// Default registry host for references without one
pub const DEFAULT_REGISTRY: &str = "registry-1.docker.io";
/// Default tag for references without one
pub const DEFAULT_TAG: &str = "latest";

/// A parsed image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Registry host, possibly with a port
    pub registry: String,
    /// Repository path within the registry
    pub repository: String,
    /// Tag
    pub tag: String,
}

impl Reference {
    /// Parse a reference string
    pub fn parse(input: &str) -> SkiffResult<Self> {
        let invalid = |reason: &str| SkiffError::InvalidReference {
            reference: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty reference"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(invalid("whitespace not allowed"));
        }

        // Split off the registry host: the first path component is a host
        // only if it contains '.' or ':' or is "localhost".
        let (registry, rest) = match trimmed.split_once('/') {
            Some((head, rest))
                if head.contains('.') || head.contains(':') || head == "localhost" =>
            {
                (head.to_string(), rest)
            }
            _ => (DEFAULT_REGISTRY.to_string(), trimmed),
        };

        if rest.is_empty() {
            return Err(invalid("missing repository"));
        }

        // The tag separator is a ':' after the last '/'.
        let (repository, tag) = match rest.rfind(':') {
            Some(idx) if idx > rest.rfind('/').map_or(0, |s| s) => {
                let (repo, tag) = rest.split_at(idx);
                (repo.to_string(), tag[1..].to_string())
            }
            _ => (rest.to_string(), DEFAULT_TAG.to_string()),
        };

        if repository.is_empty() {
            return Err(invalid("missing repository"));
        }
        if tag.is_empty() {
            return Err(invalid("empty tag"));
        }

        // Docker Hub bare names live under library/
        let repository = if registry == DEFAULT_REGISTRY && !repository.contains('/') {
            format!("library/{repository}")
        } else {
            repository
        };

        Ok(Self {
            registry,
            repository,
            tag,
        })
    }

    /// Filesystem-safe identity string derived from the reference
    pub fn path_id(&self) -> String {
        format!("{self}").replace('/', "%").replace(':', "+")
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_name() {
        let r = Reference::parse("alpine").unwrap();
        assert_eq!(r.registry, DEFAULT_REGISTRY);
        assert_eq!(r.repository, "library/alpine");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn parse_with_tag() {
        let r = Reference::parse("alpine:3.19").unwrap();
        assert_eq!(r.repository, "library/alpine");
        assert_eq!(r.tag, "3.19");
    }

    #[test]
    fn parse_with_registry_and_port() {
        let r = Reference::parse("localhost:5000/myimage:v1").unwrap();
        assert_eq!(r.registry, "localhost:5000");
        assert_eq!(r.repository, "myimage");
        assert_eq!(r.tag, "v1");
    }

    #[test]
    fn parse_nested_repository() {
        let r = Reference::parse("ghcr.io/org/team/app:2.0").unwrap();
        assert_eq!(r.registry, "ghcr.io");
        assert_eq!(r.repository, "org/team/app");
        assert_eq!(r.tag, "2.0");
    }

    #[test]
    fn parse_org_repo_on_hub() {
        // A first component without dot/colon is part of the repository
        let r = Reference::parse("dean0x/tool:1.0").unwrap();
        assert_eq!(r.registry, DEFAULT_REGISTRY);
        assert_eq!(r.repository, "dean0x/tool");
    }

    #[test]
    fn parse_invalid() {
        assert!(Reference::parse("").is_err());
        assert!(Reference::parse("has space:tag").is_err());
        assert!(Reference::parse("repo:").is_err());
        assert!(Reference::parse("example.com/").is_err());
    }

    #[test]
    fn display_roundtrip() {
        let r = Reference::parse("localhost:5000/myimage:v1").unwrap();
        let again = Reference::parse(&r.to_string()).unwrap();
        assert_eq!(r, again);
    }

    #[test]
    fn path_id_is_filesystem_safe() {
        let r = Reference::parse("localhost:5000/org/app:v1").unwrap();
        let id = r.path_id();
        assert!(!id.contains('/'));
        assert!(!id.contains(':'));
        assert_eq!(id, "localhost+5000%org%app+v1");
    }

    #[test]
    fn path_id_is_stable() {
        let a = Reference::parse("alpine:3.19").unwrap().path_id();
        let b = Reference::parse("alpine:3.19").unwrap().path_id();
        assert_eq!(a, b);
    }
}
