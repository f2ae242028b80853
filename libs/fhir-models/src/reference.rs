//! Parsing of `Reference.reference` strings

use std::fmt;

/// Where a `Reference` points
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceTarget {
    /// `Patient/123` or `Patient/123/_history/2`
    Local {
        resource_type: String,
        id: String,
        version: Option<String>,
    },
    /// `http://server/fhir/Patient/123[/_history/2]`
    Absolute {
        base: String,
        resource_type: String,
        id: String,
        version: Option<String>,
    },
    /// `#p1`, a resource in the `contained` list of the referencing resource
    Contained { id: String },
    /// Anything else (`urn:uuid:...`, `urn:oid:...`, unparseable URLs)
    Opaque(String),
}

fn is_resource_type(segment: &str) -> bool {
    segment
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_uppercase())
        && segment.chars().all(|c| c.is_ascii_alphanumeric())
}

fn is_id(segment: &str) -> bool {
    !segment.is_empty()
        && segment.len() <= 64
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// Split `Type/id[/_history/vid]` off the end of a path
fn split_tail(path: &str) -> Option<(&str, String, String, Option<String>)> {
    let segments: Vec<&str> = path.split('/').collect();
    let n = segments.len();

    let (type_idx, version) = if n >= 4 && segments[n - 2] == "_history" {
        (n - 4, Some(segments[n - 1].to_string()))
    } else if n >= 2 {
        (n - 2, None)
    } else {
        return None;
    };

    let resource_type = segments[type_idx];
    let id = segments[type_idx + 1];
    if !is_resource_type(resource_type) || !is_id(id) {
        return None;
    }

    let prefix_len = segments[..type_idx]
        .iter()
        .map(|s| s.len() + 1)
        .sum::<usize>();
    let base = path[..prefix_len].trim_end_matches('/');
    Some((base, resource_type.to_string(), id.to_string(), version))
}

impl ReferenceTarget {
    pub fn parse(reference: &str) -> Self {
        if let Some(id) = reference.strip_prefix('#') {
            return Self::Contained { id: id.to_string() };
        }

        if reference.starts_with("http://") || reference.starts_with("https://") {
            return match split_tail(reference) {
                Some((base, resource_type, id, version)) if !base.is_empty() => Self::Absolute {
                    base: base.to_string(),
                    resource_type,
                    id,
                    version,
                },
                _ => Self::Opaque(reference.to_string()),
            };
        }

        match split_tail(reference) {
            Some((base, resource_type, id, version)) if base.is_empty() => Self::Local {
                resource_type,
                id,
                version,
            },
            _ => Self::Opaque(reference.to_string()),
        }
    }

    pub fn resource_type(&self) -> Option<&str> {
        match self {
            Self::Local { resource_type, .. } | Self::Absolute { resource_type, .. } => {
                Some(resource_type)
            }
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Local { id, .. } | Self::Absolute { id, .. } | Self::Contained { id } => Some(id),
            Self::Opaque(_) => None,
        }
    }
}

impl fmt::Display for ReferenceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local {
                resource_type,
                id,
                version,
            } => {
                write!(f, "{resource_type}/{id}")?;
                if let Some(v) = version {
                    write!(f, "/_history/{v}")?;
                }
                Ok(())
            }
            Self::Absolute {
                base,
                resource_type,
                id,
                version,
            } => {
                write!(f, "{base}/{resource_type}/{id}")?;
                if let Some(v) = version {
                    write!(f, "/_history/{v}")?;
                }
                Ok(())
            }
            Self::Contained { id } => write!(f, "#{id}"),
            Self::Opaque(raw) => f.write_str(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_reference() {
        let target = ReferenceTarget::parse("Organization/f201");
        assert_eq!(
            target,
            ReferenceTarget::Local {
                resource_type: "Organization".into(),
                id: "f201".into(),
                version: None,
            }
        );
        assert_eq!(target.resource_type(), Some("Organization"));
        assert_eq!(target.to_string(), "Organization/f201");

        let versioned = ReferenceTarget::parse("Patient/example/_history/2");
        assert!(matches!(
            &versioned,
            ReferenceTarget::Local { version: Some(v), .. } if v == "2"
        ));
        assert_eq!(versioned.to_string(), "Patient/example/_history/2");
    }

    #[test]
    fn test_absolute_reference() {
        let target = ReferenceTarget::parse("http://fhir.example.org/base/Patient/23/_history/1");
        match &target {
            ReferenceTarget::Absolute {
                base,
                resource_type,
                id,
                version,
            } => {
                assert_eq!(base, "http://fhir.example.org/base");
                assert_eq!(resource_type, "Patient");
                assert_eq!(id, "23");
                assert_eq!(version.as_deref(), Some("1"));
            }
            other => panic!("expected absolute reference, got {other:?}"),
        }
        assert_eq!(
            target.to_string(),
            "http://fhir.example.org/base/Patient/23/_history/1"
        );
    }

    #[test]
    fn test_contained_and_opaque() {
        assert_eq!(
            ReferenceTarget::parse("#p1"),
            ReferenceTarget::Contained { id: "p1".into() }
        );
        let urn = ReferenceTarget::parse("urn:uuid:04121321-4af5-424c-a0e1-ed3aab1c349d");
        assert!(matches!(urn, ReferenceTarget::Opaque(_)));
        assert_eq!(urn.id(), None);

        assert!(matches!(ReferenceTarget::parse("patient/1"), ReferenceTarget::Opaque(_)));
        assert!(matches!(ReferenceTarget::parse("http://example.org"), ReferenceTarget::Opaque(_)));
    }
}
