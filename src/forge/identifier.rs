//! Parsing of repository identifiers given by users
//!
//! Accepts `owner/name`, HTTPS URLs (optionally with `.git` or a
//! `/tree/<ref>` suffix) and SCP-style `git@host:owner/name.git` remotes.

use url::Url;

use crate::forge::types::RepositoryId;
use crate::ingest::error::IngestError;

/// Identifier parsed from user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIdentifier {
    pub repository: RepositoryId,
    /// Reference embedded in a `/tree/<ref>` URL
    pub reference: Option<String>,
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

fn from_segments<'a>(
    input: &str,
    mut segments: impl Iterator<Item = &'a str>,
) -> Result<ParsedIdentifier, IngestError> {
    let invalid = || IngestError::InvalidIdentifier {
        input: input.to_string(),
    };

    let owner = segments.next().ok_or_else(invalid)?;
    let name = segments
        .next()
        .map(|n| n.trim_end_matches(".git"))
        .ok_or_else(invalid)?;

    if !is_valid_segment(owner) || !is_valid_segment(name) {
        return Err(invalid());
    }

    let rest: Vec<&str> = segments.collect();
    let reference = match rest.as_slice() {
        [] => None,
        ["tree", reference @ ..] | ["blob", reference @ ..] if !reference.is_empty() => {
            Some(reference.join("/"))
        }
        _ => return Err(invalid()),
    };

    Ok(ParsedIdentifier {
        repository: RepositoryId::new(owner, name),
        reference,
    })
}

/// Parse a repository identifier
pub fn parse_identifier(input: &str) -> Result<ParsedIdentifier, IngestError> {
    let trimmed = input.trim();

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        let url = Url::parse(trimmed).map_err(|_| IngestError::InvalidIdentifier {
            input: input.to_string(),
        })?;
        let path = url.path().trim_matches('/').to_string();
        return from_segments(input, path.split('/').filter(|s| !s.is_empty()));
    }

    if let Some(stripped) = trimmed.strip_prefix("git@") {
        let (_, path) = stripped
            .split_once(':')
            .ok_or_else(|| IngestError::InvalidIdentifier {
                input: input.to_string(),
            })?;
        return from_segments(input, path.trim_matches('/').split('/'));
    }

    from_segments(input, trimmed.trim_matches('/').split('/'))
}
