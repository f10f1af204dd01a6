//! Navigation token codec and the places a token can live.
//!
//! A token has the form `<workflow>[@<run>[@<artifact>]]`. Parsing is purely
//! positional from the left: the first empty segment ends the token, so a
//! malformed input degrades to the nearest valid prefix instead of producing
//! a state with a gap.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use tracing::debug;

use crate::error::Result;
use crate::types::NavigationState;

/// Reserved separator between token fields.
pub const SEPARATOR: char = '@';

/// Decode a raw token. Never fails; unusable input yields the unset state.
pub fn parse(raw: &str) -> NavigationState {
    let mut state = NavigationState::new();
    for (depth, segment) in raw.split(SEPARATOR).take(3).enumerate() {
        let next = match depth {
            0 => state.with_workflow(segment),
            1 => state.with_run(segment),
            _ => state.with_artifact(segment),
        };
        match next {
            Some(s) => state = s,
            None => break,
        }
    }
    state
}

/// Encode a state. Unset trailing fields are simply absent.
pub fn serialize(state: &NavigationState) -> String {
    let sep = SEPARATOR.to_string();
    [state.workflow_id(), state.run_id(), state.artifact_id()]
        .into_iter()
        .map_while(|f| f)
        .collect::<Vec<_>>()
        .join(sep.as_str())
}

impl std::fmt::Display for NavigationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&serialize(self))
    }
}

impl FromStr for NavigationState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(parse(s))
    }
}

/// Where the current token is kept between navigation events.
pub trait LocationHost: Send + Sync + 'static {
    /// The raw token currently stored, empty if none.
    fn read(&self) -> String;

    /// Replace the stored token.
    fn write(&self, token: &str) -> Result<()>;
}

/// Token held in memory only.
#[derive(Debug, Default)]
pub struct MemoryLocation {
    token: Mutex<String>,
}

impl MemoryLocation {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(token.into()),
        }
    }
}

impl LocationHost for MemoryLocation {
    fn read(&self) -> String {
        self.token
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    fn write(&self, token: &str) -> Result<()> {
        if let Ok(mut t) = self.token.lock() {
            *t = token.to_string();
        }
        Ok(())
    }
}

/// Token persisted to a file so a restarted client comes back to the same
/// selection.
#[derive(Debug, Clone)]
pub struct FileLocation {
    path: PathBuf,
}

impl FileLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocationHost for FileLocation {
    fn read(&self) -> String {
        std::fs::read_to_string(&self.path)
            .map(|s| s.trim_end_matches(['\n', '\r']).to_string())
            .unwrap_or_default()
    }

    fn write(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{}\n", token))?;
        debug!(path = %self.path.display(), token, "Persisted location");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(token: &str) -> NavigationState {
        parse(token)
    }

    #[test]
    fn empty_token_is_unset() {
        assert_eq!(parse(""), NavigationState::new());
    }

    #[test]
    fn fields_are_positional() {
        let s = parse("orders@2024-01-02T10-00-00@B.log");
        assert_eq!(s.workflow_id(), Some("orders"));
        assert_eq!(s.run_id(), Some("2024-01-02T10-00-00"));
        assert_eq!(s.artifact_id(), Some("B.log"));
    }

    #[test]
    fn round_trips_every_depth() {
        let states = [
            NavigationState::new(),
            NavigationState::workflow("orders").unwrap(),
            NavigationState::workflow("orders")
                .and_then(|s| s.with_run("r1"))
                .unwrap(),
            NavigationState::workflow("orders")
                .and_then(|s| s.with_run("r1"))
                .and_then(|s| s.with_artifact("A.log"))
                .unwrap(),
        ];
        for s in states {
            assert_eq!(parse(&serialize(&s)), s);
        }
    }

    #[test]
    fn never_emits_trailing_separator() {
        let s = NavigationState::workflow("orders").unwrap();
        assert_eq!(serialize(&s), "orders");
        assert_eq!(serialize(&NavigationState::new()), "");
        let s = s.with_run("r1").unwrap();
        assert_eq!(s.to_string(), "orders@r1");
    }

    #[test]
    fn leading_separator_degrades_to_unset() {
        let s = parse("@x");
        assert!(s.is_empty());
        assert_eq!(s.run_id(), None);
    }

    #[test]
    fn gap_keeps_valid_prefix() {
        let s = parse("a@@c");
        assert_eq!(s.workflow_id(), Some("a"));
        assert_eq!(s.run_id(), None);
        assert_eq!(s.artifact_id(), None);

        let s = parse("a@b@");
        assert_eq!(s.depth(), 2);
    }

    #[test]
    fn extra_segments_are_ignored() {
        let s = state("a@b@c@d");
        assert_eq!(s.artifact_id(), Some("c"));
        assert_eq!(s.to_string(), "a@b@c");
    }

    #[test]
    fn content_is_not_validated() {
        let s = state("weird name/.. %20@run #1");
        assert_eq!(s.workflow_id(), Some("weird name/.. %20"));
        assert_eq!(s.run_id(), Some("run #1"));
    }

    #[test]
    fn from_str_matches_parse() {
        let s: NavigationState = "orders@r1".parse().unwrap();
        assert_eq!(s, parse("orders@r1"));
    }

    #[test]
    fn memory_location_stores_token() {
        let host = MemoryLocation::new("orders");
        assert_eq!(host.read(), "orders");
        host.write("orders@r1").unwrap();
        assert_eq!(host.read(), "orders@r1");
    }

    #[test]
    fn file_location_persists_token() {
        let dir = tempfile::tempdir().unwrap();
        let host = FileLocation::new(dir.path().join("state").join("location"));
        assert_eq!(host.read(), "");
        host.write("orders@r1@A.log").unwrap();

        let reopened = FileLocation::new(host.path().to_path_buf());
        assert_eq!(parse(&reopened.read()).artifact_id(), Some("A.log"));
    }
}
