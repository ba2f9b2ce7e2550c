//! Describes how tail targets are represented in the paths of live channels.
//!
//! A panel query is answered with a snapshot frame whose channel is
//! `ds/<datasource uid>/<path>`; the host then subscribes to that channel and
//! the backend has to recover the target from the path alone.

use std::{
    fmt::{self, Write},
    str::FromStr,
};

use sha2::{Digest, Sha256};

use crate::errors::{AppError, AppResult};
use crate::models::query::{RelationName, SelectStatement, TailTarget};

/// How a type is serialized into a channel path.
///
/// Channel paths can only contain alphanumerics and a few other characters,
/// so some types encode their data differently.
pub trait PathDisplay {
    /// Format `self` into `f`, like [`fmt::Display::fmt`], keeping the output path-safe.
    fn fmt_path(&self, f: &mut String) -> fmt::Result;

    fn to_path(&self) -> String {
        let mut s = String::new();
        self.fmt_path(&mut s).expect("writing to a String cannot fail");
        s
    }
}

/// The ID of a select statement.
///
/// Used as the key of the backend's statement map and safe to embed in a
/// channel path, so a stream subscription can find the statement that the
/// snapshot query ran. Internally a hex sha256 digest of the statement.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct QueryId(String);

impl QueryId {
    /// Wraps a pre-computed digest taken from a path.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn from_statement(statement: &SelectStatement) -> Self {
        Self(format!("{:x}", Sha256::digest(statement.as_str().as_bytes())))
    }

    /// The digest, not the original statement.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl PathDisplay for RelationName {
    fn fmt_path(&self, f: &mut String) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PathDisplay for SelectStatement {
    fn fmt_path(&self, f: &mut String) -> fmt::Result {
        f.write_str(QueryId::from_statement(self).as_str())
    }
}

impl PathDisplay for TailTarget {
    fn fmt_path(&self, f: &mut String) -> fmt::Result {
        f.write_str("tail/")?;
        match self {
            Self::Relation { name } => {
                f.write_str("relation/")?;
                name.fmt_path(f)
            }
            Self::Select { statement } => {
                f.write_str("select/")?;
                statement.fmt_path(f)
            }
        }
    }
}

/// A parsed channel path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Path {
    /// Tail the output of a target.
    Tail(TailPath),
}

/// The target part of a tail path. Select statements travel as their ID.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TailPath {
    Relation { name: RelationName },
    Select { query_id: QueryId },
}

impl FromStr for Path {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        let unknown = || AppError::UnknownPath(s.to_string());
        let mut parts = s.trim_matches('/').splitn(3, '/');
        let (Some("tail"), Some(kind), Some(rest)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(unknown());
        };
        match kind {
            "relation" => Ok(Self::Tail(TailPath::Relation {
                name: rest.parse().map_err(|_| unknown())?,
            })),
            "select" if is_query_id(rest) => Ok(Self::Tail(TailPath::Select {
                query_id: QueryId::new(rest),
            })),
            _ => Err(unknown()),
        }
    }
}

fn is_query_id(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// A live channel address: `ds/<datasource uid>/<path>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Channel {
    pub datasource_uid: String,
    pub path: String,
}

impl Channel {
    pub fn new(datasource_uid: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            datasource_uid: datasource_uid.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ds/{}/{}", self.datasource_uid, self.path)
    }
}

impl FromStr for Channel {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.splitn(3, '/').collect::<Vec<_>>()[..] {
            ["ds", uid, path] if !uid.is_empty() && !path.is_empty() => Ok(Self::new(uid, path)),
            _ => Err(AppError::UnknownPath(s.to_string())),
        }
    }
}
