//! Which backend runs which operation kind.

use crate::ir::OpKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("backend list is empty")]
    EmptyBackendList,
    #[error("malformed override '{0}', expected <OpKind>=<backend>")]
    MalformedOverride(String),
    #[error("unknown operation kind '{0}' in override")]
    UnknownOpKind(String),
    #[error("override '{kind}={backend}' names a backend missing from the backend list")]
    UnlistedBackend { kind: String, backend: String },
}

/// Default backend plus per-kind overrides, resolved once per compilation.
///
/// Every backend the selection names must be registered when the graph is compiled, even
/// one no operation ends up on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSelection {
    pub default_backend: String,
    /// Further backends after the default, in listing order.
    #[serde(default)]
    pub extra_backends: Vec<String>,
    #[serde(default)]
    pub overrides: BTreeMap<OpKind, String>,
}

impl BackendSelection {
    pub fn new(default_backend: impl Into<String>) -> Self {
        Self {
            default_backend: default_backend.into(),
            extra_backends: Vec::new(),
            overrides: BTreeMap::new(),
        }
    }

    /// Routes `kind` to `backend`, listing the backend if it is new.
    pub fn with_override(mut self, kind: OpKind, backend: impl Into<String>) -> Self {
        let backend = backend.into();
        self.list(&backend);
        self.overrides.insert(kind, backend);
        self
    }

    /// Every backend the selection names: the default first, then the rest in listing order.
    pub fn backends(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.default_backend.as_str())
            .chain(self.extra_backends.iter().map(String::as_str))
            .chain(
                self.overrides
                    .values()
                    .map(String::as_str)
                    .filter(move |backend| !self.is_listed(backend)),
            )
    }

    fn is_listed(&self, backend: &str) -> bool {
        self.default_backend == backend || self.extra_backends.iter().any(|b| b == backend)
    }

    fn list(&mut self, backend: &str) {
        if !self.is_listed(backend) {
            self.extra_backends.push(backend.to_string());
        }
    }

    pub fn backend_for(&self, kind: OpKind) -> &str {
        self.overrides
            .get(&kind)
            .map(String::as_str)
            .unwrap_or(self.default_backend.as_str())
    }

    /// Parses the textual form: a `;`-separated backend list whose first entry is the default,
    /// and `,`/`;`-separated `<OpKind>=<backend>` overrides. An override may only name a
    /// listed backend.
    ///
    /// ```
    /// use nnrt::backend::selection::BackendSelection;
    /// use nnrt::ir::OpKind;
    ///
    /// let selection = BackendSelection::parse("tflite;cpu", "Conv2D=cpu").unwrap();
    /// assert_eq!(selection.backend_for(OpKind::Conv2D), "cpu");
    /// assert_eq!(selection.backend_for(OpKind::Add), "tflite");
    /// ```
    pub fn parse(backends: &str, overrides: &str) -> Result<Self, SelectionError> {
        let mut listed = backends
            .split(';')
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let default_backend = listed.next().ok_or(SelectionError::EmptyBackendList)?;
        let mut selection = BackendSelection::new(default_backend);
        for backend in listed {
            selection.list(backend);
        }

        for entry in overrides
            .split([',', ';'])
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
        {
            let (kind, backend) = entry
                .split_once('=')
                .map(|(kind, backend)| (kind.trim(), backend.trim()))
                .filter(|(kind, backend)| !kind.is_empty() && !backend.is_empty())
                .ok_or_else(|| SelectionError::MalformedOverride(entry.to_string()))?;
            let parsed: OpKind = kind
                .parse()
                .map_err(|_| SelectionError::UnknownOpKind(kind.to_string()))?;
            if !selection.is_listed(backend) {
                return Err(SelectionError::UnlistedBackend {
                    kind: kind.to_string(),
                    backend: backend.to_string(),
                });
            }
            selection.overrides.insert(parsed, backend.to_string());
        }
        Ok(selection)
    }
}
