//! Host command registration.
//!
//! The host agent keeps its custom commands in a JSON file. We add or remove our
//! command names in the array at a JSON pointer and leave everything else in the
//! file as it was.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::HostSettings;
use crate::error::{Error, Result};
use crate::fsutil;

/// Result of a register/unregister pass.
#[derive(Debug, Clone, Serialize)]
pub struct HostUpdate {
    pub config_file: PathBuf,
    pub pointer: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: bool,
}

/// Edits the host's command list.
pub struct HostRegistrar {
    path: PathBuf,
    pointer: String,
    commands: Vec<String>,
}

impl HostRegistrar {
    pub fn from_settings(settings: &HostSettings) -> Result<Self> {
        let path = settings
            .config_file
            .as_deref()
            .map(PathBuf::from)
            .ok_or_else(|| Error::HostConfig {
                path: PathBuf::new(),
                message: "host.config_file is not set".to_string(),
            })?;
        Ok(Self::new(
            path,
            settings.commands_pointer.clone(),
            settings.commands.clone(),
        ))
    }

    pub fn new(path: PathBuf, pointer: String, commands: Vec<String>) -> Self {
        Self {
            path,
            pointer,
            commands,
        }
    }

    /// Append each missing command name.
    pub fn register(&self) -> Result<HostUpdate> {
        let mut doc = self.load()?.unwrap_or_else(|| Value::Object(Map::new()));
        let list = self.array_mut(&mut doc)?;

        let mut added = Vec::new();
        for command in &self.commands {
            if !list.iter().any(|v| v.as_str() == Some(command)) {
                list.push(Value::String(command.clone()));
                added.push(command.clone());
            }
        }

        let changed = !added.is_empty();
        if changed {
            self.save(&doc)?;
            info!(path = %self.path.display(), added = ?added, "Registered host commands");
        } else {
            debug!(path = %self.path.display(), "Host commands already registered");
        }
        Ok(self.update(added, Vec::new(), changed))
    }

    /// Remove our command names; a missing file or array is already clean.
    pub fn unregister(&self) -> Result<HostUpdate> {
        let Some(mut doc) = self.load()? else {
            return Ok(self.update(Vec::new(), Vec::new(), false));
        };
        if doc.pointer(&self.pointer).is_none() {
            return Ok(self.update(Vec::new(), Vec::new(), false));
        }

        let list = self.array_mut(&mut doc)?;
        let mut removed = Vec::new();
        list.retain(|v| match v.as_str() {
            Some(s) if self.commands.iter().any(|c| c == s) => {
                removed.push(s.to_string());
                false
            }
            _ => true,
        });

        let changed = !removed.is_empty();
        if changed {
            self.save(&doc)?;
            info!(path = %self.path.display(), removed = ?removed, "Unregistered host commands");
        }
        Ok(self.update(Vec::new(), removed, changed))
    }

    fn update(&self, added: Vec<String>, removed: Vec<String>, changed: bool) -> HostUpdate {
        HostUpdate {
            config_file: self.path.clone(),
            pointer: self.pointer.clone(),
            added,
            removed,
            changed,
        }
    }

    fn host_error(&self, message: impl Into<String>) -> Error {
        Error::HostConfig {
            path: self.path.clone(),
            message: message.into(),
        }
    }

    fn load(&self) -> Result<Option<Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io_read(&self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| self.host_error(format!("invalid JSON: {}", e)))
    }

    fn save(&self, doc: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io_write(parent, e))?;
        }
        let mut bytes = serde_json::to_vec_pretty(doc)?;
        bytes.push(b'\n');
        fsutil::write_atomic(&self.path, &bytes).map_err(|e| Error::io_write(&self.path, e))
    }

    /// Walk the pointer, creating objects along the way and the array at the end.
    fn array_mut<'a>(&self, doc: &'a mut Value) -> Result<&'a mut Vec<Value>> {
        let segments = pointer_segments(&self.pointer)
            .ok_or_else(|| self.host_error(format!("invalid JSON pointer '{}'", self.pointer)))?;
        let Some((last, parents)) = segments.split_last() else {
            return doc
                .as_array_mut()
                .ok_or_else(|| self.host_error("document root is not an array"));
        };

        let mut current = doc;
        for segment in parents {
            current = current
                .as_object_mut()
                .ok_or_else(|| self.host_error(format!("'{}' is not inside an object", segment)))?
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }

        current
            .as_object_mut()
            .ok_or_else(|| self.host_error(format!("'{}' is not inside an object", last)))?
            .entry(last.clone())
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| self.host_error(format!("'{}' is not an array", self.pointer)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Split an RFC 6901 pointer into unescaped segments.
fn pointer_segments(pointer: &str) -> Option<Vec<String>> {
    if pointer.is_empty() {
        return Some(Vec::new());
    }
    let rest = pointer.strip_prefix('/')?;
    Some(
        rest.split('/')
            .map(|s| s.replace("~1", "/").replace("~0", "~"))
            .collect(),
    )
}
