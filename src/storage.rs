use log::warn;
use serde_json::{Map, Value};
#[cfg(test)]
use std::cell::RefCell;
#[cfg(test)]
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const WINDOW_START_KEY: &str = "timecard_date_range_start";
pub const WINDOW_END_KEY: &str = "timecard_date_range_end";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), io::Error>;
    fn remove(&self, key: &str) -> Result<(), io::Error>;
    fn clear(&self) -> Result<(), io::Error>;
}

// Re-read on every call so separate invocations see each other's writes.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn durable() -> Result<Self, io::Error> {
        let mut path = home_dir()?;
        path.push(".timecard-auth.json");
        Ok(Self::new(path))
    }

    pub fn session() -> Result<Self, io::Error> {
        let dir = match dirs::runtime_dir().or_else(dirs::cache_dir) {
            Some(dir) => dir.join("timecard"),
            None => home_dir()?.join(".timecard"),
        };
        Ok(Self::new(dir.join("session.json")))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn read_map(&self) -> Map<String, Value> {
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!("Ignoring malformed store file {}", self.path.display());
                Map::new()
            }
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), io::Error> {
        let json = serde_json::to_string_pretty(map)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        options.open(&self.path)?.write_all(json.as_bytes())
    }
}

fn home_dir() -> Result<PathBuf, io::Error> {
    dirs::home_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Home directory not found"))
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read_map()
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), io::Error> {
        let mut map = self.read_map();
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), io::Error> {
        let mut map = self.read_map();
        if map.remove(key).is_none() {
            return Ok(());
        }
        self.write_map(&map)
    }

    fn clear(&self) -> Result<(), io::Error> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), io::Error> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), io::Error> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), io::Error> {
        self.values.borrow_mut().clear();
        Ok(())
    }
}

#[cfg(test)]
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::rc::Rc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), io::Error> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), io::Error> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<(), io::Error> {
        (**self).clear()
    }
}
