//! In-memory media server for integration tests

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{Result, bail};
use async_trait::async_trait;

use curator::collections::{CollectionId, Item, ItemId, RemoteCollection};
use curator::services::{Library, MediaServer, ServerStatus};

#[derive(Default)]
struct State {
    libraries: Vec<Library>,
    items: HashMap<String, Vec<Item>>,
    /// (library id, collection)
    collections: Vec<(String, RemoteCollection)>,
    next_id: u64,
    scans: Vec<String>,
    calls: Vec<String>,
    failing_collections: HashSet<String>,
    failing_libraries: HashSet<String>,
    offline: bool,
}

#[derive(Default)]
pub struct InMemoryServer {
    state: Mutex<State>,
}

impl InMemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_library(&self, id: &str, title: &str, section_type: &str, items: Vec<Item>) -> Library {
        let library = Library {
            id: id.to_string(),
            title: title.to_string(),
            section_type: section_type.to_string(),
        };
        let mut state = self.state.lock().unwrap();
        state.libraries.push(library.clone());
        state.items.insert(id.to_string(), items);
        library
    }

    pub fn add_collection(&self, library_id: &str, name: &str, items: &[&str]) -> CollectionId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("c{}", state.next_id);
        state.collections.push((
            library_id.to_string(),
            RemoteCollection {
                id: id.clone(),
                name: name.to_string(),
                items: items.iter().map(|s| s.to_string()).collect(),
            },
        ));
        id
    }

    /// Make every mutation of the named collection fail
    pub fn fail_collection(&self, name: &str) {
        self.state.lock().unwrap().failing_collections.insert(name.to_string());
    }

    /// Make item and collection listing of a library fail
    pub fn fail_library(&self, library_id: &str) {
        self.state.lock().unwrap().failing_libraries.insert(library_id.to_string());
    }

    /// Make status and library listing fail, as with a bad URL or token
    pub fn go_offline(&self) {
        self.state.lock().unwrap().offline = true;
    }

    pub fn collection(&self, name: &str) -> Option<BTreeSet<ItemId>> {
        self.state
            .lock()
            .unwrap()
            .collections
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(_, c)| c.items.clone())
    }

    pub fn collection_names(&self, library_id: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .collections
            .iter()
            .filter(|(lib, _)| lib == library_id)
            .map(|(_, c)| c.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Current collections of a library, as the server would list them
    pub fn collections_in(&self, library_id: &str) -> Vec<RemoteCollection> {
        self.state
            .lock()
            .unwrap()
            .collections
            .iter()
            .filter(|(lib, _)| lib == library_id)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn scans(&self) -> Vec<String> {
        self.state.lock().unwrap().scans.clone()
    }

    /// Mutating calls in the order they arrived
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn mutate(&self, collection_id: &str, call: String, f: impl FnOnce(&mut RemoteCollection)) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        let failing = state.failing_collections.clone();
        let Some((_, collection)) = state.collections.iter_mut().find(|(_, c)| c.id == collection_id) else {
            bail!("collection {} not found", collection_id);
        };
        if failing.contains(&collection.name) {
            bail!("server error (500)");
        }
        f(collection);
        Ok(())
    }
}

#[async_trait]
impl MediaServer for InMemoryServer {
    async fn server_status(&self) -> Result<ServerStatus> {
        let state = self.state.lock().unwrap();
        if state.offline {
            bail!("401 Unauthorized");
        }
        Ok(ServerStatus {
            server_name: "test".to_string(),
            version: "1.0".to_string(),
            platform: "Linux".to_string(),
            platform_version: "6".to_string(),
            libraries: state.libraries.len(),
            updated_at: "2026-01-01T00:00:00+00:00".to_string(),
        })
    }

    async fn list_libraries(&self) -> Result<Vec<Library>> {
        let state = self.state.lock().unwrap();
        if state.offline {
            bail!("401 Unauthorized");
        }
        Ok(state.libraries.clone())
    }

    async fn list_items(&self, library: &Library) -> Result<Vec<Item>> {
        let state = self.state.lock().unwrap();
        if state.failing_libraries.contains(&library.id) {
            bail!("connection reset");
        }
        Ok(state.items.get(&library.id).cloned().unwrap_or_default())
    }

    async fn list_collections(&self, library_id: &str) -> Result<Vec<RemoteCollection>> {
        let state = self.state.lock().unwrap();
        if state.failing_libraries.contains(library_id) {
            bail!("connection reset");
        }
        Ok(state
            .collections
            .iter()
            .filter(|(lib, _)| lib == library_id)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn create_collection(&self, library: &Library, name: &str, items: &[ItemId]) -> Result<CollectionId> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create {}", name));
        if state.failing_collections.contains(name) {
            bail!("server error (500)");
        }
        state.next_id += 1;
        let id = format!("c{}", state.next_id);
        state.collections.push((
            library.id.clone(),
            RemoteCollection {
                id: id.clone(),
                name: name.to_string(),
                items: items.iter().cloned().collect(),
            },
        ));
        Ok(id)
    }

    async fn add_items_to_collection(&self, collection_id: &str, items: &[ItemId]) -> Result<()> {
        self.mutate(collection_id, format!("add {} {:?}", collection_id, items), |c| {
            c.items.extend(items.iter().cloned());
        })
    }

    async fn remove_items_from_collection(&self, collection_id: &str, items: &[ItemId]) -> Result<()> {
        self.mutate(collection_id, format!("remove {} {:?}", collection_id, items), |c| {
            for item in items {
                c.items.remove(item);
            }
        })
    }

    async fn scan_library(&self, library_id: &str) -> Result<()> {
        self.state.lock().unwrap().scans.push(library_id.to_string());
        Ok(())
    }
}

/// `count` movies from `year`, ids starting at `first_id`
pub fn movies(year: i32, count: usize, first_id: usize) -> Vec<Item> {
    (first_id..first_id + count)
        .map(|id| Item::movie(id.to_string(), format!("Movie {}", id)).with_year(year))
        .collect()
}

pub fn ids(items: &[&str]) -> Vec<ItemId> {
    items.iter().map(|s| s.to_string()).collect()
}
