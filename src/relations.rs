use serde::{Deserialize, Serialize};

use crate::UserId;

/// Ordered set of user ids. Lists stay small, so membership is a linear scan.
#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct IdList(Vec<UserId>);

impl IdList {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn contains(&self, id: &UserId) -> bool {
        self.0.iter().any(|i| i == id)
    }
    /// Returns `false` if the id was already present.
    pub fn insert(&mut self, id: UserId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }
    /// Removes by value, tolerating an absent id. Returns whether anything was removed.
    pub fn remove(&mut self, id: &UserId) -> bool {
        let before = self.0.len();
        self.0.retain(|i| i != id);
        self.0.len() != before
    }
    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.0.iter()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<UserId> for IdList {
    fn from_iter<T: IntoIterator<Item = UserId>>(iter: T) -> Self {
        let mut list = IdList::new();
        for id in iter {
            list.insert(id);
        }
        list
    }
}

/// The four relationship lists every user carries.
#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Relationships {
    pub sent_requests: IdList,
    pub received_requests: IdList,
    pub ignored_requests: IdList,
    pub connections: IdList,
}

impl Relationships {
    pub fn mentions(&self, id: &UserId) -> bool {
        self.sent_requests.contains(id)
            || self.received_requests.contains(id)
            || self.ignored_requests.contains(id)
            || self.connections.contains(id)
    }
    /// Strips `id` from all four lists. Returns whether anything changed.
    pub fn purge(&mut self, id: &UserId) -> bool {
        let sent = self.sent_requests.remove(id);
        let received = self.received_requests.remove(id);
        let ignored = self.ignored_requests.remove(id);
        let connected = self.connections.remove(id);
        sent || received || ignored || connected
    }
}
