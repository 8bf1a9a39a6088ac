//! sled-backed user records.
//!
//! Three trees: `users` (id -> JSON record), `emails` (lowercased email -> id) and
//! `tokens` (session token -> id). Every write goes through one transaction spanning all
//! three so the indexes never drift from the records.

use devmatch_common::{IdList, Relationships, Token, UserId, UserSummary, UserView};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree};
use sled::{Db, Transactional, Tree};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// bcrypt hash, never the plaintext.
    pub password: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub photourl: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(flatten)]
    pub relations: Relationships,
    #[serde(default)]
    pub tokens: Vec<Token>,
}

impl User {
    pub fn new(first_name: String, last_name: String, email: &str, password_hash: String) -> Self {
        Self {
            id: UserId(Uuid::new_v4().to_string()),
            first_name,
            last_name,
            email: normalize_email(email),
            password: password_hash,
            ..Default::default()
        }
    }

    pub fn view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            age: self.age,
            gender: self.gender.clone(),
            photourl: self.photourl.clone(),
            skills: self.skills.clone(),
            relations: self.relations.clone(),
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            photourl: self.photourl.clone(),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct Users {
    users: Tree,
    emails: Tree,
    tokens: Tree,
}

impl Users {
    pub fn open(db: &Db) -> Result<Self> {
        Ok(Self {
            users: db.open_tree("users")?,
            emails: db.open_tree("emails")?,
            tokens: db.open_tree("tokens")?,
        })
    }

    pub fn find(&self, id: &UserId) -> Result<Option<User>> {
        match self.users.get(id.as_str())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get(&self, id: &UserId) -> Result<User> {
        self.find(id)?.ok_or_else(|| AppError::not_found("User not found"))
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.emails.get(normalize_email(email))? {
            Some(id) => self.find(&UserId(String::from_utf8_lossy(&id).into_owned())),
            None => Ok(None),
        }
    }

    pub fn find_by_token(&self, token: &Token) -> Result<Option<User>> {
        match self.tokens.get(token.as_ref())? {
            Some(id) => self.find(&UserId(String::from_utf8_lossy(&id).into_owned())),
            None => Ok(None),
        }
    }

    pub fn all(&self) -> Result<Vec<User>> {
        self.users
            .iter()
            .values()
            .map(|bytes| -> Result<User> { Ok(serde_json::from_slice(&bytes?)?) })
            .collect()
    }

    /// Resolves ids to summaries, skipping ids whose record no longer exists.
    pub fn summaries(&self, ids: &IdList) -> Result<Vec<UserSummary>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids.iter() {
            if let Some(user) = self.find(id)? {
                out.push(user.summary());
            }
        }
        Ok(out)
    }

    /// Stores a brand new record. Fails with `Duplicate` if the email is taken.
    pub fn insert(&self, user: &User) -> Result<()> {
        self.transaction(|tx| {
            if tx.load(&user.id)?.is_some() {
                return abort(AppError::duplicate("User id already exists"));
            }
            tx.store(None, user)
        })?;
        debug!(id = %user.id, "inserted user");
        Ok(())
    }

    /// Loads, mutates and writes back one record atomically.
    pub fn update(&self, id: &UserId, func: impl Fn(&mut User) -> Result<()>) -> Result<User> {
        let user = self.transaction(|tx| {
            let before = tx.require(id, "User not found")?;
            let mut after = before.clone();
            func(&mut after).map_err(ConflictableTransactionError::Abort)?;
            tx.store(Some(&before), &after)?;
            Ok(after)
        })?;
        debug!(id = %id, "updated user");
        Ok(user)
    }

    /// Mutates `actor` with read access to `other`; only `actor` is written.
    /// `missing` is the message used when `other` does not exist.
    pub fn update_against(
        &self,
        actor: &UserId,
        other: &UserId,
        missing: &'static str,
        func: impl Fn(&mut User, &User) -> Result<()>,
    ) -> Result<User> {
        let user = self.transaction(|tx| {
            let before = tx.require(actor, "User not found")?;
            let other = tx.require(other, missing)?;
            let mut after = before.clone();
            func(&mut after, &other).map_err(ConflictableTransactionError::Abort)?;
            tx.store(Some(&before), &after)?;
            Ok(after)
        })?;
        debug!(id = %actor, "updated user");
        Ok(user)
    }

    /// Loads two records, mutates both and writes both in a single transaction.
    /// `missing` is the message used when `other` does not exist.
    pub fn update_pair(
        &self,
        actor: &UserId,
        other: &UserId,
        missing: &'static str,
        func: impl Fn(&mut User, &mut User) -> Result<()>,
    ) -> Result<(User, User)> {
        if actor == other {
            return Err(crate::engine::RelationError::SelfReference.into());
        }
        let pair = self.transaction(|tx| {
            let a_before = tx.require(actor, "User not found")?;
            let b_before = tx.require(other, missing)?;
            let (mut a, mut b) = (a_before.clone(), b_before.clone());
            func(&mut a, &mut b).map_err(ConflictableTransactionError::Abort)?;
            tx.store(Some(&a_before), &a)?;
            tx.store(Some(&b_before), &b)?;
            Ok((a, b))
        })?;
        debug!(actor = %actor, other = %other, "updated user pair");
        Ok(pair)
    }

    /// Deletes a record and its index entries, then strips its id from every other user's
    /// relationship lists.
    pub fn remove(&self, id: &UserId) -> Result<User> {
        let removed = self.transaction(|tx| {
            let user = tx.require(id, "User not found")?;
            tx.erase(&user)?;
            Ok(user)
        })?;

        let mut referencing = Vec::new();
        for user in self.all()? {
            if user.relations.mentions(id) {
                referencing.push(user.id);
            }
        }
        for other in referencing {
            let purged = self.update(&other, |u| {
                u.relations.purge(id);
                Ok(())
            });
            match purged {
                Ok(_) | Err(AppError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        debug!(id = %id, "removed user");
        Ok(removed)
    }

    fn transaction<A>(&self, func: impl Fn(&Tx<'_>) -> ConflictableTransactionResult<A, AppError>) -> Result<A> {
        Ok((&self.users, &self.emails, &self.tokens).transaction(|(users, emails, tokens)| {
            func(&Tx { users, emails, tokens })
        })?)
    }
}

fn abort<A>(err: AppError) -> ConflictableTransactionResult<A, AppError> {
    Err(ConflictableTransactionError::Abort(err))
}

struct Tx<'a> {
    users: &'a TransactionalTree,
    emails: &'a TransactionalTree,
    tokens: &'a TransactionalTree,
}

impl Tx<'_> {
    fn load(&self, id: &UserId) -> ConflictableTransactionResult<Option<User>, AppError> {
        match self.users.get(id.as_str())? {
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(user) => Ok(Some(user)),
                Err(e) => abort(e.into()),
            },
            None => Ok(None),
        }
    }

    fn require(&self, id: &UserId, missing: &'static str) -> ConflictableTransactionResult<User, AppError> {
        match self.load(id)? {
            Some(user) => Ok(user),
            None => abort(AppError::not_found(missing)),
        }
    }

    fn store(&self, before: Option<&User>, after: &User) -> ConflictableTransactionResult<(), AppError> {
        let email_changed = before.map_or(true, |b| b.email != after.email);
        if email_changed {
            if let Some(owner) = self.emails.get(after.email.as_str())? {
                if &*owner != after.id.as_str().as_bytes() {
                    return abort(AppError::duplicate("Email already registered"));
                }
            }
            if let Some(b) = before {
                self.emails.remove(b.email.as_str())?;
            }
            self.emails.insert(after.email.as_str(), after.id.as_str())?;
        }

        if let Some(b) = before {
            for token in b.tokens.iter().filter(|t| !after.tokens.contains(t)) {
                self.tokens.remove(token.as_ref())?;
            }
        }
        for token in &after.tokens {
            self.tokens.insert(token.as_ref(), after.id.as_str())?;
        }

        let bytes = match serde_json::to_vec(after) {
            Ok(bytes) => bytes,
            Err(e) => return abort(e.into()),
        };
        self.users.insert(after.id.as_str(), bytes)?;
        Ok(())
    }

    fn erase(&self, user: &User) -> ConflictableTransactionResult<(), AppError> {
        self.users.remove(user.id.as_str())?;
        self.emails.remove(user.email.as_str())?;
        for token in &user.tokens {
            self.tokens.remove(token.as_ref())?;
        }
        Ok(())
    }
}
