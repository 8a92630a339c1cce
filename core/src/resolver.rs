//! Find-or-create for Snipe-IT models and lookup of users by email, backed by
//! a per-run [`LookupCache`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::category::Category;
use crate::snipe::NewModel;
use crate::snipe::SnipeClient;
use crate::snipe::User;

const UNKNOWN_MODEL: &str = "Unknown";

/// Snipe-IT model name for a hardware model within a category.
pub fn model_name(hardware_model: &str, category: Category) -> String {
    let hardware_model = hardware_model.trim();
    let hardware_model = if hardware_model.is_empty() {
        UNKNOWN_MODEL
    } else {
        hardware_model
    };
    format!("{hardware_model} ({})", category.model_suffix())
}

/// Spellings to try when searching for a user. The directory has both
/// spellings of the surname in use.
pub fn email_variants(email: &str) -> Vec<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Vec::new();
    }
    let mut variants = vec![email.clone()];
    let alternate = if email.contains("mackenzie") {
        Some(email.replace("mackenzie", "mckenzie"))
    } else if email.contains("mckenzie") {
        Some(email.replace("mckenzie", "mackenzie"))
    } else {
        None
    };
    if let Some(alternate) = alternate {
        variants.push(alternate);
    }
    variants
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Run-scoped memo of resolved model and user ids. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct LookupCache {
    models: Arc<Mutex<HashMap<(String, u64), u64>>>,
    /// `None` records a user that was searched for and not found.
    users: Arc<Mutex<HashMap<String, Option<u64>>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self, name: &str, category_id: u64) -> Option<u64> {
        let found = self
            .models
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(name.to_lowercase(), category_id))
            .copied();
        self.count(found.is_some());
        found
    }

    pub fn insert_model(&self, name: &str, category_id: u64, model_id: u64) {
        self.models
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((name.to_lowercase(), category_id), model_id);
    }

    /// Outer `None` means "not looked up yet"; inner `None` is a cached miss.
    pub fn user(&self, email: &str) -> Option<Option<u64>> {
        let found = self
            .users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&email.to_lowercase())
            .copied();
        self.count(found.is_some());
        found
    }

    pub fn insert_user(&self, email: &str, user_id: Option<u64>) {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(email.to_lowercase(), user_id);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn count(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
pub struct Resolver {
    snipe: SnipeClient,
    cache: LookupCache,
    manufacturer_id: u64,
}

impl Resolver {
    pub fn new(snipe: SnipeClient, cache: LookupCache, manufacturer_id: u64) -> Self {
        Self {
            snipe,
            cache,
            manufacturer_id,
        }
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    /// Looks the model up without creating it, so a dry run can tell which
    /// models a real sync would add.
    pub async fn find_model(&self, hardware_model: &str, category: Category) -> Option<u64> {
        let name = model_name(hardware_model, category);
        if let Some(id) = self.cache.model(&name, category.id()) {
            return Some(id);
        }
        let id = self.search_model(&name).await?;
        self.cache.insert_model(&name, category.id(), id);
        Some(id)
    }

    /// Returns the id of the model for this hardware/category pair, creating
    /// it in Snipe-IT when no model of that name exists yet.
    pub async fn resolve_model(&self, hardware_model: &str, category: Category) -> Option<u64> {
        let name = model_name(hardware_model, category);
        if let Some(id) = self.cache.model(&name, category.id()) {
            debug!(model = %name, id, "model cache hit");
            return Some(id);
        }

        if let Some(id) = self.search_model(&name).await {
            self.cache.insert_model(&name, category.id(), id);
            return Some(id);
        }

        let new_model = NewModel {
            name: name.clone(),
            category_id: category.id(),
            manufacturer_id: self.manufacturer_id,
        };
        match self.snipe.create_model(&new_model).await {
            Ok(id) => {
                info!(model = %name, id, category = category.name(), "created model");
                self.cache.insert_model(&name, category.id(), id);
                Some(id)
            }
            Err(err) => {
                error!(model = %name, "failed to create model: {err}");
                None
            }
        }
    }

    async fn search_model(&self, name: &str) -> Option<u64> {
        match self.snipe.search_models(name).await {
            Ok(models) => models
                .into_iter()
                .find(|model| model.name.eq_ignore_ascii_case(name))
                .map(|model| model.id),
            Err(err) => {
                warn!(model = %name, "model search failed: {err}");
                None
            }
        }
    }

    /// Snipe-IT user id for an email, trying each spelling variant. Lookup
    /// failures are logged and treated as "no user".
    pub async fn resolve_user(&self, email: &str) -> Option<u64> {
        let key = email.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        if let Some(cached) = self.cache.user(&key) {
            return cached;
        }

        let mut resolved = None;
        for variant in email_variants(&key) {
            match self.snipe.search_users(&variant).await {
                Ok(users) => {
                    if let Some(user) = pick_user(users, &variant) {
                        debug!(email = %key, user_id = user.id, "matched user");
                        resolved = Some(user.id);
                        break;
                    }
                }
                Err(err) => warn!(email = %variant, "user search failed: {err}"),
            }
        }

        if resolved.is_none() {
            debug!(email = %key, "no Snipe-IT user");
        }
        self.cache.insert_user(&key, resolved);
        resolved
    }
}

/// Prefers an exact email match, otherwise takes the first search result.
fn pick_user(users: Vec<User>, email: &str) -> Option<User> {
    let exact = users.iter().position(|user| {
        user.email
            .as_deref()
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(email))
    });
    match exact {
        Some(index) => users.into_iter().nth(index),
        None => users.into_iter().next(),
    }
}
