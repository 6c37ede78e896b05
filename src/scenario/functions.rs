use log::warn;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::ScenarioError;
use crate::repo::{DeeplinkUpdate, ProductUpdate, Repositories};

pub type Params = Map<String, Value>;
pub type FunctionFuture = Pin<Box<dyn Future<Output = Result<Value, ScenarioError>> + Send>>;
pub type ScenarioFunction = Arc<dyn Fn(Params) -> FunctionFuture + Send + Sync>;

/// scenario-callable functions addressed as "repository.function"
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    repositories: HashMap<String, HashMap<String, ScenarioFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, path: &str, function: F) -> Result<(), ScenarioError>
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ScenarioError>> + Send + 'static,
    {
        self.insert(path, repo_fn(function))
    }

    fn insert(&mut self, path: &str, function: ScenarioFunction) -> Result<(), ScenarioError> {
        let (repository, name) = split_path(path)?;
        self.repositories
            .entry(repository.to_string())
            .or_default()
            .insert(name.to_string(), function);
        Ok(())
    }

    pub fn resolve(&self, path: &str) -> Result<ScenarioFunction, ScenarioError> {
        let (repository, name) = split_path(path)?;
        let functions = self
            .repositories
            .get(repository)
            .ok_or_else(|| ScenarioError::UnknownRepository(repository.to_string()))?;
        functions
            .get(name)
            .cloned()
            .ok_or_else(|| ScenarioError::UnknownFunction {
                repository: repository.to_string(),
                function: name.to_string(),
            })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }

    /// exposes the repository operations scenarios are allowed to call
    pub fn with_repositories(repos: Repositories) -> Self {
        let mut registry = Self::new();
        registry.register_repositories(repos);
        registry
    }

    fn register_repositories(&mut self, repos: Repositories) {
        let entries: Vec<(&str, ScenarioFunction)> = vec![
            ("users.get_or_create_user", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let id = match opt_i64(&params, "id")? {
                            Some(id) => id,
                            None => req_i64(&params, "user_id")?,
                        };
                        let (user, _) = repos
                            .users()
                            .get_or_create_user(
                                id,
                                opt_str(&params, "username")?.as_deref(),
                                opt_str(&params, "full_name")?.as_deref(),
                                opt_bool(&params, "is_premium")?,
                                opt_i32(&params, "deeplink")?,
                            )
                            .await?;
                        to_value(&user)
                    }
                })
            }),
            ("users.get_user_by_id", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let user = repos
                            .users()
                            .get_user_by_id(req_i64(&params, "user_id")?)
                            .await?;
                        to_value(&user)
                    }
                })
            }),
            ("users.update_user", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let user = repos
                            .users()
                            .update_user(
                                req_i64(&params, "user_id")?,
                                opt_str(&params, "username")?.as_deref(),
                            )
                            .await?;
                        to_value(&user)
                    }
                })
            }),
            ("users.delete_user", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let deleted = repos
                            .users()
                            .delete_user(req_i64(&params, "user_id")?)
                            .await?;
                        Ok(Value::Bool(deleted))
                    }
                })
            }),
            ("lessons.get_or_create_lesson_progress", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let lesson = repos
                            .lessons()
                            .get_or_create_lesson_progress(
                                req_i64(&params, "user_id")?,
                                opt_i32(&params, "lesson_number")?.unwrap_or(1),
                            )
                            .await?;
                        to_value(&lesson)
                    }
                })
            }),
            ("lessons.update_lesson_progress", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let lesson = repos
                            .lessons()
                            .update_lesson_progress(req_i64(&params, "user_id")?)
                            .await?;
                        to_value(&lesson)
                    }
                })
            }),
            ("lessons.get_lesson_progress_by_user", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let lesson = repos
                            .lessons()
                            .get_lesson_progress_by_user(req_i64(&params, "user_id")?)
                            .await?;
                        to_value(&lesson)
                    }
                })
            }),
            ("purchases.create_purchase", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let purchase = repos
                            .purchases()
                            .create_purchase(
                                req_i64(&params, "user_id")?,
                                req_i64(&params, "product_id")?,
                                req_i32(&params, "amount")?,
                            )
                            .await?;
                        to_value(&purchase)
                    }
                })
            }),
            ("purchases.get_purchase_by_user", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let purchase = repos
                            .purchases()
                            .get_purchase_by_user(req_i64(&params, "user_id")?)
                            .await?;
                        to_value(&purchase)
                    }
                })
            }),
            ("purchases.mark_paid", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let purchase = repos
                            .purchases()
                            .mark_paid(req_i64(&params, "purchase_id")?)
                            .await?;
                        to_value(&purchase)
                    }
                })
            }),
            ("deeplink.create_deeplink", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let deeplink = repos
                            .deeplinks()
                            .create_deeplink(
                                &req_str(&params, "source")?,
                                &req_str(&params, "target")?,
                                opt_str(&params, "link")?.as_deref(),
                            )
                            .await?;
                        to_value(&deeplink)
                    }
                })
            }),
            ("deeplink.get_deeplink_by_id", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let deeplink = repos
                            .deeplinks()
                            .get_deeplink_by_id(req_i32(&params, "deeplink_id")?)
                            .await?;
                        to_value(&deeplink)
                    }
                })
            }),
            ("deeplink.get_all_deeplinks", {
                let repos = repos.clone();
                repo_fn(move |_params| {
                    let repos = repos.clone();
                    async move { to_value(&repos.deeplinks().get_all_deeplinks().await?) }
                })
            }),
            ("deeplink.update_deeplink", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let update = DeeplinkUpdate {
                            source: opt_str(&params, "source")?,
                            target: opt_str(&params, "target")?,
                            link: opt_str(&params, "link")?,
                        };
                        let deeplink = repos
                            .deeplinks()
                            .update_deeplink(req_i32(&params, "deeplink_id")?, update)
                            .await?;
                        to_value(&deeplink)
                    }
                })
            }),
            ("deeplink.delete_deeplink", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let deleted = repos
                            .deeplinks()
                            .delete_deeplink(req_i32(&params, "deeplink_id")?)
                            .await?;
                        Ok(Value::Bool(deleted))
                    }
                })
            }),
            ("products.create_product", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let product = repos
                            .products()
                            .create_product(
                                &req_str(&params, "name")?,
                                &req_str(&params, "info")?,
                                opt_str(&params, "description")?.as_deref(),
                                req_i32(&params, "price")?,
                            )
                            .await?;
                        to_value(&product)
                    }
                })
            }),
            ("products.get_product_by_id", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let product = repos
                            .products()
                            .get_product_by_id(req_i64(&params, "product_id")?)
                            .await?;
                        to_value(&product)
                    }
                })
            }),
            ("products.get_all_products", {
                let repos = repos.clone();
                repo_fn(move |_params| {
                    let repos = repos.clone();
                    async move { to_value(&repos.products().get_all_products().await?) }
                })
            }),
            ("products.update_product", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let update = ProductUpdate {
                            name: opt_str(&params, "name")?,
                            info: opt_str(&params, "info")?,
                            description: opt_str(&params, "description")?,
                            price: opt_i32(&params, "price")?,
                        };
                        let product = repos
                            .products()
                            .update_product(req_i64(&params, "product_id")?, update)
                            .await?;
                        to_value(&product)
                    }
                })
            }),
            ("products.delete_product", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let deleted = repos
                            .products()
                            .delete_product(req_i64(&params, "product_id")?)
                            .await?;
                        Ok(Value::Bool(deleted))
                    }
                })
            }),
            ("purchases.get_purchase_by_id", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let purchase = repos
                            .purchases()
                            .get_purchase_by_id(req_i64(&params, "purchase_id")?)
                            .await?;
                        to_value(&purchase)
                    }
                })
            }),
            ("purchases.update_purchase", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let purchase = repos
                            .purchases()
                            .update_purchase(
                                req_i64(&params, "purchase_id")?,
                                req_i64(&params, "payment_id")?,
                                &req_str(&params, "link")?,
                            )
                            .await?;
                        to_value(&purchase)
                    }
                })
            }),
            ("purchases.delete_purchase", {
                let repos = repos.clone();
                repo_fn(move |params| {
                    let repos = repos.clone();
                    async move {
                        let deleted = repos
                            .purchases()
                            .delete_purchase(req_i64(&params, "purchase_id")?)
                            .await?;
                        Ok(Value::Bool(deleted))
                    }
                })
            }),
            ("purchases.paid_users_count", {
                let repos = repos.clone();
                repo_fn(move |_params| {
                    let repos = repos.clone();
                    async move { Ok(Value::from(repos.purchases().paid_users_count().await?)) }
                })
            }),
            ("lessons.get_users_lesson_progress", {
                let repos = repos.clone();
                repo_fn(move |_params| {
                    let repos = repos.clone();
                    async move {
                        let progress = repos.lessons().get_users_lesson_progress().await?;
                        let rows = progress
                            .iter()
                            .map(|(user, lesson)| {
                                Ok(json!({ "user": to_value(user)?, "lesson": to_value(lesson)? }))
                            })
                            .collect::<Result<Vec<_>, ScenarioError>>()?;
                        Ok(Value::Array(rows))
                    }
                })
            }),
            ("users.count_users", {
                let repos = repos.clone();
                repo_fn(move |_params| {
                    let repos = repos.clone();
                    async move { Ok(Value::from(repos.users().count_users().await?)) }
                })
            }),
        ];

        for (path, function) in entries {
            if let Err(e) = self.insert(path, function) {
                warn!("Skipping scenario function {}: {}", path, e);
            }
        }

        // older scenarios still call the payment flag by its previous name
        if let Ok(mark_paid) = self.resolve("purchases.mark_paid") {
            if let Err(e) = self.insert("purchases.toggle_is_paid", mark_paid) {
                warn!("Skipping scenario function purchases.toggle_is_paid: {}", e);
            }
        }
    }
}

fn repo_fn<F, Fut>(function: F) -> ScenarioFunction
where
    F: Fn(Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ScenarioError>> + Send + 'static,
{
    Arc::new(move |params| Box::pin(function(params)))
}

fn split_path(path: &str) -> Result<(&str, &str), ScenarioError> {
    match path.split_once('.') {
        Some((repository, name)) if !repository.is_empty() && !name.is_empty() => {
            Ok((repository, name))
        }
        _ => Err(ScenarioError::InvalidFunctionPath(path.to_string())),
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ScenarioError> {
    serde_json::to_value(value).map_err(ScenarioError::Parse)
}

// =============================================================================
// Parameter helpers
// =============================================================================

/// numbers may arrive as json numbers or numeric strings
pub fn opt_i64(params: &Params, key: &str) -> Result<Option<i64>, ScenarioError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| ScenarioError::InvalidParams(format!("'{}' must be an integer", key))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ScenarioError::InvalidParams(format!("'{}' must be an integer", key))),
        Some(_) => Err(ScenarioError::InvalidParams(format!(
            "'{}' must be an integer",
            key
        ))),
    }
}

pub fn req_i64(params: &Params, key: &str) -> Result<i64, ScenarioError> {
    opt_i64(params, key)?
        .ok_or_else(|| ScenarioError::InvalidParams(format!("missing '{}'", key)))
}

pub fn opt_i32(params: &Params, key: &str) -> Result<Option<i32>, ScenarioError> {
    opt_i64(params, key)?
        .map(|value| {
            i32::try_from(value)
                .map_err(|_| ScenarioError::InvalidParams(format!("'{}' is out of range", key)))
        })
        .transpose()
}

pub fn req_i32(params: &Params, key: &str) -> Result<i32, ScenarioError> {
    opt_i32(params, key)?
        .ok_or_else(|| ScenarioError::InvalidParams(format!("missing '{}'", key)))
}

pub fn opt_str(params: &Params, key: &str) -> Result<Option<String>, ScenarioError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(ScenarioError::InvalidParams(format!(
            "'{}' must be a string",
            key
        ))),
    }
}

pub fn req_str(params: &Params, key: &str) -> Result<String, ScenarioError> {
    opt_str(params, key)?
        .ok_or_else(|| ScenarioError::InvalidParams(format!("missing '{}'", key)))
}

pub fn opt_bool(params: &Params, key: &str) -> Result<Option<bool>, ScenarioError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ScenarioError::InvalidParams(format!(
            "'{}' must be a boolean",
            key
        ))),
    }
}
