use itertools::Itertools;
use std::collections::HashMap;

use crate::backend::{Backend, Collection, Filter, Order, Query, decode, decode_all, encode};
use crate::models::profile::{CreateProfileRequest, Profile};
use crate::utils::error::{BackendError, ChatError, ChatResult};
use crate::utils::validation::validate_username;

/// Every profile except the current user's.
pub async fn list_other_users<B: Backend>(
    backend: &B,
    current_user_id: Option<&str>,
) -> ChatResult<Vec<Profile>> {
    let mut query = Query::table(Collection::Profiles).order(Order::asc("username"));
    if let Some(user_id) = current_user_id {
        query = query.filter(Filter::neq("user_id", user_id));
    }

    let rows = backend.query(query).await?;
    Ok(decode_all(rows)?)
}

pub async fn get_profile<B: Backend>(backend: &B, user_id: &str) -> ChatResult<Option<Profile>> {
    find_one(backend, Filter::eq("user_id", user_id)).await
}

pub async fn find_profile_by_username<B: Backend>(
    backend: &B,
    username: &str,
) -> ChatResult<Option<Profile>> {
    find_one(backend, Filter::eq("username", username)).await
}

async fn find_one<B: Backend>(backend: &B, filter: Filter) -> ChatResult<Option<Profile>> {
    let row = backend
        .query(Query::table(Collection::Profiles).filter(filter).limit(1))
        .await?
        .into_iter()
        .next();

    Ok(row.map(decode).transpose()?)
}

/// Resolves a set of user ids with one batched lookup, keyed by user id.
pub async fn fetch_profiles<'a, B, I>(
    backend: &B,
    user_ids: I,
) -> ChatResult<HashMap<String, Profile>>
where
    B: Backend,
    I: IntoIterator<Item = &'a str>,
{
    let ids: Vec<String> = user_ids.into_iter().unique().map(str::to_string).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = backend
        .query(Query::table(Collection::Profiles).filter(Filter::is_in("user_id", ids)))
        .await?;
    let profiles: Vec<Profile> = decode_all(rows)?;

    Ok(profiles
        .into_iter()
        .map(|profile| (profile.user_id.clone(), profile))
        .collect())
}

/// Registers a profile. Normally the hosted service does this when an
/// account is created; the bundled backend needs it done explicitly.
pub async fn create_profile<B: Backend>(
    backend: &B,
    request: CreateProfileRequest,
) -> ChatResult<Profile> {
    validate_username(&request.username)?;

    let request = CreateProfileRequest {
        display_name: request
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
        ..request
    };

    let row = match backend.insert(Collection::Profiles, encode(&request)?).await {
        Ok(row) => row,
        Err(BackendError::Conflict(_)) => {
            let message = if find_profile_by_username(backend, &request.username)
                .await?
                .is_some()
            {
                format!("Username '{}' is already taken", request.username)
            } else {
                format!("User {} already has a profile", request.user_id)
            };
            return Err(ChatError::Validation(message));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!("Profile created for {}", request.username);
    Ok(decode(row)?)
}
