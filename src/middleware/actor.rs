// src/middleware/actor.rs

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

// Cabeçalho com a identidade do operador (a autenticação fica a montante)
pub const ACTOR_HEADER: &str = "x-actor-id";

pub const ANONYMOUS_ACTOR: &str = "anonymous";

/// Quem está executando a ação. Sem cabeçalho (ou com valor ilegível),
/// o ator é `anonymous`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_parts(parts: &Parts) -> Self {
        let actor = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(ANONYMOUS_ACTOR);

        Actor(actor.to_string())
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Actor::from_parts(parts))
    }
}
