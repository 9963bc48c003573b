//! Scope registry and dataset resolution.
//!
//! Each [`Scope`] declares the dataset it reads and the calculator that
//! produces its series. [`resolve`] turns a requested scope set into the
//! minimal set of datasets that has to be fetched.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::types::{RawDataset, Scope};

/// Calculator used to produce a scope's series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calculator {
    /// Events per bucket
    RawCount,
    /// First-ever occurrence per entity, with running total
    NewEntity,
    /// Users with favourites over all users, every record in range counted
    FavouritesRatio,
}

/// Descriptor for a scope, used for dispatch and discovery.
#[derive(Debug, Clone)]
pub struct ScopeDescriptor {
    pub scope: Scope,
    pub dataset: RawDataset,
    pub calculator: Calculator,
    pub summary: &'static str,
}

const SCOPES: &[ScopeDescriptor] = &[
    ScopeDescriptor {
        scope: Scope::Inputs,
        dataset: RawDataset::InputEvents,
        calculator: Calculator::RawCount,
        summary: "Inputs received per period.",
    },
    ScopeDescriptor {
        scope: Scope::NewUsersFromInputs,
        dataset: RawDataset::InputEvents,
        calculator: Calculator::NewEntity,
        summary: "Users sending their first-ever input, with running total.",
    },
    ScopeDescriptor {
        scope: Scope::Users,
        dataset: RawDataset::UserCreationEvents,
        calculator: Calculator::RawCount,
        summary: "User records created per period.",
    },
    ScopeDescriptor {
        scope: Scope::NewUsers,
        dataset: RawDataset::UserCreationEvents,
        calculator: Calculator::NewEntity,
        summary: "Users created for the first time, with running total.",
    },
    ScopeDescriptor {
        scope: Scope::UsersWithFavourites,
        dataset: RawDataset::UserCreationEvents,
        calculator: Calculator::FavouritesRatio,
        summary: "Share of created users that saved favourites.",
    },
];

/// Descriptor for a scope.
pub fn descriptor(scope: Scope) -> &'static ScopeDescriptor {
    SCOPES
        .iter()
        .find(|d| d.scope == scope)
        .unwrap_or_else(|| unreachable!("every scope has a descriptor"))
}

/// List all registered scopes.
pub fn list_scopes() -> &'static [ScopeDescriptor] {
    SCOPES
}

/// Datasets needed to answer `scopes`.
pub fn resolve(scopes: &BTreeSet<Scope>) -> Result<BTreeSet<RawDataset>> {
    if scopes.is_empty() {
        return Err(Error::NoScopes);
    }
    Ok(scopes.iter().map(|s| descriptor(*s).dataset).collect())
}
