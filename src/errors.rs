// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// Request-level failures raised by the record store before any data is
/// returned to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Not authenticated: run `autoledger user login <email>` or pass --as <email>")]
    NotAuthenticated,
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: String },
    #[error("Access denied: cannot {action} car {car_id}")]
    AccessDenied { action: Action, car_id: i64 },
}

/// Operations the store gates on the caller's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Update,
    Delete,
    ManageFinance,
    ManageShares,
}

impl Action {
    pub fn allowed_for_shared(self) -> bool {
        matches!(self, Action::Read | Action::Update)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::ManageFinance => "change purchase, loan or sale details of",
            Action::ManageShares => "manage sharing for",
        };
        f.write_str(s)
    }
}

/// Pulls the typed access error out of an `anyhow` chain, if any.
pub fn access_error(err: &anyhow::Error) -> Option<&AccessError> {
    err.chain().find_map(|e| e.downcast_ref::<AccessError>())
}
