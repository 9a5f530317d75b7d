//! Row-level write authorization.
//!
//! [`rules`] declares policies; [`evaluate`] runs them. Clients only supply
//! the declaration. Evaluation happens on the authority side (the
//! [`upstream`](crate::upstream) reference authority in this crate).

pub mod evaluate;
pub mod rules;

pub use evaluate::{Authorizer, Denial};
pub use rules::{
    define_authorization, AuthData, AuthorizationConfig, OpPolicy, RowPolicy, Rule, TablePolicy,
    WriteOp,
};
