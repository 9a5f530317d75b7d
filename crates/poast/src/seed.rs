//! Fixed users and mediums. Client writes to these tables are denied, so the
//! seed is the only way rows get there.

use poast_sync::types::row_from_value;
use poast_sync::upstream::MemoryUpstream;
use serde_json::json;

use crate::error::Result;
use crate::models::{Medium, User};

const USERS: &[(&str, &str, bool)] = &[
    ("ycD76wW4R2", "Aaron", true),
    ("IoQSaxeVO5", "Matt", true),
    ("WndZWmGkO4", "Cesar", true),
    ("ENzoNm7g4E", "Erik", true),
    ("dLKecN3ntd", "Greg", true),
    ("enVvyDlBul", "Darick", true),
    ("9ogaDuDNFx", "Alex", true),
    ("6z7dkeVLNm", "Dax", false),
    ("7VoEoJWEwn", "Nate", false),
];

const MEDIUMS: &[(&str, &str)] = &[
    ("G14bSFuNDq", "Discord"),
    ("b7rqt_8w_H", "Twitter DM"),
    ("0HzSMcee_H", "Tweet reply to unrelated thread"),
    ("ttx7NCmyac", "SMS"),
];

pub fn users() -> Vec<User> {
    USERS
        .iter()
        .map(|&(id, name, partner)| User {
            id: id.to_string(),
            name: name.to_string(),
            partner,
        })
        .collect()
}

pub fn mediums() -> Vec<Medium> {
    MEDIUMS
        .iter()
        .map(|&(id, name)| Medium {
            id: id.to_string(),
            name: name.to_string(),
        })
        .collect()
}

/// Load every user and medium into `upstream`.
pub fn seed_upstream(upstream: &MemoryUpstream) -> Result<()> {
    upstream.seed(
        "user",
        users()
            .into_iter()
            .map(|u| row_from_value(json!({ "id": u.id, "name": u.name, "partner": u.partner }))),
    )?;
    upstream.seed(
        "medium",
        mediums()
            .into_iter()
            .map(|m| row_from_value(json!({ "id": m.id, "name": m.name }))),
    )?;
    tracing::debug!(users = USERS.len(), mediums = MEDIUMS.len(), "seeded upstream");
    Ok(())
}

/// The id of the seeded user named `name`.
pub fn user_id(name: &str) -> Option<&'static str> {
    USERS.iter().find(|(_, n, _)| *n == name).map(|(id, _, _)| *id)
}
