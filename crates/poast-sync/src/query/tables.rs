//! referenced_tables: the set of tables a descriptor reads, including every
//! table reached through relationship traversals.
//!
//! Used by the reactive layer to decide whether a change to a table should
//! dirty a query subscription.

use std::collections::BTreeSet;

use super::types::Query;

/// Collect the root table and every nested relationship table.
pub fn referenced_tables(query: &Query) -> BTreeSet<String> {
    let mut tables = BTreeSet::new();
    collect(query, &mut tables);
    tables
}

fn collect(query: &Query, tables: &mut BTreeSet<String>) {
    if !query.table().is_empty() {
        tables.insert(query.table().to_string());
    }
    for related in query.related_queries() {
        collect(&related.query, tables);
    }
}
