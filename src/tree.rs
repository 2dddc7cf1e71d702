use std::collections::BTreeSet;

use crate::driver::Driver;
use crate::error::Error;

/// Transitive closure of descendant ids rooted at `root`, walking the
/// self-referential `up_column` → `id_column` linkage breadth-first.
/// The root itself is always included, so a childless root yields
/// `[root]`. Driver failures propagate; they are not the same thing as
/// an empty subtree.
pub async fn tree_ids(
    driver: &dyn Driver,
    table: &str,
    id_column: &str,
    up_column: &str,
    root: u32,
) -> Result<Vec<u32>, Error> {
    let mut seen: BTreeSet<u32> = BTreeSet::new();
    let mut ordered = vec![root];
    seen.insert(root);

    let mut frontier = vec![root];
    while !frontier.is_empty() {
        let id_list = frontier
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT {id} FROM {table} WHERE {up} IN ({ids})",
            id = id_column,
            table = table,
            up = up_column,
            ids = id_list,
        );
        let result = driver.execute(&sql).await?;

        frontier.clear();
        for row in &result.rows {
            let Some(cell) = row.first().and_then(|c| c.as_deref()) else {
                continue;
            };
            let Ok(id) = cell.parse::<u32>() else {
                continue;
            };
            // seen guards against linkage cycles in corrupt data
            if seen.insert(id) {
                ordered.push(id);
                frontier.push(id);
            }
        }
    }

    Ok(ordered)
}
