use crate::model::{DocRef, Document};
use crate::store::{HierarchyStore, StoreResult};

/// A document reached by [`walk_subtree`], with its depth below the walk root.
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    pub document: Document,
    pub depth: usize,
}

/// Depth-first, pre-order walk of the subtree under `root`, root included.
///
/// Every parent is visited before its children and siblings keep store order,
/// so parents always appear earlier in the result than their descendants.
pub async fn walk_subtree<S: HierarchyStore>(store: &S, root: Document) -> StoreResult<Vec<Visit>> {
    let mut visits = Vec::new();
    let mut stack = vec![(root, 0usize)];
    while let Some((document, depth)) = stack.pop() {
        let children = match document.doc_ref().children() {
            Some(collection) => store.list_children(&collection).await?,
            None => Vec::new(),
        };
        visits.push(Visit { document, depth });
        for child in children.into_iter().rev() {
            stack.push((child, depth + 1));
        }
    }
    Ok(visits)
}

/// Deletion order for a walked subtree: deepest level first, the root last.
pub fn bottom_up(visits: &[Visit]) -> Vec<DocRef> {
    let mut ordered: Vec<&Visit> = visits.iter().collect();
    ordered.sort_by(|a, b| b.depth.cmp(&a.depth));
    ordered
        .into_iter()
        .map(|visit| visit.document.doc_ref())
        .collect()
}
