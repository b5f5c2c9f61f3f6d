use super::{NodeId, NodeKind, SyntaxTree};

/// Resolution passes that infer hierarchy the parser leaves flat or implicit
///
/// Every pass is total: constructs that do not fit the expected shape become
/// siblings at the current depth instead of errors.
pub struct NestingResolver;

impl NestingResolver {
    /// Run all passes in order
    pub fn resolve(tree: &mut SyntaxTree) {
        Self::resolve_container_depth(tree);
        Self::resolve_list_nesting(tree);
        Self::resolve_header_hierarchy(tree);
        Self::resolve_blockquote_depth(tree);
    }

    /// `nesting_depth` = number of enclosing list items and blockquotes
    fn resolve_container_depth(tree: &mut SyntaxTree) {
        // Arena order is pre-order, so parents are always resolved first
        for idx in 1..tree.len() {
            let id = NodeId(idx);
            let Some(parent) = tree.node(id).parent() else {
                continue;
            };
            let parent_node = tree.node(parent);
            let depth = parent_node.meta.nesting_depth + usize::from(parent_node.kind.is_container());
            tree.node_mut(id).meta.nesting_depth = depth;
        }
    }

    /// Indentation stack per outermost list
    ///
    /// An item attaches under the most recent item with strictly smaller
    /// indentation; otherwise it is a sibling at the depth reached.
    fn resolve_list_nesting(tree: &mut SyntaxTree) {
        let outer_lists: Vec<NodeId> = tree
            .nodes_of_kind(NodeKind::List)
            .filter(|(id, _)| !tree.has_ancestor(*id, NodeKind::ListItem))
            .map(|(id, _)| id)
            .collect();

        for list in outer_lists {
            let items: Vec<(NodeId, usize)> = tree
                .descendants(list)
                .into_iter()
                .filter(|&id| tree.node(id).kind == NodeKind::ListItem)
                .map(|id| (id, Self::marker_indent(tree, id)))
                .collect();

            let mut stack: Vec<(usize, NodeId)> = Vec::new();
            for (item, indent) in items {
                while stack.last().is_some_and(|&(open, _)| open >= indent) {
                    stack.pop();
                }
                let meta = &mut tree.node_mut(item).meta;
                meta.list_parent = stack.last().map(|&(_, id)| id);
                meta.nesting_depth = stack.len();
                stack.push((indent, item));
            }
        }
    }

    /// Byte column of an item's list marker within its source line
    fn marker_indent(tree: &SyntaxTree, item: NodeId) -> usize {
        let start = tree.node(item).span.start;
        let line_start = start.offset + 1 - start.column;
        let marker = tree.source()[start.offset..]
            .find(|c: char| c != ' ' && c != '\t' && c != '>')
            .map_or(start.offset, |skip| start.offset + skip);
        marker - line_start
    }

    /// Stack of open headers by level
    ///
    /// A header at level L closes every open header with level >= L and
    /// records the nearest remaining one as its parent.
    fn resolve_header_hierarchy(tree: &mut SyntaxTree) {
        let headers: Vec<(NodeId, u8)> = tree
            .nodes_of_kind(NodeKind::Header)
            .map(|(id, node)| (id, node.meta.level.unwrap_or(1)))
            .collect();

        let mut stack: Vec<(u8, NodeId)> = Vec::new();
        for (header, level) in headers {
            while stack.last().is_some_and(|&(open, _)| open >= level) {
                stack.pop();
            }
            let parent = stack.last().map(|&(_, id)| id);
            stack.push((level, header));

            let meta = &mut tree.node_mut(header).meta;
            meta.header_parent = parent;
            meta.hierarchy_level = Some(stack.len());
        }
    }

    /// One CommonMark blockquote per `>` marker, so the marker count equals
    /// the number of blockquotes on the ancestor chain
    fn resolve_blockquote_depth(tree: &mut SyntaxTree) {
        let quotes: Vec<NodeId> = tree
            .nodes_of_kind(NodeKind::Blockquote)
            .map(|(id, _)| id)
            .collect();

        for quote in quotes {
            let enclosing = tree
                .ancestors(quote)
                .filter(|&a| tree.node(a).kind == NodeKind::Blockquote)
                .count();
            tree.node_mut(quote).meta.quote_depth = Some(enclosing + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{AstBuilder, NodeKind, SyntaxTree};

    fn build(text: &str) -> SyntaxTree {
        AstBuilder::new().build(text)
    }

    #[test]
    fn test_list_nesting_depths() {
        let tree = build("- a\n  - b\n    - c\n  - d\n- e\n");
        let depths: Vec<usize> = tree
            .nodes_of_kind(NodeKind::ListItem)
            .map(|(_, n)| n.meta.nesting_depth)
            .collect();
        assert_eq!(depths, vec![0, 1, 2, 1, 0]);

        let items: Vec<_> = tree.nodes_of_kind(NodeKind::ListItem).map(|(id, _)| id).collect();
        assert_eq!(tree.node(items[1]).meta.list_parent, Some(items[0]));
        assert_eq!(tree.node(items[2]).meta.list_parent, Some(items[1]));
        assert_eq!(tree.node(items[3]).meta.list_parent, Some(items[0]));
        assert_eq!(tree.node(items[4]).meta.list_parent, None);
    }

    #[test]
    fn test_header_hierarchy() {
        let tree = build("# A\n\n## B\n\n### C\n\n## D\n\n# E\n\n### F\n");
        let headers: Vec<_> = tree.nodes_of_kind(NodeKind::Header).map(|(id, _)| id).collect();
        let levels: Vec<Option<usize>> = headers
            .iter()
            .map(|&id| tree.node(id).meta.hierarchy_level)
            .collect();
        assert_eq!(levels, vec![Some(1), Some(2), Some(3), Some(2), Some(1), Some(2)]);

        assert_eq!(tree.node(headers[0]).meta.header_parent, None);
        assert_eq!(tree.node(headers[2]).meta.header_parent, Some(headers[1]));
        assert_eq!(tree.node(headers[3]).meta.header_parent, Some(headers[0]));
        assert_eq!(tree.node(headers[5]).meta.header_parent, Some(headers[4]));
    }

    #[test]
    fn test_blockquote_depth() {
        let tree = build("> outer\n>\n> > inner\n");
        let depths: Vec<Option<usize>> = tree
            .nodes_of_kind(NodeKind::Blockquote)
            .map(|(_, n)| n.meta.quote_depth)
            .collect();
        assert_eq!(depths, vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_container_depth_for_inline_content() {
        let tree = build("> - quoted item\n");
        let (id, text) = tree.nodes_of_kind(NodeKind::Text).next().unwrap();
        assert_eq!(tree.text(id), "quoted item");
        assert_eq!(text.meta.nesting_depth, 2);
    }
}
