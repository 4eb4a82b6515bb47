//! `xsl:sort` keys for `apply-templates` and `for-each`.

use std::cmp::Ordering;

use super::context::ExecutionContext;
use crate::dom::Node;
use crate::error::Result;
use crate::xpath::{self, Expression};

#[derive(Debug)]
pub struct SortKey {
    pub select: Expression,
    pub descending: bool,
    pub numeric: bool,
}

/// Compiles one `xsl:sort` element into a key.
pub fn compile_sort_key(node: &Node) -> Result<SortKey> {
    let select = node.attribute("select").unwrap_or_default();
    let select = if select.is_empty() {
        "string(.)".to_string()
    } else {
        select
    };
    Ok(SortKey {
        select: xpath::parse_expression(&select)?,
        descending: node.attribute("order").as_deref() == Some("descending"),
        numeric: node.attribute("data-type").as_deref() == Some("number"),
    })
}

enum KeyValue {
    Text(String),
    Num(f64),
}

/// Stable sort by the given keys, compared in declaration order.
pub fn sort_nodes(nodes: &mut Vec<Node>, keys: &[SortKey], ctx: &ExecutionContext) -> Result<()> {
    if keys.is_empty() {
        return Ok(());
    }

    // Evaluate every key for every node up front; the comparator then never
    // touches the XPath engine.
    let mut decorated: Vec<(Vec<KeyValue>, Node)> = Vec::with_capacity(nodes.len());
    for node in nodes.iter() {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let value = ctx.eval_compiled(&key.select, node)?;
            values.push(if key.numeric {
                KeyValue::Num(value.number())
            } else {
                KeyValue::Text(value.string())
            });
        }
        decorated.push((values, node.clone()));
    }

    decorated.sort_by(|(a, _), (b, _)| {
        for (i, key) in keys.iter().enumerate() {
            let ord = match (&a[i], &b[i]) {
                (KeyValue::Text(x), KeyValue::Text(y)) => x.cmp(y),
                (KeyValue::Num(x), KeyValue::Num(y)) => {
                    x.partial_cmp(y).unwrap_or(Ordering::Equal)
                }
                _ => Ordering::Equal,
            };
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });

    *nodes = decorated.into_iter().map(|(_, n)| n).collect();
    Ok(())
}
