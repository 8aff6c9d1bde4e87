//! 块参照展开：把 INSERT 替换为块定义中的图元，按累计插入点平移。

use topo_core::geometry::Vector2;
use topo_core::primitive::{Drawing, Primitive, PrimitiveId};
use tracing::debug;

use crate::errors::{Diagnostic, SkipReason};

/// 展开结果。展开出的图元沿用顶层 INSERT 的编号，诊断因此能指回图纸中的原始实体。
#[derive(Debug, Default, Clone)]
pub struct Expansion {
    pub primitives: Vec<(PrimitiveId, Primitive)>,
    pub diagnostics: Vec<Diagnostic>,
}

/// 递归展开所有块参照。未定义的块、自引用的块与超过 `max_depth` 层的嵌套都会跳过并记录诊断。
pub fn expand_inserts(drawing: &Drawing, max_depth: usize) -> Expansion {
    let mut expansion = Expansion::default();
    let mut stack = Vec::new();
    for (id, primitive) in drawing.primitives() {
        expand_one(
            drawing,
            *id,
            primitive,
            Vector2::new(0.0, 0.0),
            &mut stack,
            max_depth,
            &mut expansion,
        );
    }
    expansion
}

fn expand_one<'a>(
    drawing: &'a Drawing,
    id: PrimitiveId,
    primitive: &Primitive,
    offset: Vector2,
    stack: &mut Vec<&'a str>,
    max_depth: usize,
    expansion: &mut Expansion,
) {
    let Primitive::Insert(insert) = primitive else {
        let placed = if offset.length_squared() > 0.0 {
            primitive.translated(offset)
        } else {
            primitive.clone()
        };
        expansion.primitives.push((id, placed));
        return;
    };

    let reason = if !insert.insert.is_finite() {
        Some(SkipReason::NonFinite { field: "insert" })
    } else if stack.len() >= max_depth {
        Some(SkipReason::NestingTooDeep(max_depth))
    } else if stack.iter().any(|name| *name == insert.block_name) {
        Some(SkipReason::RecursiveBlock(insert.block_name.clone()))
    } else {
        None
    };
    if let Some(reason) = reason {
        expansion.diagnostics.push(Diagnostic {
            primitive: id,
            kind: primitive.kind(),
            reason,
        });
        return;
    }

    let Some(block) = drawing.block(&insert.block_name) else {
        expansion.diagnostics.push(Diagnostic {
            primitive: id,
            kind: primitive.kind(),
            reason: SkipReason::UnknownBlock(insert.block_name.clone()),
        });
        return;
    };

    let insert_offset = insert.insert.as_vec2();
    let nested_offset = Vector2::from(offset.as_vec2() + insert_offset);
    debug!(
        block = %block.name,
        depth = stack.len() + 1,
        primitives = block.primitives.len(),
        "展开块参照"
    );
    stack.push(block.name.as_str());
    for child in &block.primitives {
        expand_one(
            drawing,
            id,
            child,
            nested_offset,
            stack,
            max_depth,
            expansion,
        );
    }
    stack.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use topo_core::geometry::Point2;
    use topo_core::primitive::{BlockDefinition, Circle, Insert};

    fn circle(x: f64, y: f64) -> Primitive {
        Primitive::Circle(Circle {
            center: Point2::new(x, y),
            radius: 1.0,
        })
    }

    fn insert(name: &str, x: f64, y: f64) -> Primitive {
        Primitive::Insert(Insert {
            block_name: name.to_string(),
            insert: Point2::new(x, y),
        })
    }

    #[test]
    fn nested_inserts_accumulate_offsets() {
        let mut drawing = Drawing::new();
        drawing.add_block_definition(BlockDefinition {
            name: "inner".into(),
            primitives: vec![circle(1.0, 0.0)],
        });
        drawing.add_block_definition(BlockDefinition {
            name: "outer".into(),
            primitives: vec![insert("inner", 10.0, 0.0), circle(0.0, 0.0)],
        });
        let id = drawing.add_insert("outer", Point2::new(100.0, 5.0));

        let expansion = expand_inserts(&drawing, 16);
        assert!(expansion.diagnostics.is_empty());
        assert_eq!(expansion.primitives.len(), 2);
        assert!(expansion.primitives.iter().all(|(pid, _)| *pid == id));
        assert_eq!(expansion.primitives[0].1, circle(111.0, 5.0));
        assert_eq!(expansion.primitives[1].1, circle(100.0, 5.0));
    }

    #[test]
    fn self_reference_is_reported_not_followed() {
        let mut drawing = Drawing::new();
        drawing.add_block_definition(BlockDefinition {
            name: "loop".into(),
            primitives: vec![circle(0.0, 0.0), insert("loop", 1.0, 1.0)],
        });
        drawing.add_insert("loop", Point2::new(0.0, 0.0));

        let expansion = expand_inserts(&drawing, 16);
        assert_eq!(expansion.primitives.len(), 1);
        assert_eq!(expansion.diagnostics.len(), 1);
        assert_eq!(
            expansion.diagnostics[0].reason,
            SkipReason::RecursiveBlock("loop".into())
        );
    }

    #[test]
    fn unknown_block_and_depth_limit_are_skipped() {
        let mut drawing = Drawing::new();
        drawing.add_insert("missing", Point2::new(0.0, 0.0));
        drawing.add_block_definition(BlockDefinition {
            name: "a".into(),
            primitives: vec![insert("b", 0.0, 0.0)],
        });
        drawing.add_block_definition(BlockDefinition {
            name: "b".into(),
            primitives: vec![circle(0.0, 0.0)],
        });
        drawing.add_insert("a", Point2::new(0.0, 0.0));

        let expansion = expand_inserts(&drawing, 1);
        let reasons: Vec<_> = expansion
            .diagnostics
            .iter()
            .map(|diagnostic| diagnostic.reason.clone())
            .collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::UnknownBlock("missing".into()),
                SkipReason::NestingTooDeep(1)
            ]
        );
        assert!(expansion.primitives.is_empty());
    }
}
