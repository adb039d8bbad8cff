//! Parser tests for the S-expression text format

use crate::ast::{SExpr, Span};
use crate::parser::parse_source;

#[test]
fn test_parse_empty_document() {
    assert!(parse_source("").unwrap().is_empty());
}

#[test]
fn test_parse_nested_lists() {
    let doc = parse_source("(block $l (nop))").unwrap();
    assert_eq!(doc.len(), 1);
    let items = doc[0].node.as_list().expect("list");
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].node.as_atom(), Some("block"));
    assert_eq!(items[1].node.as_label(), Some("l"));
    assert_eq!(items[2].node.head(), Some("nop"));
}

#[test]
fn test_parse_spans_cover_lists() {
    let doc = parse_source("  (drop (i32.const 1))").unwrap();
    assert_eq!(doc[0].span, Span::new(2, 22));
    let items = doc[0].node.as_list().unwrap();
    assert_eq!(items[1].span, Span::new(8, 21));
}

#[test]
fn test_parse_literals() {
    let doc = parse_source("(f64.const 2.5) (i64.const -9)").unwrap();
    assert_eq!(doc.len(), 2);
    assert_eq!(doc[0].node.as_list().unwrap()[1].node, SExpr::Float(2.5));
    assert_eq!(doc[1].node.as_list().unwrap()[1].node, SExpr::Int(-9));
}

#[test]
fn test_parse_unbalanced_fails() {
    assert!(parse_source("(block (nop)").is_err());
    assert!(parse_source("(nop))").is_err());
}

#[test]
fn test_parse_error_span_points_at_token() {
    let err = parse_source("(nop))").unwrap_err();
    assert_eq!(err.span(), Some(Span::new(5, 6)));
}
