use cst::Template;
use cst::block::BlockKind;
use cst::block::field::Field;
use cst::parser::{ParseError, ParseErrorKind, Parser};

fn parse(source: &str) -> Template {
    Parser::new(source.to_string(), 0)
        .parse()
        .expect("parse failed")
}

fn parse_err(source: &str) -> ParseError {
    Parser::new(source.to_string(), 0)
        .parse()
        .expect_err("expected a parse error")
}

#[test]
fn bare_lines_become_string_blocks() {
    let template = parse("Hello\n\nWelcome {{user}}!\n");
    assert_eq!(template.blocks.len(), 3);
    for block in &template.blocks {
        assert_eq!(block.kind, BlockKind::String);
        assert_eq!(block.rows.len(), 1);
        assert!(block.header.is_none());
    }
    assert_eq!(template.blocks[0].rows[0], "Hello");
    assert_eq!(template.blocks[1].rows[0], "");
    assert_eq!(template.blocks[2].rows[0], "Welcome {{user}}!");
    assert_eq!(template.blocks[2].line, 3);
}

#[test]
fn foreach_block_collects_rows() {
    let src = "(block-start;type:foreach;source:data.csv)\nHello {0}, you are {1}\n  indented\n(block-end)";
    let template = parse(src);
    assert_eq!(template.blocks.len(), 1);
    let block = &template.blocks[0];
    assert_eq!(block.kind, BlockKind::Foreach);
    assert_eq!(block.source.as_deref(), Some("data.csv"));
    assert_eq!(block.rows, vec!["Hello {0}, you are {1}", "  indented"]);
    assert_eq!(
        block.fields,
        vec![Field::new("type", "foreach"), Field::new("source", "data.csv")]
    );
    assert_eq!(block.span, 0..src.len());
}

#[test]
fn blank_lines_inside_block_are_rows() {
    let template = parse("(block-start;type:foreach;source:a.csv)\n\n{0}\n\n(block-end)\n");
    assert_eq!(template.blocks[0].rows, vec!["", "{0}", ""]);
}

#[test]
fn store_block_is_self_closing() {
    let template = parse("(store;source:kv.csv)\n{{title}}\n");
    assert_eq!(template.blocks.len(), 2);
    assert_eq!(template.blocks[0].kind, BlockKind::Store);
    assert_eq!(template.blocks[0].source.as_deref(), Some("kv.csv"));
    assert!(template.blocks[0].rows.is_empty());
    assert_eq!(template.blocks[1].kind, BlockKind::String);
}

#[test]
fn store_marker_forces_store_kind() {
    let template = parse("(store;type:foreach;source:kv.csv)");
    assert_eq!(template.blocks[0].kind, BlockKind::Store);
}

#[test]
fn unknown_type_is_accepted_at_parse_time() {
    let template = parse("(block-start;type:table;source:x.csv;width:80)\nrow\n(block-end)");
    let block = &template.blocks[0];
    assert_eq!(block.kind, BlockKind::Other("table".into()));
    assert_eq!(block.field("width"), Some("80"));
}

#[test]
fn missing_type_yields_empty_kind_name() {
    let template = parse("(block-start;source:x.csv)\n(block-end)");
    assert_eq!(template.blocks[0].kind.name(), "");
}

#[test]
fn repeated_attribute_last_wins() {
    let template = parse("(block-start;type:foreach;source:a.csv;source:b.csv)\n(block-end)");
    assert_eq!(template.blocks[0].source.as_deref(), Some("b.csv"));
    assert_eq!(template.blocks[0].fields.len(), 3);
}

#[test]
fn blocks_keep_file_order() {
    let src = "top\n(store;source:kv.csv)\n(block-start;type:foreach;source:d.csv)\n{0}\n(block-end)\nbottom";
    let kinds: Vec<BlockKind> = parse(src).blocks.into_iter().map(|b| b.kind).collect();
    assert_eq!(
        kinds,
        vec![
            BlockKind::String,
            BlockKind::Store,
            BlockKind::Foreach,
            BlockKind::String
        ]
    );
}

#[test]
fn nested_block_start_is_rejected() {
    let err = parse_err("(block-start;type:foreach;source:a.csv)\n(block-start;type:foreach;source:b.csv)\n(block-end)");
    assert_eq!(err.kind, ParseErrorKind::NestedBlock("(block-start)"));
    assert_eq!(err.line, 2);
    assert_eq!(err.text, "(block-start;type:foreach;source:b.csv)");
}

#[test]
fn nesting_is_checked_before_header_syntax() {
    let err = parse_err("(block-start;type:foreach;source:a.csv)\n(block-start;broken\n");
    assert_eq!(err.kind, ParseErrorKind::NestedBlock("(block-start)"));
}

#[test]
fn store_inside_block_is_rejected() {
    let err = parse_err("(block-start;type:foreach;source:a.csv)\n(store;source:kv.csv)\n(block-end)");
    assert_eq!(err.kind, ParseErrorKind::NestedBlock("(store)"));
    assert_eq!(err.line, 2);
}

#[test]
fn unmatched_block_end_is_rejected() {
    let err = parse_err("text\n(block-end)\n");
    assert_eq!(err.kind, ParseErrorKind::UnmatchedBlockEnd);
    assert_eq!(err.line, 2);
}

#[test]
fn unterminated_block_points_at_opening_marker() {
    let src = "intro\n(block-start;type:foreach;source:a.csv)\n{0}\n";
    let err = parse_err(src);
    assert_eq!(err.kind, ParseErrorKind::UnterminatedBlock);
    assert_eq!(err.line, 2);
    assert_eq!(&src[err.span.clone()], "(block-start;type:foreach;source:a.csv)");
}

#[test]
fn missing_closing_parenthesis_is_malformed() {
    let err = parse_err("(block-start;type:foreach;source:a.csv\n(block-end)");
    assert!(matches!(err.kind, ParseErrorKind::MalformedHeader(_)));
    let err = parse_err("(store;source:kv.csv");
    assert!(matches!(err.kind, ParseErrorKind::MalformedHeader(_)));
}

#[test]
fn attribute_without_colon_is_malformed() {
    let err = parse_err("(block-start;type:foreach;sourcedata.csv)\n(block-end)");
    assert!(matches!(err.kind, ParseErrorKind::MalformedHeader(_)));
    assert_eq!(err.line, 1);
}

#[test]
fn error_display_includes_line() {
    let err = parse_err("a\nb\n(block-end)");
    assert_eq!(
        err.to_string(),
        "line 3: (block-end) without a matching (block-start)"
    );
}

#[test]
fn crlf_templates_parse_like_lf() {
    let template = parse("(block-start;type:foreach;source:a.csv)\r\n{0}\r\n(block-end)\r\n");
    assert_eq!(template.blocks.len(), 1);
    assert_eq!(template.blocks[0].rows, vec!["{0}"]);
}

#[test]
fn empty_template_has_no_blocks() {
    assert!(parse("").is_empty());
}
