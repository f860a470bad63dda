use super::*;
use crate::error::StmtError;
use crate::placeholder::{Token, tokenize};
use crate::qb::select;

fn placeholders(sql: &str) -> Vec<usize> {
    tokenize(sql)
        .into_iter()
        .filter_map(|t| match t {
            Token::Placeholder(idx) => Some(idx),
            Token::Text(_) => None,
        })
        .collect()
}

#[test]
fn test_basic_render() {
    let mut s = Statement::new();
    s.eq("status", "active").or().gt("age", 18);

    let built = s.render();
    assert_eq!(built.sql, "WHERE (status = $1) OR (age > $2)");
    assert_eq!(built.values, vec![Value::from("active"), Value::from(18)]);
}

#[test]
fn test_empty_statement() {
    let mut s = Statement::new();
    assert!(s.is_empty());
    assert_eq!(s.render(), &BuiltQuery::default());

    // prepended values survive so the composed query stays aligned
    s.add_params(vec!["x"]);
    let built = s.render();
    assert_eq!(built.sql, "");
    assert_eq!(built.values, vec![Value::from("x")]);
}

#[test]
fn test_single_fragment_has_no_combinator() {
    let mut s = Statement::new();
    s.or().eq("a", 1);
    assert_eq!(s.fragments()[0].combinator(), Combinator::None);
    assert_eq!(s.to_sql(), "WHERE (a = $1)");

    s.eq("b", 2);
    assert_eq!(s.fragments()[1].combinator(), Combinator::And);
}

#[test]
fn test_add_group() {
    let mut s = Statement::new();
    s.eq("a", 1);

    let mut g = Statement::group();
    g.eq("a", 1).or().eq("b", 2);
    s.and_group(&g);

    let built = s.render();
    assert_eq!(built.sql, "WHERE (a = $1) AND ((a = $2) OR (b = $3))");
    assert_eq!(built.values.len(), 3);
}

#[test]
fn test_empty_group_is_ignored() {
    let mut s = Statement::new();
    s.eq("a", 1).or_group(&Statement::group());
    assert_eq!(s.len(), 1);
}

#[test]
fn test_numbering_is_contiguous() {
    let mut g = Statement::group();
    g.in_list("id", vec![1, 2, 3]).or().is_null("deleted_at");

    let mut s = Statement::new();
    s.between("age", 18, 65)
        .and_group(&g)
        .like("name", "a%")
        .raw("score > ? AND score < ?", vec![10, 20])
        .unwrap()
        .any("tag", vec!["x", "y"]);
    s.add_offset(4);

    let built = s.render().clone();
    let expected: Vec<usize> = (5..5 + built.values.len()).collect();
    assert_eq!(placeholders(&built.sql), expected);
    assert_eq!(s.param_count(), 9);
}

#[test]
fn test_relative_offsets() {
    let mut s = Statement::new();
    s.eq("a", 1);

    s.add_offset(2);
    assert_eq!(s.to_sql(), "WHERE (a = $3)");

    s.add_offset(1);
    assert_eq!(s.to_sql(), "WHERE (a = $4)");
    assert_eq!(s.offset(), 3);

    s.set_offset(5);
    assert_eq!(s.to_sql(), "WHERE (a = $6)");

    s.reset_offset();
    assert_eq!(s.to_sql(), "WHERE (a = $1)");
}

#[test]
fn test_add_params_prepends_values() {
    let mut s = Statement::new();
    s.eq("a", 1);
    s.add_params(vec!["x", "y"]);

    let built = s.render();
    assert_eq!(built.sql, "WHERE (a = $3)");
    assert_eq!(
        built.values,
        vec![Value::from("x"), Value::from("y"), Value::from(1)]
    );

    // prepended values keep their slots across resets
    s.reset_offset();
    assert_eq!(s.to_sql(), "WHERE (a = $3)");
    s.set_offset(1);
    assert_eq!(s.to_sql(), "WHERE (a = $4)");
}

#[test]
fn test_template_mismatch_fails_fast() {
    let mut s = Statement::new();
    let err = s
        .add_leaf("a = ? AND b = ?", 1, Combinator::And)
        .unwrap_err();
    assert!(matches!(
        err,
        StmtError::PlaceholderMismatch {
            expected: 2,
            found: 1,
            ..
        }
    ));
    assert!(s.is_empty());
    assert!(s.values().is_empty());

    assert!(s.raw("a = ?", ()).is_err());
}

#[test]
fn test_raw_leaf_is_counted() {
    let mut s = Statement::new();
    s.raw("deleted_at IS NULL", ()).unwrap();
    s.raw("tags && ?", Value::array(["a"])).unwrap();
    s.eq("id", 7);

    assert_eq!(
        s.to_sql(),
        "WHERE (deleted_at IS NULL) AND (tags && $1) AND (id = $2)"
    );
    assert_eq!(s.len(), 3);
}

#[test]
fn test_markers_inside_literals_are_not_slots() {
    let mut s = Statement::new();
    s.raw("note <> '?' AND id = ?", 5).unwrap();
    assert_eq!(s.to_sql(), "WHERE (note <> '?' AND id = $1)");
}

#[test]
fn test_custom_marker() {
    let mut s = Statement::new().with_marker(":v");
    assert_eq!(s.marker(), ":v");
    s.add_leaf("data ? :v", "key", Combinator::None).unwrap();
    assert_eq!(s.to_sql(), "WHERE (data ? $1)");
}

#[test]
fn test_render_is_memoized_until_mutation() {
    let mut s = Statement::new();
    s.eq("a", 1);
    let first = s.render().clone();
    assert_eq!(s.render(), &first);

    s.eq("b", 2);
    assert_eq!(s.to_sql(), "WHERE (a = $1) AND (b = $2)");

    s.add_offset(1);
    assert_eq!(s.to_sql(), "WHERE (a = $2) AND (b = $3)");
}

#[test]
fn test_clone_is_independent() {
    let mut original = Statement::new();
    original.eq("a", 1);
    let before = original.render().clone();

    let mut copy = original.clone();
    copy.eq("b", 2).add_offset(3);
    assert_eq!(copy.to_sql(), "WHERE (a = $4) AND (b = $5)");

    assert_eq!(original.render(), &before);
    assert_eq!(original.values().len(), 1);
}

#[test]
fn test_clear() {
    let mut s = Statement::having();
    s.gt("COUNT(*)", 5).add_offset(2);
    s.add_params(vec![1]);
    s.clear();

    assert!(s.is_empty());
    assert_eq!(s.offset(), 0);
    s.eq("x", 1);
    assert_eq!(s.to_sql(), "HAVING (x = $1)");
}

#[test]
fn test_keyword_toggle() {
    let mut s = Statement::on();
    s.eq("a.id", 1);
    assert_eq!(s.to_sql(), "ON (a.id = $1)");

    s.set_keyword_enabled(false);
    assert_eq!(s.to_sql(), "(a.id = $1)");
}

#[test]
fn test_list_helpers() {
    let mut s = Statement::new();
    s.in_list::<i32>("id", vec![])
        .not_in::<i32>("id", vec![])
        .not_in("kind", vec!["a", "b"]);
    assert_eq!(
        s.to_sql(),
        "WHERE (1=0) AND (1=1) AND (kind NOT IN ($1, $2))"
    );
}

#[test]
fn test_range_and_null_helpers() {
    let mut s = Statement::new();
    s.not_between("age", 1, 5)
        .is_not_null("email")
        .ne("role", "guest")
        .lte("score", 10)
        .not_ilike("name", "%bot%");
    assert_eq!(
        s.to_sql(),
        "WHERE (age NOT BETWEEN $1 AND $2) AND (email IS NOT NULL) AND (role != $3) \
         AND (score <= $4) AND (name NOT ILIKE $5)"
    );
}

#[test]
fn test_text_search() {
    let mut s = Statement::new();
    s.search("body", "rust async", TextSearch::Websearch);
    assert_eq!(
        s.to_sql(),
        "WHERE (to_tsvector(body) @@ websearch_to_tsquery($1))"
    );

    let mut s = Statement::new();
    s.search_with_config("english", "body", "rust", TextSearch::Plain);
    assert_eq!(
        s.to_sql(),
        "WHERE (to_tsvector($1::regconfig, body) @@ plainto_tsquery($2::regconfig, $3))"
    );

    let built = s.build(EqualityMode::Strict).unwrap();
    assert_eq!(
        built.sql,
        "WHERE (to_tsvector($1::regconfig, body) @@ plainto_tsquery($1::regconfig, $2))"
    );
    assert_eq!(built.values, vec![Value::from("english"), Value::from("rust")]);
}

#[test]
fn test_multi_ilike() {
    let mut s = Statement::new();
    s.eq("active", true).multi_ilike(&["name", "email"], "%ann%");
    assert_eq!(
        s.to_sql(),
        "WHERE (active = $1) AND ((name ILIKE $2) OR (email ILIKE $3))"
    );
}

#[test]
fn test_optional_helpers() {
    let mut s = Statement::new();
    s.eq_opt("a", Some(1))
        .eq_opt::<i32>("b", None)
        .like_opt("c", Some("x%"))
        .in_opt::<i32>("d", Some(vec![]))
        .in_opt("e", Some(vec![3]));
    assert_eq!(s.to_sql(), "WHERE (a = $1) AND (c LIKE $2) AND (e IN ($3))");
}

#[test]
fn test_subquery_inserted_first() {
    let mut sub = select("orders").select("user_id").eq("kind", "refund");

    let mut s = Statement::new();
    s.in_subquery("id", &mut sub).unwrap();
    s.eq("status", "active").gt("age", 18);

    let built = s.render();
    assert_eq!(
        built.sql,
        "WHERE (id IN (SELECT user_id FROM orders WHERE (kind = $1))) AND (status = $2) AND (age > $3)"
    );
    assert_eq!(
        built.values,
        vec![Value::from("refund"), Value::from("active"), Value::from(18)]
    );
}

#[test]
fn test_subquery_after_offset() {
    let mut sub = select("bans").select("user_id").gt("until", 100);

    let mut s = Statement::new();
    s.eq("org", 1).not_exists(&mut sub).unwrap();
    s.add_offset(2);
    assert_eq!(
        s.to_sql(),
        "WHERE (org = $3) AND (NOT EXISTS (SELECT user_id FROM bans WHERE (until > $4)))"
    );
}

#[test]
fn test_subquery_with_shared_placeholder() {
    let mut sub = select("c").select("id").with_raw(
        "c",
        "SELECT id FROM x WHERE a = $1 OR b = $1",
        vec![Value::from(5)],
    );

    let mut s = Statement::new();
    s.eq("org", 1).in_subquery("id", &mut sub).unwrap();

    let built = s.render();
    assert_eq!(
        built.sql,
        "WHERE (org = $1) AND (id IN (WITH c AS (SELECT id FROM x WHERE a = $2 OR b = $2) \
         SELECT id FROM c))"
    );
    assert_eq!(built.values, vec![Value::from(1), Value::from(5)]);

    s.add_offset(1);
    assert_eq!(
        s.to_sql(),
        "WHERE (org = $2) AND (id IN (WITH c AS (SELECT id FROM x WHERE a = $3 OR b = $3) \
         SELECT id FROM c))"
    );
}

#[test]
fn test_build_dedupes_mixed_leaves() {
    let mut s = Statement::new();
    s.eq("a", 1).or().eq("b", 1).and().eq("status", "active");

    let built = s.build(EqualityMode::Deep).unwrap();
    assert_eq!(built.sql, "WHERE (a = $1) OR (b = $1) AND (status = $2)");
    assert_eq!(built.values, vec![Value::from(1), Value::from("active")]);

    // the memoized render keeps every slot
    assert_eq!(s.render().values.len(), 3);
}

#[test]
fn test_suppressed_dedupe() {
    let mut s = Statement::new();
    s.eq("a", 1).eq("b", 1);
    s.set_dedup_suppressed(true);
    let built = s.build(EqualityMode::Strict).unwrap();
    assert_eq!(built.sql, "WHERE (a = $1) AND (b = $2)");
}
