//! Binding of crypt(3) hash strings into scheme records.

use crate::error::{Error, Result};
use crate::parse::{self, Fragment, ValueNode};
use crate::schema::{self, Field, FieldKind, FieldValue, Record, Schema};

/// Parses a hash string into a new scheme record.
pub fn unmarshal<T: Record>(hash: &str) -> Result<T> {
    let mut record = T::default();
    unmarshal_into(hash, &mut record)?;
    Ok(record)
}

struct GroupCtx {
    values: Vec<ValueNode>,
    remaining: usize,
    end: usize,
}

fn fail<T>(
    schema: &Schema<T>,
    value: &'static str,
    field: Option<&'static str>,
    offset: usize,
    msg: impl Into<String>,
) -> Error {
    Error::Unmarshal {
        value,
        type_name: schema.type_name,
        field,
        offset,
        msg: msg.into(),
    }
}

/// Parses a hash string into an existing scheme record.
///
/// Fields are matched against fragments left to right. A field marked
/// `omitempty` may be skipped when the fragment count shows its value is
/// absent; the bookkeeping mirrors the number of remaining fragments
/// against the number of remaining required fields.
pub fn unmarshal_into<T: Record>(hash: &str, record: &mut T) -> Result<()> {
    let tree = parse::parse(hash)?;
    let schema = schema::of::<T>()?;

    if let Some(prefix_field) = &schema.prefix {
        match &tree.prefix {
            Some(p) => bind(record, &schema, prefix_field, &p.text, "prefix", p.end)?,
            None if !prefix_field.opts.omit_empty => {
                return Err(fail(
                    &schema,
                    "EOF",
                    Some(prefix_field.name),
                    hash.len(),
                    "prefix not found",
                ));
            }
            None => {}
        }
    }

    let mut frag_idx = 0usize;
    let mut inline_used = 0usize;
    let mut group: Option<GroupCtx> = None;
    let mut num_values = tree.fragments.len() as isize;
    let mut num_req = schema.required as isize;

    for field in &schema.fields {
        if !field.opts.group {
            if let Some(g) = group.take() {
                if g.remaining > 0 {
                    return Err(fail(
                        &schema,
                        "group",
                        Some(field.name),
                        g.end,
                        "excessive fragment",
                    ));
                }
                frag_idx += 1;
                inline_used = 0;
            }
        }
        if frag_idx >= tree.fragments.len() {
            if field.opts.omit_empty {
                continue;
            }
            return Err(fail(
                &schema,
                "EOF",
                Some(field.name),
                hash.len(),
                "unexpected EOF",
            ));
        }
        if field.opts.omit_empty
            && !field.opts.group
            && group.is_none()
            && num_values - num_req <= 0
        {
            num_values -= 1;
            continue;
        }
        let frag = &tree.fragments[frag_idx];
        if field.opts.group {
            match frag {
                Fragment::Group(values) => {
                    if group.is_none() {
                        group = Some(GroupCtx {
                            values: values.clone(),
                            remaining: values.len(),
                            end: frag.end(),
                        });
                    }
                }
                Fragment::Value(v) => {
                    if field.opts.omit_empty {
                        continue;
                    }
                    group = Some(GroupCtx {
                        values: vec![v.clone()],
                        remaining: 1,
                        end: v.end,
                    });
                }
            }
            let g = match group.as_mut() {
                Some(g) => g,
                None => continue,
            };
            // group implies param, checked at schema compile time
            let needle = format!("{}=", field.opts.param.unwrap_or_default());
            match g.values.iter().find(|v| v.text.starts_with(&needle)) {
                Some(v) => {
                    let (text, end) = (v.text.clone(), v.end);
                    g.remaining = g.remaining.saturating_sub(1);
                    bind(record, &schema, field, &text, "value", end)?;
                }
                None if !field.opts.omit_empty => {
                    return Err(fail(
                        &schema,
                        frag.label(),
                        Some(field.name),
                        frag.end(),
                        "grouped param not found",
                    ));
                }
                None => {}
            }
            continue;
        }
        match frag {
            Fragment::Value(v) => {
                let text = v.text.get(inline_used..).unwrap_or_default();
                let matched = match field.opts.param {
                    Some(p) => text.starts_with(&format!("{}=", p)),
                    None => true,
                };
                if !matched {
                    if field.opts.omit_empty {
                        continue;
                    }
                    return Err(fail(
                        &schema,
                        "value",
                        Some(field.name),
                        v.end,
                        format!("{} not found", field.describe()),
                    ));
                }
                bind(record, &schema, field, text, "value", v.end)?;
                num_values -= 1;
                if !field.opts.omit_empty {
                    num_req -= 1;
                }
                if field.opts.inline {
                    inline_used += field.opts.length;
                } else {
                    frag_idx += 1;
                    inline_used = 0;
                }
            }
            Fragment::Group(_) => {
                if field.opts.omit_empty {
                    continue;
                }
                return Err(fail(
                    &schema,
                    "group",
                    Some(field.name),
                    frag.end(),
                    format!("{} not found", field.describe()),
                ));
            }
        }
    }

    if let Some(g) = group.take() {
        if g.remaining > 0 {
            return Err(fail(&schema, "group", None, g.end, "excessive fragment"));
        }
        frag_idx += 1;
    }
    if let Some(frag) = tree.fragments.get(frag_idx) {
        return Err(fail(
            &schema,
            frag.label(),
            None,
            frag.end(),
            "excessive fragment",
        ));
    }
    Ok(())
}

fn bind<T>(
    record: &mut T,
    schema: &Schema<T>,
    field: &Field<T>,
    text: &str,
    label: &'static str,
    offset: usize,
) -> Result<()> {
    let fail = |msg: String| Error::Unmarshal {
        value: label,
        type_name: schema.type_name,
        field: Some(field.name),
        offset,
        msg,
    };
    if field.opts.prefix && !matches!(field.kind, FieldKind::Str | FieldKind::Text) {
        return Err(fail("unsupported type".to_string()));
    }
    let mut text = text;
    if let Some(param) = field.opts.param {
        if let Some(rest) = text.strip_prefix(&format!("{}=", param)) {
            text = rest;
        }
    }
    let mut take = text.len();
    if field.opts.length > 0 {
        if field.opts.inline {
            if text.len() < field.opts.length {
                return Err(fail("length mismatch".to_string()));
            }
            take = field.opts.length;
        } else if text.len() != field.opts.length {
            return Err(fail("length mismatch".to_string()));
        }
    }
    if let Some(enc) = field.opts.encoding {
        if let Some(i) = enc.index_any_invalid(&text.as_bytes()[..take]) {
            return Err(fail(format!(
                "invalid character '{}'",
                text.as_bytes()[i] as char
            )));
        }
    }
    if take < text.len() {
        // take falls on a char boundary whenever the alphabet check ran,
        // since every alphabet is ASCII
        text = match text.get(..take) {
            Some(t) => t,
            None => return Err(fail("length mismatch".to_string())),
        };
    }
    match field.kind {
        FieldKind::Text => match &field.decode {
            Some(decode) => decode(record, text).map_err(fail),
            None => Ok(()),
        },
        FieldKind::Bytes => {
            if let Some(set) = &field.set {
                set(record, FieldValue::Bytes(text.as_bytes().to_vec()));
            }
            Ok(())
        }
        FieldKind::Uint => {
            let invalid = || fail(format!("invalid integer {:?}", text));
            let v = u64::from_str_radix(text, field.opts.base).map_err(|_| invalid())?;
            if field.bits < 64 && v >> field.bits != 0 {
                return Err(invalid());
            }
            if let Some(set) = &field.set {
                set(record, FieldValue::Uint(v));
            }
            Ok(())
        }
        FieldKind::Str => {
            if let Some(set) = &field.set {
                set(record, FieldValue::Str(text.to_string()));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;

    #[derive(Default, Debug, PartialEq)]
    struct Optional {
        prefix: String,
        a: String,
        o1: String,
        o2: String,
        b: String,
        o3: String,
        c: String,
    }

    impl Record for Optional {
        fn describe(b: &mut SchemaBuilder<Self>) {
            b.string("prefix", "", |s| &s.prefix, |s| &mut s.prefix);
            b.string("a", "", |s| &s.a, |s| &mut s.a);
            b.string("o1", "omitempty", |s| &s.o1, |s| &mut s.o1);
            b.string("o2", "omitempty", |s| &s.o2, |s| &mut s.o2);
            b.string("b", "", |s| &s.b, |s| &mut s.b);
            b.string("o3", "omitempty", |s| &s.o3, |s| &mut s.o3);
            b.string("c", "", |s| &s.c, |s| &mut s.c);
        }
    }

    #[test]
    fn skips_absent_optional_values() {
        let v: Optional = unmarshal("$test$a$b$c").unwrap();
        assert_eq!(
            v,
            Optional {
                prefix: "$test$".to_string(),
                a: "a".to_string(),
                b: "b".to_string(),
                c: "c".to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn fills_present_optional_values() {
        let v: Optional = unmarshal("$test$a$x$y$b$z$c").unwrap();
        assert_eq!(
            v,
            Optional {
                prefix: "$test$".to_string(),
                a: "a".to_string(),
                o1: "x".to_string(),
                o2: "y".to_string(),
                b: "b".to_string(),
                o3: "z".to_string(),
                c: "c".to_string(),
            }
        );
    }

    #[derive(Default, Debug, PartialEq)]
    struct Grouped {
        prefix: String,
        memory: u32,
        time: u32,
        salt: String,
    }

    impl Record for Grouped {
        fn describe(b: &mut SchemaBuilder<Self>) {
            b.string("prefix", "", |s| &s.prefix, |s| &mut s.prefix);
            b.uint32("memory", "param:m,group", |s| s.memory, |s, v| s.memory = v);
            b.uint32("time", "param:t,group", |s| s.time, |s, v| s.time = v);
            b.string("salt", "", |s| &s.salt, |s| &mut s.salt);
        }
    }

    #[test]
    fn binds_grouped_params() {
        let v: Grouped = unmarshal("$test$m=512,t=3$abc").unwrap();
        assert_eq!(
            v,
            Grouped {
                prefix: "$test$".to_string(),
                memory: 512,
                time: 3,
                salt: "abc".to_string(),
            }
        );
    }

    #[test]
    fn rejects_unconsumed_group_values() {
        assert_eq!(
            unmarshal::<Grouped>("$test$m=512,t=3,p=1$abc").unwrap_err(),
            Error::Unmarshal {
                value: "group",
                type_name: "Grouped",
                field: Some("salt"),
                offset: 19,
                msg: "excessive fragment".to_string(),
            }
        );
    }

    #[test]
    fn rejects_missing_grouped_param() {
        assert_eq!(
            unmarshal::<Grouped>("$test$m=512$abc").unwrap_err(),
            Error::Unmarshal {
                value: "value",
                type_name: "Grouped",
                field: Some("time"),
                offset: 11,
                msg: "grouped param not found".to_string(),
            }
        );
    }

    #[test]
    fn rejects_trailing_fragments() {
        assert_eq!(
            unmarshal::<Grouped>("$test$m=512,t=3$abc$extra").unwrap_err(),
            Error::Unmarshal {
                value: "value",
                type_name: "Grouped",
                field: None,
                offset: 25,
                msg: "excessive fragment".to_string(),
            }
        );
    }

    #[test]
    fn rejects_truncated_hashes() {
        assert_eq!(
            unmarshal::<Grouped>("$test$m=512,t=3").unwrap_err(),
            Error::Unmarshal {
                value: "EOF",
                type_name: "Grouped",
                field: Some("salt"),
                offset: 15,
                msg: "unexpected EOF".to_string(),
            }
        );
    }

    #[test]
    fn rejects_missing_prefix() {
        assert_eq!(
            unmarshal::<Grouped>("").unwrap_err(),
            Error::Unmarshal {
                value: "EOF",
                type_name: "Grouped",
                field: Some("prefix"),
                offset: 0,
                msg: "prefix not found".to_string(),
            }
        );
    }

    #[derive(Default, Debug, PartialEq)]
    struct Inline {
        rounds: u32,
        salt: String,
        sum: String,
    }

    impl Record for Inline {
        fn describe(b: &mut SchemaBuilder<Self>) {
            b.uint32("rounds", "length:4,inline,base:16", |s| s.rounds, |s, v| {
                s.rounds = v
            });
            b.string("salt", "length:4,inline", |s| &s.salt, |s| &mut s.salt);
            b.string("sum", "", |s| &s.sum, |s| &mut s.sum);
        }
    }

    #[test]
    fn inline_fields_share_a_fragment() {
        let v: Inline = unmarshal("00ffabcdsum").unwrap();
        assert_eq!(
            v,
            Inline {
                rounds: 0xff,
                salt: "abcd".to_string(),
                sum: "sum".to_string(),
            }
        );
    }

    #[test]
    fn inline_length_mismatch() {
        assert_eq!(
            unmarshal::<Inline>("00ffab").unwrap_err(),
            Error::Unmarshal {
                value: "value",
                type_name: "Inline",
                field: Some("salt"),
                offset: 6,
                msg: "length mismatch".to_string(),
            }
        );
    }

    #[test]
    fn inline_multibyte_boundary_is_invalid() {
        let input = "00f\u{e9}abcdsum";
        assert_eq!(
            unmarshal::<Inline>(input).unwrap_err(),
            Error::Unmarshal {
                value: "value",
                type_name: "Inline",
                field: Some("rounds"),
                offset: input.len(),
                msg: "invalid character '\u{c3}'".to_string(),
            }
        );
    }

    #[test]
    fn unvalidated_inline_multibyte_boundary_is_a_length_mismatch() {
        #[derive(Default, Debug, PartialEq)]
        struct Raw {
            head: String,
            tail: String,
        }

        impl Record for Raw {
            fn describe(b: &mut SchemaBuilder<Self>) {
                b.string("head", "length:2,inline,enc:none", |s| &s.head, |s| {
                    &mut s.head
                });
                b.string("tail", "enc:none", |s| &s.tail, |s| &mut s.tail);
            }
        }

        let v: Raw = unmarshal("\u{e9}xy").unwrap();
        assert_eq!(v.head, "\u{e9}");
        assert_eq!(v.tail, "xy");
        assert_eq!(
            unmarshal::<Raw>("\u{20ac}xy").unwrap_err(),
            Error::Unmarshal {
                value: "value",
                type_name: "Raw",
                field: Some("head"),
                offset: 5,
                msg: "length mismatch".to_string(),
            }
        );
    }

    #[test]
    fn invalid_characters_report_position() {
        let err = unmarshal::<Grouped>("$test$m=512,t=3$a@c").unwrap_err();
        assert_eq!(
            err,
            Error::Unmarshal {
                value: "value",
                type_name: "Grouped",
                field: Some("salt"),
                offset: 19,
                msg: "invalid character '@'".to_string(),
            }
        );
    }
}
